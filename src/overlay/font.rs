//! Font face selection for the overlay renderer.
//!
//! Two branches: a scalable TrueType face loaded from a configured path,
//! and a built-in face (DejaVu Sans, embedded in the binary) that is
//! always available. If the configured face cannot be read or parsed the
//! renderer falls back to the built-in face and keeps going — font
//! trouble must never fail a render once the image has decoded.

use std::path::Path;

use ab_glyph::{point, Font, FontRef, FontVec, PxScale, ScaleFont};
use image::RgbaImage;
use tracing::{debug, warn};

use crate::error::StampError;

/// DejaVu Sans, embedded so the fallback branch can never be missing.
/// License: assets/fonts/LICENSE-DejaVu.
const BUILTIN_FONT: &[u8] = include_bytes!("../../assets/fonts/DejaVuSans.ttf");

/// The face the renderer draws with.
pub enum FontFace {
    /// TrueType face loaded from a user-configured path.
    Scalable(FontVec),
    /// Embedded DejaVu Sans.
    Builtin(FontRef<'static>),
}

impl FontFace {
    /// Load the configured face, falling back to the built-in one.
    ///
    /// The built-in face is parsed first; it ships inside the binary, so a
    /// parse failure means a broken build and is the only way this
    /// constructor errors. A bad `path` only produces a warning.
    pub fn load(path: Option<&Path>) -> Result<Self, StampError> {
        let builtin = FontRef::try_from_slice(BUILTIN_FONT)
            .map_err(|e| StampError::Render(format!("embedded font unusable: {e}")))?;

        if let Some(path) = path {
            match std::fs::read(path) {
                Ok(bytes) => match FontVec::try_from_vec(bytes) {
                    Ok(font) => {
                        debug!(path = %path.display(), "loaded scalable overlay font");
                        return Ok(Self::Scalable(font));
                    }
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "font unparseable, using built-in face");
                    }
                },
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "font unreadable, using built-in face");
                }
            }
        }

        Ok(Self::Builtin(builtin))
    }

    /// Rendered height of one line at `px` pixels (ascent minus descent).
    #[must_use]
    pub fn line_height(&self, px: f32) -> f32 {
        match self {
            Self::Scalable(f) => scaled_height(f, px),
            Self::Builtin(f) => scaled_height(f, px),
        }
    }

    /// Draw one line of text onto `canvas`, top-left corner at
    /// (`left`, `top`), blending glyph coverage into the existing pixels.
    /// Glyphs that fall outside the canvas are clipped, not an error.
    pub fn draw_line(&self, canvas: &mut RgbaImage, text: &str, px: f32, left: f32, top: f32) {
        match self {
            Self::Scalable(f) => draw_line(f, canvas, text, px, left, top),
            Self::Builtin(f) => draw_line(f, canvas, text, px, left, top),
        }
    }
}

impl std::fmt::Debug for FontFace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Scalable(_) => f.write_str("FontFace::Scalable"),
            Self::Builtin(_) => f.write_str("FontFace::Builtin"),
        }
    }
}

fn scaled_height<F: Font>(font: &F, px: f32) -> f32 {
    let scaled = font.as_scaled(PxScale::from(px));
    scaled.ascent() - scaled.descent()
}

/// Overlay text color. Solid white; the translucent banner underneath
/// provides the contrast.
const TEXT_LUMA: u8 = 255;

fn draw_line<F: Font>(font: &F, canvas: &mut RgbaImage, text: &str, px: f32, left: f32, top: f32) {
    let scale = PxScale::from(px);
    let scaled = font.as_scaled(scale);
    let baseline = top + scaled.ascent();
    let (width, height) = canvas.dimensions();

    let mut caret = left;
    let mut prev = None;
    for ch in text.chars() {
        let id = font.glyph_id(ch);
        if let Some(prev) = prev {
            caret += scaled.kern(prev, id);
        }
        let glyph = id.with_scale_and_position(scale, point(caret, baseline));
        caret += scaled.h_advance(id);
        prev = Some(id);

        let Some(outlined) = font.outline_glyph(glyph) else {
            continue; // whitespace and unmapped chars have no outline
        };
        let bounds = outlined.px_bounds();
        outlined.draw(|gx, gy, coverage| {
            if coverage <= 0.0 {
                return;
            }
            let x = bounds.min.x as i32 + gx as i32;
            let y = bounds.min.y as i32 + gy as i32;
            if x < 0 || y < 0 || x as u32 >= width || y as u32 >= height {
                return;
            }
            let pixel = canvas.get_pixel_mut(x as u32, y as u32);
            for channel in &mut pixel.0[..3] {
                let blended =
                    f32::from(*channel).mul_add(1.0 - coverage, f32::from(TEXT_LUMA) * coverage);
                *channel = blended.round().clamp(0.0, 255.0) as u8;
            }
        });
    }
}
