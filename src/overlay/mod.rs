//! Overlay rendering: burns a provenance banner into photo pixels.
//!
//! The renderer decodes an uploaded image, alpha-blends a translucent
//! black banner across the bottom edge, draws the caption lines in white
//! on top of it, and re-encodes as fixed-quality JPEG.
//!
//! Rendering is deterministic: for the same input bytes, the same lines,
//! and the same font, the output bytes are identical across runs. The
//! fingerprint of the output is the photo's identity, so any
//! nondeterminism here would silently break duplicate detection.

pub mod font;

use std::io::Cursor;
use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, RgbaImage};
use tracing::debug;

use crate::error::StampError;

pub use font::FontFace;

/// Alpha of the banner rectangle (out of 255). Dark enough for contrast,
/// light enough that the photo stays visible underneath.
const BANNER_ALPHA: u32 = 140;

/// JPEG quality of the annotated output.
const JPEG_QUALITY: u8 = 85;

/// Renders caption banners onto decoded photos.
#[derive(Debug)]
pub struct OverlayRenderer {
    face: FontFace,
}

impl OverlayRenderer {
    /// Create a renderer, loading the overlay font.
    ///
    /// `font_path` selects a scalable TrueType face; when it is absent or
    /// unusable the embedded built-in face is used instead, so rendering
    /// is available whenever construction succeeds.
    pub fn new(font_path: Option<&Path>) -> Result<Self, StampError> {
        Ok(Self {
            face: FontFace::load(font_path)?,
        })
    }

    /// Burn `lines` into `image_bytes` and return the annotated JPEG.
    ///
    /// The banner spans the full width, is anchored to the bottom edge,
    /// and is clamped so it never extends above the top of the image.
    /// Lines are drawn left-aligned and are not wrapped or truncated; a
    /// line longer than the image simply runs off the right edge.
    pub fn render(&self, image_bytes: &[u8], lines: &[String]) -> Result<Vec<u8>, StampError> {
        let decoded = image::load_from_memory(image_bytes).map_err(StampError::Decode)?;
        let mut canvas = decoded.to_rgba8();
        let (width, height) = canvas.dimensions();

        if !lines.is_empty() {
            let font_px = (width as f32 / 40.0).max(12.0);
            let padding = ((font_px / 4.0) as u32).max(6);

            let line_heights: Vec<u32> = lines
                .iter()
                .map(|_| self.face.line_height(font_px).ceil() as u32)
                .collect();
            let text_height: u32 = line_heights.iter().sum::<u32>()
                + padding * (lines.len() as u32 - 1);
            let banner_height = text_height + padding * 2;
            let banner_top = height.saturating_sub(banner_height);

            blend_banner(&mut canvas, banner_top);

            let mut y = banner_top as f32 + padding as f32;
            for (line, line_height) in lines.iter().zip(&line_heights) {
                self.face.draw_line(&mut canvas, line, font_px, padding as f32, y);
                y += (*line_height + padding) as f32;
            }

            debug!(width, height, banner_height, lines = lines.len(), "banner composited");
        }

        encode_jpeg(canvas)
    }
}

/// Alpha-blend the translucent black banner over rows `top..height`.
/// Blending black at alpha `a` reduces each channel to `(255 - a)/255`.
fn blend_banner(canvas: &mut RgbaImage, top: u32) {
    let (width, height) = canvas.dimensions();
    for y in top..height {
        for x in 0..width {
            let pixel = canvas.get_pixel_mut(x, y);
            for channel in &mut pixel.0[..3] {
                *channel = (u32::from(*channel) * (255 - BANNER_ALPHA) / 255) as u8;
            }
        }
    }
}

/// Flatten to opaque RGB and encode at the fixed output quality.
fn encode_jpeg(canvas: RgbaImage) -> Result<Vec<u8>, StampError> {
    let flattened = DynamicImage::ImageRgba8(canvas).to_rgb8();
    let mut out = Cursor::new(Vec::new());
    let mut encoder = JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY);
    encoder
        .encode_image(&flattened)
        .map_err(|e| StampError::Render(format!("jpeg encode failed: {e}")))?;
    Ok(out.into_inner())
}
