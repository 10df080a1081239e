//! Error taxonomy for the annotation pipeline.
//!
//! A lookup miss is *not* an error here: `verify` and `get` report misses
//! as `Option`/bool results. Everything in this enum is a genuine failure
//! of the request that produced it, isolated to that request.

use thiserror::Error;

/// Errors surfaced by the pipeline and its collaborators.
#[derive(Error, Debug)]
pub enum StampError {
    /// The uploaded file had zero bytes.
    #[error("empty upload")]
    EmptyInput,

    /// The upload's filename extension is not in the allowed set.
    #[error("file type not allowed: {0:?}")]
    UnsupportedType(String),

    /// The upload could not be decoded as a raster image.
    #[error("image decode failed: {0}")]
    Decode(#[source] image::ImageError),

    /// Overlay rendering or encoding failed.
    #[error("overlay render failed: {0}")]
    Render(String),

    /// Durable persistence (record file or stored image) failed.
    #[error("store I/O failed: {0}")]
    StoreIo(#[from] std::io::Error),

    /// The request itself was malformed (missing multipart field, etc.).
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl StampError {
    /// Whether this failure is the caller's fault (4xx class) as opposed
    /// to a server-side fault (5xx class).
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::EmptyInput | Self::UnsupportedType(_) | Self::Decode(_) | Self::InvalidRequest(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_vs_server_classification() {
        assert!(StampError::EmptyInput.is_client_error());
        assert!(StampError::UnsupportedType("gif".into()).is_client_error());
        assert!(!StampError::Render("no font".into()).is_client_error());
        assert!(!StampError::StoreIo(std::io::Error::other("disk full")).is_client_error());
    }

    #[test]
    fn messages_are_human_readable() {
        let err = StampError::UnsupportedType("svg".into());
        assert!(err.to_string().contains("svg"));
    }
}
