//! `GeoStamp` - content-addressed photo provenance
//!
//! # Features
//!
//! - **Overlay rendering**: burns a timestamp/location/notes banner into
//!   the pixels, deterministically
//! - **Content addressing**: every annotated photo is keyed by the
//!   SHA-256 of its bytes, so re-submissions are recognized as duplicates
//! - **Durable records**: a JSON-backed store that survives restarts and
//!   degrades to empty rather than refusing to start on corrupt data
//! - **HTTP boundary**: multipart upload/verify, JSON listing, CSV export
//!
//! # Example
//!
//! ```rust,no_run
//! use geostamp::{IngestMeta, PipelineConfig, StampPipeline};
//!
//! fn main() -> anyhow::Result<()> {
//!     let pipeline = StampPipeline::new(PipelineConfig::default())?;
//!     let photo = std::fs::read("field_sample.jpg")?;
//!     let meta = IngestMeta {
//!         latitude: Some("60.17".into()),
//!         longitude: Some("24.94".into()),
//!         ..IngestMeta::default()
//!     };
//!     let receipt = pipeline.ingest(&photo, "field_sample.jpg", &meta)?;
//!     println!("stored as {} ({})", receipt.stored_file_name, receipt.fingerprint);
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod fingerprint;
pub mod overlay;
pub mod pipeline;
pub mod server;
pub mod store;

pub use error::StampError;
pub use fingerprint::{fingerprint, is_fingerprint, FILE_PREFIX_LEN, FINGERPRINT_LEN};
pub use overlay::{FontFace, OverlayRenderer};
pub use pipeline::{
    IngestMeta, IngestReceipt, PipelineConfig, StampPipeline, VerifyOutcome, TIMESTAMP_FORMAT,
};
pub use server::{router, serve};
pub use store::{PhotoRecord, RecordStore};

/// Version of geostamp
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
