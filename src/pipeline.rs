//! Annotation pipeline: ingest and verify.
//!
//! `ingest` runs validate -> normalize timestamp -> render overlay ->
//! fingerprint -> persist file -> upsert record. Validation failures
//! happen before any rendering work and leave no trace; a render failure
//! aborts with nothing written; the stored file and its record are
//! written inside one critical section so the inconsistency window
//! between them is as small as a full-rewrite store allows.
//!
//! `verify` hashes the supplied bytes as-is and looks them up. It only
//! matches bytes that are byte-identical to some previously stored
//! annotated output — the original, un-annotated photo will not match.

use std::path::{Path, PathBuf};
use std::sync::RwLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::StampError;
use crate::fingerprint::{fingerprint, FILE_PREFIX_LEN};
use crate::overlay::OverlayRenderer;
use crate::store::{PhotoRecord, RecordStore};

/// Normalized timestamp layout used on the overlay and in records.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Directory holding the record file and the uploads subdirectory.
    pub data_dir: PathBuf,
    /// Optional scalable font for the overlay; built-in face otherwise.
    pub font_path: Option<PathBuf>,
    /// Lowercased filename extensions accepted for ingest.
    pub allowed_extensions: Vec<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            font_path: None,
            allowed_extensions: vec!["png".to_string(), "jpg".to_string(), "jpeg".to_string()],
        }
    }
}

impl PipelineConfig {
    /// Set the data directory.
    #[must_use]
    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    /// Set the overlay font path.
    #[must_use]
    pub fn with_font(mut self, path: impl Into<PathBuf>) -> Self {
        self.font_path = Some(path.into());
        self
    }

    /// Directory annotated files are written to.
    #[must_use]
    pub fn upload_dir(&self) -> PathBuf {
        self.data_dir.join("uploads")
    }

    /// Path of the durable record file.
    #[must_use]
    pub fn db_file(&self) -> PathBuf {
        self.data_dir.join("db.json")
    }
}

/// What a successful ingest hands back to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct IngestReceipt {
    /// Fingerprint of the annotated bytes, 64 hex chars.
    pub fingerprint: String,
    /// Name the annotated file was stored under.
    pub stored_file_name: String,
}

/// Result of a verify probe. A miss is a normal outcome.
#[derive(Debug, Clone, Serialize)]
pub struct VerifyOutcome {
    /// Fingerprint of the supplied bytes.
    pub fingerprint: String,
    /// The matching record, when one exists.
    pub record: Option<PhotoRecord>,
}

impl VerifyOutcome {
    /// Whether the bytes matched a previously ingested photo.
    #[must_use]
    pub fn found(&self) -> bool {
        self.record.is_some()
    }
}

/// Caller-supplied metadata accompanying an ingest.
#[derive(Debug, Clone, Default)]
pub struct IngestMeta {
    /// Capture timestamp hint; normalized leniently.
    pub timestamp: Option<String>,
    /// Latitude, passed through as an opaque string.
    pub latitude: Option<String>,
    /// Longitude, passed through as an opaque string.
    pub longitude: Option<String>,
    /// Free-text note.
    pub notes: String,
}

/// The content-addressed annotation pipeline.
///
/// The store sits behind an `RwLock`: lookups and exports run
/// concurrently, while ingest takes the write lock across the file write
/// and the record upsert so two full-rewrite saves cannot race.
#[derive(Debug)]
pub struct StampPipeline {
    config: PipelineConfig,
    renderer: OverlayRenderer,
    store: RwLock<RecordStore>,
}

impl StampPipeline {
    /// Build the pipeline: load fonts, open the record store, create the
    /// upload directory.
    pub fn new(config: PipelineConfig) -> Result<Self, StampError> {
        std::fs::create_dir_all(config.upload_dir())?;
        let renderer = OverlayRenderer::new(config.font_path.as_deref())?;
        let store = RwLock::new(RecordStore::open(config.db_file()));
        Ok(Self {
            config,
            renderer,
            store,
        })
    }

    /// Annotate, fingerprint, persist, and record one photograph.
    pub fn ingest(
        &self,
        raw_bytes: &[u8],
        filename_hint: &str,
        meta: &IngestMeta,
    ) -> Result<IngestReceipt, StampError> {
        if raw_bytes.is_empty() {
            return Err(StampError::EmptyInput);
        }
        let base_name = check_extension(filename_hint, &self.config.allowed_extensions)?;

        let captured_at = normalize_timestamp(meta.timestamp.as_deref());
        let latitude = non_empty(meta.latitude.as_deref());
        let longitude = non_empty(meta.longitude.as_deref());

        let mut lines = vec![
            captured_at.clone(),
            format!(
                "Lat: {} Lon: {}",
                latitude.as_deref().unwrap_or("N/A"),
                longitude.as_deref().unwrap_or("N/A"),
            ),
        ];
        if !meta.notes.is_empty() {
            lines.push(format!("Notes: {}", meta.notes));
        }

        let annotated = self.renderer.render(raw_bytes, &lines)?;
        let fingerprint = fingerprint(&annotated);
        let stored_file_name = format!("{}_{}.jpg", &fingerprint[..FILE_PREFIX_LEN], base_name);

        let record = PhotoRecord {
            stored_file_name: stored_file_name.clone(),
            captured_at,
            latitude,
            longitude,
            notes: meta.notes.clone(),
        };

        // File write and record upsert share the critical section; see
        // the module docs for the ordering contract.
        {
            let mut store = self.write_store()?;
            std::fs::write(self.config.upload_dir().join(&stored_file_name), &annotated)?;
            store.put(fingerprint.clone(), record)?;
        }

        info!(%fingerprint, file = %stored_file_name, "photo ingested");
        Ok(IngestReceipt {
            fingerprint,
            stored_file_name,
        })
    }

    /// Check whether `bytes` match a previously stored annotated photo.
    /// Never mutates the store; the bytes are hashed as supplied, without
    /// rendering.
    pub fn verify(&self, bytes: &[u8]) -> Result<VerifyOutcome, StampError> {
        let fingerprint = fingerprint(bytes);
        let record = self.read_store()?.get(&fingerprint).cloned();
        debug!(%fingerprint, found = record.is_some(), "verify probe");
        Ok(VerifyOutcome {
            fingerprint,
            record,
        })
    }

    /// Snapshot of all records in stable fingerprint order.
    pub fn records(&self) -> Result<Vec<(String, PhotoRecord)>, StampError> {
        Ok(self
            .read_store()?
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    /// Number of stored records.
    pub fn record_count(&self) -> Result<usize, StampError> {
        Ok(self.read_store()?.len())
    }

    /// CSV rendition of all records.
    pub fn export_csv(&self) -> Result<Vec<u8>, StampError> {
        self.read_store()?.export_csv()
    }

    /// Resolve a stored file name to its on-disk path, if the file
    /// exists. The name is re-sanitized so path components smuggled in by
    /// a caller cannot escape the upload directory.
    #[must_use]
    pub fn annotated_path(&self, stored_file_name: &str) -> Option<PathBuf> {
        let clean = sanitize_file_name(stored_file_name);
        let path = self.config.upload_dir().join(clean);
        path.is_file().then_some(path)
    }

    /// The configuration this pipeline was built with.
    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    fn read_store(&self) -> Result<std::sync::RwLockReadGuard<'_, RecordStore>, StampError> {
        self.store
            .read()
            .map_err(|_| StampError::StoreIo(std::io::Error::other("record store lock poisoned")))
    }

    fn write_store(&self) -> Result<std::sync::RwLockWriteGuard<'_, RecordStore>, StampError> {
        self.store
            .write()
            .map_err(|_| StampError::StoreIo(std::io::Error::other("record store lock poisoned")))
    }
}

/// Validate the filename extension and return the sanitized base name
/// (extension stripped) for use in the stored file name.
fn check_extension(filename_hint: &str, allowed: &[String]) -> Result<String, StampError> {
    let ext = Path::new(filename_hint)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .ok_or_else(|| StampError::UnsupportedType(filename_hint.to_string()))?;
    if !allowed.iter().any(|a| *a == ext) {
        return Err(StampError::UnsupportedType(ext));
    }
    Ok(sanitize_base_name(filename_hint))
}

/// Strip directories and the extension, then keep only `[A-Za-z0-9._-]`.
/// Falls back to `"photo"` rather than producing an empty name.
fn sanitize_base_name(filename_hint: &str) -> String {
    let stem = Path::new(filename_hint)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("");
    let clean = sanitize_file_name(stem);
    if clean.is_empty() {
        "photo".to_string()
    } else {
        clean
    }
}

fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect::<String>()
        .trim_matches('.')
        .to_string()
}

/// Normalize a timestamp hint to [`TIMESTAMP_FORMAT`].
///
/// No hint means "now" in UTC. A hint that parses under any of the
/// accepted layouts is reformatted; one that does not is passed through
/// verbatim — a bad timestamp never fails an ingest.
fn normalize_timestamp(hint: Option<&str>) -> String {
    match hint.map(str::trim) {
        None | Some("") => Utc::now().format(TIMESTAMP_FORMAT).to_string(),
        Some(raw) => parse_flexible(raw)
            .map_or_else(|| raw.to_string(), |dt| dt.format(TIMESTAMP_FORMAT).to_string()),
    }
}

fn parse_flexible(raw: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_utc());
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.naive_utc());
    }
    const DATETIME_LAYOUTS: [&str; 4] = [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y/%m/%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
    ];
    for layout in DATETIME_LAYOUTS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, layout) {
            return Some(dt);
        }
    }
    const DATE_LAYOUTS: [&str; 2] = ["%Y-%m-%d", "%Y/%m/%d"];
    for layout in DATE_LAYOUTS {
        if let Ok(d) = NaiveDate::parse_from_str(raw, layout) {
            return d.and_hms_opt(0, 0, 0);
        }
    }
    None
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
