//! Durable record store: fingerprint → photo metadata.
//!
//! The whole mapping lives in memory and is rewritten to a single JSON
//! file on every mutation. Fine at the record counts this tool sees;
//! the write goes through a temp file and an atomic rename so a reader
//! never observes a half-written file. An unreadable or invalid file at
//! startup degrades to an empty store instead of refusing to start.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::StampError;

/// Metadata for one annotated photograph, keyed by its fingerprint.
///
/// Wire names match the durable JSON file; every field tolerates being
/// absent so older files (and files written by future versions with more
/// fields) keep loading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoRecord {
    /// File name the annotated bytes were persisted under.
    #[serde(rename = "filename", default)]
    pub stored_file_name: String,
    /// Normalized capture timestamp (`YYYY-MM-DD HH:MM:SS`), or the raw
    /// caller string when it could not be parsed.
    #[serde(rename = "timestamp", default)]
    pub captured_at: String,
    /// Caller-supplied latitude, passed through unvalidated. `None` means
    /// not available.
    #[serde(rename = "lat", default)]
    pub latitude: Option<String>,
    /// Caller-supplied longitude, same contract as `latitude`.
    #[serde(rename = "lon", default)]
    pub longitude: Option<String>,
    /// Free-text note, possibly empty.
    #[serde(default)]
    pub notes: String,
}

/// In-memory mapping mirrored to one JSON file.
#[derive(Debug)]
pub struct RecordStore {
    path: PathBuf,
    records: BTreeMap<String, PhotoRecord>,
}

impl RecordStore {
    /// Open the store backed by `path`, loading any existing records.
    ///
    /// A missing file starts empty; a corrupt file is logged and also
    /// starts empty. Startup never fails on bad data.
    #[must_use]
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let records = match std::fs::read(&path) {
            Ok(bytes) => match serde_json::from_slice(&bytes) {
                Ok(records) => records,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "record file invalid, starting empty");
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "record file unreadable, starting empty");
                BTreeMap::new()
            }
        };
        debug!(path = %path.display(), count = records.len(), "record store opened");
        Self { path, records }
    }

    /// Upsert a record and persist the full mapping before returning.
    ///
    /// Once this returns `Ok`, the record survives a process restart.
    pub fn put(&mut self, fingerprint: String, record: PhotoRecord) -> Result<(), StampError> {
        self.records.insert(fingerprint, record);
        self.save()?;
        Ok(())
    }

    /// Look up a record. A miss is a normal outcome, not an error.
    #[must_use]
    pub fn get(&self, fingerprint: &str) -> Option<&PhotoRecord> {
        self.records.get(fingerprint)
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the store holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterate `(fingerprint, record)` in stable fingerprint order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &PhotoRecord)> {
        self.records.iter()
    }

    /// Path of the durable file backing this store.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Serialize every record as CSV with a header row. Absent latitude
    /// and longitude become empty cells; `N/A` is an overlay-rendering
    /// concern, not an export value.
    pub fn export_csv(&self) -> Result<Vec<u8>, StampError> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer
            .write_record([
                "fingerprint",
                "stored_file_name",
                "captured_at",
                "latitude",
                "longitude",
                "notes",
            ])
            .map_err(csv_io)?;
        for (fingerprint, record) in &self.records {
            writer
                .write_record([
                    fingerprint.as_str(),
                    record.stored_file_name.as_str(),
                    record.captured_at.as_str(),
                    record.latitude.as_deref().unwrap_or(""),
                    record.longitude.as_deref().unwrap_or(""),
                    record.notes.as_str(),
                ])
                .map_err(csv_io)?;
        }
        writer
            .into_inner()
            .map_err(|e| StampError::StoreIo(e.into_error()))
    }

    /// Rewrite the durable file: serialize next to it, then rename over
    /// it so concurrent readers see either the old file or the new one.
    fn save(&self) -> Result<(), StampError> {
        let bytes = serde_json::to_vec_pretty(&self.records)
            .map_err(|e| StampError::StoreIo(io::Error::other(e)))?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, bytes)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

fn csv_io(e: csv::Error) -> StampError {
    StampError::StoreIo(io::Error::other(e))
}
