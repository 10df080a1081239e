//! End-to-end tests for the annotation pipeline.
//!
//! Each test gets its own temp data directory; the pipeline under test
//! is the real one, rendering real pixels and persisting real files.

use std::io::Cursor;

use geostamp::{is_fingerprint, IngestMeta, PipelineConfig, StampPipeline};
use image::GenericImageView;
use tempfile::TempDir;

fn png_fixture(width: u32, height: u32, rgb: [u8; 3]) -> Vec<u8> {
    let img = image::RgbImage::from_pixel(width, height, image::Rgb(rgb));
    let mut out = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut out, image::ImageFormat::Png)
        .unwrap();
    out.into_inner()
}

fn pipeline_in(dir: &TempDir) -> StampPipeline {
    StampPipeline::new(PipelineConfig::default().with_data_dir(dir.path())).unwrap()
}

fn fixed_meta() -> IngestMeta {
    IngestMeta {
        timestamp: Some("2024-05-01 12:00:00".to_string()),
        latitude: Some("60.17".to_string()),
        longitude: Some("24.94".to_string()),
        notes: "survey point 7".to_string(),
    }
}

#[test]
fn ingest_is_deterministic() {
    let dir = TempDir::new().unwrap();
    let pipeline = pipeline_in(&dir);
    let photo = png_fixture(160, 120, [30, 90, 200]);

    let first = pipeline.ingest(&photo, "site.png", &fixed_meta()).unwrap();
    let second = pipeline.ingest(&photo, "site.png", &fixed_meta()).unwrap();

    assert_eq!(first.fingerprint, second.fingerprint);
    assert_eq!(first.stored_file_name, second.stored_file_name);
}

#[test]
fn verify_finds_previously_ingested_bytes() {
    let dir = TempDir::new().unwrap();
    let pipeline = pipeline_in(&dir);
    let photo = png_fixture(160, 120, [200, 40, 40]);

    let receipt = pipeline.ingest(&photo, "site.png", &fixed_meta()).unwrap();
    let stored =
        std::fs::read(dir.path().join("uploads").join(&receipt.stored_file_name)).unwrap();

    let outcome = pipeline.verify(&stored).unwrap();
    assert!(outcome.found());
    assert_eq!(outcome.fingerprint, receipt.fingerprint);
    let record = outcome.record.unwrap();
    assert_eq!(record.stored_file_name, receipt.stored_file_name);
    assert_eq!(record.latitude.as_deref(), Some("60.17"));
}

#[test]
fn verify_does_not_match_the_original_upload() {
    // Only the *annotated* bytes are recorded; the raw upload must miss.
    let dir = TempDir::new().unwrap();
    let pipeline = pipeline_in(&dir);
    let photo = png_fixture(160, 120, [10, 10, 10]);

    pipeline.ingest(&photo, "site.png", &fixed_meta()).unwrap();
    let outcome = pipeline.verify(&photo).unwrap();
    assert!(!outcome.found());
    assert!(outcome.record.is_none());
}

#[test]
fn verify_misses_unrelated_bytes() {
    let dir = TempDir::new().unwrap();
    let pipeline = pipeline_in(&dir);
    let outcome = pipeline.verify(b"unrelated bytes").unwrap();
    assert!(!outcome.found());
}

#[test]
fn reingest_upserts_without_growing_the_store() {
    let dir = TempDir::new().unwrap();
    let pipeline = pipeline_in(&dir);
    let photo = png_fixture(160, 120, [0, 128, 0]);

    pipeline.ingest(&photo, "site.png", &fixed_meta()).unwrap();
    assert_eq!(pipeline.record_count().unwrap(), 1);
    pipeline.ingest(&photo, "site.png", &fixed_meta()).unwrap();
    assert_eq!(pipeline.record_count().unwrap(), 1);
}

#[test]
fn empty_upload_is_rejected_without_side_effects() {
    let dir = TempDir::new().unwrap();
    let pipeline = pipeline_in(&dir);

    let err = pipeline.ingest(&[], "site.png", &fixed_meta()).unwrap_err();
    assert!(matches!(err, geostamp::StampError::EmptyInput));
    assert_eq!(pipeline.record_count().unwrap(), 0);
    assert_eq!(
        std::fs::read_dir(dir.path().join("uploads")).unwrap().count(),
        0
    );
}

#[test]
fn disallowed_extension_is_rejected_without_side_effects() {
    let dir = TempDir::new().unwrap();
    let pipeline = pipeline_in(&dir);
    let photo = png_fixture(60, 60, [1, 2, 3]);

    let err = pipeline
        .ingest(&photo, "vector.svg", &fixed_meta())
        .unwrap_err();
    assert!(matches!(err, geostamp::StampError::UnsupportedType(_)));
    assert_eq!(pipeline.record_count().unwrap(), 0);
    assert_eq!(
        std::fs::read_dir(dir.path().join("uploads")).unwrap().count(),
        0
    );
}

#[test]
fn garbage_image_bytes_are_a_decode_error() {
    let dir = TempDir::new().unwrap();
    let pipeline = pipeline_in(&dir);

    let err = pipeline
        .ingest(b"not an image at all", "fake.jpg", &fixed_meta())
        .unwrap_err();
    assert!(matches!(err, geostamp::StampError::Decode(_)));
    assert_eq!(pipeline.record_count().unwrap(), 0);
}

#[test]
fn unparseable_timestamp_is_stored_verbatim() {
    let dir = TempDir::new().unwrap();
    let pipeline = pipeline_in(&dir);
    let photo = png_fixture(100, 100, [80, 80, 80]);
    let meta = IngestMeta {
        timestamp: Some("last tuesday, probably".to_string()),
        ..IngestMeta::default()
    };

    let receipt = pipeline.ingest(&photo, "site.png", &meta).unwrap();
    let stored =
        std::fs::read(dir.path().join("uploads").join(&receipt.stored_file_name)).unwrap();
    let outcome = pipeline.verify(&stored).unwrap();
    assert_eq!(outcome.record.unwrap().captured_at, "last tuesday, probably");
}

#[test]
fn end_to_end_scenario() {
    let dir = TempDir::new().unwrap();
    let pipeline = pipeline_in(&dir);
    let photo = png_fixture(100, 100, [128, 128, 128]);
    let meta = IngestMeta {
        timestamp: None,
        latitude: Some("1.23".to_string()),
        longitude: Some("4.56".to_string()),
        notes: "test".to_string(),
    };

    let receipt = pipeline.ingest(&photo, "scene.png", &meta).unwrap();

    assert!(is_fingerprint(&receipt.fingerprint), "64-hex fingerprint");

    let stored_path = dir.path().join("uploads").join(&receipt.stored_file_name);
    let stored = image::load_from_memory(&std::fs::read(&stored_path).unwrap()).unwrap();
    assert_eq!(stored.dimensions(), (100, 100));

    let csv = String::from_utf8(pipeline.export_csv().unwrap()).unwrap();
    let rows: Vec<&str> = csv.lines().collect();
    assert_eq!(rows.len(), 2, "header plus one record");
    let row = rows[1];
    assert!(row.starts_with(&receipt.fingerprint));
    assert!(row.contains("1.23"));
    assert!(row.contains("4.56"));
    assert!(row.contains("test"));
}

#[test]
fn records_survive_a_restart() {
    let dir = TempDir::new().unwrap();
    let photo = png_fixture(120, 80, [66, 66, 66]);

    let receipt = {
        let pipeline = pipeline_in(&dir);
        pipeline.ingest(&photo, "site.png", &fixed_meta()).unwrap()
    };

    // New pipeline over the same data dir simulates a process restart.
    let pipeline = pipeline_in(&dir);
    assert_eq!(pipeline.record_count().unwrap(), 1);
    let records = pipeline.records().unwrap();
    let (fingerprint, record) = &records[0];
    assert_eq!(fingerprint, &receipt.fingerprint);
    assert_eq!(record.stored_file_name, receipt.stored_file_name);
    assert_eq!(record.captured_at, "2024-05-01 12:00:00");
    assert_eq!(record.latitude.as_deref(), Some("60.17"));
    assert_eq!(record.longitude.as_deref(), Some("24.94"));
    assert_eq!(record.notes, "survey point 7");
}

#[test]
fn stored_name_carries_fingerprint_prefix_and_sanitized_base() {
    let dir = TempDir::new().unwrap();
    let pipeline = pipeline_in(&dir);
    let photo = png_fixture(64, 64, [9, 9, 9]);

    let receipt = pipeline
        .ingest(&photo, "my field shot.png", &fixed_meta())
        .unwrap();
    assert!(receipt.stored_file_name.starts_with(&receipt.fingerprint[..12]));
    assert!(receipt.stored_file_name.ends_with("_my_field_shot.jpg"));
}

#[test]
fn annotated_path_refuses_traversal() {
    let dir = TempDir::new().unwrap();
    let pipeline = pipeline_in(&dir);
    assert!(pipeline.annotated_path("../db.json").is_none());
    assert!(pipeline.annotated_path("nope.jpg").is_none());
}
