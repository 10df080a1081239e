//! HTTP boundary around the annotation pipeline.
//!
//! Thin layer: multipart in, JSON (or CSV / image bytes) out. Every
//! failure is isolated to its own response; the process keeps serving.
//!
//! Routes:
//! - `POST /upload`        multipart ingest -> `{status, sha, url}`
//! - `POST /verify`        multipart probe  -> `{sha, found, record}`
//! - `GET  /records`       all records as JSON
//! - `GET  /export.csv`    CSV download
//! - `GET  /uploads/{name}` stored annotated file

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::multipart::MultipartError;
use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tracing::{info, warn};

use crate::error::StampError;
use crate::pipeline::{IngestMeta, StampPipeline};

/// Largest accepted request body (the photo plus form fields).
const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Shared state handed to every handler.
pub struct AppState {
    pipeline: StampPipeline,
}

/// Build the application router around a pipeline.
#[must_use]
pub fn router(pipeline: StampPipeline) -> Router {
    Router::new()
        .route("/upload", post(upload))
        .route("/verify", post(verify))
        .route("/records", get(records))
        .route("/export.csv", get(export_csv))
        .route("/uploads/{filename}", get(serve_upload))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(Arc::new(AppState { pipeline }))
}

/// Bind and serve until the task is stopped.
pub async fn serve(pipeline: StampPipeline, addr: SocketAddr) -> anyhow::Result<()> {
    let app = router(pipeline);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "geostamp listening");
    axum::serve(listener, app).await?;
    Ok(())
}

/// JSON error body with the status mapped from the error kind.
struct ApiError(StampError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            StampError::EmptyInput
            | StampError::UnsupportedType(_)
            | StampError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            StampError::Decode(_) => StatusCode::UNPROCESSABLE_ENTITY,
            StampError::Render(_) | StampError::StoreIo(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            warn!(error = %self.0, "request failed");
        }
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

impl From<StampError> for ApiError {
    fn from(e: StampError) -> Self {
        Self(e)
    }
}

impl From<MultipartError> for ApiError {
    fn from(e: MultipartError) -> Self {
        Self(StampError::InvalidRequest(e.to_string()))
    }
}

/// The fields a multipart ingest/verify request may carry.
#[derive(Default)]
struct UploadForm {
    photo: Option<(String, Vec<u8>)>,
    meta: IngestMeta,
}

async fn read_form(mut multipart: Multipart) -> Result<UploadForm, ApiError> {
    let mut form = UploadForm::default();
    while let Some(field) = multipart.next_field().await? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        match name.as_str() {
            "photo" => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let data = field.bytes().await?;
                form.photo = Some((filename, data.to_vec()));
            }
            "lat" => form.meta.latitude = Some(field.text().await?),
            "lon" => form.meta.longitude = Some(field.text().await?),
            "timestamp" => form.meta.timestamp = Some(field.text().await?),
            "notes" => form.meta.notes = field.text().await?,
            other => {
                warn!(field = other, "ignoring unknown multipart field");
            }
        }
    }
    Ok(form)
}

async fn upload(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<serde_json::Value>, ApiError> {
    let form = read_form(multipart).await?;
    let Some((filename, data)) = form.photo else {
        return Err(StampError::InvalidRequest("no photo part".to_string()).into());
    };

    // Decode + render is CPU-bound; keep it off the async workers.
    let meta = form.meta;
    let receipt = tokio::task::spawn_blocking(move || {
        state.pipeline.ingest(&data, &filename, &meta)
    })
    .await
    .map_err(|e| StampError::StoreIo(std::io::Error::other(e)))??;

    Ok(Json(json!({
        "status": "ok",
        "sha": receipt.fingerprint,
        "url": format!("/uploads/{}", receipt.stored_file_name),
    })))
}

async fn verify(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<serde_json::Value>, ApiError> {
    let form = read_form(multipart).await?;
    let Some((_, data)) = form.photo else {
        return Err(StampError::InvalidRequest("no photo part".to_string()).into());
    };

    let outcome = state.pipeline.verify(&data)?;
    Ok(Json(json!({
        "sha": outcome.fingerprint,
        "found": outcome.found(),
        "record": outcome.record,
    })))
}

async fn records(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let items: Vec<serde_json::Value> = state
        .pipeline
        .records()?
        .into_iter()
        .map(|(fingerprint, record)| {
            json!({
                "sha": fingerprint,
                "filename": record.stored_file_name,
                "timestamp": record.captured_at,
                "lat": record.latitude,
                "lon": record.longitude,
                "notes": record.notes,
                "url": format!("/uploads/{}", record.stored_file_name),
            })
        })
        .collect();
    Ok(Json(json!(items)))
}

async fn export_csv(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    let body = state.pipeline.export_csv()?;
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"geo_photos.csv\"",
            ),
        ],
        body,
    )
        .into_response())
}

async fn serve_upload(
    State(state): State<Arc<AppState>>,
    Path(filename): Path<String>,
) -> Response {
    let Some(path) = state.pipeline.annotated_path(&filename) else {
        return (StatusCode::NOT_FOUND, "not found").into_response();
    };
    match tokio::fs::read(&path).await {
        Ok(bytes) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "image/jpeg")],
            bytes,
        )
            .into_response(),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "stored file unreadable");
            (StatusCode::NOT_FOUND, "not found").into_response()
        }
    }
}
