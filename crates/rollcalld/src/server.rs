//! HTTP routes: upload form, upload handling, annotated output download, status.

use crate::engine::{EngineError, EngineHandle};
use crate::pages;
use axum::extract::multipart::MultipartError;
use axum::extract::{DefaultBodyLimit, Multipart, Path as UrlPath, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use rollcall_core::annotate::save_annotated;
use rollcall_core::{is_strict_tolerance, to_encoder_rgb, Roster};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// Multipart field carrying the photo.
const IMAGE_FIELD: &str = "image";
/// Prefix of annotated output file names.
const OUTPUT_PREFIX: &str = "output_";

/// Shared, read-only state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub engine: EngineHandle,
    pub roster: Arc<Roster>,
    pub upload_dir: PathBuf,
    pub output_dir: PathBuf,
    pub tolerance: f32,
    pub labels: bool,
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("No file uploaded")]
    NoFileUploaded,
    #[error("No file selected")]
    NoFileSelected,
    #[error("Invalid file name: {0}")]
    InvalidFileName(String),
    #[error("Malformed upload: {0}")]
    Multipart(#[from] MultipartError),
    #[error("Could not decode image: {0}")]
    Decode(#[source] image::ImageError),
    #[error("Output not found")]
    OutputNotFound,
    #[error("Face matching failed: {0}")]
    Engine(#[from] EngineError),
    #[error("Could not write annotated image: {0}")]
    Encode(#[source] image::ImageError),
    #[error("Storage error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Worker task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::NoFileUploaded
            | AppError::NoFileSelected
            | AppError::InvalidFileName(_)
            | AppError::Decode(_) => StatusCode::BAD_REQUEST,
            AppError::Multipart(e) => e.status(),
            AppError::OutputNotFound => StatusCode::NOT_FOUND,
            AppError::Engine(_) | AppError::Encode(_) | AppError::Io(_) | AppError::Join(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::info!(error = %self, status = status.as_u16(), "request rejected");
        }
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/upload", post(upload))
        .route("/outputs/:filename", get(output_image))
        .route("/status", get(status))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .with_state(state)
}

async fn index() -> Html<String> {
    Html(pages::upload_form())
}

/// Keep only the final path component of a client-supplied file name.
fn sanitize_file_name(raw: &str) -> Result<String, AppError> {
    if raw.is_empty() {
        return Err(AppError::NoFileSelected);
    }
    let name = raw.rsplit(['/', '\\']).next().unwrap_or_default();
    if name.is_empty() || name == "." || name == ".." {
        return Err(AppError::InvalidFileName(raw.to_string()));
    }
    Ok(name.to_string())
}

async fn upload(State(state): State<AppState>, mut multipart: Multipart) -> Result<Html<String>, AppError> {
    let mut upload = None;
    while let Some(field) = multipart.next_field().await? {
        // Parts without a filename are plain form values, not files.
        let Some(file_name) = field.file_name().map(str::to_string) else {
            continue;
        };
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }
        upload = Some((file_name, field.bytes().await?));
        break;
    }

    let (raw_name, bytes) = upload.ok_or(AppError::NoFileUploaded)?;
    let file_name = sanitize_file_name(&raw_name)?;

    let upload_path = state.upload_dir.join(&file_name);
    tokio::fs::write(&upload_path, &bytes).await?;
    tracing::info!(file = %file_name, bytes = bytes.len(), "upload saved");

    let image = tokio::task::spawn_blocking(move || image::load_from_memory(&bytes))
        .await?
        .map_err(AppError::Decode)?;

    let outcome = state.engine.match_image(to_encoder_rgb(image)).await?;

    let output_name = format!("{OUTPUT_PREFIX}{file_name}");
    let output_path = state.output_dir.join(&output_name);
    let annotated = outcome.annotated;
    tokio::task::spawn_blocking(move || save_annotated(&annotated, &output_path))
        .await?
        .map_err(AppError::Encode)?;

    tracing::info!(
        file = %file_name,
        faces = outcome.faces.len(),
        detected = outcome.detected.len(),
        not_detected = outcome.not_detected.len(),
        "upload processed"
    );

    let output_url = format!("/outputs/{}", pages::encode_path_segment(&output_name));
    Ok(Html(pages::results(&outcome.detected, &outcome.not_detected, &output_url)))
}

async fn output_image(State(state): State<AppState>, UrlPath(filename): UrlPath<String>) -> Result<Response, AppError> {
    if filename.contains(['/', '\\']) || filename == "." || filename == ".." {
        return Err(AppError::InvalidFileName(filename));
    }

    let bytes = match tokio::fs::read(state.output_dir.join(&filename)).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(AppError::OutputNotFound),
        Err(e) => return Err(e.into()),
    };

    Ok(([(header::CONTENT_TYPE, "image/jpeg")], bytes).into_response())
}

async fn status(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "version": env!("CARGO_PKG_VERSION"),
        "students": state.roster.len(),
        "embeddings": state.roster.embedding_count(),
        "tolerance": state.tolerance,
        "strict_tolerance": is_strict_tolerance(state.tolerance),
        "labels": state.labels,
    }))
}
