//! Conversion batch API handlers.

use std::sync::Arc;

use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use tracing::{info, warn};

use conversio_core::{
    ConversionOptions, Job, OrchestratorError, OrchestratorSnapshot, SourceFile, TargetFormat,
};

use super::{error_response, ApiError, MessageResponse};
use crate::state::AppState;

// ============================================================================
// Response types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct ConversionsResponse {
    #[serde(flatten)]
    pub snapshot: OrchestratorSnapshot,
    pub can_start: bool,
}

#[derive(Debug, Serialize)]
pub struct StartedResponse {
    pub jobs: Vec<Job>,
}

/// Parsed `POST /conversions` form.
struct BatchForm {
    files: Vec<SourceFile>,
    target_format: TargetFormat,
    options: ConversionOptions,
}

// ============================================================================
// Handlers
// ============================================================================

/// Current queue, progress and history
pub async fn get_conversions(State(state): State<Arc<AppState>>) -> Json<ConversionsResponse> {
    let orchestrator = state.orchestrator();
    Json(ConversionsResponse {
        snapshot: orchestrator.snapshot(),
        can_start: orchestrator.can_start(),
    })
}

/// Start a batch from a multipart upload
///
/// Fields: one or more `file` parts, `target_format`, optional `options`
/// (JSON object).
pub async fn start_conversions(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<StartedResponse>), ApiError> {
    let form = parse_form(multipart).await?;
    let count = form.files.len();

    let (jobs, handle) = state
        .orchestrator()
        .start_batch(form.files, form.target_format, form.options)
        .map_err(|e| {
            warn!("Rejected conversion batch: {}", e);
            let status = match &e {
                OrchestratorError::NotReady => StatusCode::SERVICE_UNAVAILABLE,
                OrchestratorError::Busy => StatusCode::CONFLICT,
                OrchestratorError::NoFiles | OrchestratorError::MissingTargetFormat => {
                    StatusCode::BAD_REQUEST
                }
            };
            error_response(status, e.to_string())
        })?;

    state.track_batch(handle);
    info!("Accepted batch of {} file(s)", count);
    Ok((StatusCode::ACCEPTED, Json(StartedResponse { jobs })))
}

/// Cancel the running job and drop the rest of the batch
pub async fn cancel_conversions(State(state): State<Arc<AppState>>) -> Json<MessageResponse> {
    state.orchestrator().cancel_current();
    Json(MessageResponse::new("Conversion cancelled"))
}

/// Clear queue, history and error
pub async fn reset_conversions(State(state): State<Arc<AppState>>) -> Json<MessageResponse> {
    state.orchestrator().reset();
    Json(MessageResponse::new("Conversion state reset"))
}

async fn parse_form(mut multipart: Multipart) -> Result<BatchForm, ApiError> {
    let mut files = Vec::new();
    let mut target_format: Option<String> = None;
    let mut options = ConversionOptions::new();

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                return Err(error_response(
                    StatusCode::BAD_REQUEST,
                    format!("Invalid multipart body: {}", e),
                ))
            }
        };

        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "file" => {
                let file_name = field
                    .file_name()
                    .filter(|n| !n.trim().is_empty())
                    .map(str::to_string)
                    .ok_or_else(|| {
                        error_response(StatusCode::BAD_REQUEST, "File part is missing a file name")
                    })?;
                let mime_type = field.content_type().unwrap_or("").to_string();
                let bytes = field.bytes().await.map_err(|e| {
                    error_response(
                        StatusCode::BAD_REQUEST,
                        format!("Failed to read file: {}", e),
                    )
                })?;
                files.push(SourceFile::new(file_name, mime_type, bytes));
            }
            "target_format" => {
                target_format = Some(read_text(field).await?);
            }
            "options" => {
                let raw = read_text(field).await?;
                if !raw.trim().is_empty() {
                    options = serde_json::from_str(&raw).map_err(|e| {
                        error_response(
                            StatusCode::BAD_REQUEST,
                            format!("Invalid options: {}", e),
                        )
                    })?;
                }
            }
            _ => {}
        }
    }

    let target_format = target_format
        .map(TargetFormat::new)
        .filter(|f| !f.is_empty())
        .ok_or_else(|| error_response(StatusCode::BAD_REQUEST, "target_format is required"))?;
    if files.is_empty() {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            "At least one file is required",
        ));
    }

    Ok(BatchForm {
        files,
        target_format,
        options,
    })
}

async fn read_text(field: axum::extract::multipart::Field<'_>) -> Result<String, ApiError> {
    field.text().await.map_err(|e| {
        error_response(
            StatusCode::BAD_REQUEST,
            format!("Failed to read form field: {}", e),
        )
    })
}
