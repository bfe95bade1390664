//! HTTP API for the conversion server.
//!
//! Every route lives under `/api/v1`. Errors are returned as
//! `{"error": "..."}` with a matching status code.

pub mod conversions;
pub mod engine;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod service;

use axum::{http::StatusCode, Json};
use serde::Serialize;

pub use routes::create_router;

/// Error body returned by every handler.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Plain acknowledgement body.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

pub(crate) fn error_response(status: StatusCode, error: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
        }),
    )
}
