//! Error types for the conversion clients.

use thiserror::Error;

/// Errors from the remote job protocol.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Job creation was refused or the response broke the contract.
    #[error("Failed to create conversion job: {0}")]
    JobCreation(String),

    /// Artifact upload returned a non-2xx status.
    #[error("Failed to upload conversion artifact (status {status})")]
    Upload { status: u16 },

    /// The service no longer knows the job.
    #[error("Conversion job not found")]
    JobNotFound,

    /// Result download returned a non-2xx status.
    #[error("Failed to download converted file (status {status})")]
    Download { status: u16 },

    /// Connection or protocol failure below HTTP status level.
    #[error("Conversion service request failed: {0}")]
    Transport(String),

    /// Request exceeded the client timeout.
    #[error("Conversion service request timed out")]
    Timeout,

    /// The caller cancelled the request.
    #[error("Conversion cancelled")]
    Cancelled,
}

impl ClientError {
    pub(crate) fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ClientError::Timeout
        } else {
            ClientError::Transport(e.to_string())
        }
    }
}

/// Errors from the direct (one-shot) conversion service.
#[derive(Debug, Error)]
pub enum DirectClientError {
    /// The service answered with a non-2xx status.
    #[error("Conversion failed ({status}): {body}")]
    ConversionFailed { status: u16, body: String },

    /// The request could not be built (bad MIME type, ...).
    #[error("Invalid conversion request: {0}")]
    InvalidRequest(String),

    #[error("Conversion service request failed: {0}")]
    Transport(String),

    #[error("Conversion service request timed out")]
    Timeout,
}

impl DirectClientError {
    pub(crate) fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            DirectClientError::Timeout
        } else {
            DirectClientError::Transport(e.to_string())
        }
    }
}
