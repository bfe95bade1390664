//! Types for the conversion orchestrator.

use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

use crate::client::{ClientError, DirectClientError};
use crate::delivery::DeliveryError;
use crate::engine::EngineError;
use crate::job::{CompletedRecord, Job};

pub(crate) const NOT_READY_MESSAGE: &str = "Conversion service is not ready";
pub(crate) const CANCELLED_MESSAGE: &str = "Conversion cancelled";
pub(crate) const FAILED_MESSAGE: &str = "Conversion failed";

/// Reasons a batch is refused. Nothing is queued when these are returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrchestratorError {
    /// The readiness gate is closed.
    #[error("Conversion service is not ready")]
    NotReady,

    /// A batch is already running.
    #[error("A conversion batch is already running")]
    Busy,

    #[error("No files to convert")]
    NoFiles,

    #[error("Target format is required")]
    MissingTargetFormat,
}

/// Why a single job failed. Caught at the per-job boundary.
#[derive(Debug, Error)]
pub enum JobError {
    #[error(transparent)]
    Client(#[from] ClientError),

    #[error(transparent)]
    Direct(#[from] DirectClientError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Delivery(#[from] DeliveryError),

    /// The service reported the job as failed.
    #[error("{0}")]
    Failed(String),

    /// The job stayed pending for longer than the maximum wait.
    #[error("Conversion timed out after {}s", .waited.as_secs())]
    Timeout { waited: Duration },

    #[error("Conversion cancelled")]
    Cancelled,
}

impl JobError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, JobError::Cancelled | JobError::Client(ClientError::Cancelled))
    }

    /// Human readable reason for records and the snapshot error string.
    pub fn user_message(&self) -> String {
        match self {
            _ if self.is_cancelled() => CANCELLED_MESSAGE.to_string(),
            JobError::Timeout { .. } => "Conversion timed out".to_string(),
            JobError::Failed(message) if message.trim().is_empty() => FAILED_MESSAGE.to_string(),
            other => other.to_string(),
        }
    }
}

/// State rendered by the UI. Published after every mutation.
#[derive(Debug, Clone, Default, Serialize)]
pub struct OrchestratorSnapshot {
    pub is_processing: bool,
    /// Progress of the current job, 0-100.
    pub progress: u8,
    /// Most recent failure, human readable.
    pub error: Option<String>,
    /// Jobs of the running batch not yet finished, current one included.
    pub queue: Vec<Job>,
    pub current: Option<Job>,
    pub completed: Vec<CompletedRecord>,
}

/// Outcome of one batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub attempted: usize,
    pub completed: usize,
    pub failed: usize,
    /// Jobs dropped without being attempted.
    pub skipped: usize,
    pub cancelled: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_messages() {
        assert_eq!(JobError::Cancelled.user_message(), "Conversion cancelled");
        assert_eq!(
            JobError::Client(ClientError::Cancelled).user_message(),
            "Conversion cancelled"
        );
        assert_eq!(
            JobError::Timeout {
                waited: Duration::from_secs(300)
            }
            .user_message(),
            "Conversion timed out"
        );
        assert_eq!(JobError::Failed(String::new()).user_message(), "Conversion failed");
        assert_eq!(
            JobError::Failed("corrupt input".to_string()).user_message(),
            "corrupt input"
        );
        assert_eq!(
            JobError::Client(ClientError::JobNotFound).user_message(),
            "Conversion job not found"
        );
    }

    #[test]
    fn test_orchestrator_error_messages() {
        assert_eq!(
            OrchestratorError::NotReady.to_string(),
            NOT_READY_MESSAGE
        );
    }
}
