//! Delivery of converted files to the user.

mod directory;

pub use directory::DirectorySink;

use async_trait::async_trait;
use bytes::Bytes;
use std::path::PathBuf;
use thiserror::Error;

/// A converted file ready for delivery.
#[derive(Debug, Clone)]
pub struct ConvertedArtifact {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Bytes,
}

/// Errors that can occur during delivery.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("Invalid output file name: {0}")]
    InvalidName(String),

    #[error("Failed to save {path}: {reason}")]
    Io { path: PathBuf, reason: String },
}

/// Receives converted files. Called exactly once per completed job that has
/// an output.
#[async_trait]
pub trait ResultSink: Send + Sync {
    fn name(&self) -> &str;

    /// Delivers the artifact and returns where it ended up.
    async fn deliver(&self, artifact: &ConvertedArtifact) -> Result<String, DeliveryError>;
}
