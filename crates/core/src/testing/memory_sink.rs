//! In-memory result sink for testing.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::delivery::{ConvertedArtifact, DeliveryError, ResultSink};

#[derive(Debug, Default)]
struct State {
    delivered: Vec<ConvertedArtifact>,
    failure: Option<String>,
}

/// Collects delivered artifacts instead of writing them anywhere.
#[derive(Debug, Default)]
pub struct MemorySink {
    state: Mutex<State>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn delivered(&self) -> Vec<ConvertedArtifact> {
        self.state().delivered.clone()
    }

    pub fn delivered_names(&self) -> Vec<String> {
        self.state()
            .delivered
            .iter()
            .map(|a| a.file_name.clone())
            .collect()
    }

    /// Every delivery fails with an I/O error carrying `reason`.
    pub fn fail_with(&self, reason: &str) {
        self.state().failure = Some(reason.to_string());
    }
}

#[async_trait]
impl ResultSink for MemorySink {
    fn name(&self) -> &str {
        "memory"
    }

    async fn deliver(&self, artifact: &ConvertedArtifact) -> Result<String, DeliveryError> {
        let mut state = self.state();
        if let Some(reason) = &state.failure {
            return Err(DeliveryError::Io {
                path: PathBuf::from(&artifact.file_name),
                reason: reason.clone(),
            });
        }
        state.delivered.push(artifact.clone());
        Ok(format!("memory://{}", artifact.file_name))
    }
}
