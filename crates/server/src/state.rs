use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use conversio_core::{
    BatchReport, Config, ConversionOrchestrator, HealthMonitor, LocalEngineAdapter,
    SanitizedConfig,
};
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Shared application state
pub struct AppState {
    config: Config,
    orchestrator: ConversionOrchestrator,
    /// Present for remote and direct backends
    health: Option<Arc<HealthMonitor>>,
    /// Present for the local backend
    engine: Option<Arc<LocalEngineAdapter>>,
    /// Task of the most recently started batch
    batch: Mutex<Option<JoinHandle<BatchReport>>>,
}

impl AppState {
    pub fn new(
        config: Config,
        orchestrator: ConversionOrchestrator,
        health: Option<Arc<HealthMonitor>>,
        engine: Option<Arc<LocalEngineAdapter>>,
    ) -> Self {
        Self {
            config,
            orchestrator,
            health,
            engine,
            batch: Mutex::new(None),
        }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn orchestrator(&self) -> &ConversionOrchestrator {
        &self.orchestrator
    }

    pub fn health(&self) -> Option<&Arc<HealthMonitor>> {
        self.health.as_ref()
    }

    pub fn engine(&self) -> Option<&Arc<LocalEngineAdapter>> {
        self.engine.as_ref()
    }

    /// Keeps the batch task so shutdown can wait for it.
    pub fn track_batch(&self, handle: JoinHandle<BatchReport>) {
        // Batches never overlap, so a replaced handle has already finished.
        *self.batch.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
    }

    /// Cancels a running batch and waits up to `grace` for it to wind down.
    ///
    /// Returns the report of the tracked batch, or `None` when there was
    /// none or it did not finish in time.
    pub async fn shutdown_batch(&self, grace: Duration) -> Option<BatchReport> {
        let handle = self
            .batch
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()?;

        if self.orchestrator.is_processing() {
            info!("Cancelling running batch");
            self.orchestrator.cancel_current();
        }

        match tokio::time::timeout(grace, handle).await {
            Ok(Ok(report)) => Some(report),
            Ok(Err(e)) => {
                warn!("Batch task failed: {}", e);
                None
            }
            Err(_) => {
                warn!("Batch did not stop within {:?}", grace);
                None
            }
        }
    }
}
