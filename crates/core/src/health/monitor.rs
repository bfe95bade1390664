//! Periodic readiness monitor for a conversion backend.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::gate::ReadinessGate;
use super::probe::HealthProbe;
use super::types::{HealthState, HealthStatus};
use crate::metrics;

struct MonitorInner {
    probe: Arc<dyn HealthProbe>,
    status: watch::Sender<HealthStatus>,
    in_flight: AtomicUsize,
}

/// Decrements the in-flight counter even if the probe future is dropped.
struct CheckingGuard<'a>(&'a AtomicUsize);

impl<'a> CheckingGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for CheckingGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl MonitorInner {
    async fn check(&self) -> HealthStatus {
        let _guard = CheckingGuard::enter(&self.in_flight);

        let mut status = self.probe.probe().await;
        if status.checked_at.is_none() {
            status.checked_at = Some(Utc::now());
        }

        metrics::HEALTH_CHECKS
            .with_label_values(&[status.state.as_str()])
            .inc();

        let previous = self.status.borrow().state;
        if previous != status.state {
            match status.state {
                HealthState::Healthy => info!(
                    "Conversion service {} is healthy ({:?} ms)",
                    self.probe.name(),
                    status.latency_ms
                ),
                _ => warn!(
                    "Conversion service {} is {}: {}",
                    self.probe.name(),
                    status.state.as_str(),
                    status.message
                ),
            }
        }

        self.status.send_replace(status.clone());
        status
    }
}

/// Tracks the health of one backend and gates new work on it.
///
/// The gate is open only while the last probe reported healthy and no probe
/// is running. Dropping the monitor stops polling.
pub struct HealthMonitor {
    inner: Arc<MonitorInner>,
    polling: Mutex<Option<CancellationToken>>,
}

impl HealthMonitor {
    pub fn new(probe: Arc<dyn HealthProbe>) -> Self {
        let (status, _) = watch::channel(HealthStatus::default());
        Self {
            inner: Arc::new(MonitorInner {
                probe,
                status,
                in_flight: AtomicUsize::new(0),
            }),
            polling: Mutex::new(None),
        }
    }

    /// Last published status.
    pub fn status(&self) -> HealthStatus {
        self.inner.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<HealthStatus> {
        self.inner.status.subscribe()
    }

    pub fn is_checking(&self) -> bool {
        self.inner.in_flight.load(Ordering::SeqCst) > 0
    }

    /// Runs a probe now and publishes the result.
    pub async fn check_now(&self) -> HealthStatus {
        self.inner.check().await
    }

    /// Starts periodic probing, replacing any running poller.
    ///
    /// The first probe runs immediately. Must be called inside a Tokio runtime.
    pub fn start_polling(&self, interval: Duration) {
        let token = CancellationToken::new();
        if let Some(previous) = self.slot().replace(token.clone()) {
            previous.cancel();
        }

        let inner = Arc::clone(&self.inner);
        info!(
            "Starting health polling for {} every {:?}",
            inner.probe.name(),
            interval
        );

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = inner.check() => {}
                }
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(interval) => {}
                }
            }
            debug!("Health polling for {} stopped", inner.probe.name());
        });
    }

    pub fn stop_polling(&self) {
        if let Some(token) = self.slot().take() {
            token.cancel();
        }
    }

    pub fn is_polling(&self) -> bool {
        self.slot().is_some()
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<CancellationToken>> {
        self.polling.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ReadinessGate for HealthMonitor {
    fn is_ready(&self) -> bool {
        !self.is_checking() && self.inner.status.borrow().is_healthy()
    }
}

impl Drop for HealthMonitor {
    fn drop(&mut self) {
        self.stop_polling();
    }
}
