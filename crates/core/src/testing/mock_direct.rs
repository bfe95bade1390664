//! Mock direct conversion service for testing.

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::client::{DirectClientError, DirectConversionService};
use crate::health::HealthStatus;
use crate::job::{ConversionOptions, SourceFile, TargetFormat};

/// A recorded conversion call.
#[derive(Debug, Clone)]
pub struct DirectCall {
    pub file_name: String,
    pub target_format: String,
    pub options: ConversionOptions,
}

#[derive(Debug, Default)]
struct State {
    health: Option<HealthStatus>,
    failures: HashMap<String, (u16, String)>,
    delay: Option<Duration>,
    calls: Vec<DirectCall>,
}

/// Mock implementation of [`DirectConversionService`].
///
/// Converts every file to `converted:<name>` unless a failure was injected
/// for its name.
#[derive(Debug, Default)]
pub struct MockDirectService {
    state: Mutex<State>,
}

impl MockDirectService {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_health(&self, status: HealthStatus) {
        self.state().health = Some(status);
    }

    /// The conversion of `file_name` answers `status` with `body`.
    pub fn fail(&self, file_name: &str, status: u16, body: &str) {
        self.state()
            .failures
            .insert(file_name.to_string(), (status, body.to_string()));
    }

    /// Each conversion takes `delay`.
    pub fn set_delay(&self, delay: Duration) {
        self.state().delay = Some(delay);
    }

    pub fn calls(&self) -> Vec<DirectCall> {
        self.state().calls.clone()
    }
}

#[async_trait]
impl DirectConversionService for MockDirectService {
    fn name(&self) -> &str {
        "mock-direct"
    }

    async fn check_health(&self) -> HealthStatus {
        self.state()
            .health
            .clone()
            .unwrap_or_else(|| HealthStatus::healthy(1, "Conversion service is operational"))
    }

    async fn convert(
        &self,
        file: &SourceFile,
        target_format: &TargetFormat,
        options: &ConversionOptions,
    ) -> Result<Bytes, DirectClientError> {
        let delay = {
            let mut state = self.state();
            state.calls.push(DirectCall {
                file_name: file.name.clone(),
                target_format: target_format.as_str().to_string(),
                options: options.clone(),
            });
            state.delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        match self.state().failures.get(&file.name) {
            Some((status, body)) => Err(DirectClientError::ConversionFailed {
                status: *status,
                body: body.clone(),
            }),
            None => Ok(Bytes::from(format!("converted:{}", file.name))),
        }
    }
}
