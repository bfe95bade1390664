//! Health probes for the conversion backends.

use std::sync::Arc;

use async_trait::async_trait;

use super::types::HealthStatus;
use crate::client::{ConversionService, DirectConversionService};

/// One readiness check against a backend.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    fn name(&self) -> &str;

    /// Runs the check. Failures are reported in the status, never as errors.
    async fn probe(&self) -> HealthStatus;
}

/// Probes a job-protocol service for one resource type.
pub struct RemoteHealthProbe {
    service: Arc<dyn ConversionService>,
    resource_type: String,
}

impl RemoteHealthProbe {
    pub fn new(service: Arc<dyn ConversionService>, resource_type: impl Into<String>) -> Self {
        Self {
            service,
            resource_type: resource_type.into(),
        }
    }
}

#[async_trait]
impl HealthProbe for RemoteHealthProbe {
    fn name(&self) -> &str {
        self.service.name()
    }

    async fn probe(&self) -> HealthStatus {
        self.service.check_health(&self.resource_type).await
    }
}

/// Probes a direct conversion service.
pub struct DirectHealthProbe {
    service: Arc<dyn DirectConversionService>,
}

impl DirectHealthProbe {
    pub fn new(service: Arc<dyn DirectConversionService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl HealthProbe for DirectHealthProbe {
    fn name(&self) -> &str {
        self.service.name()
    }

    async fn probe(&self) -> HealthStatus {
        self.service.check_health().await
    }
}
