use std::sync::Arc;

use crate::client::{ConversionService, DirectConversionService};
use crate::engine::LocalEngineAdapter;

/// Where jobs are converted.
#[derive(Clone)]
pub enum ConversionBackend {
    /// Remote job protocol: create, upload, poll, download.
    Remote {
        service: Arc<dyn ConversionService>,
        resource_type: String,
    },
    /// One-shot conversion service.
    Direct {
        service: Arc<dyn DirectConversionService>,
    },
    /// Local engine; must be loaded before a batch starts.
    Local { adapter: Arc<LocalEngineAdapter> },
}

impl ConversionBackend {
    /// Metric and log label.
    pub fn label(&self) -> &'static str {
        match self {
            ConversionBackend::Remote { .. } => "remote",
            ConversionBackend::Direct { .. } => "direct",
            ConversionBackend::Local { .. } => "local",
        }
    }
}

impl std::fmt::Debug for ConversionBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConversionBackend::Remote {
                service,
                resource_type,
            } => f
                .debug_struct("Remote")
                .field("service", &service.name())
                .field("resource_type", resource_type)
                .finish(),
            ConversionBackend::Direct { service } => f
                .debug_struct("Direct")
                .field("service", &service.name())
                .finish(),
            ConversionBackend::Local { adapter } => f
                .debug_struct("Local")
                .field("runtime", &adapter.runtime_name())
                .finish(),
        }
    }
}
