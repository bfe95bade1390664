//! Trait definitions for conversion services.

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use tokio_util::sync::CancellationToken;

use super::error::{ClientError, DirectClientError};
use super::types::{JobMetadata, JobTicket, StatusReport};
use crate::health::HealthStatus;
use crate::job::{ConversionOptions, SourceFile, TargetFormat};

/// A conversion service speaking the asynchronous job protocol.
///
/// Implementations are stateless and never retry; retry and timeout policy
/// belong to the orchestrator.
#[async_trait]
pub trait ConversionService: Send + Sync {
    /// Returns the name of this implementation.
    fn name(&self) -> &str;

    /// Probes the service. Failures are reported in the returned status.
    async fn check_health(&self, resource_type: &str) -> HealthStatus;

    /// Registers a job and returns where to upload and poll.
    async fn create_job(
        &self,
        resource_type: &str,
        metadata: &JobMetadata,
    ) -> Result<JobTicket, ClientError>;

    /// Transfers the raw file to the upload target.
    async fn upload_artifact(
        &self,
        upload_target: &str,
        file: &SourceFile,
        headers: &HashMap<String, String>,
    ) -> Result<(), ClientError>;

    /// Fetches the job status once. Aborts when `cancel` fires.
    async fn poll_status(
        &self,
        status_target: &str,
        cancel: &CancellationToken,
    ) -> Result<StatusReport, ClientError>;

    /// Downloads the finished artifact.
    async fn fetch_result(&self, download_target: &str) -> Result<Bytes, ClientError>;
}

/// A conversion service that converts in a single request.
#[async_trait]
pub trait DirectConversionService: Send + Sync {
    fn name(&self) -> &str;

    async fn check_health(&self) -> HealthStatus;

    async fn convert(
        &self,
        file: &SourceFile,
        target_format: &TargetFormat,
        options: &ConversionOptions,
    ) -> Result<Bytes, DirectClientError>;
}
