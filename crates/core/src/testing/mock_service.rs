//! Mock remote conversion service for testing.

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::client::{
    ClientError, ConversionService, JobMetadata, JobTicket, RemoteJobStatus, StatusReport,
};
use crate::health::HealthStatus;
use crate::job::SourceFile;

/// A status script step.
pub fn report(status: RemoteJobStatus, progress: Option<f64>) -> StatusReport {
    StatusReport {
        status,
        progress,
        download_target: None,
        error: None,
        metadata: None,
    }
}

/// A `completed` report that points at a download target.
pub fn completed(download_target: &str) -> StatusReport {
    StatusReport {
        download_target: Some(download_target.to_string()),
        ..report(RemoteJobStatus::Completed, Some(100.0))
    }
}

/// A `failed` report with an optional service message.
pub fn failed(error: Option<&str>) -> StatusReport {
    StatusReport {
        error: error.map(str::to_string),
        ..report(RemoteJobStatus::Failed, None)
    }
}

#[derive(Debug, Default)]
struct State {
    health: Option<HealthStatus>,
    health_checks: u32,
    /// Status scripts keyed by source file name. The last step repeats.
    scripts: HashMap<String, VecDeque<StatusReport>>,
    /// Job id to source file name.
    jobs: HashMap<String, String>,
    next_id: u32,
    create_failures: HashMap<String, String>,
    upload_failures: HashMap<String, u16>,
    poll_delay: Option<Duration>,
    created: Vec<JobMetadata>,
    uploads: Vec<(String, String)>,
    polls: Vec<String>,
    fetches: Vec<String>,
}

/// Mock implementation of the [`ConversionService`] trait.
///
/// Provides controllable behavior for testing:
/// - Scripted status sequences per file name
/// - Injected create and upload failures
/// - Recorded calls for assertions
///
/// Files without a script complete on the first poll. Downloads return the
/// bytes `converted:<target>`.
///
/// # Example
///
/// ```rust,ignore
/// use conversio_core::testing::{mock_service, MockConversionService};
///
/// let service = MockConversionService::new();
/// service.script("a.docx", vec![
///     mock_service::report(RemoteJobStatus::Processing, Some(40.0)),
///     mock_service::completed("/download/a"),
/// ]);
/// ```
#[derive(Debug, Default)]
pub struct MockConversionService {
    state: Mutex<State>,
}

impl MockConversionService {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sets the status returned by health checks (healthy by default).
    pub fn set_health(&self, status: HealthStatus) {
        self.state().health = Some(status);
    }

    pub fn health_checks(&self) -> u32 {
        self.state().health_checks
    }

    /// Scripts the status polls for the job created for `file_name`.
    pub fn script(&self, file_name: &str, steps: Vec<StatusReport>) {
        self.state()
            .scripts
            .insert(file_name.to_string(), steps.into());
    }

    /// Every poll for `file_name` reports `processing`.
    pub fn never_finish(&self, file_name: &str) {
        self.script(
            file_name,
            vec![report(RemoteJobStatus::Processing, Some(10.0))],
        );
    }

    pub fn fail_create(&self, file_name: &str, message: &str) {
        self.state()
            .create_failures
            .insert(file_name.to_string(), message.to_string());
    }

    pub fn fail_upload(&self, file_name: &str, status: u16) {
        self.state()
            .upload_failures
            .insert(file_name.to_string(), status);
    }

    /// Makes each poll take `delay` before answering.
    pub fn set_poll_delay(&self, delay: Duration) {
        self.state().poll_delay = Some(delay);
    }

    pub fn created_jobs(&self) -> Vec<JobMetadata> {
        self.state().created.clone()
    }

    /// Uploaded `(target, file name)` pairs.
    pub fn uploads(&self) -> Vec<(String, String)> {
        self.state().uploads.clone()
    }

    pub fn polls(&self) -> Vec<String> {
        self.state().polls.clone()
    }

    pub fn fetches(&self) -> Vec<String> {
        self.state().fetches.clone()
    }

    fn next_report(&self, status_target: &str) -> Result<StatusReport, ClientError> {
        let mut state = self.state();
        state.polls.push(status_target.to_string());

        let job_id = status_target.rsplit('/').next().unwrap_or_default();
        let file_name = state
            .jobs
            .get(job_id)
            .cloned()
            .ok_or(ClientError::JobNotFound)?;

        let Some(steps) = state.scripts.get_mut(&file_name) else {
            return Ok(completed(&format!("/download/{}", job_id)));
        };
        let step = if steps.len() > 1 {
            steps.pop_front()
        } else {
            steps.front().cloned()
        };
        Ok(step.unwrap_or_else(|| completed(&format!("/download/{}", job_id))))
    }
}

#[async_trait]
impl ConversionService for MockConversionService {
    fn name(&self) -> &str {
        "mock"
    }

    async fn check_health(&self, _resource_type: &str) -> HealthStatus {
        let mut state = self.state();
        state.health_checks += 1;
        state
            .health
            .clone()
            .unwrap_or_else(|| HealthStatus::healthy(1, "ok"))
    }

    async fn create_job(
        &self,
        _resource_type: &str,
        metadata: &JobMetadata,
    ) -> Result<JobTicket, ClientError> {
        let mut state = self.state();
        state.created.push(metadata.clone());
        if let Some(message) = state.create_failures.get(&metadata.filename) {
            return Err(ClientError::JobCreation(message.clone()));
        }

        state.next_id += 1;
        let job_id = format!("job-{}", state.next_id);
        state.jobs.insert(job_id.clone(), metadata.filename.clone());

        Ok(JobTicket {
            upload_target: format!("/upload/{}", job_id),
            upload_headers: HashMap::from([(
                "x-upload-token".to_string(),
                format!("token-{}", job_id),
            )]),
            status_target: format!("/status/{}", job_id),
            job_id,
        })
    }

    async fn upload_artifact(
        &self,
        upload_target: &str,
        file: &SourceFile,
        _headers: &HashMap<String, String>,
    ) -> Result<(), ClientError> {
        let mut state = self.state();
        state
            .uploads
            .push((upload_target.to_string(), file.name.clone()));
        match state.upload_failures.get(&file.name) {
            Some(status) => Err(ClientError::Upload { status: *status }),
            None => Ok(()),
        }
    }

    async fn poll_status(
        &self,
        status_target: &str,
        cancel: &CancellationToken,
    ) -> Result<StatusReport, ClientError> {
        let delay = self.state().poll_delay;
        if let Some(delay) = delay {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ClientError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }
        self.next_report(status_target)
    }

    async fn fetch_result(&self, download_target: &str) -> Result<Bytes, ClientError> {
        self.state().fetches.push(download_target.to_string());
        Ok(Bytes::from(format!("converted:{}", download_target)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{ConversionOptions, ConversionRequest, TargetFormat};

    fn metadata(name: &str) -> JobMetadata {
        JobMetadata::from(&ConversionRequest {
            source: SourceFile::new(name, "application/msword", vec![1u8]),
            target_format: TargetFormat::new("pdf"),
            options: ConversionOptions::new(),
        })
    }

    #[tokio::test]
    async fn test_script_last_step_repeats() {
        let service = MockConversionService::new();
        service.script(
            "a.doc",
            vec![
                report(RemoteJobStatus::Queued, None),
                report(RemoteJobStatus::Processing, Some(50.0)),
            ],
        );
        let ticket = service.create_job("document", &metadata("a.doc")).await.unwrap();
        let token = CancellationToken::new();

        let statuses: Vec<RemoteJobStatus> = {
            let mut out = Vec::new();
            for _ in 0..3 {
                out.push(
                    service
                        .poll_status(&ticket.status_target, &token)
                        .await
                        .unwrap()
                        .status,
                );
            }
            out
        };
        assert_eq!(
            statuses,
            vec![
                RemoteJobStatus::Queued,
                RemoteJobStatus::Processing,
                RemoteJobStatus::Processing
            ]
        );
    }

    #[tokio::test]
    async fn test_unknown_job_not_found() {
        let service = MockConversionService::new();
        let err = service
            .poll_status("/status/job-99", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::JobNotFound));
    }
}
