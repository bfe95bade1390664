//! Sequential batch runner.

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::backend::ConversionBackend;
use super::config::OrchestratorConfig;
use super::types::{
    BatchReport, JobError, OrchestratorError, OrchestratorSnapshot, CANCELLED_MESSAGE,
    FAILED_MESSAGE, NOT_READY_MESSAGE,
};
use crate::client::{ConversionService, DirectConversionService, JobMetadata, RemoteJobStatus};
use crate::delivery::{ConvertedArtifact, ResultSink};
use crate::engine::LocalEngineAdapter;
use crate::health::ReadinessGate;
use crate::job::{
    output_file_name, CompletedRecord, ConversionOptions, ConversionRequest, Job, JobStatus,
    SourceFile, TargetFormat,
};
use crate::metrics;

/// Converts batches of files one job at a time.
///
/// The observable state lives in a watch channel. It is written by the batch
/// loop and by [`cancel_current`](Self::cancel_current) and
/// [`reset`](Self::reset). Cloning is cheap and shares the same state.
#[derive(Clone)]
pub struct ConversionOrchestrator {
    inner: Arc<Inner>,
}

struct Inner {
    backend: ConversionBackend,
    gate: Arc<dyn ReadinessGate>,
    sink: Arc<dyn ResultSink>,
    config: OrchestratorConfig,
    state: watch::Sender<OrchestratorSnapshot>,
    /// Claimed with compare-and-swap for the whole batch.
    running: AtomicBool,
    /// Bumped by `reset`; a batch only writes state while its generation is current.
    generation: AtomicU64,
    cancel: Mutex<CancellationToken>,
}

struct Batch {
    jobs: Vec<Job>,
    token: CancellationToken,
    generation: u64,
}

/// Finalizes the snapshot and releases the processing slot, even if the
/// batch future is dropped.
struct BatchGuard<'a> {
    inner: &'a Inner,
    generation: u64,
}

impl Drop for BatchGuard<'_> {
    fn drop(&mut self) {
        self.inner.update(self.generation, |s| {
            s.is_processing = false;
            s.current = None;
            s.progress = 0;
            s.queue.clear();
        });
        metrics::QUEUE_DEPTH.set(0);
        self.inner.running.store(false, Ordering::SeqCst);
    }
}

impl ConversionOrchestrator {
    pub fn new(
        backend: ConversionBackend,
        gate: Arc<dyn ReadinessGate>,
        sink: Arc<dyn ResultSink>,
        config: OrchestratorConfig,
    ) -> Self {
        let (state, _) = watch::channel(OrchestratorSnapshot::default());
        Self {
            inner: Arc::new(Inner {
                backend,
                gate,
                sink,
                config,
                state,
                running: AtomicBool::new(false),
                generation: AtomicU64::new(0),
                cancel: Mutex::new(CancellationToken::new()),
            }),
        }
    }

    pub fn backend(&self) -> &ConversionBackend {
        &self.inner.backend
    }

    /// Gate ready and no batch running.
    pub fn can_start(&self) -> bool {
        self.inner.gate.is_ready() && !self.is_processing()
    }

    pub fn is_processing(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> OrchestratorSnapshot {
        self.inner.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<OrchestratorSnapshot> {
        self.inner.state.subscribe()
    }

    /// Converts `files` in order and resolves once every one was attempted.
    ///
    /// An empty list does nothing. Returns `NotReady` or `Busy` without
    /// touching the queue.
    pub async fn enqueue(
        &self,
        files: Vec<SourceFile>,
        target_format: TargetFormat,
        options: ConversionOptions,
    ) -> Result<BatchReport, OrchestratorError> {
        if files.is_empty() {
            return Ok(BatchReport::default());
        }
        let batch = self.inner.prepare(files, target_format, options)?;
        Ok(self.inner.run_batch(batch).await)
    }

    /// Validates like [`enqueue`](Self::enqueue), then runs the batch on a
    /// spawned task. Returns the queued jobs and the task handle.
    pub fn start_batch(
        &self,
        files: Vec<SourceFile>,
        target_format: TargetFormat,
        options: ConversionOptions,
    ) -> Result<(Vec<Job>, JoinHandle<BatchReport>), OrchestratorError> {
        if files.is_empty() {
            return Err(OrchestratorError::NoFiles);
        }
        let batch = self.inner.prepare(files, target_format, options)?;
        let jobs = batch.jobs.clone();
        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(async move { inner.run_batch(batch).await });
        Ok((jobs, handle))
    }

    /// Aborts the running job and drops the rest of the batch.
    ///
    /// The running job is recorded as failed with "Conversion cancelled";
    /// the remaining files are not attempted and get no record.
    pub fn cancel_current(&self) {
        if self.is_processing() {
            info!("Cancelling current conversion batch");
        }
        self.inner.current_token().cancel();
        self.inner.state.send_modify(|s| {
            s.queue.clear();
            s.current = None;
            s.progress = 0;
        });
        metrics::QUEUE_DEPTH.set(0);
    }

    /// Cancels anything in flight and clears queue, history, progress and error.
    pub fn reset(&self) {
        self.inner.current_token().cancel();
        self.inner.state.send_modify(|s| {
            self.inner.generation.fetch_add(1, Ordering::SeqCst);
            *s = OrchestratorSnapshot::default();
        });
        metrics::QUEUE_DEPTH.set(0);
        info!("Conversion state reset");
    }
}

impl Inner {
    fn current_token(&self) -> CancellationToken {
        self.cancel
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Applies `f` unless a reset happened since `generation` was taken.
    fn update(&self, generation: u64, f: impl FnOnce(&mut OrchestratorSnapshot)) {
        self.state.send_if_modified(|s| {
            if self.generation.load(Ordering::SeqCst) == generation {
                f(s);
                true
            } else {
                false
            }
        });
    }

    fn set_progress(&self, generation: u64, progress: u8) {
        self.update(generation, |s| s.progress = progress.min(100));
    }

    fn set_status(&self, generation: u64, job: &mut Job, status: JobStatus) {
        job.status = status;
        let id = job.id.as_str();
        self.update(generation, |s| {
            for j in s.current.iter_mut().chain(s.queue.iter_mut()) {
                if j.id == id {
                    j.status = status;
                }
            }
        });
    }

    fn prepare(
        &self,
        files: Vec<SourceFile>,
        target_format: TargetFormat,
        options: ConversionOptions,
    ) -> Result<Batch, OrchestratorError> {
        if target_format.is_empty() {
            return Err(OrchestratorError::MissingTargetFormat);
        }
        if self.running.load(Ordering::SeqCst) {
            return Err(OrchestratorError::Busy);
        }
        if !self.gate.is_ready() {
            warn!("Rejecting batch: {}", NOT_READY_MESSAGE);
            self.state
                .send_modify(|s| s.error = Some(NOT_READY_MESSAGE.to_string()));
            return Err(OrchestratorError::NotReady);
        }
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(OrchestratorError::Busy);
        }

        let token = CancellationToken::new();
        *self.cancel.lock().unwrap_or_else(PoisonError::into_inner) = token.clone();

        let jobs: Vec<Job> = files
            .into_iter()
            .map(|source| {
                Job::new(ConversionRequest {
                    source,
                    target_format: target_format.clone(),
                    options: options.clone(),
                })
            })
            .collect();

        let mut generation = 0;
        self.state.send_modify(|s| {
            generation = self.generation.load(Ordering::SeqCst);
            s.is_processing = true;
            s.progress = 0;
            s.error = None;
            s.completed.clear();
            s.queue = jobs.clone();
            s.current = None;
        });

        metrics::BATCHES_STARTED.inc();
        metrics::QUEUE_DEPTH.set(jobs.len() as i64);
        info!(
            "Starting batch of {} file(s) to {} via {} backend",
            jobs.len(),
            target_format,
            self.backend.label()
        );

        Ok(Batch {
            jobs,
            token,
            generation,
        })
    }

    async fn run_batch(&self, batch: Batch) -> BatchReport {
        let Batch {
            jobs,
            token,
            generation,
        } = batch;
        let _guard = BatchGuard {
            inner: self,
            generation,
        };

        let backend = self.backend.label();
        let total = jobs.len();
        let mut report = BatchReport::default();

        for (index, mut job) in jobs.into_iter().enumerate() {
            if token.is_cancelled() {
                report.skipped = total - index;
                report.cancelled = true;
                break;
            }

            let current = job.clone();
            self.update(generation, |s| {
                s.current = Some(current);
                s.progress = 0;
            });
            info!(
                "Converting {} ({}/{}) as job {}",
                job.source().name,
                index + 1,
                total,
                job.id
            );

            let started = Instant::now();
            let result = self.run_job(&mut job, &token, generation).await;
            report.attempted += 1;
            metrics::CONVERSION_DURATION
                .with_label_values(&[backend])
                .observe(started.elapsed().as_secs_f64());

            let (record, outcome, stop) = match result {
                Ok(()) => {
                    job.status = JobStatus::Completed;
                    report.completed += 1;
                    info!("Job {} completed", job.id);
                    (CompletedRecord::completed(&job), "completed", false)
                }
                Err(e) if e.is_cancelled() => {
                    job.status = JobStatus::Cancelled;
                    report.failed += 1;
                    report.cancelled = true;
                    report.skipped = total - index - 1;
                    info!("Job {} cancelled; dropping {} queued file(s)", job.id, report.skipped);
                    (CompletedRecord::failed(&job, CANCELLED_MESSAGE), "cancelled", true)
                }
                Err(e) => {
                    job.status = JobStatus::Failed;
                    report.failed += 1;
                    warn!("Conversion of {} failed: {}", job.source().name, e);
                    (CompletedRecord::failed(&job, e.user_message()), "failed", false)
                }
            };

            metrics::CONVERSIONS_TOTAL
                .with_label_values(&[backend, outcome])
                .inc();

            let job_id = job.id.clone();
            self.update(generation, |s| {
                if let Some(error) = &record.error {
                    s.error = Some(error.clone());
                }
                s.completed.push(record);
                s.queue.retain(|j| j.id != job_id);
                s.current = None;
            });
            metrics::QUEUE_DEPTH.set((total - index - 1) as i64);

            if stop {
                break;
            }
        }

        info!(
            "Batch finished: {} completed, {} failed, {} skipped",
            report.completed, report.failed, report.skipped
        );
        report
    }

    async fn run_job(
        &self,
        job: &mut Job,
        token: &CancellationToken,
        generation: u64,
    ) -> Result<(), JobError> {
        match &self.backend {
            ConversionBackend::Remote {
                service,
                resource_type,
            } => {
                self.run_remote(service.as_ref(), resource_type, job, token, generation)
                    .await
            }
            ConversionBackend::Direct { service } => {
                self.run_direct(service.as_ref(), job, token, generation)
                    .await
            }
            ConversionBackend::Local { adapter } => {
                self.run_local(adapter, job, token, generation).await
            }
        }
    }

    async fn run_remote(
        &self,
        service: &dyn ConversionService,
        resource_type: &str,
        job: &mut Job,
        token: &CancellationToken,
        generation: u64,
    ) -> Result<(), JobError> {
        ensure_not_cancelled(token)?;
        let metadata = JobMetadata::from(&job.request);
        let ticket = cancellable(token, service.create_job(resource_type, &metadata)).await?;
        debug!("Remote job {} created for {}", ticket.job_id, job.id);

        ensure_not_cancelled(token)?;
        self.set_status(generation, job, JobStatus::Uploading);
        cancellable(
            token,
            service.upload_artifact(&ticket.upload_target, job.source(), &ticket.upload_headers),
        )
        .await?;

        self.set_status(generation, job, JobStatus::Processing);
        let started = Instant::now();
        let max_wait = self.config.max_poll_duration();

        loop {
            ensure_not_cancelled(token)?;
            if started.elapsed() >= max_wait {
                return Err(JobError::Timeout { waited: max_wait });
            }

            metrics::STATUS_POLLS.inc();
            let report = service.poll_status(&ticket.status_target, token).await?;
            debug!(
                "Remote job {} is {:?} ({}%)",
                ticket.job_id,
                report.status,
                report.percent()
            );

            match report.status {
                RemoteJobStatus::Completed => {
                    self.set_progress(generation, 100);
                    match report.download_target.as_deref() {
                        Some(target) => {
                            let bytes = cancellable(token, service.fetch_result(target)).await?;
                            self.deliver(&artifact_for(job, bytes)).await?;
                        }
                        None => warn!(
                            "Remote job {} completed without a download URL",
                            ticket.job_id
                        ),
                    }
                    return Ok(());
                }
                RemoteJobStatus::Failed => {
                    return Err(JobError::Failed(
                        report.error.unwrap_or_else(|| FAILED_MESSAGE.to_string()),
                    ));
                }
                _ => {
                    self.set_progress(generation, report.percent());
                    sleep_or_cancel(self.config.poll_interval(), token).await?;
                }
            }
        }
    }

    async fn run_direct(
        &self,
        service: &dyn DirectConversionService,
        job: &mut Job,
        token: &CancellationToken,
        generation: u64,
    ) -> Result<(), JobError> {
        ensure_not_cancelled(token)?;
        self.set_status(generation, job, JobStatus::Processing);

        let request = &job.request;
        let bytes = cancellable(
            token,
            service.convert(&request.source, &request.target_format, &request.options),
        )
        .await?;

        self.set_progress(generation, 100);
        self.deliver(&artifact_for(job, bytes)).await
    }

    async fn run_local(
        &self,
        adapter: &LocalEngineAdapter,
        job: &mut Job,
        token: &CancellationToken,
        generation: u64,
    ) -> Result<(), JobError> {
        ensure_not_cancelled(token)?;
        self.set_status(generation, job, JobStatus::Processing);

        let request = &job.request;
        let (progress_tx, mut progress_rx) = mpsc::channel(16);
        let convert = adapter.convert_with_progress(
            &request.source,
            &request.target_format,
            &request.options,
            Some(progress_tx),
        );
        let forward = async {
            while let Some(progress) = progress_rx.recv().await {
                self.set_progress(generation, progress);
            }
        };
        let work = async {
            let (result, ()) = tokio::join!(convert, forward);
            result
        };

        let artifact = cancellable(token, work).await?;
        self.set_progress(generation, 100);
        self.deliver(&artifact).await
    }

    async fn deliver(&self, artifact: &ConvertedArtifact) -> Result<(), JobError> {
        let location = self.sink.deliver(artifact).await?;
        info!("Delivered {} to {}", artifact.file_name, location);
        Ok(())
    }
}

fn artifact_for(job: &Job, bytes: bytes::Bytes) -> ConvertedArtifact {
    let target_format = &job.request.target_format;
    ConvertedArtifact {
        file_name: output_file_name(&job.source().name, target_format),
        mime_type: target_format.mime_type().to_string(),
        bytes,
    }
}

fn ensure_not_cancelled(token: &CancellationToken) -> Result<(), JobError> {
    if token.is_cancelled() {
        Err(JobError::Cancelled)
    } else {
        Ok(())
    }
}

/// Races `fut` against the token.
async fn cancellable<T, E, F>(token: &CancellationToken, fut: F) -> Result<T, JobError>
where
    F: Future<Output = Result<T, E>>,
    JobError: From<E>,
{
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(JobError::Cancelled),
        result = fut => result.map_err(JobError::from),
    }
}

async fn sleep_or_cancel(duration: Duration, token: &CancellationToken) -> Result<(), JobError> {
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(JobError::Cancelled),
        _ = tokio::time::sleep(duration) => Ok(()),
    }
}
