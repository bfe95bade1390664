//! Local engine adapter: load lifecycle, staging and conversion.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::command::{build_args, MediaKind};
use super::config::EngineConfig;
use super::error::{EngineError, LoadAttempt};
use super::log_buffer::LogBuffer;
use super::session::{EngineSession, Loaded, SessionInfo};
use super::traits::{EngineEvent, EngineRuntime, LoadedEngine};
use crate::delivery::ConvertedArtifact;
use crate::health::ReadinessGate;
use crate::job::{output_file_name, ConversionOptions, SourceFile, TargetFormat};
use crate::metrics;

const MAX_BACKOFF_MS: u64 = 5000;

/// Delay before retry round `round` (1-based): `min(1000 * 2^(round-1), 5000)` ms.
pub fn retry_backoff(round: u32) -> Duration {
    let exp = round.saturating_sub(1).min(16);
    Duration::from_millis((1000u64 << exp).min(MAX_BACKOFF_MS))
}

/// Removes staged files when dropped without an explicit cleanup, e.g. when
/// the conversion future is cancelled mid-flight.
struct StagedFiles {
    engine: Arc<dyn LoadedEngine>,
    names: Vec<String>,
}

impl StagedFiles {
    async fn cleanup(mut self) {
        let names = std::mem::take(&mut self.names);
        for name in &names {
            if let Err(e) = self.engine.delete_file(name).await {
                warn!("Failed to remove staged file {}: {}", name, e);
            }
        }
    }
}

impl Drop for StagedFiles {
    fn drop(&mut self) {
        if self.names.is_empty() {
            return;
        }
        let names = std::mem::take(&mut self.names);
        let engine = Arc::clone(&self.engine);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    for name in &names {
                        if let Err(e) = engine.delete_file(name).await {
                            warn!("Failed to remove staged file {}: {}", name, e);
                        }
                    }
                });
            }
            Err(_) => warn!("No runtime available to remove staged files {:?}", names),
        }
    }
}

/// Wraps an [`EngineRuntime`] with a lazily loaded session.
pub struct LocalEngineAdapter {
    runtime: Arc<dyn EngineRuntime>,
    config: EngineConfig,
    session: EngineSession,
    progress: watch::Sender<u8>,
    logs: Mutex<LogBuffer>,
}

impl LocalEngineAdapter {
    pub fn new(runtime: Arc<dyn EngineRuntime>, config: EngineConfig) -> Self {
        let (progress, _) = watch::channel(0);
        let logs = Mutex::new(LogBuffer::new(config.log_capacity));
        Self {
            runtime,
            config,
            session: EngineSession::new(),
            progress,
            logs,
        }
    }

    pub fn runtime_name(&self) -> &str {
        self.runtime.name()
    }

    pub fn session(&self) -> SessionInfo {
        self.session.info()
    }

    pub fn subscribe_session(&self) -> watch::Receiver<SessionInfo> {
        self.session.subscribe()
    }

    pub fn is_loaded(&self) -> bool {
        self.session.is_loaded()
    }

    /// Progress of the running conversion, 0-100.
    pub fn progress(&self) -> u8 {
        *self.progress.borrow()
    }

    pub fn subscribe_progress(&self) -> watch::Receiver<u8> {
        self.progress.subscribe()
    }

    /// Retained log lines, oldest first.
    pub fn logs(&self) -> Vec<String> {
        self.log_buffer().lines()
    }

    pub fn recent_logs(&self, n: usize) -> Vec<String> {
        self.log_buffer().tail(n)
    }

    /// Clears progress and logs. The session stays loaded.
    pub fn reset(&self) {
        self.progress.send_replace(0);
        self.log_buffer().clear();
    }

    fn log_buffer(&self) -> std::sync::MutexGuard<'_, LogBuffer> {
        self.logs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn log(&self, line: impl Into<String>) {
        self.log_buffer().push(line);
    }

    /// Loads the engine unless already loaded. Concurrent calls share one load.
    pub async fn ensure_loaded(&self) -> Result<(), EngineError> {
        self.session
            .get_or_load(|| self.load_engine())
            .await
            .map(|_| ())
    }

    async fn load_engine(&self) -> Result<Loaded, EngineError> {
        info!("Initializing {} engine", self.runtime.name());
        self.log("Initializing engine...");

        let issues = self.runtime.check_capabilities().await;
        if !issues.is_empty() {
            let err = EngineError::UnsupportedEnvironment { issues };
            error!("Engine environment check failed: {}", err);
            self.log(format!("Error: {}", err));
            return Err(err);
        }
        self.log("Environment check passed");

        let rounds = self.config.load_retries + 1;
        let timeout = self.config.load_timeout();
        let mut attempts = Vec::new();

        for round in 0..rounds {
            if round > 0 {
                let delay = retry_backoff(round);
                self.log(format!("Retry attempt {} after {}ms delay...", round, delay.as_millis()));
                tokio::time::sleep(delay).await;
            }

            for source in &self.config.sources {
                self.log(format!("Trying to load from {}...", source));
                debug!("Loading engine from {}", source);

                let attempt = match tokio::time::timeout(timeout, self.runtime.load(source)).await {
                    Ok(Ok(engine)) => {
                        metrics::ENGINE_LOAD_ATTEMPTS
                            .with_label_values(&["success"])
                            .inc();
                        info!("Engine loaded from {} ({})", source, engine.version());
                        self.log(format!("Engine loaded: {}", engine.version()));
                        return Ok(Loaded {
                            engine,
                            source: source.to_string(),
                        });
                    }
                    Ok(Err(e)) => {
                        metrics::ENGINE_LOAD_ATTEMPTS
                            .with_label_values(&["failed"])
                            .inc();
                        LoadAttempt {
                            source: source.to_string(),
                            reason: e.to_string(),
                            timed_out: false,
                        }
                    }
                    Err(_) => {
                        metrics::ENGINE_LOAD_ATTEMPTS
                            .with_label_values(&["timeout"])
                            .inc();
                        LoadAttempt {
                            source: source.to_string(),
                            reason: format!("load timed out after {} ms", timeout.as_millis()),
                            timed_out: true,
                        }
                    }
                };

                warn!("Failed to load engine from {}: {}", source, attempt.reason);
                self.log(format!("Failed from {}: {}", source, attempt.reason));
                attempts.push(attempt);
            }
        }

        let err = EngineError::load_failed(rounds, attempts);
        error!("Engine load failed: {}", err);
        self.log(format!("Error: {}", err));
        Err(err)
    }

    /// Converts one file. Requires a loaded engine.
    pub async fn convert(
        &self,
        file: &SourceFile,
        target_format: &TargetFormat,
        options: &ConversionOptions,
    ) -> Result<ConvertedArtifact, EngineError> {
        self.convert_with_progress(file, target_format, options, None)
            .await
    }

    /// Converts one file, forwarding whole-percent progress to `progress_tx`.
    ///
    /// Progress sends never block; a full or closed channel drops the update.
    pub async fn convert_with_progress(
        &self,
        file: &SourceFile,
        target_format: &TargetFormat,
        options: &ConversionOptions,
        progress_tx: Option<mpsc::Sender<u8>>,
    ) -> Result<ConvertedArtifact, EngineError> {
        let result = self
            .run_conversion(file, target_format, options, progress_tx)
            .await;
        if let Err(e) = &result {
            self.session.record_error(e);
            self.log(format!("Error: {}", e));
        }
        result
    }

    async fn run_conversion(
        &self,
        file: &SourceFile,
        target_format: &TargetFormat,
        options: &ConversionOptions,
        progress_tx: Option<mpsc::Sender<u8>>,
    ) -> Result<ConvertedArtifact, EngineError> {
        let engine = self.session.engine().ok_or(EngineError::NotLoaded)?;
        let kind = MediaKind::from_mime(&file.mime_type).ok_or_else(|| {
            EngineError::UnsupportedInput {
                mime_type: file.mime_type.clone(),
            }
        })?;

        self.progress.send_replace(0);
        self.log(format!("Starting conversion of {}...", file.name));

        let id = Uuid::new_v4().simple();
        let input_name = format!("input_{}.{}", id, file.extension().unwrap_or("bin"));
        let output_name = format!("output_{}.{}", id, target_format.extension());

        let staged = StagedFiles {
            engine: Arc::clone(&engine),
            names: vec![input_name.clone(), output_name.clone()],
        };

        let result = self
            .run_staged(
                engine.as_ref(),
                file,
                kind,
                &input_name,
                &output_name,
                options,
                progress_tx,
            )
            .await;

        self.log("Cleaning up temporary files...");
        staged.cleanup().await;

        let bytes = result?;
        self.progress.send_replace(100);
        self.log("Conversion completed successfully");

        Ok(ConvertedArtifact {
            file_name: output_file_name(&file.name, target_format),
            mime_type: kind.output_mime(target_format),
            bytes,
        })
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_staged(
        &self,
        engine: &dyn LoadedEngine,
        file: &SourceFile,
        kind: MediaKind,
        input_name: &str,
        output_name: &str,
        options: &ConversionOptions,
        progress_tx: Option<mpsc::Sender<u8>>,
    ) -> Result<bytes::Bytes, EngineError> {
        self.log("Writing file to engine storage...");
        engine.write_file(input_name, file.bytes()).await?;

        let args = build_args(kind, input_name, output_name, options);
        debug!("Engine command: {:?}", args);

        let (events_tx, mut events_rx) = mpsc::channel(64);
        let exec = engine.exec(&args, events_tx);
        let drain = async {
            while let Some(event) = events_rx.recv().await {
                match event {
                    EngineEvent::Progress(ratio) => {
                        let percent = (ratio * 100.0).round().clamp(0.0, 100.0) as u8;
                        self.progress.send_replace(percent);
                        if let Some(tx) = &progress_tx {
                            let _ = tx.try_send(percent);
                        }
                    }
                    EngineEvent::Log(line) => self.log(line),
                }
            }
        };
        let (exec_result, ()) = tokio::join!(exec, drain);
        exec_result?;

        self.log("Reading converted file...");
        engine.read_file(output_name).await
    }
}

impl ReadinessGate for LocalEngineAdapter {
    fn is_ready(&self) -> bool {
        self.session.is_loaded()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockEngineRuntime;

    fn config() -> EngineConfig {
        EngineConfig::default()
            .with_sources(["mock://a", "mock://b"])
            .with_load_retries(0)
    }

    #[test]
    fn test_retry_backoff() {
        assert_eq!(retry_backoff(1), Duration::from_millis(1000));
        assert_eq!(retry_backoff(2), Duration::from_millis(2000));
        assert_eq!(retry_backoff(3), Duration::from_millis(4000));
        assert_eq!(retry_backoff(4), Duration::from_millis(5000));
        assert_eq!(retry_backoff(40), Duration::from_millis(5000));
    }

    #[tokio::test]
    async fn test_convert_requires_load() {
        let runtime = Arc::new(MockEngineRuntime::new());
        let adapter = LocalEngineAdapter::new(runtime, config());
        let file = SourceFile::new("clip.mov", "video/quicktime", vec![1u8, 2, 3]);

        let err = adapter
            .convert(&file, &TargetFormat::new("mp4"), &ConversionOptions::new())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::NotLoaded));
        assert!(adapter.session().last_error.is_some());
        assert!(!adapter.is_ready());
    }

    #[tokio::test]
    async fn test_falls_back_to_next_source() {
        let runtime = Arc::new(MockEngineRuntime::new());
        runtime.fail_source("mock://a", "connection refused");
        let adapter = LocalEngineAdapter::new(runtime.clone(), config());

        adapter.ensure_loaded().await.unwrap();
        assert!(adapter.is_ready());
        assert_eq!(adapter.session().source.as_deref(), Some("mock://b"));
        assert_eq!(runtime.load_calls(), vec!["mock://a", "mock://b"]);
        assert!(adapter
            .logs()
            .iter()
            .any(|l| l.contains("Failed from mock://a: connection refused")));
    }

    #[tokio::test]
    async fn test_unsupported_environment_fails_fast() {
        let runtime = Arc::new(MockEngineRuntime::new());
        runtime.set_capability_issues(vec!["staging directory is read-only".to_string()]);
        let adapter = LocalEngineAdapter::new(runtime.clone(), config());

        let err = adapter.ensure_loaded().await.unwrap_err();
        assert!(matches!(err, EngineError::UnsupportedEnvironment { .. }));
        assert!(runtime.load_calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_sources_fail_with_retries() {
        let runtime = Arc::new(MockEngineRuntime::new());
        runtime.fail_source("mock://a", "not found");
        runtime.fail_source("mock://b", "not found");
        let adapter = LocalEngineAdapter::new(runtime.clone(), config().with_load_retries(2));

        let err = adapter.ensure_loaded().await.unwrap_err();
        match &err {
            EngineError::LoadFailed {
                rounds, attempts, ..
            } => {
                assert_eq!(*rounds, 3);
                assert_eq!(attempts.len(), 6);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(runtime.load_calls().len(), 6);
        assert!(!adapter.is_ready());
    }

    #[tokio::test(start_paused = true)]
    async fn test_load_attempt_is_time_boxed() {
        let runtime = Arc::new(MockEngineRuntime::new());
        runtime.hang_source("mock://a");
        let adapter = LocalEngineAdapter::new(runtime.clone(), config().with_load_timeout(30_000));

        adapter.ensure_loaded().await.unwrap();
        assert_eq!(adapter.session().source.as_deref(), Some("mock://b"));
    }

    #[tokio::test]
    async fn test_convert_stages_and_cleans_up() {
        let runtime = Arc::new(MockEngineRuntime::new());
        let adapter = LocalEngineAdapter::new(runtime.clone(), config());
        adapter.ensure_loaded().await.unwrap();

        let file = SourceFile::new("song.wav", "audio/wav", vec![7u8; 16]);
        let artifact = adapter
            .convert(&file, &TargetFormat::new("MP3"), &ConversionOptions::new())
            .await
            .unwrap();

        assert_eq!(artifact.file_name, "song.mp3");
        assert_eq!(artifact.mime_type, "audio/mp3");
        assert_eq!(adapter.progress(), 100);

        let engine = runtime.engine();
        let args = engine.exec_calls().pop().unwrap();
        assert!(args[1].starts_with("input_") && args[1].ends_with(".wav"));
        assert!(args.last().unwrap().starts_with("output_"));
        assert!(engine.staged_files().is_empty());
    }

    #[tokio::test]
    async fn test_cleanup_runs_when_read_fails() {
        let runtime = Arc::new(MockEngineRuntime::new());
        let adapter = LocalEngineAdapter::new(runtime.clone(), config());
        adapter.ensure_loaded().await.unwrap();
        runtime.engine().skip_output();

        let file = SourceFile::new("clip.mov", "video/quicktime", vec![1u8; 8]);
        let err = adapter
            .convert(&file, &TargetFormat::new("mp4"), &ConversionOptions::new())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Staging { .. }));
        assert!(runtime.engine().staged_files().is_empty());
    }

    #[tokio::test]
    async fn test_rejects_non_media_input() {
        let runtime = Arc::new(MockEngineRuntime::new());
        let adapter = LocalEngineAdapter::new(runtime, config());
        adapter.ensure_loaded().await.unwrap();

        let file = SourceFile::new("doc.pdf", "application/pdf", vec![1u8]);
        let err = adapter
            .convert(&file, &TargetFormat::new("mp4"), &ConversionOptions::new())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Unsupported file type: application/pdf");
    }

    #[tokio::test]
    async fn test_progress_forwarded() {
        let runtime = Arc::new(MockEngineRuntime::new());
        let adapter = LocalEngineAdapter::new(runtime.clone(), config());
        adapter.ensure_loaded().await.unwrap();
        runtime.engine().set_progress_steps(vec![0.25, 0.5, 1.0]);

        let (tx, mut rx) = mpsc::channel(16);
        let file = SourceFile::new("clip.mov", "video/quicktime", vec![1u8; 8]);
        adapter
            .convert_with_progress(
                &file,
                &TargetFormat::new("mp4"),
                &ConversionOptions::new(),
                Some(tx),
            )
            .await
            .unwrap();

        let mut seen = Vec::new();
        while let Ok(p) = rx.try_recv() {
            seen.push(p);
        }
        assert_eq!(seen, vec![25, 50, 100]);
    }
}
