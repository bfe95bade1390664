//! Mock engine runtime for testing.

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;

use crate::engine::{EngineError, EngineEvent, EngineRuntime, EngineSource, LoadedEngine};

#[derive(Debug, Default)]
struct EngineState {
    files: HashMap<String, Vec<u8>>,
    exec_calls: Vec<Vec<String>>,
    skip_output: bool,
    fail_exec: Option<String>,
    hang_exec: bool,
    progress_steps: Vec<f64>,
}

/// An in-memory engine. `exec` writes the last argument as the output file.
#[derive(Debug)]
pub struct MockEngine {
    version: String,
    state: Mutex<EngineState>,
}

impl MockEngine {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            state: Mutex::new(EngineState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn exec_calls(&self) -> Vec<Vec<String>> {
        self.state().exec_calls.clone()
    }

    /// Names currently held in staging storage.
    pub fn staged_files(&self) -> Vec<String> {
        let mut names: Vec<String> = self.state().files.keys().cloned().collect();
        names.sort();
        names
    }

    /// Commands succeed without producing an output file.
    pub fn skip_output(&self) {
        self.state().skip_output = true;
    }

    /// Commands fail with `reason`.
    pub fn fail_exec(&self, reason: &str) {
        self.state().fail_exec = Some(reason.to_string());
    }

    /// Commands never finish once their progress has been reported.
    pub fn hang_exec(&self) {
        self.state().hang_exec = true;
    }

    /// Progress ratios reported by each command.
    pub fn set_progress_steps(&self, steps: Vec<f64>) {
        self.state().progress_steps = steps;
    }
}

#[async_trait]
impl LoadedEngine for MockEngine {
    fn version(&self) -> &str {
        &self.version
    }

    async fn write_file(&self, name: &str, data: &[u8]) -> Result<(), EngineError> {
        self.state().files.insert(name.to_string(), data.to_vec());
        Ok(())
    }

    async fn exec(
        &self,
        args: &[String],
        events: mpsc::Sender<EngineEvent>,
    ) -> Result<(), EngineError> {
        let (steps, fail, skip_output, hang) = {
            let mut state = self.state();
            state.exec_calls.push(args.to_vec());
            (
                state.progress_steps.clone(),
                state.fail_exec.clone(),
                state.skip_output,
                state.hang_exec,
            )
        };

        let _ = events
            .send(EngineEvent::Log(format!("mock exec {}", args.join(" "))))
            .await;
        for ratio in steps {
            let _ = events.send(EngineEvent::Progress(ratio)).await;
        }

        if hang {
            std::future::pending::<()>().await;
        }
        if let Some(reason) = fail {
            return Err(EngineError::execution(reason, None));
        }
        if !skip_output {
            if let Some(output) = args.last() {
                self.state()
                    .files
                    .insert(output.clone(), b"mock output".to_vec());
            }
        }
        Ok(())
    }

    async fn read_file(&self, name: &str) -> Result<Bytes, EngineError> {
        self.state()
            .files
            .get(name)
            .map(|data| Bytes::from(data.clone()))
            .ok_or_else(|| EngineError::staging(name, "file not found"))
    }

    async fn delete_file(&self, name: &str) -> Result<(), EngineError> {
        self.state()
            .files
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| EngineError::staging(name, "file not found"))
    }
}

#[derive(Debug, Default)]
struct RuntimeState {
    failing: HashMap<String, String>,
    hanging: Vec<String>,
    capability_issues: Vec<String>,
    load_calls: Vec<String>,
}

/// Mock implementation of [`EngineRuntime`]. Every successful load returns
/// the same shared [`MockEngine`].
#[derive(Debug)]
pub struct MockEngineRuntime {
    engine: Arc<MockEngine>,
    state: Mutex<RuntimeState>,
}

impl Default for MockEngineRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEngineRuntime {
    pub fn new() -> Self {
        Self {
            engine: Arc::new(MockEngine::new("mock-engine 1.0")),
            state: Mutex::new(RuntimeState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, RuntimeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn engine(&self) -> Arc<MockEngine> {
        Arc::clone(&self.engine)
    }

    pub fn fail_source(&self, source: &str, reason: &str) {
        self.state()
            .failing
            .insert(source.to_string(), reason.to_string());
    }

    /// Loads from `source` never finish.
    pub fn hang_source(&self, source: &str) {
        self.state().hanging.push(source.to_string());
    }

    pub fn set_capability_issues(&self, issues: Vec<String>) {
        self.state().capability_issues = issues;
    }

    pub fn load_calls(&self) -> Vec<String> {
        self.state().load_calls.clone()
    }
}

#[async_trait]
impl EngineRuntime for MockEngineRuntime {
    fn name(&self) -> &str {
        "mock"
    }

    async fn check_capabilities(&self) -> Vec<String> {
        self.state().capability_issues.clone()
    }

    async fn load(&self, source: &EngineSource) -> Result<Arc<dyn LoadedEngine>, EngineError> {
        let location = source.location().to_string();
        let (hang, failure) = {
            let mut state = self.state();
            state.load_calls.push(location.clone());
            (
                state.hanging.contains(&location),
                state.failing.get(&location).cloned(),
            )
        };

        if hang {
            std::future::pending::<()>().await;
        }
        if let Some(reason) = failure {
            return Err(EngineError::Source(reason));
        }
        let engine: Arc<dyn LoadedEngine> = self.engine.clone();
        Ok(engine)
    }
}
