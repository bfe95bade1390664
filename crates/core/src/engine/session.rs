//! Lazily loaded engine session.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{watch, OnceCell};

use super::error::EngineError;
use super::traits::LoadedEngine;

/// Lifecycle of an engine session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineState {
    #[default]
    Unloaded,
    Loading,
    Ready,
    /// The last load attempt failed. A later load retries.
    Failed,
}

impl EngineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineState::Unloaded => "unloaded",
            EngineState::Loading => "loading",
            EngineState::Ready => "ready",
            EngineState::Failed => "failed",
        }
    }
}

/// Observable session state.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SessionInfo {
    pub state: EngineState,
    pub loaded: bool,
    pub loaded_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    /// Source the engine was loaded from.
    pub source: Option<String>,
    pub version: Option<String>,
}

/// A successful load: the engine and the source it came from.
pub struct Loaded {
    pub engine: Arc<dyn LoadedEngine>,
    pub source: String,
}

/// Holds at most one loaded engine for the lifetime of an adapter.
///
/// Concurrent loads coalesce: callers that arrive while a load is running
/// wait for it and share its outcome, success or failure.
pub struct EngineSession {
    engine: OnceCell<Arc<dyn LoadedEngine>>,
    load_lock: tokio::sync::Mutex<()>,
    failures: AtomicU64,
    last_failure: Mutex<Option<EngineError>>,
    info: watch::Sender<SessionInfo>,
}

impl Default for EngineSession {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineSession {
    pub fn new() -> Self {
        let (info, _) = watch::channel(SessionInfo::default());
        Self {
            engine: OnceCell::new(),
            load_lock: tokio::sync::Mutex::new(()),
            failures: AtomicU64::new(0),
            last_failure: Mutex::new(None),
            info,
        }
    }

    /// The loaded engine, if any.
    pub fn engine(&self) -> Option<Arc<dyn LoadedEngine>> {
        self.engine.get().cloned()
    }

    pub fn is_loaded(&self) -> bool {
        self.engine.initialized()
    }

    pub fn info(&self) -> SessionInfo {
        self.info.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionInfo> {
        self.info.subscribe()
    }

    /// Records an error against the session without changing its state.
    pub fn record_error(&self, error: &EngineError) {
        let message = error.to_string();
        self.info.send_modify(|info| info.last_error = Some(message));
    }

    /// Returns the engine, running `load` if nothing is loaded yet.
    pub async fn get_or_load<F, Fut>(&self, load: F) -> Result<Arc<dyn LoadedEngine>, EngineError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Loaded, EngineError>>,
    {
        if let Some(engine) = self.engine.get() {
            return Ok(Arc::clone(engine));
        }

        let failures_seen = self.failures.load(Ordering::SeqCst);
        let _guard = self.load_lock.lock().await;

        if let Some(engine) = self.engine.get() {
            return Ok(Arc::clone(engine));
        }
        // A load failed while we waited; share its outcome instead of retrying.
        if self.failures.load(Ordering::SeqCst) != failures_seen {
            if let Some(error) = self.last_failure() {
                return Err(error);
            }
        }

        self.info.send_modify(|info| {
            info.state = EngineState::Loading;
            info.last_error = None;
        });

        match load().await {
            Ok(Loaded { engine, source }) => {
                let version = engine.version().to_string();
                // Only this task sets the cell, under the load lock.
                let _ = self.engine.set(Arc::clone(&engine));
                self.info.send_modify(|info| {
                    info.state = EngineState::Ready;
                    info.loaded = true;
                    info.loaded_at = Some(Utc::now());
                    info.source = Some(source);
                    info.version = Some(version);
                });
                Ok(engine)
            }
            Err(error) => {
                *self
                    .last_failure
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner) = Some(error.clone());
                self.failures.fetch_add(1, Ordering::SeqCst);
                let message = error.to_string();
                self.info.send_modify(|info| {
                    info.state = EngineState::Failed;
                    info.loaded = false;
                    info.last_error = Some(message);
                });
                Err(error)
            }
        }
    }

    fn last_failure(&self) -> Option<EngineError> {
        self.last_failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
