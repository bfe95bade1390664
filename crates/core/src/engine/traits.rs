//! Trait definitions for engine runtimes.

use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use tokio::sync::mpsc;

use super::config::EngineSource;
use super::error::EngineError;

/// Event emitted by a running engine command.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// Completion ratio in `0.0..=1.0`.
    Progress(f64),
    Log(String),
}

/// Knows how to check the host and load an engine instance.
#[async_trait]
pub trait EngineRuntime: Send + Sync {
    /// Returns the name of this runtime.
    fn name(&self) -> &str;

    /// Lists everything missing from the host. Empty means supported.
    async fn check_capabilities(&self) -> Vec<String>;

    /// Loads an engine from one source.
    async fn load(&self, source: &EngineSource) -> Result<Arc<dyn LoadedEngine>, EngineError>;
}

/// A loaded engine with private staging storage.
#[async_trait]
pub trait LoadedEngine: Send + Sync {
    fn version(&self) -> &str;

    async fn write_file(&self, name: &str, data: &[u8]) -> Result<(), EngineError>;

    /// Runs a command. Events are sent while it runs; a closed receiver is
    /// not an error.
    async fn exec(
        &self,
        args: &[String],
        events: mpsc::Sender<EngineEvent>,
    ) -> Result<(), EngineError>;

    async fn read_file(&self, name: &str) -> Result<Bytes, EngineError>;

    async fn delete_file(&self, name: &str) -> Result<(), EngineError>;
}
