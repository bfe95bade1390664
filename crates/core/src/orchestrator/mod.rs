//! Conversion orchestrator.
//!
//! Drives a batch of files through the configured backend:
//! - **Sequential**: one job at a time, in submission order
//! - **Isolated**: a failed job is recorded and the batch moves on
//! - **Observable**: every state change is published on a watch channel
//!
//! A batch may only start while the readiness gate is open and no other
//! batch is running.

mod backend;
mod config;
mod runner;
mod types;

pub use backend::ConversionBackend;
pub use config::OrchestratorConfig;
pub use runner::ConversionOrchestrator;
pub use types::{BatchReport, JobError, OrchestratorError, OrchestratorSnapshot};
