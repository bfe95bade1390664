//! Local conversion engine.
//!
//! The [`LocalEngineAdapter`] owns one [`EngineSession`] that is loaded at
//! most once and reused for every conversion. Loading tries an ordered list
//! of sources, each time-boxed, and retries the whole list with backoff.
//! Conversions stage the input in the engine's private storage, run a
//! command built from the options, read the output back and remove both
//! staged files.
//!
//! The runtime is pluggable through [`EngineRuntime`]; [`FfmpegRuntime`]
//! drives a native ffmpeg binary.

mod adapter;
mod command;
mod config;
mod error;
mod ffmpeg;
mod log_buffer;
mod session;
mod traits;

pub use adapter::{retry_backoff, LocalEngineAdapter};
pub use command::{build_args, resolution_size, MediaKind};
pub use config::{EngineConfig, EngineSource};
pub use error::{EngineError, LoadAttempt};
pub use ffmpeg::{FfmpegEngine, FfmpegRuntime};
pub use log_buffer::LogBuffer;
pub use session::{EngineSession, EngineState, Loaded, SessionInfo};
pub use traits::{EngineEvent, EngineRuntime, LoadedEngine};
