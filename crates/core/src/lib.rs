pub mod client;
pub mod config;
pub mod delivery;
pub mod engine;
pub mod health;
pub mod job;
pub mod metrics;
pub mod orchestrator;
pub mod testing;

pub use client::{
    ClientError, ConversionService, DirectClientError, DirectConversionService,
    DirectServiceConfig, GotenbergClient, HttpConversionClient, RemoteServiceConfig,
};
pub use config::{
    load_config, load_config_from_str, validate_config, BackendKind, Config, ConfigError,
    SanitizedConfig,
};
pub use delivery::{ConvertedArtifact, DeliveryError, DirectorySink, ResultSink};
pub use engine::{EngineConfig, EngineError, FfmpegRuntime, LocalEngineAdapter};
pub use health::{HealthMonitor, HealthState, HealthStatus, ReadinessGate};
pub use job::{
    CompletedRecord, ConversionOptions, ConversionRequest, Job, JobStatus, SourceFile,
    TargetFormat,
};
pub use orchestrator::{
    BatchReport, ConversionBackend, ConversionOrchestrator, JobError, OrchestratorConfig,
    OrchestratorError, OrchestratorSnapshot,
};
