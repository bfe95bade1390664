use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;

use crate::client::{DirectResourceKind, DirectServiceConfig, RemoteServiceConfig};
use crate::engine::EngineConfig;
use crate::orchestrator::OrchestratorConfig;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub backend: BackendConfig,
    #[serde(default)]
    pub server: ServerConfig,
    /// Required when backend = "remote"
    #[serde(default)]
    pub remote: Option<RemoteServiceConfig>,
    /// Required when backend = "direct"
    #[serde(default)]
    pub direct: Option<DirectServiceConfig>,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    #[serde(default)]
    pub health: HealthConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    8080
}

/// Backend selection
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackendConfig {
    pub kind: BackendKind,
}

/// Available conversion backends
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Job protocol: create, upload, poll, download
    Remote,
    /// One-shot multipart conversion (Gotenberg)
    Direct,
    /// Local ffmpeg engine
    Local,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Remote => "remote",
            BackendKind::Direct => "direct",
            BackendKind::Local => "local",
        }
    }
}

/// Health polling configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HealthConfig {
    /// Interval between background health checks (milliseconds)
    #[serde(default = "default_health_interval")]
    pub interval_ms: u64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_health_interval(),
        }
    }
}

fn default_health_interval() -> u64 {
    30_000
}

/// Where converted files are written
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("converted")
}

/// Sanitized config for API responses (local paths hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub backend: String,
    pub server: ServerConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote: Option<RemoteServiceConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direct: Option<SanitizedDirectConfig>,
    pub orchestrator: OrchestratorConfig,
    pub health: HealthConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engine: Option<SanitizedEngineConfig>,
    pub output_configured: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedDirectConfig {
    pub url: String,
    pub resource_type: DirectResourceKind,
    pub timeout_secs: u64,
}

/// Sanitized engine config (staging directory hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedEngineConfig {
    pub sources: usize,
    pub load_timeout_ms: u64,
    pub load_retries: u32,
    pub log_capacity: usize,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        let kind = config.backend.kind;
        Self {
            backend: kind.as_str().to_string(),
            server: config.server.clone(),
            remote: config
                .remote
                .clone()
                .filter(|_| kind == BackendKind::Remote),
            direct: config
                .direct
                .as_ref()
                .filter(|_| kind == BackendKind::Direct)
                .map(|d| SanitizedDirectConfig {
                    url: d.url.clone(),
                    resource_type: d.resource_type,
                    timeout_secs: d.timeout_secs,
                }),
            orchestrator: config.orchestrator.clone(),
            health: config.health.clone(),
            engine: (kind == BackendKind::Local).then(|| SanitizedEngineConfig {
                sources: config.engine.sources.len(),
                load_timeout_ms: config.engine.load_timeout_ms,
                load_retries: config.engine.load_retries,
                log_capacity: config.engine.log_capacity,
            }),
            output_configured: !config.output.dir.as_os_str().is_empty(),
        }
    }
}
