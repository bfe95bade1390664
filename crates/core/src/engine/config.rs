//! Configuration for the local engine.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Where to load the engine from. For the ffmpeg runtime this is a binary
/// name or path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EngineSource(String);

impl EngineSource {
    pub fn new(location: impl Into<String>) -> Self {
        Self(location.into())
    }

    pub fn location(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EngineSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Configuration for the local engine adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Ordered sources; the first one that loads wins.
    #[serde(default = "default_sources")]
    pub sources: Vec<EngineSource>,

    /// Private directory for staged input and output files.
    #[serde(default = "default_staging_dir")]
    pub staging_dir: PathBuf,

    /// Time box for a single load attempt.
    #[serde(default = "default_load_timeout_ms")]
    pub load_timeout_ms: u64,

    /// Extra rounds over the whole source list after the first one fails.
    #[serde(default = "default_load_retries")]
    pub load_retries: u32,

    /// Log lines kept in memory.
    #[serde(default = "default_log_capacity")]
    pub log_capacity: usize,

    /// Timeout for a single conversion in seconds.
    #[serde(default = "default_exec_timeout")]
    pub exec_timeout_secs: u64,
}

fn default_sources() -> Vec<EngineSource> {
    vec![EngineSource::new("ffmpeg")]
}

fn default_staging_dir() -> PathBuf {
    std::env::temp_dir().join("conversio-staging")
}

fn default_load_timeout_ms() -> u64 {
    30_000
}

fn default_load_retries() -> u32 {
    2
}

fn default_log_capacity() -> usize {
    200
}

fn default_exec_timeout() -> u64 {
    3600 // 1 hour
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sources: default_sources(),
            staging_dir: default_staging_dir(),
            load_timeout_ms: default_load_timeout_ms(),
            load_retries: default_load_retries(),
            log_capacity: default_log_capacity(),
            exec_timeout_secs: default_exec_timeout(),
        }
    }
}

impl EngineConfig {
    pub fn with_sources<I, S>(mut self, sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sources = sources.into_iter().map(EngineSource::new).collect();
        self
    }

    pub fn with_staging_dir(mut self, staging_dir: PathBuf) -> Self {
        self.staging_dir = staging_dir;
        self
    }

    pub fn with_load_timeout(mut self, timeout_ms: u64) -> Self {
        self.load_timeout_ms = timeout_ms;
        self
    }

    pub fn with_load_retries(mut self, retries: u32) -> Self {
        self.load_retries = retries;
        self
    }

    pub fn with_log_capacity(mut self, capacity: usize) -> Self {
        self.log_capacity = capacity;
        self
    }

    pub fn load_timeout(&self) -> Duration {
        Duration::from_millis(self.load_timeout_ms)
    }

    pub fn exec_timeout(&self) -> Duration {
        Duration::from_secs(self.exec_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.sources, vec![EngineSource::new("ffmpeg")]);
        assert_eq!(config.load_timeout(), Duration::from_secs(30));
        assert_eq!(config.load_retries, 2);
        assert_eq!(config.log_capacity, 200);
    }

    #[test]
    fn test_sources_from_toml() {
        let config: EngineConfig = toml::from_str(
            r#"
            sources = ["/usr/local/bin/ffmpeg", "ffmpeg"]
            load_retries = 0
        "#,
        )
        .unwrap();
        assert_eq!(config.sources.len(), 2);
        assert_eq!(config.sources[0].location(), "/usr/local/bin/ffmpeg");
        assert_eq!(config.load_retries, 0);
    }

    #[test]
    fn test_config_builder() {
        let config = EngineConfig::default()
            .with_sources(["a", "b"])
            .with_staging_dir(PathBuf::from("/tmp/stage"))
            .with_load_timeout(500)
            .with_log_capacity(10);
        assert_eq!(config.sources[1].location(), "b");
        assert_eq!(config.staging_dir, PathBuf::from("/tmp/stage"));
        assert_eq!(config.load_timeout(), Duration::from_millis(500));
        assert_eq!(config.log_capacity, 10);
    }
}
