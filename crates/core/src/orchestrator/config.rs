//! Orchestrator configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the conversion orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Delay between status polls of a remote job (milliseconds).
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Maximum time a remote job may stay pending before it fails (milliseconds).
    #[serde(default = "default_max_poll_duration")]
    pub max_poll_duration_ms: u64,
}

fn default_poll_interval() -> u64 {
    3000 // 3 seconds
}

fn default_max_poll_duration() -> u64 {
    300_000 // 5 minutes
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval(),
            max_poll_duration_ms: default_max_poll_duration(),
        }
    }
}

impl OrchestratorConfig {
    pub fn with_poll_interval(mut self, interval_ms: u64) -> Self {
        self.poll_interval_ms = interval_ms;
        self
    }

    pub fn with_max_poll_duration(mut self, duration_ms: u64) -> Self {
        self.max_poll_duration_ms = duration_ms;
        self
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn max_poll_duration(&self) -> Duration {
        Duration::from_millis(self.max_poll_duration_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.poll_interval(), Duration::from_secs(3));
        assert_eq!(config.max_poll_duration(), Duration::from_secs(300));
    }

    #[test]
    fn test_deserialize_minimal() {
        let toml = r#"
            poll_interval_ms = 2000
        "#;
        let config: OrchestratorConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.poll_interval_ms, 2000);
        assert_eq!(config.max_poll_duration_ms, 300_000);
    }
}
