//! Health status values.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Readiness of a conversion backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthState {
    #[default]
    Unknown,
    Healthy,
    Unhealthy,
    Unreachable,
}

impl HealthState {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthState::Unknown => "unknown",
            HealthState::Healthy => "healthy",
            HealthState::Unhealthy => "unhealthy",
            HealthState::Unreachable => "unreachable",
        }
    }

    /// Maps a service-reported status string. Anything unrecognised is `Unknown`.
    pub fn from_reported(status: &str) -> Self {
        match status.trim().to_ascii_lowercase().as_str() {
            "healthy" | "ok" | "up" => HealthState::Healthy,
            "unhealthy" | "degraded" | "down" => HealthState::Unhealthy,
            "unreachable" => HealthState::Unreachable,
            _ => HealthState::Unknown,
        }
    }
}

/// Result of one health probe.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub state: HealthState,
    pub latency_ms: Option<u64>,
    pub message: String,
    /// Limits advertised by the service (max size, formats, ...), if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limits: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checked_at: Option<DateTime<Utc>>,
}

impl HealthStatus {
    pub fn new(state: HealthState, latency_ms: Option<u64>, message: impl Into<String>) -> Self {
        Self {
            state,
            latency_ms,
            message: message.into(),
            limits: None,
            checked_at: Some(Utc::now()),
        }
    }

    pub fn healthy(latency_ms: u64, message: impl Into<String>) -> Self {
        Self::new(HealthState::Healthy, Some(latency_ms), message)
    }

    pub fn unhealthy(latency_ms: u64, message: impl Into<String>) -> Self {
        Self::new(HealthState::Unhealthy, Some(latency_ms), message)
    }

    pub fn unreachable(message: impl Into<String>) -> Self {
        Self::new(HealthState::Unreachable, None, message)
    }

    pub fn with_limits(mut self, limits: Option<serde_json::Value>) -> Self {
        self.limits = limits;
        self
    }

    pub fn is_healthy(&self) -> bool {
        self.state == HealthState::Healthy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_unknown() {
        let status = HealthStatus::default();
        assert_eq!(status.state, HealthState::Unknown);
        assert!(status.latency_ms.is_none());
        assert!(!status.is_healthy());
    }

    #[test]
    fn test_from_reported() {
        assert_eq!(HealthState::from_reported("healthy"), HealthState::Healthy);
        assert_eq!(HealthState::from_reported("OK"), HealthState::Healthy);
        assert_eq!(HealthState::from_reported("degraded"), HealthState::Unhealthy);
        assert_eq!(HealthState::from_reported("booting"), HealthState::Unknown);
    }

    #[test]
    fn test_serialization() {
        let status = HealthStatus::unreachable("connection refused");
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["state"], "unreachable");
        assert_eq!(json["latency_ms"], serde_json::Value::Null);
        assert!(json.get("limits").is_none());
    }
}
