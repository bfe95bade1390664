//! Configuration for the conversion clients.

use serde::{Deserialize, Serialize};

/// Remote job-protocol service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteServiceConfig {
    /// Base URL that relative paths are resolved against (e.g. "https://host/api").
    #[serde(default = "default_remote_url")]
    pub base_url: String,

    /// Resource type segment in `/conversions/{type}/...` (document, image, video, audio).
    #[serde(default = "default_resource_type")]
    pub resource_type: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_remote_timeout")]
    pub timeout_secs: u64,
}

fn default_remote_url() -> String {
    "http://localhost:8080/api".to_string()
}

fn default_resource_type() -> String {
    "document".to_string()
}

fn default_remote_timeout() -> u64 {
    60
}

impl Default for RemoteServiceConfig {
    fn default() -> Self {
        Self {
            base_url: default_remote_url(),
            resource_type: default_resource_type(),
            timeout_secs: default_remote_timeout(),
        }
    }
}

/// What the direct service converts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DirectResourceKind {
    #[default]
    Document,
    Image,
}

/// Direct (Gotenberg-style) conversion service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectServiceConfig {
    #[serde(default = "default_direct_url")]
    pub url: String,

    #[serde(default)]
    pub resource_type: DirectResourceKind,

    /// Per-request timeout in seconds. Office conversions can be slow.
    #[serde(default = "default_direct_timeout")]
    pub timeout_secs: u64,
}

fn default_direct_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_direct_timeout() -> u64 {
    120
}

impl Default for DirectServiceConfig {
    fn default() -> Self {
        Self {
            url: default_direct_url(),
            resource_type: DirectResourceKind::default(),
            timeout_secs: default_direct_timeout(),
        }
    }
}
