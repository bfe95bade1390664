//! Wire types for the remote job protocol.

use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;

use crate::job::{ConversionOptions, ConversionRequest};

/// Body of `POST /conversions/{type}/jobs`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobMetadata {
    pub filename: String,
    pub mime_type: String,
    pub size: u64,
    pub target_format: String,
    pub options: ConversionOptions,
}

impl From<&ConversionRequest> for JobMetadata {
    fn from(request: &ConversionRequest) -> Self {
        Self {
            filename: request.source.name.clone(),
            mime_type: request.source.mime_type.clone(),
            size: request.source.size,
            target_format: request.target_format.as_str().to_string(),
            options: request.options.clone(),
        }
    }
}

/// Where to upload and where to poll, as handed back by the service.
#[derive(Debug, Clone, PartialEq)]
pub struct JobTicket {
    pub job_id: String,
    pub upload_target: String,
    pub upload_headers: HashMap<String, String>,
    pub status_target: String,
}

impl JobTicket {
    /// Extracts a ticket from a job creation response body.
    ///
    /// Returns the name of the first missing field on failure.
    pub(crate) fn from_body(body: &Value) -> Result<Self, &'static str> {
        let job_id = match body.get("jobId") {
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => return Err("jobId"),
        };
        let upload_target = non_empty_str(body, "uploadUrl").ok_or("uploadUrl")?;
        let status_target = non_empty_str(body, "statusUrl").ok_or("statusUrl")?;

        let upload_headers = body
            .get("uploadHeaders")
            .and_then(Value::as_object)
            .map(|headers| {
                headers
                    .iter()
                    .filter_map(|(k, v)| match v {
                        Value::String(s) => Some((k.clone(), s.clone())),
                        Value::Number(n) => Some((k.clone(), n.to_string())),
                        _ => None,
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            job_id,
            upload_target,
            upload_headers,
            status_target,
        })
    }
}

/// Job status as reported by the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteJobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
    /// A status this client does not know; polled like `Processing`.
    Other(String),
}

impl RemoteJobStatus {
    pub fn parse(status: &str) -> Self {
        match status.trim().to_ascii_lowercase().as_str() {
            "queued" | "pending" => RemoteJobStatus::Queued,
            "processing" | "running" => RemoteJobStatus::Processing,
            "completed" | "done" | "succeeded" => RemoteJobStatus::Completed,
            "failed" | "error" => RemoteJobStatus::Failed,
            other => RemoteJobStatus::Other(other.to_string()),
        }
    }

    /// Whether polling should continue.
    pub fn is_pending(&self) -> bool {
        !matches!(self, RemoteJobStatus::Completed | RemoteJobStatus::Failed)
    }
}

/// One status poll result.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusReport {
    pub status: RemoteJobStatus,
    /// Service-reported progress, 0-100.
    pub progress: Option<f64>,
    pub download_target: Option<String>,
    pub error: Option<String>,
    pub metadata: Option<Value>,
}

impl StatusReport {
    /// Builds a report from a status body; a missing status means `processing`.
    pub(crate) fn from_body(body: &Value) -> Self {
        let status = body
            .get("status")
            .and_then(Value::as_str)
            .map(RemoteJobStatus::parse)
            .unwrap_or(RemoteJobStatus::Processing);

        let progress = body.get("progress").and_then(|p| match p {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        });

        Self {
            status,
            progress,
            download_target: non_empty_str(body, "downloadUrl"),
            error: non_empty_str(body, "error"),
            metadata: body.get("metadata").cloned(),
        }
    }

    /// Progress clamped and rounded to a whole percentage; absent means 0.
    pub fn percent(&self) -> u8 {
        self.progress
            .filter(|p| p.is_finite())
            .map(|p| p.clamp(0.0, 100.0).round() as u8)
            .unwrap_or(0)
    }
}

fn non_empty_str(body: &Value, key: &str) -> Option<String> {
    body.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Parses a body as JSON, treating empty or malformed bodies as `{}`.
pub(crate) fn parse_json_lenient(text: &str) -> Value {
    if text.trim().is_empty() {
        return Value::Object(Default::default());
    }
    match serde_json::from_str(text) {
        Ok(value @ Value::Object(_)) => value,
        Ok(_) | Err(_) => {
            tracing::warn!("Conversion service returned a non-object JSON body");
            Value::Object(Default::default())
        }
    }
}
