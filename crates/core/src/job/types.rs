//! Jobs, source files, and completion records.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;

use super::options::{ConversionOptions, TargetFormat};

/// An input file handed over by the UI layer.
#[derive(Debug, Clone, Serialize)]
pub struct SourceFile {
    /// Original file name, including extension.
    pub name: String,
    /// Size in bytes.
    pub size: u64,
    /// MIME type as reported by the uploader (may be empty).
    pub mime_type: String,
    #[serde(skip)]
    bytes: Bytes,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        let bytes = bytes.into();
        Self {
            name: name.into(),
            size: bytes.len() as u64,
            mime_type: mime_type.into(),
            bytes,
        }
    }

    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    /// MIME type to send on the wire; falls back to `application/octet-stream`.
    pub fn content_type(&self) -> &str {
        if self.mime_type.is_empty() {
            "application/octet-stream"
        } else {
            &self.mime_type
        }
    }

    /// Extension of the original name, without the dot.
    pub fn extension(&self) -> Option<&str> {
        let (stem, ext) = self.name.rsplit_once('.')?;
        if stem.is_empty() || ext.is_empty() || ext.contains('/') {
            None
        } else {
            Some(ext)
        }
    }

    pub fn summary(&self) -> FileSummary {
        FileSummary {
            name: self.name.clone(),
            size: self.size,
            mime_type: self.mime_type.clone(),
        }
    }
}

/// Name/size/type of a file, without its contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileSummary {
    pub name: String,
    pub size: u64,
    pub mime_type: String,
}

/// A single file conversion request. Immutable once created.
#[derive(Debug, Clone, Serialize)]
pub struct ConversionRequest {
    pub source: SourceFile,
    pub target_format: TargetFormat,
    pub options: ConversionOptions,
}

/// Lifecycle of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Uploading,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Uploading => "uploading",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }
}

/// One file's conversion request and its lifecycle state.
#[derive(Debug, Clone, Serialize)]
pub struct Job {
    pub id: String,
    pub request: ConversionRequest,
    pub created_at: DateTime<Utc>,
    pub status: JobStatus,
}

impl Job {
    /// Creates a queued job with a fresh id.
    pub fn new(request: ConversionRequest) -> Self {
        let created_at = Utc::now();
        Self {
            id: generate_job_id(&request.source.name, created_at),
            request,
            created_at,
            status: JobStatus::Queued,
        }
    }

    pub fn source(&self) -> &SourceFile {
        &self.request.source
    }
}

/// `{file name}-{unix millis}-{6 base36 chars}`.
fn generate_job_id(file_name: &str, at: DateTime<Utc>) -> String {
    const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut n = uuid::Uuid::new_v4().as_u128();
    let mut suffix = String::with_capacity(6);
    for _ in 0..6 {
        suffix.push(ALPHABET[(n % 36) as usize] as char);
        n /= 36;
    }
    format!("{}-{}-{}", file_name, at.timestamp_millis(), suffix)
}

/// Outcome recorded for a finished job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    Completed,
    Failed,
}

/// Append-only audit entry for an attempted job.
#[derive(Debug, Clone, Serialize)]
pub struct CompletedRecord {
    pub job_id: String,
    pub original_file: FileSummary,
    pub target_format: TargetFormat,
    pub status: RecordStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub completed_at: DateTime<Utc>,
}

impl CompletedRecord {
    pub fn completed(job: &Job) -> Self {
        Self::new(job, RecordStatus::Completed, None)
    }

    pub fn failed(job: &Job, error: impl Into<String>) -> Self {
        Self::new(job, RecordStatus::Failed, Some(error.into()))
    }

    fn new(job: &Job, status: RecordStatus, error: Option<String>) -> Self {
        Self {
            job_id: job.id.clone(),
            original_file: job.source().summary(),
            target_format: job.request.target_format.clone(),
            status,
            error,
            completed_at: Utc::now(),
        }
    }
}

/// Output file name: original stem plus the lowercase target extension.
pub fn output_file_name(original_name: &str, target_format: &TargetFormat) -> String {
    let stem = match original_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.contains('/') => stem,
        _ => original_name,
    };
    format!("{}.{}", stem, target_format.extension())
}
