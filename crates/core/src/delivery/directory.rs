//! Filesystem delivery.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::info;

use super::{ConvertedArtifact, DeliveryError, ResultSink};

/// Highest ` (n)` suffix tried before giving up.
const MAX_SUFFIX: u32 = 9999;

/// Writes converted files into a directory, never overwriting.
///
/// When `name.ext` exists, `name (1).ext`, `name (2).ext`, ... are tried.
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn io_error(path: &Path, e: std::io::Error) -> DeliveryError {
        DeliveryError::Io {
            path: path.to_path_buf(),
            reason: e.to_string(),
        }
    }
}

/// Strips any directory components from a delivered name.
fn plain_name(name: &str) -> Result<&str, DeliveryError> {
    Path::new(name)
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.trim().is_empty())
        .ok_or_else(|| DeliveryError::InvalidName(name.to_string()))
}

/// `name.ext` → `name (n).ext`; names without an extension get the suffix at the end.
fn numbered(name: &str, n: u32) -> String {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{} ({}).{}", stem, n, ext),
        _ => format!("{} ({})", name, n),
    }
}

#[async_trait]
impl ResultSink for DirectorySink {
    fn name(&self) -> &str {
        "directory"
    }

    async fn deliver(&self, artifact: &ConvertedArtifact) -> Result<String, DeliveryError> {
        let name = plain_name(&artifact.file_name)?;
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| Self::io_error(&self.dir, e))?;

        for n in 0..=MAX_SUFFIX {
            let candidate = if n == 0 {
                name.to_string()
            } else {
                numbered(name, n)
            };
            let path = self.dir.join(&candidate);

            let mut file = match fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(file) => file,
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(Self::io_error(&path, e)),
            };

            file.write_all(&artifact.bytes)
                .await
                .map_err(|e| Self::io_error(&path, e))?;
            file.flush().await.map_err(|e| Self::io_error(&path, e))?;

            info!(
                "Saved {} ({} bytes, {})",
                path.display(),
                artifact.bytes.len(),
                artifact.mime_type
            );
            return Ok(path.display().to_string());
        }

        Err(DeliveryError::Io {
            path: self.dir.join(name),
            reason: "too many files with the same name".to_string(),
        })
    }
}
