//! Native ffmpeg runtime.
//!
//! Each source is an ffmpeg binary (name on `PATH` or absolute path). Files
//! are staged in a private directory and the binary runs with that directory
//! as its working directory.

use async_trait::async_trait;
use bytes::Bytes;
use regex_lite::Regex;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::warn;

use super::config::{EngineConfig, EngineSource};
use super::error::EngineError;
use super::traits::{EngineEvent, EngineRuntime, LoadedEngine};

/// Runtime that loads native ffmpeg binaries.
pub struct FfmpegRuntime {
    staging_dir: PathBuf,
    exec_timeout: Duration,
}

impl FfmpegRuntime {
    pub fn new(staging_dir: PathBuf, exec_timeout: Duration) -> Self {
        Self {
            staging_dir,
            exec_timeout,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.staging_dir.clone(), config.exec_timeout())
    }
}

#[async_trait]
impl EngineRuntime for FfmpegRuntime {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    async fn check_capabilities(&self) -> Vec<String> {
        let mut issues = Vec::new();

        if let Err(e) = tokio::fs::create_dir_all(&self.staging_dir).await {
            issues.push(format!(
                "Staging directory {} cannot be created: {}",
                self.staging_dir.display(),
                e
            ));
            return issues;
        }

        let check_file = self.staging_dir.join(".write-check");
        match tokio::fs::write(&check_file, b"ok").await {
            Ok(()) => {
                let _ = tokio::fs::remove_file(&check_file).await;
            }
            Err(e) => issues.push(format!(
                "Staging directory {} is not writable: {}",
                self.staging_dir.display(),
                e
            )),
        }

        issues
    }

    async fn load(&self, source: &EngineSource) -> Result<Arc<dyn LoadedEngine>, EngineError> {
        let output = Command::new(source.location())
            .arg("-version")
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    EngineError::Source(format!("binary not found: {}", source))
                } else {
                    EngineError::Source(format!("failed to start {}: {}", source, e))
                }
            })?;

        if !output.status.success() {
            return Err(EngineError::Source(format!(
                "{} -version exited with code {:?}",
                source,
                output.status.code()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let version = stdout
            .lines()
            .next()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .unwrap_or("ffmpeg (unknown version)")
            .to_string();

        Ok(Arc::new(FfmpegEngine {
            binary: PathBuf::from(source.location()),
            staging_dir: self.staging_dir.clone(),
            version,
            exec_timeout: self.exec_timeout,
        }))
    }
}

/// A verified ffmpeg binary bound to a staging directory.
pub struct FfmpegEngine {
    binary: PathBuf,
    staging_dir: PathBuf,
    version: String,
    exec_timeout: Duration,
}

impl FfmpegEngine {
    /// Resolves a staged name. Names must be plain file names.
    fn staged_path(&self, name: &str) -> Result<PathBuf, EngineError> {
        let plain = Path::new(name)
            .file_name()
            .is_some_and(|f| f == name && name != "..");
        if !plain {
            return Err(EngineError::staging(name, "not a plain file name"));
        }
        Ok(self.staging_dir.join(name))
    }
}

#[async_trait]
impl LoadedEngine for FfmpegEngine {
    fn version(&self) -> &str {
        &self.version
    }

    async fn write_file(&self, name: &str, data: &[u8]) -> Result<(), EngineError> {
        let path = self.staged_path(name)?;
        tokio::fs::write(&path, data)
            .await
            .map_err(|e| EngineError::staging(name, e))
    }

    async fn exec(
        &self,
        args: &[String],
        events: mpsc::Sender<EngineEvent>,
    ) -> Result<(), EngineError> {
        let mut child = Command::new(&self.binary)
            .current_dir(&self.staging_dir)
            .args(["-hide_banner", "-nostdin", "-y", "-progress", "pipe:2"])
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| EngineError::execution(format!("failed to start ffmpeg: {}", e), None))?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| EngineError::execution("ffmpeg stderr was not captured", None))?;
        // Raw segments: ffmpeg echoes metadata tags that need not be UTF-8.
        let mut reader = BufReader::new(stderr).split(b'\n');

        let run = async {
            let mut parser = ProgressParser::new();
            let mut last_error_line = None;

            loop {
                let line = match reader.next_segment().await {
                    Ok(Some(raw)) => decode_line(&raw),
                    Ok(None) => break,
                    Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                    Err(e) => {
                        warn!("Stopped reading ffmpeg stderr: {}", e);
                        break;
                    }
                };
                if let Some(ratio) = parser.feed(&line) {
                    let _ = events.send(EngineEvent::Progress(ratio)).await;
                }
                if is_progress_line(&line) {
                    continue;
                }
                if line.contains("Error") || line.contains("error") {
                    last_error_line = Some(line.clone());
                }
                let _ = events.send(EngineEvent::Log(line)).await;
            }

            let status = child.wait().await?;
            Ok::<_, std::io::Error>((status, last_error_line))
        };

        match tokio::time::timeout(self.exec_timeout, run).await {
            Ok(Ok((status, _))) if status.success() => Ok(()),
            Ok(Ok((status, detail))) => Err(EngineError::execution(
                format!("ffmpeg exited with code {:?}", status.code()),
                detail,
            )),
            Ok(Err(e)) => Err(EngineError::execution(e.to_string(), None)),
            Err(_) => Err(EngineError::Timeout {
                timeout_secs: self.exec_timeout.as_secs(),
            }),
        }
    }

    async fn read_file(&self, name: &str) -> Result<Bytes, EngineError> {
        let path = self.staged_path(name)?;
        tokio::fs::read(&path)
            .await
            .map(Bytes::from)
            .map_err(|e| EngineError::staging(name, e))
    }

    async fn delete_file(&self, name: &str) -> Result<(), EngineError> {
        let path = self.staged_path(name)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(EngineError::staging(name, e)),
        }
    }
}

/// Lossy decode of one stderr line, without the trailing `\r`.
fn decode_line(raw: &[u8]) -> String {
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    String::from_utf8_lossy(raw).into_owned()
}

/// `key=value` lines of the `-progress` block.
fn is_progress_line(line: &str) -> bool {
    const KEYS: &[&str] = &[
        "frame=", "fps=", "stream_", "bitrate=", "total_size=", "out_time", "dup_frames=",
        "drop_frames=", "speed=", "progress=",
    ];
    KEYS.iter().any(|k| line.starts_with(k))
}

/// Turns ffmpeg stderr lines into completion ratios.
struct ProgressParser {
    duration_re: Option<Regex>,
    time_re: Option<Regex>,
    total_secs: Option<f64>,
}

impl ProgressParser {
    fn new() -> Self {
        Self {
            duration_re: Regex::new(r"Duration: (\d+):(\d+):(\d+(?:\.\d+)?)").ok(),
            time_re: Regex::new(r"^out_time_ms=(\d+)").ok(),
            total_secs: None,
        }
    }

    /// Feeds one line; returns a ratio when the line reports progress.
    fn feed(&mut self, line: &str) -> Option<f64> {
        if self.total_secs.is_none() {
            if let Some(caps) = self.duration_re.as_ref().and_then(|re| re.captures(line)) {
                let hours: f64 = caps.get(1)?.as_str().parse().ok()?;
                let minutes: f64 = caps.get(2)?.as_str().parse().ok()?;
                let seconds: f64 = caps.get(3)?.as_str().parse().ok()?;
                let total = hours * 3600.0 + minutes * 60.0 + seconds;
                if total > 0.0 {
                    self.total_secs = Some(total);
                }
                return None;
            }
        }

        if line.trim() == "progress=end" {
            return Some(1.0);
        }

        let caps = self.time_re.as_ref()?.captures(line)?;
        let micros: f64 = caps.get(1)?.as_str().parse().ok()?;
        let total = self.total_secs?;
        // out_time_ms is in microseconds despite its name.
        Some((micros / 1_000_000.0 / total).clamp(0.0, 1.0))
    }
}
