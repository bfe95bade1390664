//! Error types for the local engine.

use std::fmt;
use thiserror::Error;

/// One failed attempt to load the engine from a source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadAttempt {
    pub source: String,
    pub reason: String,
    pub timed_out: bool,
}

impl fmt::Display for LoadAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.source, self.reason)
    }
}

/// Errors from the local engine adapter and its runtimes.
///
/// Errors are `Clone` so that callers coalesced on one load all see the
/// same failure.
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    /// The host lacks what the engine needs; loading was not attempted.
    #[error("Unsupported environment: {}", .issues.join("; "))]
    UnsupportedEnvironment { issues: Vec<String> },

    /// Every source failed in every round.
    #[error("{}", load_failed_message(.rounds, .attempts, .hint))]
    LoadFailed {
        rounds: u32,
        attempts: Vec<LoadAttempt>,
        hint: Option<String>,
    },

    /// A single source could not be loaded (reported by runtimes).
    #[error("{0}")]
    Source(String),

    /// Conversion was requested before a successful load.
    #[error("Conversion engine is not loaded yet. Load it first.")]
    NotLoaded,

    /// Only audio and video inputs can be converted locally.
    #[error("Unsupported file type: {mime_type}")]
    UnsupportedInput { mime_type: String },

    /// Staging I/O failed (write, read or invalid name).
    #[error("Staging failed for {name}: {reason}")]
    Staging { name: String, reason: String },

    /// The engine ran but did not produce output.
    #[error("Engine execution failed: {reason}")]
    Execution {
        reason: String,
        detail: Option<String>,
    },

    #[error("Engine execution timed out after {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },
}

fn load_failed_message(rounds: &u32, attempts: &[LoadAttempt], hint: &Option<String>) -> String {
    let mut message = format!("All engine sources failed after {} attempts", rounds);
    if !attempts.is_empty() {
        let details: Vec<String> = attempts.iter().map(LoadAttempt::to_string).collect();
        message.push_str(&format!(": {}", details.join("; ")));
    }
    if let Some(hint) = hint {
        message.push_str(&format!(". {}", hint));
    }
    message
}

impl EngineError {
    /// Builds a load failure from the accumulated attempts, adding a hint
    /// classified from their reasons.
    pub fn load_failed(rounds: u32, attempts: Vec<LoadAttempt>) -> Self {
        let hint = classify_hint(&attempts);
        Self::LoadFailed {
            rounds,
            attempts,
            hint,
        }
    }

    pub fn staging(name: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self::Staging {
            name: name.into(),
            reason: reason.to_string(),
        }
    }

    pub fn execution(reason: impl Into<String>, detail: Option<String>) -> Self {
        Self::Execution {
            reason: reason.into(),
            detail,
        }
    }

    /// Errors that are fatal to the local path until the environment changes.
    pub fn is_environment_error(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedEnvironment { .. } | Self::LoadFailed { .. }
        )
    }
}

fn classify_hint(attempts: &[LoadAttempt]) -> Option<String> {
    if attempts.is_empty() {
        return None;
    }
    let reasons: Vec<String> = attempts.iter().map(|a| a.reason.to_lowercase()).collect();

    if attempts.iter().all(|a| a.timed_out) {
        Some("Sources may be slow or unavailable".to_string())
    } else if reasons.iter().any(|r| r.contains("permission denied")) {
        Some("Check that the engine binary is executable".to_string())
    } else if reasons
        .iter()
        .any(|r| r.contains("not found") || r.contains("no such file"))
    {
        Some("Check that the engine is installed and the source locations are correct".to_string())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attempt(source: &str, reason: &str, timed_out: bool) -> LoadAttempt {
        LoadAttempt {
            source: source.to_string(),
            reason: reason.to_string(),
            timed_out,
        }
    }

    #[test]
    fn test_load_failed_names_every_source() {
        let err = EngineError::load_failed(
            3,
            vec![
                attempt("ffmpeg", "binary not found", false),
                attempt("/opt/ffmpeg", "exited with status 1", false),
            ],
        );
        let message = err.to_string();
        assert!(message.starts_with("All engine sources failed after 3 attempts"));
        assert!(message.contains("ffmpeg: binary not found"));
        assert!(message.contains("/opt/ffmpeg: exited with status 1"));
        assert!(message.contains("installed"));
        assert!(err.is_environment_error());
    }

    #[test]
    fn test_timeout_hint() {
        let err = EngineError::load_failed(1, vec![attempt("a", "timed out after 30s", true)]);
        assert!(err.to_string().ends_with("Sources may be slow or unavailable"));
    }

    #[test]
    fn test_no_hint_for_unknown_reasons() {
        let err = EngineError::load_failed(1, vec![attempt("a", "bad magic", false)]);
        assert_eq!(
            err.to_string(),
            "All engine sources failed after 1 attempts: a: bad magic"
        );
    }

    #[test]
    fn test_unsupported_environment_lists_issues() {
        let err = EngineError::UnsupportedEnvironment {
            issues: vec!["no staging dir".to_string(), "read-only".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "Unsupported environment: no staging dir; read-only"
        );
        assert!(!EngineError::NotLoaded.is_environment_error());
    }
}
