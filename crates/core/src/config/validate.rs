use super::{
    types::{BackendKind, Config},
    ConfigError,
};

/// Validate configuration
/// Currently validates:
/// - Backend section exists (enforced by serde)
/// - Server port is not 0
/// - Poll and health intervals are positive
/// - The selected backend has a usable target (URL or engine sources)
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    // Server validation
    if config.server.port == 0 {
        return Err(invalid("server.port cannot be 0"));
    }

    // Timing validation
    if config.orchestrator.poll_interval_ms == 0 {
        return Err(invalid("orchestrator.poll_interval_ms must be greater than 0"));
    }
    if config.orchestrator.max_poll_duration_ms == 0 {
        return Err(invalid(
            "orchestrator.max_poll_duration_ms must be greater than 0",
        ));
    }
    if config.health.interval_ms == 0 {
        return Err(invalid("health.interval_ms must be greater than 0"));
    }

    match config.backend.kind {
        BackendKind::Remote => {
            let remote = config
                .remote
                .as_ref()
                .ok_or_else(|| invalid("[remote] section is required when backend.kind = \"remote\""))?;
            if remote.base_url.trim().is_empty() {
                return Err(invalid("remote.base_url cannot be empty"));
            }
            if remote.resource_type.trim().is_empty() {
                return Err(invalid("remote.resource_type cannot be empty"));
            }
        }
        BackendKind::Direct => {
            let direct = config
                .direct
                .as_ref()
                .ok_or_else(|| invalid("[direct] section is required when backend.kind = \"direct\""))?;
            if direct.url.trim().is_empty() {
                return Err(invalid("direct.url cannot be empty"));
            }
        }
        BackendKind::Local => {
            if config.engine.sources.is_empty() {
                return Err(invalid("engine.sources cannot be empty"));
            }
            if config.engine.load_timeout_ms == 0 {
                return Err(invalid("engine.load_timeout_ms must be greater than 0"));
            }
        }
    }

    Ok(())
}

fn invalid(message: &str) -> ConfigError {
    ConfigError::ValidationError(message.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_config_from_str;

    fn config(toml: &str) -> Config {
        load_config_from_str(toml).unwrap()
    }

    #[test]
    fn test_validate_valid_config() {
        let config = config(
            r#"
[backend]
kind = "remote"

[remote]
base_url = "https://convert.example.com/api"
"#,
        );
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_port_zero_fails() {
        let config = config(
            r#"
[backend]
kind = "local"

[server]
port = 0
"#,
        );
        let result = validate_config(&config);
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_validate_remote_requires_section() {
        let config = config(
            r#"
[backend]
kind = "remote"
"#,
        );
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("[remote]"));
    }

    #[test]
    fn test_validate_empty_direct_url_fails() {
        let config = config(
            r#"
[backend]
kind = "direct"

[direct]
url = " "
"#,
        );
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("direct.url"));
    }

    #[test]
    fn test_validate_local_requires_sources() {
        let config = config(
            r#"
[backend]
kind = "local"

[engine]
sources = []
"#,
        );
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("engine.sources"));
    }

    #[test]
    fn test_validate_zero_poll_interval_fails() {
        let config = config(
            r#"
[backend]
kind = "local"

[orchestrator]
poll_interval_ms = 0
"#,
        );
        assert!(validate_config(&config).is_err());
    }
}
