use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use std::path::Path;

use super::{types::Config, ConfigError};

/// Environment overrides use this prefix with `__` between key segments.
const ENV_PREFIX: &str = "CONVERSIO_";

/// Load configuration from file with environment variable overrides
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    load_with_env_prefix(path, ENV_PREFIX)
}

fn load_with_env_prefix(path: &Path, prefix: &str) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }

    let config: Config = Figment::new()
        .merge(Toml::file(path))
        .merge(Env::prefixed(prefix).split("__"))
        .extract()
        .map_err(|e| ConfigError::ParseError(describe_errors(e, path, prefix)))?;

    Ok(config)
}

/// One line per figment error, naming the file key or the environment
/// variable that holds the bad value.
fn describe_errors(error: figment::Error, path: &Path, prefix: &str) -> String {
    error
        .into_iter()
        .map(|e| {
            let key = e.path.join(".");
            let origin = match &e.metadata {
                _ if key.is_empty() => None,
                Some(md) if md.source.is_none() => Some(format!(
                    "environment variable {}{}",
                    prefix,
                    e.path.join("__").to_ascii_uppercase()
                )),
                Some(_) => Some(format!("`{}` in {}", key, path.display())),
                None => Some(format!("`{}`", key)),
            };
            match origin {
                Some(origin) => format!("{}: {}", origin, e.kind),
                None => format!("{}: {}", path.display(), e.kind),
            }
        })
        .collect::<Vec<_>>()
        .join("; ")
}

/// Load configuration from TOML string (useful for testing)
pub fn load_config_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    toml::from_str(toml_str).map_err(|e| ConfigError::ParseError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BackendKind;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_config_from_str_valid() {
        let toml = r#"
[backend]
kind = "remote"

[server]
port = 9000
"#;
        let config = load_config_from_str(toml).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.backend.kind, BackendKind::Remote);
    }

    #[test]
    fn test_load_config_from_str_missing_backend() {
        let toml = r#"
[server]
port = 8080
"#;
        let result = load_config_from_str(toml);
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn test_load_config_file_not_found() {
        let result = load_config(Path::new("/nonexistent/config.toml"));
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(_)));
    }

    #[test]
    fn test_file_error_names_the_key_and_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
[backend]
kind = "local"

[server]
port = "eighty"
"#
        )
        .unwrap();

        let err = load_config(temp_file.path()).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("`server.port`"), "{message}");
        assert!(
            message.contains(&temp_file.path().display().to_string()),
            "{message}"
        );
    }

    #[test]
    fn test_env_error_names_the_variable() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "[backend]\nkind = \"local\"").unwrap();
        // Private prefix so parallel tests reading CONVERSIO_ are unaffected.
        std::env::set_var("CONVERSIOLOADERTEST_ENGINE__LOAD_RETRIES", "many");

        let result = load_with_env_prefix(temp_file.path(), "CONVERSIOLOADERTEST_");
        std::env::remove_var("CONVERSIOLOADERTEST_ENGINE__LOAD_RETRIES");

        let message = result.unwrap_err().to_string();
        assert!(
            message.contains("environment variable CONVERSIOLOADERTEST_ENGINE__LOAD_RETRIES"),
            "{message}"
        );
    }

    #[test]
    fn test_load_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
[backend]
kind = "local"

[server]
host = "127.0.0.1"
port = 3000

[engine]
sources = ["/opt/ffmpeg/bin/ffmpeg", "ffmpeg"]
load_retries = 0
"#
        )
        .unwrap();

        let config = load_config(temp_file.path()).unwrap();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.server.host.to_string(), "127.0.0.1");
        assert_eq!(config.engine.sources.len(), 2);
        assert_eq!(config.engine.load_retries, 0);
    }
}
