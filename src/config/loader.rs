//! Configuration file loading.

use crate::config::{Config, validate_config};
use std::path::Path;
use thiserror::Error;

/// Errors that can occur while building a runner's configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("lame-duck period must be greater than zero")]
    InvalidGracePeriod,

    #[error("no lame-duck signals defined")]
    NoSignals,

    #[error("failed to read configuration file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("failed to parse YAML: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error("configuration validation failed: {0}")]
    ValidationError(String),
}

/// Load configuration from a YAML file.
///
/// This function reads the file, parses the YAML, and validates the configuration.
///
/// # Arguments
///
/// * `path` - Path to the configuration file
///
/// # Returns
///
/// The parsed and validated configuration, or an error.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();

    // Read file contents
    let contents = std::fs::read_to_string(path)?;

    // Parse YAML
    let config: Config = serde_yaml::from_str(&contents)?;

    // Validate configuration
    validate_config(&config).map_err(ConfigError::ValidationError)?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogFormat;
    use crate::signal::Signal;
    use std::io::Write;
    use std::time::Duration;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_full_config() {
        let yaml = r#"
global:
  log_level: debug
  log_format: pretty

lameduck:
  grace_period: 10s
  signals: [SIGTERM]
  quiet: true

server:
  listen: "127.0.0.1:9000"
  response_delay: 250ms
"#;

        let mut file = NamedTempFile::new().unwrap();
        file.write_all(yaml.as_bytes()).unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.global.log_format, LogFormat::Pretty);
        assert_eq!(config.lameduck.grace_period, Duration::from_secs(10));
        assert_eq!(config.lameduck.signals, vec![Signal::Terminate]);
        assert!(config.lameduck.quiet);
        assert_eq!(config.server.listen.port(), 9000);
        assert_eq!(config.server.response_delay, Duration::from_millis(250));
    }

    #[test]
    fn test_load_empty_document_uses_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"{}").unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.lameduck.grace_period, Duration::from_secs(3));
    }

    #[test]
    fn test_load_missing_file() {
        let result = load_config("/nonexistent/path/config.yaml");
        assert!(matches!(result.unwrap_err(), ConfigError::ReadError(_)));
    }

    #[test]
    fn test_load_invalid_yaml() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"not: valid: yaml: {{{}}}").unwrap();

        let result = load_config(file.path());
        assert!(matches!(result.unwrap_err(), ConfigError::ParseError(_)));
    }

    #[test]
    fn test_load_unknown_signal() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"lameduck:\n  signals: [SIGKILL]\n").unwrap();

        let result = load_config(file.path());
        assert!(matches!(result.unwrap_err(), ConfigError::ParseError(_)));
    }

    #[test]
    fn test_load_rejects_empty_signals() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"lameduck:\n  signals: []\n").unwrap();

        let result = load_config(file.path());
        assert!(matches!(result.unwrap_err(), ConfigError::ValidationError(_)));
    }
}
