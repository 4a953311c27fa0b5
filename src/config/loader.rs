//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::ServiceConfig;
use crate::config::validation::{validate_config, ValidationError};
use crate::services::ServiceRole;

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path, role: ServiceRole) -> Result<ServiceConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content, role)
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str, role: ServiceRole) -> Result<ServiceConfig, ConfigError> {
    let config: ServiceConfig = toml::from_str(content)?;
    validate_config(&config, role).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Load from `path` if given, otherwise validated defaults.
pub fn load_or_default(path: Option<&Path>, role: ServiceRole) -> Result<ServiceConfig, ConfigError> {
    match path {
        Some(path) => load_config(path, role),
        None => {
            let config = ServiceConfig::default();
            validate_config(&config, role).map_err(ConfigError::Validation)?;
            Ok(config)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_yields_defaults() {
        let config = parse_config("", ServiceRole::Edge).unwrap();
        assert_eq!(config.listener.bind_address, "0.0.0.0:8080");
        assert_eq!(config.targets.len(), 3);
    }

    #[test]
    fn test_validation_errors_are_joined() {
        let err = parse_config("[retries]\nmax_attempts = 0\n", ServiceRole::Edge).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
        assert!(err.to_string().contains("retries.max_attempts must be at least 1"));
    }

    #[test]
    fn test_parse_error() {
        let err = parse_config("[retries\n", ServiceRole::Edge).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = load_config(Path::new("/nonexistent/calc-mesh.toml"), ServiceRole::Edge).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
