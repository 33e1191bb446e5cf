//! Configuration loading from disk.

use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::config::schema::ClientConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<ClientConfig, ConfigError> {
    let config: ClientConfig = toml::from_str(content)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<ClientConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config = parse_config(&content)?;
    tracing::debug!(path = ?path, node = %config.node.url, "Configuration loaded");
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error() {
        let err = parse_config("[node\nurl = 1").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_validation_error_message() {
        let err = parse_config("[node]\nrpc_timeout_secs = 0").unwrap_err();
        assert!(err.to_string().contains("node.rpc_timeout_secs"));
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join("tusc_client_loader_test.toml");
        fs::write(&path, "[transactions]\nexpiration_secs = 60\n").unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.transactions.expiration_secs, 60);

        fs::remove_file(&path).unwrap_or_default();
    }

    #[test]
    fn test_missing_file() {
        let err = load_config(Path::new("/nonexistent/tusc.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
