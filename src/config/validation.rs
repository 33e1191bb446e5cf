//! Configuration validation.
//!
//! Serde handles syntax; this module checks value ranges and formats.
//! All errors are collected rather than stopping at the first one.

use thiserror::Error;

use crate::blockchain::types::ObjectId;
use crate::config::schema::ClientConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// Validate a configuration, returning every problem found.
pub fn validate_config(config: &ClientConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.chain.prefix.is_empty() {
        errors.push(ValidationError::new("chain.prefix", "must not be empty"));
    }
    if config.chain.core_symbol.is_empty() {
        errors.push(ValidationError::new("chain.core_symbol", "must not be empty"));
    }
    if ObjectId::parse_typed(&config.chain.core_asset_id, 3).is_err() {
        errors.push(ValidationError::new(
            "chain.core_asset_id",
            "must be an asset id (1.3.x)",
        ));
    }
    if let Some(chain_id) = &config.chain.chain_id {
        match hex::decode(chain_id) {
            Ok(bytes) if bytes.len() == 32 => {}
            _ => errors.push(ValidationError::new(
                "chain.chain_id",
                "must be 32 bytes of hex",
            )),
        }
    }

    for (field, url) in std::iter::once(("node.url", &config.node.url)).chain(
        config
            .node
            .failover_urls
            .iter()
            .map(|u| ("node.failover_urls", u)),
    ) {
        match url::Url::parse(url) {
            Ok(parsed) if matches!(parsed.scheme(), "http" | "https" | "ws" | "wss") => {}
            Ok(parsed) => errors.push(ValidationError::new(
                field,
                format!("unsupported scheme '{}'", parsed.scheme()),
            )),
            Err(e) => errors.push(ValidationError::new(field, format!("invalid URL: {}", e))),
        }
    }

    if config.node.rpc_timeout_secs == 0 {
        errors.push(ValidationError::new("node.rpc_timeout_secs", "must be > 0"));
    }
    if config.node.retries.max_attempts == 0 {
        errors.push(ValidationError::new("node.retries.max_attempts", "must be >= 1"));
    }
    if config.transactions.expiration_secs == 0 {
        errors.push(ValidationError::new("transactions.expiration_secs", "must be > 0"));
    }
    if config.transactions.proposal_expiration_secs == 0 {
        errors.push(ValidationError::new(
            "transactions.proposal_expiration_secs",
            "must be > 0",
        ));
    }
    if ObjectId::parse_typed(&config.transactions.fee_asset, 3).is_err() {
        errors.push(ValidationError::new(
            "transactions.fee_asset",
            "must be an asset id (1.3.x)",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&ClientConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = ClientConfig::default();
        config.chain.prefix.clear();
        config.node.url = "ftp://node".to_string();
        config.node.rpc_timeout_secs = 0;
        config.transactions.fee_asset = "TUSC".to_string();

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 4);
        assert!(errors.iter().any(|e| e.field == "node.url"));
    }

    #[test]
    fn test_chain_id_length() {
        let mut config = ClientConfig::default();
        config.chain.chain_id = Some("abcd".to_string());
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].field, "chain.chain_id");
    }
}
