//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the client.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the chain client.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ClientConfig {
    /// Chain-specific constants.
    pub chain: ChainParameters,

    /// Node connection settings.
    pub node: NodeConfig,

    /// Transaction and proposal defaults.
    pub transactions: TransactionConfig,

    /// Object cache settings.
    pub cache: CacheConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Chain-specific identifiers substituted into the generic core.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ChainParameters {
    /// Public key prefix (e.g. "TUSC").
    pub prefix: String,

    /// Symbol of the core asset.
    pub core_symbol: String,

    /// Object id of the core asset.
    pub core_asset_id: String,

    /// Hex chain id. Fetched from the node when absent.
    pub chain_id: Option<String>,
}

impl Default for ChainParameters {
    fn default() -> Self {
        Self {
            prefix: "TUSC".to_string(),
            core_symbol: "TUSC".to_string(),
            core_asset_id: "1.3.0".to_string(),
            chain_id: None,
        }
    }
}

/// Node connection configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct NodeConfig {
    /// API endpoint URL.
    pub url: String,

    /// Failover endpoint URLs.
    pub failover_urls: Vec<String>,

    /// RPC request timeout in seconds.
    pub rpc_timeout_secs: u64,

    /// Retry settings applied by the HTTP transport.
    pub retries: RetryConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            url: "wss://api.tusc.network/wallet".to_string(),
            failover_urls: Vec::new(),
            rpc_timeout_secs: 10,
            retries: RetryConfig::default(),
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of attempts per endpoint (1 = no retry).
    pub max_attempts: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            base_delay_ms: 100,
            max_delay_ms: 2000,
        }
    }
}

/// Transaction building defaults.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TransactionConfig {
    /// Seconds until a constructed transaction expires.
    pub expiration_secs: u32,

    /// Seconds until a proposal expires.
    pub proposal_expiration_secs: u32,

    /// Review period for proposals, if any.
    pub proposal_review_secs: Option<u32>,

    /// Lifetime of limit orders built without an explicit expiration.
    pub order_expiration_secs: u32,

    /// Asset used to pay fees.
    pub fee_asset: String,

    /// Build and sign, but never broadcast.
    pub nobroadcast: bool,
}

impl Default for TransactionConfig {
    fn default() -> Self {
        Self {
            expiration_secs: 30,
            proposal_expiration_secs: 2 * 24 * 60 * 60,
            proposal_review_secs: None,
            order_expiration_secs: 356 * 24 * 60 * 60,
            fee_asset: "1.3.0".to_string(),
            nobroadcast: false,
        }
    }
}

/// Object cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Seconds a fetched object stays fresh (0 = forever).
    pub object_expiration_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            object_expiration_secs: 10,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}
