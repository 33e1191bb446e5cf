//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ClientConfig (validated, immutable)
//!     → shared via Arc inside every BlockchainInstance
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; a new instance is built for a new config
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    CacheConfig, ChainParameters, ClientConfig, NodeConfig, ObservabilityConfig, RetryConfig,
    TransactionConfig,
};
