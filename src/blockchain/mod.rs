//! Node access: transports, keys and the connection context.
//!
//! # Data Flow
//! ```text
//! ClientConfig (node url, chain parameters)
//!     → client.rs / memory.rs (Rpc implementations)
//!     → instance.rs (BlockchainInstance: rpc + cache + wallet)
//!     → objects, market and builder modules
//! ```
//!
//! # Security Constraints
//! - Private keys come from WIF strings or the `TUSC_WIF` environment variable
//! - Keys and WIFs are never logged

pub mod client;
pub mod instance;
pub mod memory;
pub mod rpc;
pub mod types;
pub mod wallet;

pub use client::HttpRpc;
pub use instance::{
    clear_shared_instance, is_shared_instance, set_shared_instance, shared_instance,
    BlockchainInstance,
};
pub use memory::MemoryRpc;
pub use rpc::Rpc;
pub use types::{ChainError, ChainResult, ObjectId, ObjectKind};
pub use wallet::{InMemoryKeyStore, KeyStore, PrivateKey, PublicKey, Wallet};
