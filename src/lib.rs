//! Client core for the TUSC chain.
//!
//! Chain objects backed by an expiring cache, fixed-point amount and price
//! arithmetic, and a transaction builder with nested proposals that signs
//! and broadcasts over JSON-RPC.

pub mod blockchain;
pub mod builder;
pub mod config;
pub mod market;
pub mod message;
pub mod objects;
pub mod observability;
pub mod protocol;
pub mod resilience;

pub use blockchain::{BlockchainInstance, ChainError, ChainResult, ObjectId, Wallet};
pub use builder::{ProposalBuilder, ProposalHandle, TransactionBuilder};
pub use config::ClientConfig;
pub use market::{Amount, Order, Price};
pub use message::{Message, SignedMessage};
pub use objects::{Account, Asset, Committee, Permission};
