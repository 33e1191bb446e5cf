//! Resilience helpers for the network transport.
//!
//! # Data Flow
//! ```text
//! RPC call to node:
//!     → per-call timeout (tokio::time::timeout in the transport)
//!     → on failure: backoff.rs delay before the next attempt
//!     → after max attempts: next failover endpoint
//! ```
//!
//! The builder and cache never retry; only the HTTP transport uses this.

pub mod backoff;
