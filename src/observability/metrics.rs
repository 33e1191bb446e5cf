//! Metrics collection.
//!
//! # Metrics
//! - `tusc_cache_requests_total` (counter): object cache lookups by result
//! - `tusc_cache_size` (gauge): number of entries in an object cache
//! - `tusc_rpc_calls_total` (counter): RPC calls by method and outcome
//! - `tusc_transactions_total` (counter): transactions signed/broadcast

use metrics::{counter, gauge};

/// Record an object cache lookup.
pub fn record_cache_lookup(hit: bool) {
    let result = if hit { "hit" } else { "miss" };
    counter!("tusc_cache_requests_total", "result" => result).increment(1);
}

/// Record the current number of cached objects.
pub fn record_cache_size(size: usize) {
    gauge!("tusc_cache_size").set(size as f64);
}

/// Record an RPC call outcome.
pub fn record_rpc_call(method: &str, ok: bool) {
    let outcome = if ok { "ok" } else { "error" };
    counter!(
        "tusc_rpc_calls_total",
        "method" => method.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

/// Record a transaction lifecycle event ("signed", "broadcast").
pub fn record_transaction(event: &'static str) {
    counter!("tusc_transactions_total", "event" => event).increment(1);
}
