//! JSON-RPC transport over HTTP with timeout, retry and failover.
//!
//! # Responsibilities
//! - POST `call` requests to the node's API endpoint
//! - Enforce a per-request timeout
//! - Retry transport failures with backoff, then fail over to the next URL
//! - Surface node-side errors immediately (they are not transient)

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::timeout;
use url::Url;

use crate::blockchain::rpc::Rpc;
use crate::blockchain::types::{ChainError, ChainResult};
use crate::config::{NodeConfig, RetryConfig};
use crate::observability::metrics;
use crate::resilience::backoff::backoff_for;

enum CallError {
    /// Connection or HTTP-level failure; worth retrying.
    Transport(String),
    /// The node answered with an error object.
    Node(String),
}

/// HTTP JSON-RPC client with failover support.
pub struct HttpRpc {
    http: reqwest::Client,
    /// Primary endpoint first, then failovers.
    endpoints: Vec<Url>,
    timeout_duration: Duration,
    retries: RetryConfig,
    next_id: AtomicU64,
}

impl HttpRpc {
    /// Create a new transport from node configuration.
    ///
    /// `ws://` and `wss://` URLs are mapped to their HTTP equivalents; the
    /// nodes serve the same API on both.
    pub fn new(config: &NodeConfig) -> ChainResult<Self> {
        let mut endpoints = vec![Self::http_url(&config.url)?];

        for url_str in &config.failover_urls {
            match Self::http_url(url_str) {
                Ok(url) => endpoints.push(url),
                Err(_) => tracing::warn!(url = %url_str, "Ignoring invalid failover RPC URL"),
            }
        }

        tracing::info!(
            url = %endpoints[0],
            failovers = endpoints.len() - 1,
            timeout_secs = config.rpc_timeout_secs,
            "RPC transport initialized"
        );

        Ok(Self {
            http: reqwest::Client::new(),
            endpoints,
            timeout_duration: Duration::from_secs(config.rpc_timeout_secs),
            retries: config.retries.clone(),
            next_id: AtomicU64::new(1),
        })
    }

    fn http_url(raw: &str) -> ChainResult<Url> {
        let mut url: Url = raw
            .parse()
            .map_err(|e| ChainError::Rpc(format!("Invalid RPC URL '{}': {}", raw, e)))?;
        let scheme = match url.scheme() {
            "ws" => "http",
            "wss" => "https",
            "http" | "https" => return Ok(url),
            other => {
                return Err(ChainError::Rpc(format!(
                    "Unsupported RPC URL scheme '{}'",
                    other
                )))
            }
        };
        url.set_scheme(scheme)
            .map_err(|_| ChainError::Rpc(format!("Cannot map '{}' to HTTP", raw)))?;
        Ok(url)
    }

    pub fn endpoints(&self) -> &[Url] {
        &self.endpoints
    }

    async fn post(&self, endpoint: &Url, body: &Value) -> Result<Value, CallError> {
        let response = self
            .http
            .post(endpoint.clone())
            .json(body)
            .send()
            .await
            .map_err(|e| CallError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_server_error() {
            return Err(CallError::Transport(format!("HTTP {}", status)));
        }

        let mut reply: Value = response
            .json()
            .await
            .map_err(|e| CallError::Transport(format!("invalid JSON reply: {}", e)))?;

        if let Some(error) = reply.get("error").filter(|e| !e.is_null()) {
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string());
            return Err(CallError::Node(message));
        }

        Ok(reply.get_mut("result").map(Value::take).unwrap_or(Value::Null))
    }
}

#[async_trait]
impl Rpc for HttpRpc {
    async fn call(&self, api: &str, method: &str, params: Value) -> ChainResult<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": "call",
            "params": [api, method, params],
        });

        let mut timed_out = false;
        for (i, endpoint) in self.endpoints.iter().enumerate() {
            for attempt in 0..self.retries.max_attempts.max(1) {
                if attempt > 0 {
                    tokio::time::sleep(backoff_for(&self.retries, attempt)).await;
                }

                match timeout(self.timeout_duration, self.post(endpoint, &body)).await {
                    Ok(Ok(result)) => {
                        metrics::record_rpc_call(method, true);
                        return Ok(result);
                    }
                    Ok(Err(CallError::Node(message))) => {
                        metrics::record_rpc_call(method, false);
                        return Err(ChainError::Rpc(format!("{}: {}", method, message)));
                    }
                    Ok(Err(CallError::Transport(e))) => {
                        tracing::warn!(endpoint_idx = i, attempt, method, error = %e, "RPC error");
                    }
                    Err(_) => {
                        timed_out = true;
                        tracing::warn!(endpoint_idx = i, attempt, method, "RPC timeout");
                    }
                }
            }
        }

        metrics::record_rpc_call(method, false);
        if timed_out {
            Err(ChainError::Timeout(self.timeout_duration.as_secs()))
        } else {
            Err(ChainError::Rpc(format!("All RPC endpoints failed for {}", method)))
        }
    }
}

impl std::fmt::Debug for HttpRpc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpRpc")
            .field("endpoints", &self.endpoints)
            .field("timeout_secs", &self.timeout_duration.as_secs())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> NodeConfig {
        NodeConfig {
            url: "http://127.0.0.1:1".to_string(),
            failover_urls: Vec::new(),
            rpc_timeout_secs: 1,
            retries: RetryConfig {
                max_attempts: 1,
                base_delay_ms: 1,
                max_delay_ms: 1,
            },
        }
    }

    #[test]
    fn test_websocket_urls_are_mapped() {
        let mut config = test_config();
        config.url = "wss://api.tusc.network/wallet".to_string();
        config.failover_urls = vec!["ws://localhost:8090".to_string(), "not a url".to_string()];

        let rpc = HttpRpc::new(&config).unwrap();
        assert_eq!(rpc.endpoints().len(), 2);
        assert_eq!(rpc.endpoints()[0].as_str(), "https://api.tusc.network/wallet");
        assert_eq!(rpc.endpoints()[1].scheme(), "http");
    }

    #[test]
    fn test_rejects_unknown_scheme() {
        let mut config = test_config();
        config.url = "ftp://node".to_string();
        assert!(HttpRpc::new(&config).is_err());
    }

    #[tokio::test]
    async fn test_rpc_failover() {
        let mut config = test_config();
        config.failover_urls.push("http://127.0.0.1:2".to_string());

        let rpc = HttpRpc::new(&config).unwrap();

        // Nothing listens on either port
        let result = rpc.get_chain_id().await;
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("All RPC endpoints failed"));
    }
}
