//! RPC interface to a node.
//!
//! Transports implement [`Rpc::call`]; the typed helpers are provided on top
//! and mirror the node's `database` and `network_broadcast` APIs.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::blockchain::types::{ChainError, ChainResult};

fn optional(value: Value) -> Option<Value> {
    match value {
        Value::Null => None,
        v => Some(v),
    }
}

fn optional_list(method: &str, value: Value) -> ChainResult<Vec<Option<Value>>> {
    match value {
        Value::Array(items) => Ok(items.into_iter().map(optional).collect()),
        other => Err(ChainError::Rpc(format!(
            "{} returned non-array result: {}",
            method, other
        ))),
    }
}

/// Node API consumed by the object layer and the transaction builder.
#[async_trait]
pub trait Rpc: Send + Sync {
    /// Invoke `api.method(params)`; `params` is a JSON array.
    async fn call(&self, api: &str, method: &str, params: Value) -> ChainResult<Value>;

    async fn get_objects(&self, ids: &[String]) -> ChainResult<Vec<Option<Value>>> {
        let result = self.call("database", "get_objects", json!([ids])).await?;
        optional_list("get_objects", result)
    }

    async fn get_object(&self, id: &str) -> ChainResult<Option<Value>> {
        let mut objects = self.get_objects(&[id.to_string()]).await?;
        Ok(objects.pop().flatten())
    }

    async fn get_account_by_name(&self, name: &str) -> ChainResult<Option<Value>> {
        let result = self
            .call("database", "get_account_by_name", json!([name]))
            .await?;
        Ok(optional(result))
    }

    async fn lookup_asset_symbols(&self, symbols: &[String]) -> ChainResult<Vec<Option<Value>>> {
        let result = self
            .call("database", "lookup_asset_symbols", json!([symbols]))
            .await?;
        optional_list("lookup_asset_symbols", result)
    }

    async fn get_committee_member_by_account(&self, account_id: &str) -> ChainResult<Option<Value>> {
        let result = self
            .call("database", "get_committee_member_by_account", json!([account_id]))
            .await?;
        Ok(optional(result))
    }

    async fn get_witness_by_account(&self, account_id: &str) -> ChainResult<Option<Value>> {
        let result = self
            .call("database", "get_witness_by_account", json!([account_id]))
            .await?;
        Ok(optional(result))
    }

    async fn get_block(&self, block_num: u64) -> ChainResult<Option<Value>> {
        let result = self.call("database", "get_block", json!([block_num])).await?;
        Ok(optional(result))
    }

    async fn get_block_header(&self, block_num: u64) -> ChainResult<Option<Value>> {
        let result = self
            .call("database", "get_block_header", json!([block_num]))
            .await?;
        Ok(optional(result))
    }

    async fn get_dynamic_global_properties(&self) -> ChainResult<Value> {
        self.call("database", "get_dynamic_global_properties", json!([]))
            .await
    }

    async fn get_chain_id(&self) -> ChainResult<String> {
        match self.call("database", "get_chain_id", json!([])).await? {
            Value::String(id) => Ok(id),
            other => Err(ChainError::Rpc(format!("unexpected chain id: {}", other))),
        }
    }

    /// Fees for `ops`; proposal entries come back as `[fee, [inner fees]]`.
    async fn get_required_fees(&self, ops: &[Value], asset_id: &str) -> ChainResult<Vec<Value>> {
        match self
            .call("database", "get_required_fees", json!([ops, asset_id]))
            .await?
        {
            Value::Array(fees) => Ok(fees),
            other => Err(ChainError::Rpc(format!("unexpected fees: {}", other))),
        }
    }

    async fn get_potential_signatures(&self, tx: &Value) -> ChainResult<Vec<String>> {
        let result = self
            .call("database", "get_potential_signatures", json!([tx]))
            .await?;
        serde_json::from_value(result)
            .map_err(|e| ChainError::Rpc(format!("unexpected potential signatures: {}", e)))
    }

    async fn broadcast_transaction(&self, tx: &Value) -> ChainResult<Value> {
        self.call(
            "network_broadcast",
            "broadcast_transaction_synchronous",
            json!([tx]),
        )
        .await
    }
}
