//! In-process node stand-in.
//!
//! Serves objects, blocks and global properties from memory and records
//! broadcasts instead of sending them. Used for offline transaction building
//! and as the test fixture for everything above the transport.

use arc_swap::ArcSwap;
use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

use crate::blockchain::rpc::Rpc;
use crate::blockchain::types::{ChainError, ChainResult};
use crate::protocol::operations::PROPOSAL_CREATE_ID;

/// Chain id used when none is given.
pub const TEST_CHAIN_ID: &str = "39f5e2ede1f8bc1a3a54a7914414e3779e33193f1f5693510e73cb7a87617447";

/// In-memory RPC backend.
#[derive(Debug)]
pub struct MemoryRpc {
    chain_id: String,
    objects: DashMap<String, Value>,
    account_names: DashMap<String, String>,
    asset_symbols: DashMap<String, String>,
    blocks: DashMap<u64, Value>,
    fees: DashMap<u64, i64>,
    dynamic_global_properties: ArcSwap<Value>,
    potential_signatures: ArcSwap<Vec<String>>,
    broadcasts: Mutex<Vec<Value>>,
}

impl Default for MemoryRpc {
    fn default() -> Self {
        Self::new(TEST_CHAIN_ID)
    }
}

impl MemoryRpc {
    pub fn new(chain_id: &str) -> Self {
        Self {
            chain_id: chain_id.to_string(),
            objects: DashMap::new(),
            account_names: DashMap::new(),
            asset_symbols: DashMap::new(),
            blocks: DashMap::new(),
            fees: DashMap::new(),
            dynamic_global_properties: ArcSwap::from_pointee(json!({
                "id": "2.1.0",
                "head_block_number": 1,
                "head_block_id": "000000013f2c1e9b8d3a63a1e1e1e1e1e1e1e1e1",
                "time": "2015-10-13T14:12:24",
            })),
            potential_signatures: ArcSwap::from_pointee(Vec::new()),
            broadcasts: Mutex::new(Vec::new()),
        }
    }

    /// Store an object under its `id`, indexing account names and asset
    /// symbols.
    pub fn add_object(&self, object: Value) -> ChainResult<()> {
        let id = object
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| ChainError::malformed("object without id"))?
            .to_string();

        if id.starts_with("1.2.") {
            if let Some(name) = object.get("name").and_then(Value::as_str) {
                self.account_names.insert(name.to_string(), id.clone());
            }
        }
        if id.starts_with("1.3.") {
            if let Some(symbol) = object.get("symbol").and_then(Value::as_str) {
                self.asset_symbols.insert(symbol.to_string(), id.clone());
            }
        }
        self.objects.insert(id, object);
        Ok(())
    }

    pub fn remove_object(&self, id: &str) {
        self.objects.remove(id);
    }

    pub fn add_block(&self, block_num: u64, block: Value) {
        self.blocks.insert(block_num, block);
    }

    pub fn set_dynamic_global_properties(&self, properties: Value) {
        self.dynamic_global_properties.store(Arc::new(properties));
    }

    /// Fee charged for an operation id (default 0).
    pub fn set_fee(&self, operation_id: u64, amount: i64) {
        self.fees.insert(operation_id, amount);
    }

    pub fn set_potential_signatures(&self, keys: Vec<String>) {
        self.potential_signatures.store(Arc::new(keys));
    }

    /// Transactions passed to `broadcast_transaction`, oldest first.
    pub fn broadcasts(&self) -> Vec<Value> {
        self.broadcasts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn find_by_field(&self, prefix: &str, field: &str, value: &str) -> Value {
        self.objects
            .iter()
            .find(|r| {
                r.key().starts_with(prefix)
                    && r.value().get(field).and_then(Value::as_str) == Some(value)
            })
            .map(|r| r.value().clone())
            .unwrap_or(Value::Null)
    }

    fn fee_for(&self, op: &Value, asset_id: &str) -> Value {
        let op_id = op.get(0).and_then(Value::as_u64).unwrap_or_default();
        let fee = json!({
            "amount": self.fees.get(&op_id).map(|r| *r.value()).unwrap_or(0),
            "asset_id": asset_id,
        });

        if op_id == PROPOSAL_CREATE_ID {
            let inner: Vec<Value> = op
                .get(1)
                .and_then(|body| body.get("proposed_ops"))
                .and_then(Value::as_array)
                .map(|ops| {
                    ops.iter()
                        .filter_map(|wrapper| wrapper.get("op"))
                        .map(|inner| self.fee_for(inner, asset_id))
                        .collect()
                })
                .unwrap_or_default();
            json!([fee, inner])
        } else {
            fee
        }
    }
}

fn param<'a>(params: &'a Value, idx: usize, method: &str) -> ChainResult<&'a Value> {
    params
        .get(idx)
        .ok_or_else(|| ChainError::Rpc(format!("{}: missing parameter {}", method, idx)))
}

fn str_list(value: &Value) -> Vec<String> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

#[async_trait]
impl Rpc for MemoryRpc {
    async fn call(&self, api: &str, method: &str, params: Value) -> ChainResult<Value> {
        tracing::trace!(api, method, "memory rpc call");
        let result = match method {
            "get_objects" => {
                let ids = str_list(param(&params, 0, method)?);
                Value::Array(
                    ids.iter()
                        .map(|id| {
                            self.objects
                                .get(id)
                                .map(|r| r.value().clone())
                                .unwrap_or(Value::Null)
                        })
                        .collect(),
                )
            }
            "get_account_by_name" => {
                let name = param(&params, 0, method)?.as_str().unwrap_or_default();
                self.account_names
                    .get(name)
                    .and_then(|id| self.objects.get(id.value()).map(|r| r.value().clone()))
                    .unwrap_or(Value::Null)
            }
            "lookup_asset_symbols" => {
                let symbols = str_list(param(&params, 0, method)?);
                Value::Array(
                    symbols
                        .iter()
                        .map(|symbol| {
                            self.asset_symbols
                                .get(symbol)
                                .and_then(|id| self.objects.get(id.value()).map(|r| r.value().clone()))
                                .unwrap_or(Value::Null)
                        })
                        .collect(),
                )
            }
            "get_committee_member_by_account" => {
                let account = param(&params, 0, method)?.as_str().unwrap_or_default();
                self.find_by_field("1.5.", "committee_member_account", account)
            }
            "get_witness_by_account" => {
                let account = param(&params, 0, method)?.as_str().unwrap_or_default();
                self.find_by_field("1.6.", "witness_account", account)
            }
            "get_block" | "get_block_header" => {
                let num = param(&params, 0, method)?.as_u64().unwrap_or_default();
                self.blocks
                    .get(&num)
                    .map(|r| r.value().clone())
                    .unwrap_or(Value::Null)
            }
            "get_dynamic_global_properties" => (**self.dynamic_global_properties.load()).clone(),
            "get_chain_id" => Value::String(self.chain_id.clone()),
            "get_required_fees" => {
                let asset_id = param(&params, 1, method)?.as_str().unwrap_or("1.3.0");
                let ops = param(&params, 0, method)?
                    .as_array()
                    .cloned()
                    .unwrap_or_default();
                Value::Array(ops.iter().map(|op| self.fee_for(op, asset_id)).collect())
            }
            "get_potential_signatures" => json!(**self.potential_signatures.load()),
            "broadcast_transaction_synchronous" | "broadcast_transaction" => {
                let tx = param(&params, 0, method)?.clone();
                let mut broadcasts = self.broadcasts.lock().unwrap_or_else(|e| e.into_inner());
                broadcasts.push(tx);
                json!({
                    "id": format!("{:040x}", broadcasts.len()),
                    "block_num": 2,
                    "trx_num": broadcasts.len() - 1,
                })
            }
            other => return Err(ChainError::Rpc(format!("{}: method not supported", other))),
        };
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_object_lookups() {
        let rpc = MemoryRpc::default();
        rpc.add_object(json!({"id": "1.2.100", "name": "init0"})).unwrap();
        rpc.add_object(json!({"id": "1.3.0", "symbol": "TUSC", "precision": 5})).unwrap();

        let objects = rpc
            .get_objects(&["1.2.100".to_string(), "1.2.999".to_string()])
            .await
            .unwrap();
        assert!(objects[0].is_some());
        assert!(objects[1].is_none());

        let account = rpc.get_account_by_name("init0").await.unwrap().unwrap();
        assert_eq!(account["id"], "1.2.100");
        assert!(rpc.get_account_by_name("nobody").await.unwrap().is_none());

        let assets = rpc.lookup_asset_symbols(&["TUSC".to_string()]).await.unwrap();
        assert_eq!(assets[0].as_ref().unwrap()["precision"], 5);
    }

    #[tokio::test]
    async fn test_proposal_fees_are_nested() {
        let rpc = MemoryRpc::default();
        rpc.set_fee(0, 20);
        let ops = vec![json!([22, {"proposed_ops": [{"op": [0, {}]}, {"op": [0, {}]}]}])];
        let fees = rpc.get_required_fees(&ops, "1.3.0").await.unwrap();
        assert_eq!(fees[0][0]["amount"], 0);
        assert_eq!(fees[0][1].as_array().unwrap().len(), 2);
        assert_eq!(fees[0][1][1]["amount"], 20);
    }

    #[tokio::test]
    async fn test_broadcast_is_recorded() {
        let rpc = MemoryRpc::default();
        rpc.broadcast_transaction(&json!({"operations": []})).await.unwrap();
        assert_eq!(rpc.broadcasts().len(), 1);
        assert!(rpc.call("database", "no_such_method", json!([])).await.is_err());
    }
}
