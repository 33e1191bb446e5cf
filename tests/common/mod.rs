//! Shared fixtures for integration tests.

#![allow(dead_code)]

use serde_json::{json, Value};
use std::sync::Arc;

use tusc_client::blockchain::{BlockchainInstance, MemoryRpc, ObjectId};
use tusc_client::config::ClientConfig;
use tusc_client::protocol::operations::Transfer;
use tusc_client::protocol::types::AssetAmount;

pub const WIF: &str = "5KQwrPbwdL6PhXujxW37FSSQZ1JiwsST4cqQzDeyXtP79zkvFD3";
pub const PUBKEY: &str = "TUSC6MRyAjQq8ud7hVNYcfnVPJqcVpscN5So8BhtHuGYqET5GDW5CV";

fn authority(key: &str) -> Value {
    json!({"weight_threshold": 1, "account_auths": [], "key_auths": [[key, 1]]})
}

fn account(id: &str, name: &str) -> Value {
    json!({
        "id": id,
        "name": name,
        "owner": authority(PUBKEY),
        "active": authority(PUBKEY),
        "options": {"memo_key": PUBKEY},
    })
}

/// A node with a few accounts, assets, one committee member and block 1.
pub fn memory_rpc() -> Arc<MemoryRpc> {
    let rpc = Arc::new(MemoryRpc::default());
    for object in [
        account("1.2.100", "init0"),
        account("1.2.101", "init1"),
        account("1.2.7", "xeroc"),
        account("1.2.8", "nathan"),
        json!({"id": "1.3.0", "symbol": "TUSC", "precision": 5, "issuer": "1.2.3"}),
        json!({"id": "1.3.121", "symbol": "USD", "precision": 4, "issuer": "1.2.0"}),
        json!({
            "id": "1.5.27",
            "committee_member_account": "1.2.7",
            "vote_id": "0:11",
            "url": "https://example.com/xeroc",
        }),
    ] {
        rpc.add_object(object).unwrap();
    }
    rpc.add_block(
        1,
        json!({
            "previous": "0000000000000000000000000000000000000000",
            "timestamp": "2015-10-13T14:12:24",
            "witness": "1.6.8",
            "transaction_merkle_root": "0000000000000000000000000000000000000000",
            "transactions": [],
        }),
    );
    rpc
}

pub fn instance_with(config: ClientConfig) -> (Arc<MemoryRpc>, BlockchainInstance) {
    let rpc = memory_rpc();
    let instance = BlockchainInstance::new(config, rpc.clone());
    (rpc, instance)
}

pub fn instance() -> BlockchainInstance {
    instance_with(ClientConfig::default()).1
}

/// Transfer of `amount` TUSC satoshis from init0 to init1.
pub fn transfer(amount: i64) -> Transfer {
    Transfer::new(
        ObjectId::protocol(2, 100),
        ObjectId::protocol(2, 101),
        AssetAmount::new(amount, ObjectId::protocol(3, 0)),
    )
}
