//! Hashed timelock contracts (`1.16.x`).

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::blockchain::instance::BlockchainInstance;
use crate::blockchain::types::{type_ids, ChainResult, ObjectId, ObjectKind};
use crate::objects::{decode, load_by_id, refresh_by_id, Refreshable};
use crate::protocol::types::{int_or_string, TimePointSec};

#[derive(Deserialize)]
struct HtlcTransfer {
    from: ObjectId,
    to: ObjectId,
    #[serde(deserialize_with = "int_or_string")]
    amount: i64,
    asset_id: ObjectId,
}

#[derive(Deserialize)]
struct HtlcConditions {
    time_lock: HtlcTimeLock,
}

#[derive(Deserialize)]
struct HtlcTimeLock {
    expiration: TimePointSec,
}

#[derive(Deserialize)]
struct HtlcFields {
    id: ObjectId,
    transfer: HtlcTransfer,
    conditions: HtlcConditions,
}

#[derive(Debug, Clone)]
pub struct Htlc {
    id: ObjectId,
    from: ObjectId,
    to: ObjectId,
    amount: i64,
    asset_id: ObjectId,
    expiration: TimePointSec,
    data: Value,
    instance: BlockchainInstance,
}

impl Htlc {
    pub async fn new(id: &str, instance: Option<&BlockchainInstance>) -> ChainResult<Self> {
        let instance = BlockchainInstance::resolve(instance)?;
        let data = load_by_id(&instance, id, type_ids::HTLC, ObjectKind::Htlc).await?;
        Self::from_value(data, instance)
    }

    fn from_value(data: Value, instance: BlockchainInstance) -> ChainResult<Self> {
        let fields: HtlcFields = decode(&data, ObjectKind::Htlc)?;
        Ok(Self {
            id: fields.id,
            from: fields.transfer.from,
            to: fields.transfer.to,
            amount: fields.transfer.amount,
            asset_id: fields.transfer.asset_id,
            expiration: fields.conditions.time_lock.expiration,
            data,
            instance,
        })
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn from(&self) -> ObjectId {
        self.from
    }

    pub fn to(&self) -> ObjectId {
        self.to
    }

    pub fn amount(&self) -> i64 {
        self.amount
    }

    pub fn asset_id(&self) -> ObjectId {
        self.asset_id
    }

    /// Time after which the sender can reclaim the funds.
    pub fn expiration(&self) -> TimePointSec {
        self.expiration
    }

    pub fn raw(&self) -> &Value {
        &self.data
    }
}

#[async_trait]
impl Refreshable for Htlc {
    async fn refresh(&mut self) -> ChainResult<()> {
        let data = refresh_by_id(&self.instance, &self.id.to_string(), ObjectKind::Htlc).await?;
        *self = Self::from_value(data, self.instance.clone())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::memory::MemoryRpc;
    use crate::blockchain::types::ChainError;
    use crate::config::ClientConfig;
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_htlc() {
        let rpc = Arc::new(MemoryRpc::default());
        rpc.add_object(json!({
            "id": "1.16.0",
            "transfer": {"from": "1.2.100", "to": "1.2.101", "amount": "1000", "asset_id": "1.3.0"},
            "conditions": {
                "hash_lock": {"preimage_hash": [2, "0000"], "preimage_size": 32},
                "time_lock": {"expiration": "2030-01-01T00:00:00"},
            },
        }))
        .unwrap();
        let instance = BlockchainInstance::new(ClientConfig::default(), rpc);

        let htlc = Htlc::new("1.16.0", Some(&instance)).await.unwrap();
        assert_eq!(htlc.amount(), 1000);
        assert_eq!(htlc.to().to_string(), "1.2.101");
        assert_eq!(htlc.expiration().to_string(), "2030-01-01T00:00:00");

        let err = Htlc::new("1.16.9", Some(&instance)).await.unwrap_err();
        assert!(matches!(err, ChainError::NotFound { kind: ObjectKind::Htlc, .. }));
    }
}
