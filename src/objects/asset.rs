//! Assets (`1.3.x`).

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::fmt;

use crate::blockchain::instance::BlockchainInstance;
use crate::blockchain::types::{type_ids, ChainError, ChainResult, ObjectId, ObjectKind};
use crate::objects::{decode, fetch_and_store, load, Refreshable};

#[derive(Deserialize)]
struct AssetFields {
    id: ObjectId,
    symbol: String,
    precision: u8,
    #[serde(default)]
    issuer: Option<ObjectId>,
    #[serde(default)]
    bitasset_data_id: Option<ObjectId>,
}

/// An asset, looked up by id or by symbol.
#[derive(Debug, Clone)]
pub struct Asset {
    id: ObjectId,
    symbol: String,
    precision: u8,
    issuer: Option<ObjectId>,
    bitasset_data_id: Option<ObjectId>,
    data: Value,
    instance: BlockchainInstance,
}

impl Asset {
    /// Load `identifier` (`1.3.x` or a symbol such as `TUSC`).
    pub async fn new(identifier: &str, instance: Option<&BlockchainInstance>) -> ChainResult<Self> {
        let instance = BlockchainInstance::resolve(instance)?;
        let data = Self::fetch(&instance, identifier, false).await?;
        Self::from_value(data, instance)
    }

    async fn fetch(instance: &BlockchainInstance, identifier: &str, refresh: bool) -> ChainResult<Value> {
        let rpc = instance.rpc();
        if ObjectId::is_object_id(identifier) {
            ObjectId::parse_typed(identifier, type_ids::ASSET)?;
            let fetch = || rpc.get_object(identifier);
            if refresh {
                fetch_and_store(instance, identifier, ObjectKind::Asset, fetch).await
            } else {
                load(instance, identifier, ObjectKind::Asset, fetch).await
            }
        } else {
            let symbol = identifier.to_uppercase();
            let fetch = || async {
                let mut found = rpc.lookup_asset_symbols(&[symbol.clone()]).await?;
                Ok::<_, ChainError>(found.pop().flatten())
            };
            let key = format!("asset:{}", symbol);
            if refresh {
                fetch_and_store(instance, &key, ObjectKind::Asset, fetch).await
            } else {
                load(instance, &key, ObjectKind::Asset, fetch).await
            }
        }
    }

    pub fn from_value(data: Value, instance: BlockchainInstance) -> ChainResult<Self> {
        let fields: AssetFields = decode(&data, ObjectKind::Asset)?;
        Ok(Self {
            id: fields.id,
            symbol: fields.symbol,
            precision: fields.precision,
            issuer: fields.issuer,
            bitasset_data_id: fields.bitasset_data_id,
            data,
            instance,
        })
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Number of decimal places of the minimal unit.
    pub fn precision(&self) -> u8 {
        self.precision
    }

    pub fn issuer(&self) -> Option<ObjectId> {
        self.issuer
    }

    /// Market-pegged assets carry bitasset data.
    pub fn is_bitasset(&self) -> bool {
        self.bitasset_data_id.is_some()
    }

    pub fn raw(&self) -> &Value {
        &self.data
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<Asset {}>", self.symbol)
    }
}

#[async_trait]
impl Refreshable for Asset {
    async fn refresh(&mut self) -> ChainResult<()> {
        let id = self.id.to_string();
        let data = Self::fetch(&self.instance, &id, true).await?;
        *self = Self::from_value(data, self.instance.clone())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::memory::MemoryRpc;
    use crate::config::ClientConfig;
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_asset_by_symbol_and_id() {
        let rpc = Arc::new(MemoryRpc::default());
        rpc.add_object(json!({"id": "1.3.0", "symbol": "TUSC", "precision": 5, "issuer": "1.2.3"}))
            .unwrap();
        let instance = BlockchainInstance::new(ClientConfig::default(), rpc);

        let asset = Asset::new("tusc", Some(&instance)).await.unwrap();
        assert_eq!(asset.id().to_string(), "1.3.0");
        assert_eq!(asset.precision(), 5);
        assert!(!asset.is_bitasset());
        assert!(instance.cache().contains("1.3.0"));

        let asset = Asset::new("1.3.0", Some(&instance)).await.unwrap();
        assert_eq!(asset.symbol(), "TUSC");

        let err = Asset::new("GOLD", Some(&instance)).await.unwrap_err();
        assert!(matches!(err, ChainError::NotFound { kind: ObjectKind::Asset, .. }));
    }

    #[tokio::test]
    async fn test_symbol_does_not_shadow_account_name() {
        let rpc = Arc::new(MemoryRpc::default());
        rpc.add_object(json!({"id": "1.3.0", "symbol": "TUSC", "precision": 5}))
            .unwrap();
        let instance = BlockchainInstance::new(ClientConfig::default(), rpc);

        Asset::new("TUSC", Some(&instance)).await.unwrap();
        assert!(instance.cache().contains("asset:TUSC"));

        let err = crate::objects::Account::new("TUSC", Some(&instance)).await.unwrap_err();
        match err {
            ChainError::NotFound { kind, identifier } => {
                assert_eq!(kind, ObjectKind::Account);
                assert_eq!(identifier, "TUSC");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
