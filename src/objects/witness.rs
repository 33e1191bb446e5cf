//! Witnesses (`1.6.x`).

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::fmt;

use crate::blockchain::instance::BlockchainInstance;
use crate::blockchain::types::{type_ids, ChainError, ChainResult, ObjectId, ObjectKind};
use crate::objects::{decode, load, load_by_id, refresh_by_id, Account, Refreshable};
use crate::protocol::types::int_or_string;

#[derive(Deserialize)]
struct WitnessFields {
    id: ObjectId,
    witness_account: ObjectId,
    #[serde(default)]
    signing_key: String,
    #[serde(default)]
    url: String,
    #[serde(default, deserialize_with = "int_or_string")]
    total_votes: i64,
}

/// A block producer, looked up by its id or by its account.
#[derive(Debug, Clone)]
pub struct Witness {
    id: ObjectId,
    signing_key: String,
    url: String,
    total_votes: i64,
    account: Account,
    data: Value,
}

impl Witness {
    /// Load `identifier`: a `1.6.x` id, or an account name or id.
    pub async fn new(identifier: &str, instance: Option<&BlockchainInstance>) -> ChainResult<Self> {
        let instance = BlockchainInstance::resolve(instance)?;

        let data = if ObjectId::parse_typed(identifier, type_ids::WITNESS).is_ok() {
            load_by_id(&instance, identifier, type_ids::WITNESS, ObjectKind::Witness).await?
        } else {
            let account = Account::new(identifier, Some(&instance)).await?;
            let account_id = account.id().to_string();
            let key = format!("witness:{}", account_id);
            load(&instance, &key, ObjectKind::Witness, || {
                instance.rpc().get_witness_by_account(&account_id)
            })
            .await
            .map_err(|e| match e {
                ChainError::NotFound { kind, .. } => ChainError::not_found(kind, identifier),
                other => other,
            })?
        };

        Self::from_value(data, &instance).await
    }

    async fn from_value(data: Value, instance: &BlockchainInstance) -> ChainResult<Self> {
        let fields: WitnessFields = decode(&data, ObjectKind::Witness)?;
        let account = Account::new(&fields.witness_account.to_string(), Some(instance)).await?;
        Ok(Self {
            id: fields.id,
            signing_key: fields.signing_key,
            url: fields.url,
            total_votes: fields.total_votes,
            account,
            data,
        })
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn account(&self) -> &Account {
        &self.account
    }

    /// Block signing key in its string form.
    pub fn signing_key(&self) -> &str {
        &self.signing_key
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn total_votes(&self) -> i64 {
        self.total_votes
    }

    pub fn raw(&self) -> &Value {
        &self.data
    }
}

impl fmt::Display for Witness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<Witness {}>", self.account.name())
    }
}

#[async_trait]
impl Refreshable for Witness {
    async fn refresh(&mut self) -> ChainResult<()> {
        let instance = self.account.instance().clone();
        let data = refresh_by_id(&instance, &self.id.to_string(), ObjectKind::Witness).await?;
        *self = Self::from_value(data, &instance).await?;
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
    async fn test_witness_by_account_and_id() {
        let rpc = Arc::new(MemoryRpc::default());
        rpc.add_object(json!({"id": "1.2.9", "name": "init1"})).unwrap();
        rpc.add_object(json!({"id": "1.2.10", "name": "lurker"})).unwrap();
        rpc.add_object(json!({
            "id": "1.6.2",
            "witness_account": "1.2.9",
            "url": "https://tusc.network",
            "total_votes": "1200000",
        }))
        .unwrap();
        let instance = BlockchainInstance::new(ClientConfig::default(), rpc);

        let witness = Witness::new("init1", Some(&instance)).await.unwrap();
        assert_eq!(witness.id().to_string(), "1.6.2");
        assert_eq!(witness.total_votes(), 1_200_000);
        assert_eq!(witness.to_string(), "<Witness init1>");

        let witness = Witness::new("1.6.2", Some(&instance)).await.unwrap();
        assert_eq!(witness.account().id().to_string(), "1.2.9");

        let err = Witness::new("lurker", Some(&instance)).await.unwrap_err();
        assert!(matches!(err, ChainError::NotFound { kind: ObjectKind::Witness, .. }));
    }
}
