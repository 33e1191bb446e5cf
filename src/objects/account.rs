//! Accounts (`1.2.x`).

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::blockchain::instance::BlockchainInstance;
use crate::blockchain::types::{type_ids, ChainError, ChainResult, ObjectId, ObjectKind};
use crate::objects::{decode, fetch_and_store, load, Refreshable};

/// Which authority of an account signs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    Active,
    Owner,
}

impl FromStr for Permission {
    type Err = ChainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Permission::Active),
            "owner" => Ok(Permission::Owner),
            other => Err(ChainError::malformed(format!("unknown permission '{}'", other))),
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Permission::Active => f.write_str("active"),
            Permission::Owner => f.write_str("owner"),
        }
    }
}

/// Weighted multi-signature authority.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Authority {
    pub weight_threshold: u32,
    #[serde(default)]
    pub account_auths: Vec<(ObjectId, u16)>,
    /// Keys are kept as strings so foreign prefixes survive.
    #[serde(default)]
    pub key_auths: Vec<(String, u16)>,
}

#[derive(Deserialize)]
struct AccountOptions {
    memo_key: String,
}

#[derive(Deserialize)]
struct AccountFields {
    id: ObjectId,
    name: String,
    #[serde(default)]
    owner: Authority,
    #[serde(default)]
    active: Authority,
    options: Option<AccountOptions>,
}

/// An account, looked up by id or by name.
#[derive(Debug, Clone)]
pub struct Account {
    id: ObjectId,
    name: String,
    owner: Authority,
    active: Authority,
    memo_key: Option<String>,
    data: Value,
    instance: BlockchainInstance,
}

impl Account {
    /// Load `identifier` (`1.2.x` or an account name).
    pub async fn new(identifier: &str, instance: Option<&BlockchainInstance>) -> ChainResult<Self> {
        let instance = BlockchainInstance::resolve(instance)?;
        let data = Self::fetch(&instance, identifier, false).await?;
        Self::from_value(data, instance)
    }

    async fn fetch(instance: &BlockchainInstance, identifier: &str, refresh: bool) -> ChainResult<Value> {
        let rpc = instance.rpc();
        if ObjectId::is_object_id(identifier) {
            ObjectId::parse_typed(identifier, type_ids::ACCOUNT)?;
            let fetch = || rpc.get_object(identifier);
            if refresh {
                fetch_and_store(instance, identifier, ObjectKind::Account, fetch).await
            } else {
                load(instance, identifier, ObjectKind::Account, fetch).await
            }
        } else {
            let key = format!("account:{}", identifier);
            let fetch = || rpc.get_account_by_name(identifier);
            if refresh {
                fetch_and_store(instance, &key, ObjectKind::Account, fetch).await
            } else {
                load(instance, &key, ObjectKind::Account, fetch).await
            }
        }
    }

    /// Wrap an already fetched account object.
    pub fn from_value(data: Value, instance: BlockchainInstance) -> ChainResult<Self> {
        let fields: AccountFields = decode(&data, ObjectKind::Account)?;
        Ok(Self {
            id: fields.id,
            name: fields.name,
            owner: fields.owner,
            active: fields.active,
            memo_key: fields.options.map(|o| o.memo_key),
            data,
            instance,
        })
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn memo_key(&self) -> Option<&str> {
        self.memo_key.as_deref()
    }

    pub fn authority(&self, permission: Permission) -> &Authority {
        match permission {
            Permission::Active => &self.active,
            Permission::Owner => &self.owner,
        }
    }

    pub fn raw(&self) -> &Value {
        &self.data
    }

    pub fn instance(&self) -> &BlockchainInstance {
        &self.instance
    }
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<Account {}>", self.name)
    }
}

#[async_trait]
impl Refreshable for Account {
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

    fn instance() -> (Arc<MemoryRpc>, BlockchainInstance) {
        let rpc = Arc::new(MemoryRpc::default());
        rpc.add_object(json!({
            "id": "1.2.100",
            "name": "init0",
            "owner": {"weight_threshold": 1, "account_auths": [], "key_auths": [], "address_auths": []},
            "active": {"weight_threshold": 1, "account_auths": [["1.2.7", 1]], "key_auths": [], "address_auths": []},
            "options": {"memo_key": "TUSC1111111111111111111111111111111114T1Anm"},
        }))
        .unwrap();
        let instance = BlockchainInstance::new(ClientConfig::default(), rpc.clone());
        (rpc, instance)
    }

    #[tokio::test]
    async fn test_account_by_name_and_id() {
        let (_, instance) = instance();
        let by_name = Account::new("init0", Some(&instance)).await.unwrap();
        assert_eq!(by_name.id().to_string(), "1.2.100");
        assert_eq!(by_name.to_string(), "<Account init0>");
        assert!(instance.cache().contains("1.2.100"));
        assert!(instance.cache().contains("account:init0"));

        let by_id = Account::new("1.2.100", Some(&instance)).await.unwrap();
        assert_eq!(by_id.name(), "init0");
        assert_eq!(
            by_id.authority(Permission::Active).account_auths,
            vec![(ObjectId::protocol(2, 7), 1)]
        );
    }

    #[tokio::test]
    async fn test_missing_account() {
        let (_, instance) = instance();
        let err = Account::new("FOObarNonExisting", Some(&instance)).await.unwrap_err();
        assert!(matches!(
            err,
            ChainError::NotFound { kind: ObjectKind::Account, .. }
        ));
        assert!(Account::new("1.3.0", Some(&instance)).await.is_err());
    }

    #[tokio::test]
    async fn test_refresh_bypasses_cache() {
        let (rpc, instance) = instance();
        let mut account = Account::new("init0", Some(&instance)).await.unwrap();

        rpc.add_object(json!({"id": "1.2.100", "name": "init0-renamed"})).unwrap();
        assert_eq!(Account::new("1.2.100", Some(&instance)).await.unwrap().name(), "init0");

        account.refresh().await.unwrap();
        assert_eq!(account.name(), "init0-renamed");
        assert_eq!(instance.cache().get("1.2.100", Value::Null)["name"], "init0-renamed");
    }

    #[test]
    fn test_permission_parse() {
        assert_eq!("owner".parse::<Permission>().unwrap(), Permission::Owner);
        assert!("posting".parse::<Permission>().is_err());
    }
}
