//! Committee members (`1.5.x`).

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::fmt;

use crate::blockchain::instance::BlockchainInstance;
use crate::blockchain::types::{type_ids, ChainError, ChainResult, ObjectId, ObjectKind};
use crate::objects::{decode, load, load_by_id, refresh_by_id, Account, Refreshable};

#[derive(Deserialize)]
struct CommitteeFields {
    id: ObjectId,
    committee_member_account: ObjectId,
    #[serde(default)]
    vote_id: String,
    #[serde(default)]
    url: String,
}

/// A committee member, looked up by its id or by the member's account.
#[derive(Debug, Clone)]
pub struct Committee {
    id: ObjectId,
    vote_id: String,
    url: String,
    account: Account,
    data: Value,
}

impl Committee {
    /// Load `identifier`: a `1.5.x` id, or an account name or id.
    ///
    /// An unknown account fails with `NotFound(account)`; an account that is
    /// not a committee member fails with `NotFound(committee member)`.
    pub async fn new(identifier: &str, instance: Option<&BlockchainInstance>) -> ChainResult<Self> {
        let instance = BlockchainInstance::resolve(instance)?;

        let data = match ObjectId::parse_typed(identifier, type_ids::COMMITTEE_MEMBER) {
            Ok(_) => {
                load_by_id(&instance, identifier, type_ids::COMMITTEE_MEMBER, ObjectKind::CommitteeMember)
                    .await?
            }
            Err(_) => {
                let account = Account::new(identifier, Some(&instance)).await?;
                let account_id = account.id().to_string();
                let key = format!("committee:{}", account_id);
                load(&instance, &key, ObjectKind::CommitteeMember, || {
                    instance.rpc().get_committee_member_by_account(&account_id)
                })
                .await
                .map_err(|e| match e {
                    ChainError::NotFound { kind, .. } => ChainError::not_found(kind, identifier),
                    other => other,
                })?
            }
        };

        Self::from_value(data, &instance).await
    }

    async fn from_value(data: Value, instance: &BlockchainInstance) -> ChainResult<Self> {
        let fields: CommitteeFields = decode(&data, ObjectKind::CommitteeMember)?;
        let account = Account::new(&fields.committee_member_account.to_string(), Some(instance)).await?;
        Ok(Self {
            id: fields.id,
            vote_id: fields.vote_id,
            url: fields.url,
            account,
            data,
        })
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    /// The member's account.
    pub fn account(&self) -> &Account {
        &self.account
    }

    pub fn vote_id(&self) -> &str {
        &self.vote_id
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn raw(&self) -> &Value {
        &self.data
    }
}

impl fmt::Display for Committee {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<Committee {}>", self.id)
    }
}

#[async_trait]
impl Refreshable for Committee {
    async fn refresh(&mut self) -> ChainResult<()> {
        let instance = self.account.instance().clone();
        let data = refresh_by_id(&instance, &self.id.to_string(), ObjectKind::CommitteeMember).await?;
        *self = Self::from_value(data, &instance).await?;
        Ok(())
    }
}
