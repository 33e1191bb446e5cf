//! Proposals collected inside a transaction.

use crate::blockchain::instance::BlockchainInstance;
use crate::blockchain::types::ChainResult;
use crate::objects::Account;
use crate::protocol::encoding::Extensions;
use crate::protocol::operations::{Operation, ProposalCreate, ProposedOperation};
use crate::protocol::types::{AssetAmount, TimePointSec};

/// Operations to be wrapped in one `proposal_create`.
///
/// A proposal lives inside its parent [`TransactionBuilder`] and is reached
/// through a [`ProposalHandle`]. It keeps its position among the parent's
/// items and is materialized when the parent is constructed.
///
/// [`TransactionBuilder`]: crate::builder::TransactionBuilder
/// [`ProposalHandle`]: crate::builder::ProposalHandle
#[derive(Debug, Clone)]
pub struct ProposalBuilder {
    proposer: String,
    expiration_secs: u32,
    review_secs: Option<u32>,
    ops: Vec<Operation>,
}

impl ProposalBuilder {
    pub fn new(proposer: &str, expiration_secs: u32, review_secs: Option<u32>) -> Self {
        Self {
            proposer: proposer.to_string(),
            expiration_secs,
            review_secs,
            ops: Vec::new(),
        }
    }

    pub fn append_op(&mut self, op: impl Into<Operation>) -> &mut Self {
        self.ops.push(op.into());
        self
    }

    pub fn append_ops<I, O>(&mut self, ops: I) -> &mut Self
    where
        I: IntoIterator<Item = O>,
        O: Into<Operation>,
    {
        self.ops.extend(ops.into_iter().map(Into::into));
        self
    }

    pub fn set_expiration(&mut self, secs: u32) -> &mut Self {
        self.expiration_secs = secs;
        self
    }

    pub fn set_review(&mut self, secs: Option<u32>) -> &mut Self {
        self.review_secs = secs;
        self
    }

    /// Account name or id that pays for the proposal.
    pub fn proposer(&self) -> &str {
        &self.proposer
    }

    pub fn expiration_secs(&self) -> u32 {
        self.expiration_secs
    }

    pub fn review_secs(&self) -> Option<u32> {
        self.review_secs
    }

    pub fn operations(&self) -> &[Operation] {
        &self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Build the `proposal_create` operation, or `None` if nothing was
    /// proposed. The fee is a zero placeholder until fees are resolved.
    pub async fn materialize(&self, instance: &BlockchainInstance) -> ChainResult<Option<Operation>> {
        if self.ops.is_empty() {
            tracing::debug!(proposer = %self.proposer, "Skipping empty proposal");
            return Ok(None);
        }

        let proposer = Account::new(&self.proposer, Some(instance)).await?;
        let proposal = ProposalCreate {
            fee: AssetAmount::zero(instance.core_asset_id()?),
            fee_paying_account: proposer.id(),
            expiration_time: TimePointSec::from_now(self.expiration_secs),
            proposed_ops: self
                .ops
                .iter()
                .cloned()
                .map(|op| ProposedOperation { op })
                .collect(),
            review_period_seconds: self.review_secs,
            extensions: Extensions,
        };
        Ok(Some(proposal.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::memory::MemoryRpc;
    use crate::blockchain::types::{ChainError, ObjectId};
    use crate::config::ClientConfig;
    use crate::protocol::operations::Transfer;
    use serde_json::json;
    use std::sync::Arc;

    fn transfer() -> Transfer {
        Transfer::new(
            ObjectId::protocol(2, 100),
            ObjectId::protocol(2, 101),
            AssetAmount::new(1, ObjectId::protocol(3, 0)),
        )
    }

    fn instance() -> BlockchainInstance {
        let rpc = Arc::new(MemoryRpc::default());
        rpc.add_object(json!({"id": "1.2.100", "name": "init0"})).unwrap();
        BlockchainInstance::new(ClientConfig::default(), rpc)
    }

    #[tokio::test]
    async fn test_empty_proposal_materializes_to_nothing() {
        let proposal = ProposalBuilder::new("init0", 3600, None);
        assert!(proposal.materialize(&instance()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_materialize_resolves_proposer() {
        let mut proposal = ProposalBuilder::new("init0", 3600, Some(60));
        proposal.append_op(transfer()).append_ops(vec![transfer(), transfer()]);
        assert_eq!(proposal.len(), 3);

        let Some(Operation::ProposalCreate(op)) = proposal.materialize(&instance()).await.unwrap() else {
            panic!("expected a proposal_create");
        };
        assert_eq!(op.fee_paying_account.to_string(), "1.2.100");
        assert_eq!(op.proposed_ops.len(), 3);
        assert_eq!(op.review_period_seconds, Some(60));
        assert!(op.expiration_time > TimePointSec::now());
    }

    #[tokio::test]
    async fn test_unknown_proposer() {
        let mut proposal = ProposalBuilder::new("nobody", 3600, None);
        proposal.append_op(transfer());
        assert!(matches!(
            proposal.materialize(&instance()).await,
            Err(ChainError::NotFound { .. })
        ));
    }
}
