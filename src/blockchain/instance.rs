//! Connection context and the process-wide shared instance.
//!
//! A [`BlockchainInstance`] bundles the RPC transport, configuration, object
//! cache and wallet. Chain objects and builders take one explicitly or fall
//! back to the shared instance, captured once at construction.

use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tokio::sync::OnceCell;

use crate::blockchain::client::HttpRpc;
use crate::blockchain::rpc::Rpc;
use crate::blockchain::types::{ChainError, ChainResult, ObjectId};
use crate::blockchain::wallet::Wallet;
use crate::builder::{ProposalHandle, TransactionBuilder};
use crate::config::{ChainParameters, ClientConfig};
use crate::market::{Amount, AssetResolver, AssetSpec};
use crate::objects::{Asset, ObjectCache};
use crate::protocol::operations::LimitOrderCreate;
use crate::protocol::types::TimePointSec;

static SHARED_INSTANCE: ArcSwapOption<InstanceInner> = ArcSwapOption::const_empty();

struct InstanceInner {
    rpc: Arc<dyn Rpc>,
    config: ClientConfig,
    cache: ObjectCache,
    wallet: Wallet,
    chain_id: OnceCell<String>,
}

/// Handle to a node connection; cheap to clone.
#[derive(Clone)]
pub struct BlockchainInstance {
    inner: Arc<InstanceInner>,
}

impl BlockchainInstance {
    /// Create an instance over an existing transport.
    pub fn new(config: ClientConfig, rpc: Arc<dyn Rpc>) -> Self {
        let wallet = Wallet::in_memory(&config.chain.prefix);
        Self::with_wallet(config, rpc, wallet)
    }

    pub fn with_wallet(config: ClientConfig, rpc: Arc<dyn Rpc>, wallet: Wallet) -> Self {
        let cache = ObjectCache::new(config.cache.object_expiration_secs);
        Self {
            inner: Arc::new(InstanceInner {
                rpc,
                config,
                cache,
                wallet,
                chain_id: OnceCell::new(),
            }),
        }
    }

    /// Create an instance talking HTTP JSON-RPC to the configured node.
    pub fn connect(config: ClientConfig) -> ChainResult<Self> {
        let rpc = HttpRpc::new(&config.node)?;
        Ok(Self::new(config, Arc::new(rpc)))
    }

    /// `instance` if given, otherwise the shared instance.
    pub fn resolve(instance: Option<&BlockchainInstance>) -> ChainResult<BlockchainInstance> {
        match instance {
            Some(instance) => Ok(instance.clone()),
            None => shared_instance().ok_or(ChainError::NoInstance),
        }
    }

    pub fn rpc(&self) -> &dyn Rpc {
        self.inner.rpc.as_ref()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn chain(&self) -> &ChainParameters {
        &self.inner.config.chain
    }

    pub fn cache(&self) -> &ObjectCache {
        &self.inner.cache
    }

    pub fn wallet(&self) -> &Wallet {
        &self.inner.wallet
    }

    pub fn nobroadcast(&self) -> bool {
        self.inner.config.transactions.nobroadcast
    }

    /// Id of the core asset (`1.3.0` by default).
    pub fn core_asset_id(&self) -> ChainResult<ObjectId> {
        self.chain().core_asset_id.parse()
    }

    /// Chain id of the connected node, fetched once.
    ///
    /// Fails with `ChainMismatch` if a chain id is configured and the node
    /// reports another one.
    pub async fn chain_id(&self) -> ChainResult<String> {
        let chain_id = self
            .inner
            .chain_id
            .get_or_try_init(|| async {
                let reported = self.rpc().get_chain_id().await?;
                if let Some(expected) = &self.chain().chain_id {
                    if !expected.eq_ignore_ascii_case(&reported) {
                        return Err(ChainError::ChainMismatch {
                            expected: expected.clone(),
                            actual: reported,
                        });
                    }
                }
                tracing::debug!(chain_id = %reported, "Chain id resolved");
                Ok(reported)
            })
            .await?;
        Ok(chain_id.clone())
    }

    /// Fresh transaction builder bound to this instance.
    pub fn new_tx(&self) -> TransactionBuilder {
        TransactionBuilder::new(self.clone())
    }

    /// Attach a new proposal to `tx`.
    ///
    /// `expiration` and `review` are in seconds; `None` falls back to the
    /// configured proposal defaults.
    pub fn new_proposal(
        &self,
        tx: &mut TransactionBuilder,
        proposer: &str,
        expiration: Option<u32>,
        review: Option<u32>,
    ) -> ChainResult<ProposalHandle> {
        let defaults = &self.config().transactions;
        tx.new_proposal(
            proposer,
            expiration.unwrap_or(defaults.proposal_expiration_secs),
            review.or(defaults.proposal_review_secs),
        )
    }

    /// Limit order selling `amount_to_sell` for at least `min_to_receive`.
    ///
    /// `expiration` is in seconds from now; `None` uses the configured
    /// order lifetime.
    pub fn new_limit_order(
        &self,
        seller: ObjectId,
        amount_to_sell: &Amount,
        min_to_receive: &Amount,
        expiration: Option<u32>,
    ) -> ChainResult<LimitOrderCreate> {
        if amount_to_sell.asset().id == min_to_receive.asset().id {
            return Err(ChainError::malformed(format!(
                "limit order sells and buys {}",
                amount_to_sell.symbol()
            )));
        }
        let lifetime = expiration.unwrap_or(self.config().transactions.order_expiration_secs);
        Ok(LimitOrderCreate::new(
            seller,
            amount_to_sell.to_asset_amount(),
            min_to_receive.to_asset_amount(),
            TimePointSec::from_now(lifetime),
        ))
    }

    fn ptr_eq(&self, other: &Arc<InstanceInner>) -> bool {
        Arc::ptr_eq(&self.inner, other)
    }
}

impl fmt::Debug for BlockchainInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockchainInstance")
            .field("prefix", &self.chain().prefix)
            .field("cache", &self.inner.cache.to_string())
            .field("wallet", &self.inner.wallet)
            .finish()
    }
}

#[async_trait]
impl AssetResolver for BlockchainInstance {
    async fn resolve_asset(&self, identifier: &str) -> ChainResult<AssetSpec> {
        let asset = Asset::new(identifier, Some(self)).await?;
        Ok(AssetSpec::from(&asset))
    }
}

/// Install `instance` as the process-wide default, clearing its cache.
pub fn set_shared_instance(instance: &BlockchainInstance) {
    instance.cache().clear();
    SHARED_INSTANCE.store(Some(instance.inner.clone()));
    tracing::debug!("Shared blockchain instance set");
}

/// The process-wide default instance, if one is set.
pub fn shared_instance() -> Option<BlockchainInstance> {
    SHARED_INSTANCE
        .load_full()
        .map(|inner| BlockchainInstance { inner })
}

pub fn clear_shared_instance() {
    SHARED_INSTANCE.store(None);
}

/// True if `instance` is the current shared instance.
pub fn is_shared_instance(instance: &BlockchainInstance) -> bool {
    SHARED_INSTANCE
        .load()
        .as_ref()
        .map(|inner| instance.ptr_eq(inner))
        .unwrap_or(false)
}
