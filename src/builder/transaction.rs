//! Transaction building, signing and broadcasting.
//!
//! # Lifecycle
//! ```text
//! append_ops / new_proposal   (items, in call order)
//!     → construct()           (proposals materialized, fees, expiration, ref block)
//!     → sign()                (frozen from here on)
//!     → broadcast()           (then cleared)
//! ```

use serde_json::Value;
use std::future::Future;
use std::pin::Pin;

use crate::blockchain::instance::BlockchainInstance;
use crate::blockchain::types::{ChainError, ChainResult, ObjectId};
use crate::blockchain::wallet::{PrivateKey, PublicKey};
use crate::builder::proposal::ProposalBuilder;
use crate::objects::{Account, Asset, Permission};
use crate::observability::metrics;
use crate::protocol::operations::Operation;
use crate::protocol::transaction::SignedTransaction;
use crate::protocol::types::TimePointSec;

/// Authorities are followed this many levels below the signing account.
const MAX_AUTHORITY_DEPTH: u8 = 2;

type KeysFuture<'a> = Pin<Box<dyn Future<Output = ChainResult<Vec<(PrivateKey, u16)>>> + Send + 'a>>;

#[derive(Debug, Clone)]
enum TxItem {
    Operation(Operation),
    Proposal(ProposalBuilder),
}

/// Refers to a proposal inside the transaction that created it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProposalHandle(usize);

/// Accumulates operations and proposals into one signed transaction.
pub struct TransactionBuilder {
    instance: BlockchainInstance,
    items: Vec<TxItem>,
    signers: Vec<(PublicKey, PrivateKey)>,
    fee_asset: String,
    expiration_secs: u32,
    tx: Option<SignedTransaction>,
}

impl TransactionBuilder {
    /// Empty builder using the instance's transaction defaults.
    pub fn new(instance: BlockchainInstance) -> Self {
        let defaults = &instance.config().transactions;
        let fee_asset = defaults.fee_asset.clone();
        let expiration_secs = defaults.expiration_secs;
        Self {
            instance,
            items: Vec::new(),
            signers: Vec::new(),
            fee_asset,
            expiration_secs,
            tx: None,
        }
    }

    pub fn instance(&self) -> &BlockchainInstance {
        &self.instance
    }

    fn ensure_unsigned(&self) -> ChainResult<()> {
        if self.is_signed() {
            return Err(ChainError::AlreadySigned);
        }
        Ok(())
    }

    /// Any change drops the constructed transaction.
    fn touch(&mut self) -> ChainResult<()> {
        self.ensure_unsigned()?;
        self.tx = None;
        Ok(())
    }

    pub fn append_op(&mut self, op: impl Into<Operation>) -> ChainResult<&mut Self> {
        self.touch()?;
        self.items.push(TxItem::Operation(op.into()));
        Ok(self)
    }

    pub fn append_ops<I, O>(&mut self, ops: I) -> ChainResult<&mut Self>
    where
        I: IntoIterator<Item = O>,
        O: Into<Operation>,
    {
        self.touch()?;
        self.items
            .extend(ops.into_iter().map(|op| TxItem::Operation(op.into())));
        Ok(self)
    }

    /// Start a proposal at the current position.
    pub fn new_proposal(
        &mut self,
        proposer: &str,
        expiration_secs: u32,
        review_secs: Option<u32>,
    ) -> ChainResult<ProposalHandle> {
        self.touch()?;
        self.items.push(TxItem::Proposal(ProposalBuilder::new(
            proposer,
            expiration_secs,
            review_secs,
        )));
        Ok(ProposalHandle(self.items.len() - 1))
    }

    pub fn proposal(&self, handle: ProposalHandle) -> Option<&ProposalBuilder> {
        match self.items.get(handle.0) {
            Some(TxItem::Proposal(proposal)) => Some(proposal),
            _ => None,
        }
    }

    /// Mutable access to a proposal; fails once the transaction is signed.
    pub fn proposal_mut(&mut self, handle: ProposalHandle) -> ChainResult<&mut ProposalBuilder> {
        self.touch()?;
        match self.items.get_mut(handle.0) {
            Some(TxItem::Proposal(proposal)) => Ok(proposal),
            _ => Err(ChainError::malformed(format!("no proposal at position {}", handle.0))),
        }
    }

    /// Number of top-level items (operations and proposals).
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Asset fees are paid in, by symbol or id.
    pub fn set_fee_asset(&mut self, asset: &str) -> ChainResult<()> {
        self.touch()?;
        self.fee_asset = asset.to_string();
        Ok(())
    }

    /// Seconds from construction until the transaction expires.
    pub fn set_expiration(&mut self, secs: u32) -> ChainResult<()> {
        self.touch()?;
        self.expiration_secs = secs;
        Ok(())
    }

    /// Sign with a key not held in the wallet.
    pub fn append_wif(&mut self, wif: &str) -> ChainResult<()> {
        self.ensure_unsigned()?;
        let key = PrivateKey::from_wif(wif)?;
        self.add_signer(key);
        Ok(())
    }

    fn add_signer(&mut self, key: PrivateKey) {
        let public_key = key.public_key(self.instance.wallet().prefix());
        if !self.signers.iter().any(|(known, _)| *known == public_key) {
            tracing::debug!(public_key = %public_key, "Signer added");
            self.signers.push((public_key, key));
        }
    }

    /// Add the wallet keys that satisfy `permission` of `account`.
    ///
    /// Keys of the account itself are taken first; if their weight stays
    /// below the threshold, authorizing accounts are searched as well.
    pub async fn append_signer(&mut self, account: &str, permission: Permission) -> ChainResult<()> {
        self.ensure_unsigned()?;
        let account = Account::new(account, Some(&self.instance)).await?;
        let threshold = account.authority(permission).weight_threshold;
        let name = account.name().to_string();

        let keys = fetch_keys(&self.instance, account, permission, 0, threshold).await?;
        if keys.is_empty() {
            return Err(ChainError::MissingKey(format!("{} authority of {}", permission, name)));
        }
        for (key, _) in keys {
            self.add_signer(key);
        }
        Ok(())
    }

    async fn fee_asset_id(&self) -> ChainResult<ObjectId> {
        match self.fee_asset.parse::<ObjectId>() {
            Ok(id) => Ok(id),
            Err(_) => Ok(Asset::new(&self.fee_asset, Some(&self.instance)).await?.id()),
        }
    }

    /// Materialize proposals, resolve fees and set expiration and the
    /// reference block. A constructed transaction is reused until changed.
    pub async fn construct(&mut self) -> ChainResult<()> {
        if self.tx.is_some() {
            return Ok(());
        }

        let mut operations = Vec::with_capacity(self.items.len());
        for item in &self.items {
            match item {
                TxItem::Operation(op) => operations.push(op.clone()),
                TxItem::Proposal(proposal) => {
                    if let Some(op) = proposal.materialize(&self.instance).await? {
                        operations.push(op);
                    }
                }
            }
        }

        if !operations.is_empty() {
            let fee_asset = self.fee_asset_id().await?.to_string();
            let encoded: Vec<Value> = operations.iter().map(Operation::to_json).collect();
            let fees = self
                .instance
                .rpc()
                .get_required_fees(&encoded, &fee_asset)
                .await?;
            if fees.len() != operations.len() {
                return Err(ChainError::Rpc(format!(
                    "expected {} fees, node returned {}",
                    operations.len(),
                    fees.len()
                )));
            }
            for (op, fee) in operations.iter_mut().zip(&fees) {
                op.apply_fee(fee)?;
            }
        }

        let properties = self.instance.rpc().get_dynamic_global_properties().await?;
        let head_block_number = properties
            .get("head_block_number")
            .and_then(Value::as_u64)
            .ok_or_else(|| ChainError::Rpc("global properties without head_block_number".to_string()))?;
        let head_block_id = properties
            .get("head_block_id")
            .and_then(Value::as_str)
            .ok_or_else(|| ChainError::Rpc("global properties without head_block_id".to_string()))?;
        let (ref_block_num, ref_block_prefix) =
            SignedTransaction::ref_block(head_block_number, head_block_id)?;

        tracing::debug!(
            operations = operations.len(),
            ref_block_num,
            ref_block_prefix,
            "Transaction constructed"
        );
        self.tx = Some(SignedTransaction::new(
            ref_block_num,
            ref_block_prefix,
            TimePointSec::from_now(self.expiration_secs),
            operations,
        ));
        Ok(())
    }

    /// Wallet keys the node reports as potentially required.
    async fn potential_signers(&self, tx: &Value) -> ChainResult<Vec<PrivateKey>> {
        let wallet = self.instance.wallet();
        let candidates = self.instance.rpc().get_potential_signatures(tx).await?;
        Ok(candidates
            .iter()
            .filter_map(|key| PublicKey::parse_with_prefix(key, wallet.prefix()).ok())
            .filter_map(|key| wallet.get_private_key(&key).ok())
            .collect())
    }

    /// Sign the transaction, constructing it first if needed.
    ///
    /// Without explicit signers the wallet keys the node reports as
    /// potential signatures are used, then the active authorities the
    /// operations require. Signing an already signed transaction is a no-op.
    pub async fn sign(&mut self) -> ChainResult<()> {
        if self.is_signed() {
            return Ok(());
        }
        self.construct().await?;

        if self.signers.is_empty() {
            let tx = self.transaction_json()?;
            for key in self.potential_signers(&tx).await? {
                self.add_signer(key);
            }
        }
        if self.signers.is_empty() {
            let required: Vec<ObjectId> = self
                .tx
                .iter()
                .flat_map(|tx| tx.operations.iter())
                .flat_map(Operation::required_active_authorities)
                .collect();
            for account in dedup(required) {
                self.append_signer(&account.to_string(), Permission::Active).await?;
            }
        }
        if self.signers.is_empty() {
            return Err(ChainError::MissingKey("no signing keys available".to_string()));
        }

        let chain_id = self.instance.chain_id().await?;
        let keys: Vec<PrivateKey> = self.signers.iter().map(|(_, key)| key.clone()).collect();
        let tx = self
            .tx
            .as_mut()
            .ok_or_else(|| ChainError::malformed("transaction not constructed"))?;
        tx.sign(&keys, &chain_id)?;

        metrics::record_transaction("signed");
        tracing::info!(
            operations = tx.operations.len(),
            signatures = tx.signatures.len(),
            "Transaction signed"
        );
        Ok(())
    }

    fn transaction_json(&self) -> ChainResult<Value> {
        let tx = self
            .tx
            .as_ref()
            .ok_or_else(|| ChainError::malformed("transaction not constructed"))?;
        serde_json::to_value(tx).map_err(|e| ChainError::malformed(format!("transaction json: {}", e)))
    }

    /// Wire JSON of the transaction, constructing it first if needed.
    pub async fn json(&mut self) -> ChainResult<Value> {
        self.construct().await?;
        self.transaction_json()
    }

    /// The constructed transaction, if any.
    pub fn transaction(&self) -> Option<&SignedTransaction> {
        self.tx.as_ref()
    }

    /// Sign if needed and send to the node, then reset the builder.
    ///
    /// With `nobroadcast` set the signed transaction is returned instead of
    /// being sent.
    pub async fn broadcast(&mut self) -> ChainResult<Value> {
        self.sign().await?;
        let tx = self.transaction_json()?;

        if self.instance.nobroadcast() {
            tracing::info!("Not broadcasting, nobroadcast is set");
            self.clear();
            return Ok(tx);
        }

        let result = self.instance.rpc().broadcast_transaction(&tx).await;
        self.clear();
        let result = result?;
        metrics::record_transaction("broadcast");
        tracing::info!(operations = tx["operations"].as_array().map_or(0, Vec::len), "Transaction broadcast");
        Ok(result)
    }

    /// Drop items, signers and any constructed transaction.
    pub fn clear(&mut self) {
        self.items.clear();
        self.signers.clear();
        self.tx = None;
    }

    pub fn is_signed(&self) -> bool {
        self.tx.as_ref().map_or(false, SignedTransaction::is_signed)
    }
}

fn dedup(ids: Vec<ObjectId>) -> Vec<ObjectId> {
    let mut unique: Vec<ObjectId> = Vec::with_capacity(ids.len());
    for id in ids {
        if !unique.contains(&id) {
            unique.push(id);
        }
    }
    unique
}

/// Wallet keys for `permission` of `account` with their weights.
fn fetch_keys(
    instance: &BlockchainInstance,
    account: Account,
    permission: Permission,
    level: u8,
    threshold: u32,
) -> KeysFuture<'_> {
    Box::pin(async move {
        if level > MAX_AUTHORITY_DEPTH {
            return Ok(Vec::new());
        }

        let wallet = instance.wallet();
        let authority = account.authority(permission).clone();
        let mut keys = Vec::new();
        for (key, weight) in &authority.key_auths {
            let Ok(public_key) = PublicKey::parse_with_prefix(key, wallet.prefix()) else {
                continue;
            };
            if let Ok(private_key) = wallet.get_private_key(&public_key) {
                keys.push((private_key, *weight));
            }
        }

        let weight: u32 = keys.iter().map(|(_, w)| u32::from(*w)).sum();
        if weight < threshold {
            for (account_id, _) in &authority.account_auths {
                tracing::debug!(account = %account.name(), via = %account_id, "Following account authority");
                let authorizer = Account::new(&account_id.to_string(), Some(instance)).await?;
                keys.extend(fetch_keys(instance, authorizer, permission, level + 1, threshold).await?);
            }
        }
        Ok(keys)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::memory::MemoryRpc;
    use crate::config::ClientConfig;
    use crate::protocol::operations::{OperationKind, Transfer};
    use crate::protocol::types::AssetAmount;
    use serde_json::json;
    use std::sync::Arc;

    const WIF: &str = "5KQwrPbwdL6PhXujxW37FSSQZ1JiwsST4cqQzDeyXtP79zkvFD3";
    const PUBKEY: &str = "TUSC6MRyAjQq8ud7hVNYcfnVPJqcVpscN5So8BhtHuGYqET5GDW5CV";

    fn authority(keys: &[&str], accounts: &[&str]) -> Value {
        json!({
            "weight_threshold": 1,
            "key_auths": keys.iter().map(|k| json!([k, 1])).collect::<Vec<_>>(),
            "account_auths": accounts.iter().map(|a| json!([a, 1])).collect::<Vec<_>>(),
        })
    }

    fn setup(config: ClientConfig) -> (Arc<MemoryRpc>, BlockchainInstance) {
        let rpc = Arc::new(MemoryRpc::default());
        rpc.add_object(json!({
            "id": "1.2.100", "name": "init0",
            "owner": authority(&[PUBKEY], &[]), "active": authority(&[PUBKEY], &[]),
        }))
        .unwrap();
        rpc.add_object(json!({
            "id": "1.2.101", "name": "multisig",
            "owner": authority(&[], &["1.2.100"]), "active": authority(&[], &["1.2.100"]),
        }))
        .unwrap();
        rpc.add_object(json!({"id": "1.3.0", "symbol": "TUSC", "precision": 5})).unwrap();
        let instance = BlockchainInstance::new(config, rpc.clone());
        (rpc, instance)
    }

    fn transfer(amount: i64) -> Transfer {
        Transfer::new(
            ObjectId::protocol(2, 100),
            ObjectId::protocol(2, 101),
            AssetAmount::new(amount, ObjectId::protocol(3, 0)),
        )
    }

    fn op_ids(json: &Value) -> Vec<u64> {
        json["operations"]
            .as_array()
            .unwrap()
            .iter()
            .map(|op| op[0].as_u64().unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_items_keep_creation_order() {
        let (_, instance) = setup(ClientConfig::default());
        let mut tx = instance.new_tx();
        tx.append_op(transfer(1)).unwrap();
        let proposal = tx.new_proposal("init0", 3600, None).unwrap();
        let empty = tx.new_proposal("init0", 3600, None).unwrap();
        tx.append_op(transfer(2)).unwrap();
        tx.proposal_mut(proposal).unwrap().append_ops(vec![transfer(3), transfer(4)]);

        assert_eq!(tx.len(), 4);
        assert!(tx.proposal(empty).unwrap().is_empty());
        let json = tx.json().await.unwrap();
        assert_eq!(op_ids(&json), vec![0, 22, 0]);
        assert_eq!(json["operations"][1][1]["proposed_ops"][1]["op"][1]["amount"]["amount"], 4);
    }

    #[tokio::test]
    async fn test_construct_sets_fees_and_ref_block() {
        let (rpc, instance) = setup(ClientConfig::default());
        rpc.set_fee(OperationKind::Transfer.id(), 2000);
        rpc.set_fee(OperationKind::ProposalCreate.id(), 500);

        let mut tx = instance.new_tx();
        tx.append_op(transfer(1)).unwrap();
        let handle = tx.new_proposal("init0", 3600, None).unwrap();
        tx.proposal_mut(handle).unwrap().append_op(transfer(2));
        let json = tx.json().await.unwrap();

        assert_eq!(json["ref_block_num"], 1);
        assert_eq!(
            json["ref_block_prefix"],
            u32::from_le_bytes([0x3f, 0x2c, 0x1e, 0x9b])
        );
        assert_eq!(json["operations"][0][1]["fee"]["amount"], 2000);
        assert_eq!(json["operations"][1][1]["fee"]["amount"], 500);
        assert_eq!(json["operations"][1][1]["proposed_ops"][0]["op"][1]["fee"]["amount"], 2000);
        assert_eq!(json["signatures"], json!([]));
    }

    #[tokio::test]
    async fn test_sign_without_keys() {
        let (_, instance) = setup(ClientConfig::default());
        let mut tx = instance.new_tx();
        tx.append_op(transfer(1)).unwrap();
        assert!(matches!(tx.sign().await, Err(ChainError::MissingKey(_))));
        assert!(!tx.is_signed());
    }

    #[tokio::test]
    async fn test_signed_transaction_is_frozen() {
        let (_, instance) = setup(ClientConfig::default());
        let mut tx = instance.new_tx();
        tx.append_op(transfer(1)).unwrap();
        tx.append_wif(WIF).unwrap();
        tx.sign().await.unwrap();
        assert!(tx.is_signed());

        assert!(matches!(tx.append_op(transfer(2)), Err(ChainError::AlreadySigned)));
        assert!(matches!(tx.new_proposal("init0", 60, None), Err(ChainError::AlreadySigned)));
        assert!(matches!(tx.set_expiration(60), Err(ChainError::AlreadySigned)));

        tx.clear();
        assert!(tx.is_empty());
        tx.append_op(transfer(2)).unwrap();
    }

    #[tokio::test]
    async fn test_append_signer_follows_account_authorities() {
        let (_, instance) = setup(ClientConfig::default());
        instance.wallet().add_private_key(WIF).unwrap();

        let mut tx = instance.new_tx();
        tx.append_op(transfer(1)).unwrap();
        tx.append_signer("multisig", Permission::Active).await.unwrap();
        tx.sign().await.unwrap();
        assert_eq!(tx.transaction().unwrap().signatures.len(), 1);
    }

    #[tokio::test]
    async fn test_append_signer_without_wallet_key() {
        let (_, instance) = setup(ClientConfig::default());
        let mut tx = instance.new_tx();
        assert!(matches!(
            tx.append_signer("init0", Permission::Owner).await,
            Err(ChainError::MissingKey(_))
        ));
    }

    #[tokio::test]
    async fn test_sign_falls_back_to_required_authorities() {
        let (_, instance) = setup(ClientConfig::default());
        instance.wallet().add_private_key(WIF).unwrap();
        let mut tx = instance.new_tx();
        tx.append_op(transfer(1)).unwrap();
        tx.sign().await.unwrap();
        assert!(tx.is_signed());
    }

    #[tokio::test]
    async fn test_broadcast_clears() {
        let (rpc, instance) = setup(ClientConfig::default());
        rpc.set_potential_signatures(vec![PUBKEY.to_string()]);
        instance.wallet().add_private_key(WIF).unwrap();

        let mut tx = instance.new_tx();
        tx.append_op(transfer(1)).unwrap();
        tx.broadcast().await.unwrap();

        let sent = rpc.broadcasts();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0]["signatures"].as_array().unwrap().len(), 1);
        assert!(tx.is_empty());
        assert!(tx.transaction().is_none());
    }

    #[tokio::test]
    async fn test_nobroadcast() {
        let mut config = ClientConfig::default();
        config.transactions.nobroadcast = true;
        let (rpc, instance) = setup(config);

        let mut tx = instance.new_tx();
        tx.append_op(transfer(1)).unwrap();
        tx.append_wif(WIF).unwrap();
        let json = tx.broadcast().await.unwrap();

        assert!(rpc.broadcasts().is_empty());
        assert_eq!(op_ids(&json), vec![0]);
        assert_eq!(json["signatures"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_fee_asset_by_symbol() {
        let (_, instance) = setup(ClientConfig::default());
        let mut tx = instance.new_tx();
        tx.set_fee_asset("TUSC").unwrap();
        tx.append_op(transfer(1)).unwrap();
        let json = tx.json().await.unwrap();
        assert_eq!(json["operations"][0][1]["fee"]["asset_id"], "1.3.0");

        tx.set_fee_asset("NOPE").unwrap();
        assert!(matches!(tx.json().await, Err(ChainError::NotFound { .. })));
    }
}
