//! Operations and their wire forms.
//!
//! JSON form is `[id, {fields}]`; binary form is the varint id followed by
//! the fields in declaration order.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;
use std::io::{Error, Write};

use crate::blockchain::types::{ChainError, ChainResult, ObjectId};
use crate::blockchain::wallet::PublicKey;
use crate::protocol::encoding::{write_varint, ChainEncode, Extensions};
use crate::protocol::types::{AssetAmount, Memo, TimePointSec};

/// Wire id of `proposal_create`.
pub const PROPOSAL_CREATE_ID: u64 = 22;

macro_rules! operation_kinds {
    ($($variant:ident = $id:literal => $name:literal),* $(,)?) => {
        /// Every operation kind the chain knows, with its stable wire id.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum OperationKind {
            $($variant),*
        }

        impl OperationKind {
            pub const ALL: &'static [OperationKind] = &[$(OperationKind::$variant),*];

            pub fn id(self) -> u64 {
                match self {
                    $(OperationKind::$variant => $id),*
                }
            }

            pub fn name(self) -> &'static str {
                match self {
                    $(OperationKind::$variant => $name),*
                }
            }

            pub fn from_id(id: u64) -> Option<Self> {
                match id {
                    $($id => Some(OperationKind::$variant),)*
                    _ => None,
                }
            }

            pub fn from_name(name: &str) -> Option<Self> {
                match name {
                    $($name => Some(OperationKind::$variant),)*
                    _ => None,
                }
            }
        }
    };
}

operation_kinds! {
    Transfer = 0 => "transfer",
    LimitOrderCreate = 1 => "limit_order_create",
    LimitOrderCancel = 2 => "limit_order_cancel",
    CallOrderUpdate = 3 => "call_order_update",
    FillOrder = 4 => "fill_order",
    AccountCreate = 5 => "account_create",
    AccountUpdate = 6 => "account_update",
    AccountWhitelist = 7 => "account_whitelist",
    AccountUpgrade = 8 => "account_upgrade",
    AccountTransfer = 9 => "account_transfer",
    AssetCreate = 10 => "asset_create",
    AssetUpdate = 11 => "asset_update",
    AssetUpdateBitasset = 12 => "asset_update_bitasset",
    AssetUpdateFeedProducers = 13 => "asset_update_feed_producers",
    AssetIssue = 14 => "asset_issue",
    AssetReserve = 15 => "asset_reserve",
    AssetFundFeePool = 16 => "asset_fund_fee_pool",
    AssetSettle = 17 => "asset_settle",
    AssetGlobalSettle = 18 => "asset_global_settle",
    AssetPublishFeed = 19 => "asset_publish_feed",
    WitnessCreate = 20 => "witness_create",
    WitnessUpdate = 21 => "witness_update",
    ProposalCreate = 22 => "proposal_create",
    ProposalUpdate = 23 => "proposal_update",
    ProposalDelete = 24 => "proposal_delete",
    WithdrawPermissionCreate = 25 => "withdraw_permission_create",
    WithdrawPermissionUpdate = 26 => "withdraw_permission_update",
    WithdrawPermissionClaim = 27 => "withdraw_permission_claim",
    WithdrawPermissionDelete = 28 => "withdraw_permission_delete",
    CommitteeMemberCreate = 29 => "committee_member_create",
    CommitteeMemberUpdate = 30 => "committee_member_update",
    CommitteeMemberUpdateGlobalParameters = 31 => "committee_member_update_global_parameters",
    VestingBalanceCreate = 32 => "vesting_balance_create",
    VestingBalanceWithdraw = 33 => "vesting_balance_withdraw",
    WorkerCreate = 34 => "worker_create",
    Custom = 35 => "custom",
    Assert = 36 => "assert",
    BalanceClaim = 37 => "balance_claim",
    OverrideTransfer = 38 => "override_transfer",
    TransferToBlind = 39 => "transfer_to_blind",
    BlindTransfer = 40 => "blind_transfer",
    TransferFromBlind = 41 => "transfer_from_blind",
    AssetSettleCancel = 42 => "asset_settle_cancel",
    AssetClaimFees = 43 => "asset_claim_fees",
    FbaDistribute = 44 => "fba_distribute",
    BidCollateral = 45 => "bid_collateral",
    ExecuteBid = 46 => "execute_bid",
    AssetClaimPool = 47 => "asset_claim_pool",
    AssetUpdateIssuer = 48 => "asset_update_issuer",
    HtlcCreate = 49 => "htlc_create",
    HtlcRedeem = 50 => "htlc_redeem",
    HtlcRedeemed = 51 => "htlc_redeemed",
    HtlcExtend = 52 => "htlc_extend",
    HtlcRefund = 53 => "htlc_refund",
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    pub fee: AssetAmount,
    pub from: ObjectId,
    pub to: ObjectId,
    pub amount: AssetAmount,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memo: Option<Memo>,
    #[serde(default)]
    pub extensions: Extensions,
}

impl Transfer {
    /// Transfer with a zero placeholder fee in the amount's asset.
    pub fn new(from: ObjectId, to: ObjectId, amount: AssetAmount) -> Self {
        Self {
            fee: AssetAmount::zero(amount.asset_id),
            from,
            to,
            amount,
            memo: None,
            extensions: Extensions,
        }
    }
}

impl ChainEncode for Transfer {
    fn encode<W: Write>(&self, w: &mut W) -> Result<usize, Error> {
        Ok(self.fee.encode(w)?
            + self.from.encode(w)?
            + self.to.encode(w)?
            + self.amount.encode(w)?
            + self.memo.encode(w)?
            + self.extensions.encode(w)?)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitOrderCreate {
    pub fee: AssetAmount,
    pub seller: ObjectId,
    pub amount_to_sell: AssetAmount,
    pub min_to_receive: AssetAmount,
    pub expiration: TimePointSec,
    #[serde(default)]
    pub fill_or_kill: bool,
    #[serde(default)]
    pub extensions: Extensions,
}

impl LimitOrderCreate {
    /// Order that is not fill-or-kill, with a zero placeholder fee in the
    /// asset being sold.
    pub fn new(
        seller: ObjectId,
        amount_to_sell: AssetAmount,
        min_to_receive: AssetAmount,
        expiration: TimePointSec,
    ) -> Self {
        Self {
            fee: AssetAmount::zero(amount_to_sell.asset_id),
            seller,
            amount_to_sell,
            min_to_receive,
            expiration,
            fill_or_kill: false,
            extensions: Extensions,
        }
    }
}

impl ChainEncode for LimitOrderCreate {
    fn encode<W: Write>(&self, w: &mut W) -> Result<usize, Error> {
        Ok(self.fee.encode(w)?
            + self.seller.encode(w)?
            + self.amount_to_sell.encode(w)?
            + self.min_to_receive.encode(w)?
            + self.expiration.encode(w)?
            + self.fill_or_kill.encode(w)?
            + self.extensions.encode(w)?)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitOrderCancel {
    pub fee: AssetAmount,
    pub fee_paying_account: ObjectId,
    pub order: ObjectId,
    #[serde(default)]
    pub extensions: Extensions,
}

impl ChainEncode for LimitOrderCancel {
    fn encode<W: Write>(&self, w: &mut W) -> Result<usize, Error> {
        Ok(self.fee.encode(w)?
            + self.fee_paying_account.encode(w)?
            + self.order.encode(w)?
            + self.extensions.encode(w)?)
    }
}

/// An operation nested in a proposal, `{"op": [id, {fields}]}` in JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposedOperation {
    pub op: Operation,
}

impl ChainEncode for ProposedOperation {
    fn encode<W: Write>(&self, w: &mut W) -> Result<usize, Error> {
        self.op.encode(w)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalCreate {
    pub fee: AssetAmount,
    pub fee_paying_account: ObjectId,
    pub expiration_time: TimePointSec,
    pub proposed_ops: Vec<ProposedOperation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review_period_seconds: Option<u32>,
    #[serde(default)]
    pub extensions: Extensions,
}

impl ChainEncode for ProposalCreate {
    fn encode<W: Write>(&self, w: &mut W) -> Result<usize, Error> {
        Ok(self.fee.encode(w)?
            + self.fee_paying_account.encode(w)?
            + self.expiration_time.encode(w)?
            + self.proposed_ops.encode(w)?
            + self.review_period_seconds.encode(w)?
            + self.extensions.encode(w)?)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalUpdate {
    pub fee: AssetAmount,
    pub fee_paying_account: ObjectId,
    pub proposal: ObjectId,
    #[serde(default)]
    pub active_approvals_to_add: Vec<ObjectId>,
    #[serde(default)]
    pub active_approvals_to_remove: Vec<ObjectId>,
    #[serde(default)]
    pub owner_approvals_to_add: Vec<ObjectId>,
    #[serde(default)]
    pub owner_approvals_to_remove: Vec<ObjectId>,
    #[serde(default)]
    pub key_approvals_to_add: Vec<PublicKey>,
    #[serde(default)]
    pub key_approvals_to_remove: Vec<PublicKey>,
    #[serde(default)]
    pub extensions: Extensions,
}

impl ChainEncode for ProposalUpdate {
    fn encode<W: Write>(&self, w: &mut W) -> Result<usize, Error> {
        Ok(self.fee.encode(w)?
            + self.fee_paying_account.encode(w)?
            + self.proposal.encode(w)?
            + self.active_approvals_to_add.encode(w)?
            + self.active_approvals_to_remove.encode(w)?
            + self.owner_approvals_to_add.encode(w)?
            + self.owner_approvals_to_remove.encode(w)?
            + self.key_approvals_to_add.encode(w)?
            + self.key_approvals_to_remove.encode(w)?
            + self.extensions.encode(w)?)
    }
}

/// An operation the builder can encode and sign.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Transfer(Transfer),
    LimitOrderCreate(LimitOrderCreate),
    LimitOrderCancel(LimitOrderCancel),
    ProposalCreate(ProposalCreate),
    ProposalUpdate(ProposalUpdate),
}

impl Operation {
    pub fn kind(&self) -> OperationKind {
        match self {
            Operation::Transfer(_) => OperationKind::Transfer,
            Operation::LimitOrderCreate(_) => OperationKind::LimitOrderCreate,
            Operation::LimitOrderCancel(_) => OperationKind::LimitOrderCancel,
            Operation::ProposalCreate(_) => OperationKind::ProposalCreate,
            Operation::ProposalUpdate(_) => OperationKind::ProposalUpdate,
        }
    }

    pub fn id(&self) -> u64 {
        self.kind().id()
    }

    pub fn fee(&self) -> &AssetAmount {
        match self {
            Operation::Transfer(op) => &op.fee,
            Operation::LimitOrderCreate(op) => &op.fee,
            Operation::LimitOrderCancel(op) => &op.fee,
            Operation::ProposalCreate(op) => &op.fee,
            Operation::ProposalUpdate(op) => &op.fee,
        }
    }

    pub fn set_fee(&mut self, fee: AssetAmount) {
        match self {
            Operation::Transfer(op) => op.fee = fee,
            Operation::LimitOrderCreate(op) => op.fee = fee,
            Operation::LimitOrderCancel(op) => op.fee = fee,
            Operation::ProposalCreate(op) => op.fee = fee,
            Operation::ProposalUpdate(op) => op.fee = fee,
        }
    }

    /// Apply a fee as returned by `get_required_fees`.
    ///
    /// Proposals receive `[fee, [inner fees]]`; the inner fees are applied
    /// to the proposed operations in order.
    pub fn apply_fee(&mut self, fee: &Value) -> ChainResult<()> {
        let parse = |v: &Value| {
            AssetAmount::deserialize(v).map_err(|e| ChainError::Rpc(format!("invalid fee {}: {}", v, e)))
        };

        match (self, fee) {
            (Operation::ProposalCreate(proposal), Value::Array(parts)) => {
                let outer = parts
                    .first()
                    .ok_or_else(|| ChainError::Rpc("empty proposal fee".to_string()))?;
                proposal.fee = parse(outer)?;
                if let Some(Value::Array(inner)) = parts.get(1) {
                    for (wrapped, fee) in proposal.proposed_ops.iter_mut().zip(inner) {
                        wrapped.op.apply_fee(fee)?;
                    }
                }
                Ok(())
            }
            (op, fee) => {
                op.set_fee(parse(fee)?);
                Ok(())
            }
        }
    }

    /// Accounts whose active authority must approve this operation.
    pub fn required_active_authorities(&self) -> Vec<ObjectId> {
        match self {
            Operation::Transfer(op) => vec![op.from],
            Operation::LimitOrderCreate(op) => vec![op.seller],
            Operation::LimitOrderCancel(op) => vec![op.fee_paying_account],
            Operation::ProposalCreate(op) => vec![op.fee_paying_account],
            Operation::ProposalUpdate(op) => {
                let mut accounts = vec![op.fee_paying_account];
                accounts.extend(&op.active_approvals_to_add);
                accounts.extend(&op.active_approvals_to_remove);
                accounts
            }
        }
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

impl From<Transfer> for Operation {
    fn from(op: Transfer) -> Self {
        Operation::Transfer(op)
    }
}

impl From<LimitOrderCreate> for Operation {
    fn from(op: LimitOrderCreate) -> Self {
        Operation::LimitOrderCreate(op)
    }
}

impl From<LimitOrderCancel> for Operation {
    fn from(op: LimitOrderCancel) -> Self {
        Operation::LimitOrderCancel(op)
    }
}

impl From<ProposalCreate> for Operation {
    fn from(op: ProposalCreate) -> Self {
        Operation::ProposalCreate(op)
    }
}

impl From<ProposalUpdate> for Operation {
    fn from(op: ProposalUpdate) -> Self {
        Operation::ProposalUpdate(op)
    }
}

impl ChainEncode for Operation {
    fn encode<W: Write>(&self, w: &mut W) -> Result<usize, Error> {
        let len = write_varint(w, self.id())?;
        let body = match self {
            Operation::Transfer(op) => op.encode(w)?,
            Operation::LimitOrderCreate(op) => op.encode(w)?,
            Operation::LimitOrderCancel(op) => op.encode(w)?,
            Operation::ProposalCreate(op) => op.encode(w)?,
            Operation::ProposalUpdate(op) => op.encode(w)?,
        };
        Ok(len + body)
    }
}

impl Serialize for Operation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Operation::Transfer(op) => (self.id(), op).serialize(serializer),
            Operation::LimitOrderCreate(op) => (self.id(), op).serialize(serializer),
            Operation::LimitOrderCancel(op) => (self.id(), op).serialize(serializer),
            Operation::ProposalCreate(op) => (self.id(), op).serialize(serializer),
            Operation::ProposalUpdate(op) => (self.id(), op).serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Operation {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let (id, fields) = <(u64, Value)>::deserialize(deserializer)?;
        let kind = OperationKind::from_id(id)
            .ok_or_else(|| D::Error::custom(format!("unknown operation id {}", id)))?;

        let op = match kind {
            OperationKind::Transfer => serde_json::from_value(fields).map(Operation::Transfer),
            OperationKind::LimitOrderCreate => {
                serde_json::from_value(fields).map(Operation::LimitOrderCreate)
            }
            OperationKind::LimitOrderCancel => {
                serde_json::from_value(fields).map(Operation::LimitOrderCancel)
            }
            OperationKind::ProposalCreate => serde_json::from_value(fields).map(Operation::ProposalCreate),
            OperationKind::ProposalUpdate => serde_json::from_value(fields).map(Operation::ProposalUpdate),
            other => return Err(D::Error::custom(format!("unsupported operation {}", other))),
        };
        op.map_err(D::Error::custom)
    }
}
