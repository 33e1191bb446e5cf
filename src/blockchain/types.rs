//! Chain-specific types and error definitions.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Kind of chain object a lookup was looking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Object,
    Account,
    Asset,
    CommitteeMember,
    Witness,
    Worker,
    VestingBalance,
    Htlc,
    Block,
    Proposal,
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ObjectKind::Object => "object",
            ObjectKind::Account => "account",
            ObjectKind::Asset => "asset",
            ObjectKind::CommitteeMember => "committee member",
            ObjectKind::Witness => "witness",
            ObjectKind::Worker => "worker",
            ObjectKind::VestingBalance => "vesting balance",
            ObjectKind::Htlc => "htlc",
            ObjectKind::Block => "block",
            ObjectKind::Proposal => "proposal",
        };
        f.write_str(name)
    }
}

/// Errors that can occur during chain operations.
#[derive(Debug, Error)]
pub enum ChainError {
    /// RPC connection or request failed.
    #[error("RPC error: {0}")]
    Rpc(String),

    /// RPC request timed out.
    #[error("RPC timeout after {0} seconds")]
    Timeout(u64),

    /// The requested object does not exist on chain.
    #[error("{kind} {identifier} does not exist")]
    NotFound { kind: ObjectKind, identifier: String },

    /// Arithmetic or comparison across different assets.
    #[error("Asset mismatch: {left} vs {right}")]
    AssetMismatch { left: String, right: String },

    /// A required signing key is not available.
    #[error("Missing private key: {0}")]
    MissingKey(String),

    /// The transaction was mutated after it had been signed.
    #[error("Transaction is already signed; clear it before modifying")]
    AlreadySigned,

    /// Unparseable amount, price, id or operation input.
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    /// No explicit instance given and no shared instance configured.
    #[error("No blockchain instance available")]
    NoInstance,

    /// Invalid private key format or signing error.
    #[error("Wallet error: {0}")]
    Wallet(String),

    /// A signature does not match the key it claims.
    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    /// Chain configuration mismatch.
    #[error("Chain ID mismatch: expected {expected}, got {actual}")]
    ChainMismatch { expected: String, actual: String },

    /// Binary serialization failed.
    #[error("Encoding error: {0}")]
    Encoding(#[from] std::io::Error),
}

impl ChainError {
    pub(crate) fn not_found(kind: ObjectKind, identifier: impl Into<String>) -> Self {
        ChainError::NotFound {
            kind,
            identifier: identifier.into(),
        }
    }

    pub(crate) fn malformed(msg: impl Into<String>) -> Self {
        ChainError::MalformedInput(msg.into())
    }
}

/// Result type for chain operations.
pub type ChainResult<T> = Result<T, ChainError>;

/// Composite object identifier `space.type.instance`, e.g. `1.2.0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId {
    pub space: u8,
    pub type_id: u8,
    pub instance: u64,
}

impl ObjectId {
    pub const fn new(space: u8, type_id: u8, instance: u64) -> Self {
        Self {
            space,
            type_id,
            instance,
        }
    }

    /// Protocol object of the given type (space 1).
    pub const fn protocol(type_id: u8, instance: u64) -> Self {
        Self::new(1, type_id, instance)
    }

    /// True if `s` looks like an object id rather than a name or symbol.
    pub fn is_object_id(s: &str) -> bool {
        s.parse::<ObjectId>().is_ok()
    }

    /// Parse `s` and require the given type id.
    pub fn parse_typed(s: &str, type_id: u8) -> ChainResult<Self> {
        let id: ObjectId = s.parse()?;
        if id.type_id != type_id {
            return Err(ChainError::malformed(format!(
                "expected object of type 1.{}.x, got {}",
                type_id, id
            )));
        }
        Ok(id)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.space, self.type_id, self.instance)
    }
}

impl FromStr for ObjectId {
    type Err = ChainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split('.');
        let (Some(space), Some(type_id), Some(instance), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(ChainError::malformed(format!("invalid object id '{}'", s)));
        };
        let bad = |_| ChainError::malformed(format!("invalid object id '{}'", s));
        Ok(Self {
            space: space.parse().map_err(bad)?,
            type_id: type_id.parse().map_err(bad)?,
            instance: instance.parse().map_err(bad)?,
        })
    }
}

impl Serialize for ObjectId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ObjectId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Protocol object type ids.
pub mod type_ids {
    pub const ACCOUNT: u8 = 2;
    pub const ASSET: u8 = 3;
    pub const COMMITTEE_MEMBER: u8 = 5;
    pub const WITNESS: u8 = 6;
    pub const LIMIT_ORDER: u8 = 7;
    pub const PROPOSAL: u8 = 10;
    pub const VESTING_BALANCE: u8 = 13;
    pub const WORKER: u8 = 14;
    pub const HTLC: u8 = 16;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_id_parse() {
        let id: ObjectId = "1.2.100".parse().unwrap();
        assert_eq!(id, ObjectId::protocol(type_ids::ACCOUNT, 100));
        assert_eq!(id.to_string(), "1.2.100");

        assert!("1.2".parse::<ObjectId>().is_err());
        assert!("1.2.3.4".parse::<ObjectId>().is_err());
        assert!("init0".parse::<ObjectId>().is_err());
        assert!(!ObjectId::is_object_id("TUSC"));
    }

    #[test]
    fn test_parse_typed() {
        assert!(ObjectId::parse_typed("1.5.27", type_ids::COMMITTEE_MEMBER).is_ok());
        assert!(ObjectId::parse_typed("1.2.27", type_ids::COMMITTEE_MEMBER).is_err());
    }

    #[test]
    fn test_error_display() {
        let err = ChainError::Timeout(10);
        assert_eq!(err.to_string(), "RPC timeout after 10 seconds");

        let err = ChainError::not_found(ObjectKind::CommitteeMember, "nathan");
        assert_eq!(err.to_string(), "committee member nathan does not exist");
    }
}
