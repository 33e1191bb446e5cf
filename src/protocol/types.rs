//! Primitive protocol types shared by operations and transactions.

use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::io::{Error, Write};
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::blockchain::types::{ChainError, ObjectId};
use crate::blockchain::wallet::PublicKey;
use crate::protocol::encoding::{Bytes, ChainEncode};

const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Raw asset quantity as it appears inside operations: integer amount in the
/// asset's minimal unit plus the asset id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssetAmount {
    #[serde(deserialize_with = "int_or_string")]
    pub amount: i64,
    pub asset_id: ObjectId,
}

impl AssetAmount {
    pub fn new(amount: i64, asset_id: ObjectId) -> Self {
        Self { amount, asset_id }
    }

    /// Zero of the given asset, used as a placeholder fee.
    pub fn zero(asset_id: ObjectId) -> Self {
        Self::new(0, asset_id)
    }
}

impl ChainEncode for AssetAmount {
    fn encode<W: Write>(&self, w: &mut W) -> Result<usize, Error> {
        Ok(self.amount.encode(w)? + self.asset_id.encode(w)?)
    }
}

/// Nodes serialize 64-bit integers either as numbers or as strings.
pub(crate) fn int_or_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum IntOrString {
        Int(i64),
        Str(String),
    }

    match IntOrString::deserialize(deserializer)? {
        IntOrString::Int(v) => Ok(v),
        IntOrString::Str(s) => s.parse().map_err(serde::de::Error::custom),
    }
}

/// Seconds since the Unix epoch, rendered as `YYYY-MM-DDTHH:MM:SS` in JSON.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimePointSec(pub u32);

impl TimePointSec {
    pub fn now() -> Self {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        Self(secs.min(u32::MAX as u64) as u32)
    }

    /// `now() + secs`, saturating.
    pub fn from_now(secs: u32) -> Self {
        Self(Self::now().0.saturating_add(secs))
    }

    pub fn seconds(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for TimePointSec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match DateTime::from_timestamp(self.0 as i64, 0) {
            Some(dt) => write!(f, "{}", dt.format(TIME_FORMAT)),
            None => write!(f, "{}", self.0),
        }
    }
}

impl FromStr for TimePointSec {
    type Err = ChainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim_end_matches('Z');
        let dt = NaiveDateTime::parse_from_str(trimmed, TIME_FORMAT)
            .map_err(|e| ChainError::malformed(format!("invalid time '{}': {}", s, e)))?;
        let secs = dt.and_utc().timestamp();
        u32::try_from(secs)
            .map(TimePointSec)
            .map_err(|_| ChainError::malformed(format!("time out of range '{}'", s)))
    }
}

impl Serialize for TimePointSec {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TimePointSec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

impl ChainEncode for TimePointSec {
    fn encode<W: Write>(&self, w: &mut W) -> Result<usize, Error> {
        self.0.encode(w)
    }
}

/// Memo attached to a transfer. The message is already encrypted; this
/// type only carries it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Memo {
    pub from: PublicKey,
    pub to: PublicKey,
    #[serde(deserialize_with = "u64_or_string")]
    pub nonce: u64,
    pub message: Bytes,
}

fn u64_or_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum U64OrString {
        Int(u64),
        Str(String),
    }

    match U64OrString::deserialize(deserializer)? {
        U64OrString::Int(v) => Ok(v),
        U64OrString::Str(s) => s.parse().map_err(serde::de::Error::custom),
    }
}

impl ChainEncode for Memo {
    fn encode<W: Write>(&self, w: &mut W) -> Result<usize, Error> {
        Ok(self.from.encode(w)? + self.to.encode(w)? + self.nonce.encode(w)? + self.message.encode(w)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::encoding::serialize;

    #[test]
    fn test_time_point_format() {
        let t: TimePointSec = "2015-10-13T14:12:24".parse().unwrap();
        assert_eq!(t.0, 1444745544);
        assert_eq!(t.to_string(), "2015-10-13T14:12:24");
        assert_eq!(serialize(&t).unwrap(), 1444745544u32.to_le_bytes());
        assert!("yesterday".parse::<TimePointSec>().is_err());
    }

    #[test]
    fn test_asset_amount_json() {
        let amount: AssetAmount =
            serde_json::from_str(r#"{"amount": "5555555", "asset_id": "1.3.0"}"#).unwrap();
        assert_eq!(amount.amount, 5555555);

        let json = serde_json::to_value(AssetAmount::zero(ObjectId::protocol(3, 0))).unwrap();
        assert_eq!(json, serde_json::json!({"amount": 0, "asset_id": "1.3.0"}));
    }

    #[test]
    fn test_asset_amount_encoding() {
        let amount = AssetAmount::new(1, ObjectId::protocol(3, 1));
        assert_eq!(serialize(&amount).unwrap(), [1, 0, 0, 0, 0, 0, 0, 0, 1]);
    }
}
