//! Vesting balances (`1.13.x`).

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::blockchain::instance::BlockchainInstance;
use crate::blockchain::types::{type_ids, ChainError, ChainResult, ObjectId, ObjectKind};
use crate::objects::{decode, load_by_id, refresh_by_id, Refreshable};
use crate::protocol::types::{int_or_string, AssetAmount, TimePointSec};

#[derive(Debug, Clone, Deserialize)]
struct LinearPolicy {
    begin_timestamp: TimePointSec,
    vesting_cliff_seconds: u32,
    vesting_duration_seconds: u32,
    #[serde(deserialize_with = "int_or_string")]
    begin_balance: i64,
}

#[derive(Debug, Clone, Deserialize)]
struct CddPolicy {
    vesting_seconds: u32,
    start_claim: TimePointSec,
    #[serde(deserialize_with = "u128_or_string")]
    coin_seconds_earned: u128,
    coin_seconds_earned_last_update: TimePointSec,
}

fn u128_or_string<'de, D: serde::Deserializer<'de>>(deserializer: D) -> Result<u128, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::String(s) => s.parse().map_err(serde::de::Error::custom),
        Value::Number(n) => n
            .as_u64()
            .map(u128::from)
            .ok_or_else(|| serde::de::Error::custom("negative coin seconds")),
        other => Err(serde::de::Error::custom(format!("invalid coin seconds: {}", other))),
    }
}

/// Vesting schedule of a balance.
#[derive(Debug, Clone)]
enum VestingPolicy {
    Linear(LinearPolicy),
    CoinDaysDestroyed(CddPolicy),
}

#[derive(Deserialize)]
struct VestingFields {
    id: ObjectId,
    owner: ObjectId,
    balance: AssetAmount,
    policy: (u8, Value),
}

#[derive(Debug, Clone)]
pub struct Vesting {
    id: ObjectId,
    owner: ObjectId,
    balance: AssetAmount,
    policy: VestingPolicy,
    data: Value,
    instance: BlockchainInstance,
}

impl Vesting {
    pub async fn new(id: &str, instance: Option<&BlockchainInstance>) -> ChainResult<Self> {
        let instance = BlockchainInstance::resolve(instance)?;
        let data = load_by_id(&instance, id, type_ids::VESTING_BALANCE, ObjectKind::VestingBalance).await?;
        Self::from_value(data, instance)
    }

    fn from_value(data: Value, instance: BlockchainInstance) -> ChainResult<Self> {
        let fields: VestingFields = decode(&data, ObjectKind::VestingBalance)?;
        let policy = match fields.policy {
            (0, p) => VestingPolicy::Linear(decode(&p, ObjectKind::VestingBalance)?),
            (1, p) => VestingPolicy::CoinDaysDestroyed(decode(&p, ObjectKind::VestingBalance)?),
            (other, _) => {
                return Err(ChainError::malformed(format!("unknown vesting policy {}", other)))
            }
        };
        Ok(Self {
            id: fields.id,
            owner: fields.owner,
            balance: fields.balance,
            policy,
            data,
            instance,
        })
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn owner(&self) -> ObjectId {
        self.owner
    }

    pub fn balance(&self) -> AssetAmount {
        self.balance
    }

    /// Amount withdrawable now.
    pub fn claimable(&self) -> AssetAmount {
        self.claimable_at(TimePointSec::now())
    }

    /// Amount withdrawable at `now`.
    pub fn claimable_at(&self, now: TimePointSec) -> AssetAmount {
        let balance = self.balance.amount.max(0);
        let allowed = match &self.policy {
            VestingPolicy::Linear(p) => linear_allowed(p, balance, now),
            VestingPolicy::CoinDaysDestroyed(p) => cdd_allowed(p, balance, now),
        };
        AssetAmount::new(allowed.clamp(0, balance), self.balance.asset_id)
    }

    pub fn raw(&self) -> &Value {
        &self.data
    }
}

fn linear_allowed(p: &LinearPolicy, balance: i64, now: TimePointSec) -> i64 {
    if now <= p.begin_timestamp {
        return 0;
    }
    let elapsed = i128::from(now.seconds() - p.begin_timestamp.seconds());
    if elapsed < i128::from(p.vesting_cliff_seconds) {
        return 0;
    }
    let begin_balance = i128::from(p.begin_balance);
    let duration = i128::from(p.vesting_duration_seconds);
    let vested = if duration == 0 || elapsed >= duration {
        begin_balance
    } else {
        begin_balance * elapsed / duration
    };
    let withdrawn = begin_balance - i128::from(balance);
    (vested - withdrawn).clamp(0, i128::from(balance)) as i64
}

fn cdd_allowed(p: &CddPolicy, balance: i64, now: TimePointSec) -> i64 {
    if now <= p.start_claim {
        return 0;
    }
    if p.vesting_seconds == 0 {
        return balance;
    }
    let balance = balance as u128;
    let delta = u128::from(now.seconds().saturating_sub(p.coin_seconds_earned_last_update.seconds()));
    let max = balance * u128::from(p.vesting_seconds);
    let earned = (p.coin_seconds_earned + balance * delta).min(max);
    (earned / u128::from(p.vesting_seconds)) as i64
}

#[async_trait]
impl Refreshable for Vesting {
    async fn refresh(&mut self) -> ChainResult<()> {
        let data = refresh_by_id(&self.instance, &self.id.to_string(), ObjectKind::VestingBalance).await?;
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

    fn instance() -> BlockchainInstance {
        let rpc = Arc::new(MemoryRpc::default());
        rpc.add_object(json!({
            "id": "1.13.1",
            "owner": "1.2.100",
            "balance": {"amount": 1000, "asset_id": "1.3.0"},
            "policy": [1, {
                "vesting_seconds": 100,
                "start_claim": "1970-01-01T00:00:00",
                "coin_seconds_earned": "0",
                "coin_seconds_earned_last_update": "2020-01-01T00:00:00",
            }],
        }))
        .unwrap();
        rpc.add_object(json!({
            "id": "1.13.2",
            "owner": "1.2.100",
            "balance": {"amount": 800, "asset_id": "1.3.0"},
            "policy": [0, {
                "begin_timestamp": "2020-01-01T00:00:00",
                "vesting_cliff_seconds": 0,
                "vesting_duration_seconds": 100,
                "begin_balance": 1000,
            }],
        }))
        .unwrap();
        BlockchainInstance::new(ClientConfig::default(), rpc)
    }

    #[tokio::test]
    async fn test_cdd_claimable() {
        let vesting = Vesting::new("1.13.1", Some(&instance())).await.unwrap();
        let start: TimePointSec = "2020-01-01T00:00:00".parse().unwrap();

        assert_eq!(vesting.claimable_at(start).amount, 0);
        assert_eq!(vesting.claimable_at(TimePointSec(start.0 + 50)).amount, 500);
        assert_eq!(vesting.claimable_at(TimePointSec(start.0 + 500)).amount, 1000);
    }

    #[tokio::test]
    async fn test_linear_claimable() {
        let vesting = Vesting::new("1.13.2", Some(&instance())).await.unwrap();
        let start: TimePointSec = "2020-01-01T00:00:00".parse().unwrap();

        // 200 already withdrawn
        assert_eq!(vesting.claimable_at(TimePointSec(start.0 + 50)).amount, 300);
        assert_eq!(vesting.claimable_at(TimePointSec(start.0 + 100)).amount, 800);
        assert_eq!(vesting.claimable_at(TimePointSec(start.0 + 10)).amount, 0);
    }
}
