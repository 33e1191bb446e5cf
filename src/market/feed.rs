//! Price feeds and margin call prices of market-pegged assets.

use serde_json::Value;
use std::fmt;

use crate::blockchain::types::{ChainError, ChainResult, ObjectId};
use crate::market::order::field;
use crate::market::{Amount, AssetResolver, Price};
use crate::protocol::types::TimePointSec;

/// Price from a `{"base", "quote"}` mapping, or `None` for the null price
/// (both amounts zero) a feed carries before its first publication.
async fn feed_price(value: Option<&Value>, resolver: &dyn AssetResolver) -> ChainResult<Option<Price>> {
    let Some(value) = value else {
        return Ok(None);
    };
    let (Some(base), Some(quote)) = (value.get("base"), value.get("quote")) else {
        return Err(ChainError::malformed(format!("price needs base and quote: {}", value)));
    };
    let base = Amount::from_value(base, resolver).await?;
    let quote = Amount::from_value(quote, resolver).await?;
    if base.amount() == 0 && quote.amount() == 0 {
        return Ok(None);
    }
    Price::new(quote, base).map(Some)
}

/// A feed published by a producer for a market-pegged asset.
#[derive(Debug, Clone)]
pub struct PriceFeed {
    producer: Option<ObjectId>,
    date: Option<TimePointSec>,
    maintenance_collateral_ratio: u16,
    maximum_short_squeeze_ratio: u16,
    settlement_price: Option<Price>,
    core_exchange_rate: Option<Price>,
}

impl PriceFeed {
    /// Parse either a bare feed object or a published entry of the form
    /// `[producer, [date, feed]]`.
    pub async fn new(feed: &Value, resolver: &dyn AssetResolver) -> ChainResult<Self> {
        let (producer, date, body) = match feed {
            Value::Array(entry) if entry.len() == 2 => {
                let bad = || ChainError::malformed(format!("invalid published feed: {}", feed));
                let producer: ObjectId = entry[0].as_str().ok_or_else(bad)?.parse()?;
                let published = entry[1].as_array().filter(|p| p.len() == 2).ok_or_else(bad)?;
                let date: TimePointSec = published[0].as_str().ok_or_else(bad)?.parse()?;
                (Some(producer), Some(date), &published[1])
            }
            Value::Object(_) => (None, None, feed),
            other => return Err(ChainError::malformed(format!("invalid price feed: {}", other))),
        };

        let ratio = |key: &str| -> ChainResult<u16> {
            field::<u16>(body, key)?.ok_or_else(|| ChainError::malformed(format!("price feed lacks {}", key)))
        };

        Ok(Self {
            producer,
            date,
            maintenance_collateral_ratio: ratio("maintenance_collateral_ratio")?,
            maximum_short_squeeze_ratio: ratio("maximum_short_squeeze_ratio")?,
            settlement_price: feed_price(body.get("settlement_price"), resolver).await?,
            core_exchange_rate: feed_price(body.get("core_exchange_rate"), resolver).await?,
        })
    }

    /// All feeds published in a bitasset data object (`2.4.x`).
    pub async fn from_bitasset_data(data: &Value, resolver: &dyn AssetResolver) -> ChainResult<Vec<Self>> {
        let Some(feeds) = data.get("feeds").and_then(Value::as_array) else {
            return Ok(Vec::new());
        };
        let mut parsed = Vec::with_capacity(feeds.len());
        for feed in feeds {
            parsed.push(Self::new(feed, resolver).await?);
        }
        Ok(parsed)
    }

    pub fn producer(&self) -> Option<ObjectId> {
        self.producer
    }

    pub fn date(&self) -> Option<TimePointSec> {
        self.date
    }

    /// In per mille.
    pub fn maintenance_collateral_ratio(&self) -> u16 {
        self.maintenance_collateral_ratio
    }

    /// In per mille.
    pub fn maximum_short_squeeze_ratio(&self) -> u16 {
        self.maximum_short_squeeze_ratio
    }

    pub fn settlement_price(&self) -> Option<&Price> {
        self.settlement_price.as_ref()
    }

    pub fn core_exchange_rate(&self) -> Option<&Price> {
        self.core_exchange_rate.as_ref()
    }
}

/// A call order update whose base and quote describe the call price.
#[derive(Debug, Clone)]
pub struct UpdateCallOrder {
    call_price: Price,
    data: Value,
}

impl UpdateCallOrder {
    pub async fn new(call: &Value, resolver: &dyn AssetResolver) -> ChainResult<Self> {
        let call_price = call
            .get("call_price")
            .ok_or_else(|| ChainError::malformed(format!("call order without call_price: {}", call)))?;
        Ok(Self {
            call_price: Price::from_value(call_price, resolver).await?,
            data: call.clone(),
        })
    }

    pub fn call_price(&self) -> &Price {
        &self.call_price
    }

    pub fn base(&self) -> &Amount {
        self.call_price.base()
    }

    pub fn quote(&self) -> &Amount {
        self.call_price.quote()
    }

    pub fn raw(&self) -> &Value {
        &self.data
    }
}

impl fmt::Display for UpdateCallOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Margin Call: {} {} @ {}",
            self.call_price.quote(),
            self.call_price.base(),
            self.call_price
        )
    }
}
