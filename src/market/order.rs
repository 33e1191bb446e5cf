//! Open and filled orders.

use serde_json::Value;
use std::fmt;

use crate::blockchain::instance::BlockchainInstance;
use crate::blockchain::types::{ChainError, ChainResult, ObjectId};
use crate::market::{Amount, AssetResolver, Price};
use crate::protocol::types::TimePointSec;

static NULL: Value = Value::Null;

/// Direction of a fill relative to the base asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderSide::Buy => f.write_str("buy"),
            OrderSide::Sell => f.write_str("sell"),
        }
    }
}

pub(crate) fn field<T: serde::de::DeserializeOwned>(value: &Value, key: &str) -> ChainResult<Option<T>> {
    match value.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => T::deserialize(v)
            .map(Some)
            .map_err(|e| ChainError::malformed(format!("invalid order field '{}': {}", key, e))),
    }
}

/// A limit order whose amounts are the actual order sizes.
///
/// An order looked up by id that no longer exists is marked `deleted` and
/// carries no price, seller or amounts.
#[derive(Debug, Clone)]
pub struct Order {
    id: Option<ObjectId>,
    price: Option<Price>,
    seller: Option<ObjectId>,
    expiration: Option<TimePointSec>,
    for_sale: Option<Amount>,
    deleted: bool,
    data: Value,
}

impl Order {
    /// Look up a `1.7.x` limit order.
    pub async fn from_id(id: &str, instance: Option<&BlockchainInstance>) -> ChainResult<Self> {
        let instance = BlockchainInstance::resolve(instance)?;
        let order_id: ObjectId = id.parse()?;

        match instance.rpc().get_object(id).await? {
            Some(object) => Self::from_object(&object, &instance).await,
            None => {
                tracing::debug!(order = %order_id, "Order no longer exists");
                Ok(Self {
                    id: Some(order_id),
                    price: None,
                    seller: None,
                    expiration: None,
                    for_sale: None,
                    deleted: true,
                    data: Value::Null,
                })
            }
        }
    }

    /// Wrap a limit order object carrying `sell_price` and `for_sale`.
    pub async fn from_object(object: &Value, resolver: &dyn AssetResolver) -> ChainResult<Self> {
        let sell_price = object
            .get("sell_price")
            .ok_or_else(|| ChainError::malformed("limit order without sell_price"))?;
        let price = Price::from_value(sell_price, resolver).await?;

        let for_sale = match object.get("for_sale") {
            None | Some(Value::Null) => None,
            Some(raw) => {
                let amount = match raw {
                    Value::String(s) => s.parse::<i64>().ok(),
                    other => other.as_i64(),
                }
                .ok_or_else(|| ChainError::malformed(format!("invalid for_sale: {}", raw)))?;
                Some(Amount::from_raw(amount, price.base().asset().clone()))
            }
        };

        Ok(Self {
            id: field(object, "id")?,
            seller: field(object, "seller")?,
            expiration: field(object, "expiration")?,
            for_sale,
            price: Some(price),
            deleted: false,
            data: object.clone(),
        })
    }

    /// Order described by a `limit_order_create` payload.
    pub async fn from_operation(op: &Value, resolver: &dyn AssetResolver) -> ChainResult<Self> {
        let (Some(to_sell), Some(to_receive)) = (op.get("amount_to_sell"), op.get("min_to_receive")) else {
            return Err(ChainError::malformed("order needs amount_to_sell and min_to_receive"));
        };
        let base = Amount::from_value(to_sell, resolver).await?;
        let quote = Amount::from_value(to_receive, resolver).await?;

        Ok(Self {
            id: None,
            seller: field(op, "seller")?,
            expiration: field(op, "expiration")?,
            for_sale: None,
            price: Some(Price::new(quote, base)?),
            deleted: false,
            data: op.clone(),
        })
    }

    pub fn from_price(price: Price) -> Self {
        Self {
            id: None,
            price: Some(price),
            seller: None,
            expiration: None,
            for_sale: None,
            deleted: false,
            data: Value::Null,
        }
    }

    pub fn id(&self) -> Option<ObjectId> {
        self.id
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    pub fn price(&self) -> Option<&Price> {
        self.price.as_ref()
    }

    pub fn base(&self) -> Option<&Amount> {
        self.price.as_ref().map(Price::base)
    }

    pub fn quote(&self) -> Option<&Amount> {
        self.price.as_ref().map(Price::quote)
    }

    pub fn seller(&self) -> Option<ObjectId> {
        self.seller
    }

    pub fn expiration(&self) -> Option<TimePointSec> {
        self.expiration
    }

    /// Remaining amount for sale, in the base asset.
    pub fn for_sale(&self) -> Option<&Amount> {
        self.for_sale.as_ref()
    }

    pub fn raw(&self) -> &Value {
        &self.data
    }
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(price) = &self.price else {
            let id = self.id.map(|id| id.to_string()).unwrap_or_default();
            return write!(f, "deleted order {}", id);
        };
        match &self.for_sale {
            Some(for_sale) => match price.invert().convert(for_sale) {
                Ok(quote) => write!(f, "{} for {} @ {}", quote, for_sale, price),
                Err(_) => write!(f, "{} @ {}", for_sale, price),
            },
            None => write!(f, "{} for {} @ {}", price.quote(), price.base(), price),
        }
    }
}

/// A fill taken from account or market history.
///
/// Fills from account history carry the actual amounts exchanged. Market
/// history entries only carry the trade price, so base and quote form the
/// ratio.
#[derive(Debug, Clone)]
pub struct FilledOrder {
    price: Price,
    side: Option<OrderSide>,
    time: Option<TimePointSec>,
    account_id: Option<ObjectId>,
    data: Value,
}

impl FilledOrder {
    /// Build from a `fill_order` payload or a history entry wrapping one in
    /// `op`. `base_asset` defaults to the received asset.
    pub async fn new(
        fill: &Value,
        base_asset: Option<ObjectId>,
        resolver: &dyn AssetResolver,
    ) -> ChainResult<Self> {
        let order = match fill.get("op") {
            Some(Value::Array(op)) => op.get(1).unwrap_or(&NULL),
            Some(op @ Value::Object(_)) => op,
            _ => fill,
        };
        let (price, side) = Price::from_fill(order, base_asset, resolver).await?;

        Ok(Self {
            price,
            side: Some(side),
            time: field(fill, "time")?.or(field(order, "time")?),
            account_id: field(order, "account_id")?,
            data: order.clone(),
        })
    }

    /// Build from a market history entry with `price` and `date`.
    pub async fn from_trade(
        entry: &Value,
        base: &str,
        quote: &str,
        resolver: &dyn AssetResolver,
    ) -> ChainResult<Self> {
        let base = resolver.resolve_asset(base).await?;
        let quote = resolver.resolve_asset(quote).await?;
        let price = match entry.get("price") {
            Some(Value::String(s)) => Price::from_decimal(s, base, quote)?,
            Some(Value::Number(n)) => {
                let ratio = n
                    .as_f64()
                    .ok_or_else(|| ChainError::malformed(format!("invalid trade price {}", n)))?;
                Price::from_f64(ratio, base, quote)?
            }
            _ => return Err(ChainError::malformed(format!("trade without price: {}", entry))),
        };
        let side = match entry.get("type").and_then(Value::as_str) {
            Some("buy") => Some(OrderSide::Buy),
            Some("sell") => Some(OrderSide::Sell),
            _ => None,
        };

        Ok(Self {
            price,
            side,
            time: field(entry, "date")?,
            account_id: field(entry, "side1_account_id")?,
            data: entry.clone(),
        })
    }

    pub fn price(&self) -> &Price {
        &self.price
    }

    pub fn base(&self) -> &Amount {
        self.price.base()
    }

    pub fn quote(&self) -> &Amount {
        self.price.quote()
    }

    pub fn side(&self) -> Option<OrderSide> {
        self.side
    }

    pub fn time(&self) -> Option<TimePointSec> {
        self.time
    }

    pub fn account_id(&self) -> Option<ObjectId> {
        self.account_id
    }

    pub fn raw(&self) -> &Value {
        &self.data
    }
}

impl fmt::Display for FilledOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(time) = self.time {
            write!(f, "({}) ", time)?;
        }
        if let Some(side) = self.side {
            write!(f, "{} ", side)?;
        }
        write!(f, "{} for {} @ {}", self.price.quote(), self.price.base(), self.price)
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
        rpc.add_object(json!({"id": "1.3.0", "symbol": "TUSC", "precision": 5})).unwrap();
        rpc.add_object(json!({"id": "1.3.121", "symbol": "USD", "precision": 4})).unwrap();
        rpc.add_object(json!({
            "id": "1.7.1",
            "seller": "1.2.100",
            "for_sale": "50000",
            "expiration": "2030-01-01T00:00:00",
            "sell_price": {
                "base": {"amount": 10000, "asset_id": "1.3.121"},
                "quote": {"amount": 200000, "asset_id": "1.3.0"},
            },
        }))
        .unwrap();
        BlockchainInstance::new(ClientConfig::default(), rpc)
    }

    #[tokio::test]
    async fn test_order_from_id() {
        let instance = instance();
        let order = Order::from_id("1.7.1", Some(&instance)).await.unwrap();
        assert!(!order.is_deleted());
        assert_eq!(order.seller().unwrap().to_string(), "1.2.100");
        assert_eq!(order.for_sale().unwrap().to_string(), "5.0000 USD");
        assert!((order.price().unwrap().price() - 0.5).abs() < 1e-12);
        assert_eq!(order.to_string(), "10.00000 TUSC for 5.0000 USD @ 0.500000000 USD/TUSC");
    }

    #[tokio::test]
    async fn test_missing_order_is_deleted() {
        let instance = instance();
        let order = Order::from_id("1.7.99", Some(&instance)).await.unwrap();
        assert!(order.is_deleted());
        assert!(order.price().is_none());
        assert!(order.base().is_none());
        assert!(order.seller().is_none());
        assert_eq!(order.to_string(), "deleted order 1.7.99");
    }

    #[tokio::test]
    async fn test_order_from_operation() {
        let op = json!({
            "seller": "1.2.100",
            "amount_to_sell": {"amount": 100000, "asset_id": "1.3.0"},
            "min_to_receive": {"amount": 20000, "asset_id": "1.3.121"},
            "expiration": "2030-01-01T00:00:00",
            "fill_or_kill": false,
        });
        let order = Order::from_operation(&op, &instance()).await.unwrap();
        assert_eq!(order.base().unwrap().symbol(), "TUSC");
        assert_eq!(order.quote().unwrap().symbol(), "USD");
        assert!((order.price().unwrap().price() - 0.5).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_filled_order_from_history() {
        let entry = json!({
            "op": [4, {
                "account_id": "1.2.100",
                "pays": {"amount": 10000, "asset_id": "1.3.121"},
                "receives": {"amount": 100000, "asset_id": "1.3.0"},
            }],
            "time": "2020-01-01T00:00:00",
        });
        let base = Some(ObjectId::protocol(3, 0));
        let filled = FilledOrder::new(&entry, base, &instance()).await.unwrap();
        assert_eq!(filled.side(), Some(OrderSide::Sell));
        assert_eq!(filled.base().symbol(), "TUSC");
        assert_eq!(filled.account_id().unwrap().to_string(), "1.2.100");
        assert_eq!(filled.time().unwrap().to_string(), "2020-01-01T00:00:00");

        let usd = Some(ObjectId::protocol(3, 121));
        let filled = FilledOrder::new(&entry, usd, &instance()).await.unwrap();
        assert_eq!(filled.side(), Some(OrderSide::Buy));
        assert_eq!(filled.base().symbol(), "USD");
    }

    #[tokio::test]
    async fn test_filled_order_from_market_history() {
        let entry = json!({
            "sequence": 12,
            "date": "2021-03-04T05:06:07",
            "price": "0.0512",
            "amount": "1000.00000",
            "value": "51.2000",
            "type": "sell",
            "side1_account_id": "1.2.100",
            "side2_account_id": "1.2.101",
        });
        let filled = FilledOrder::from_trade(&entry, "USD", "TUSC", &instance()).await.unwrap();
        assert_eq!(filled.base().symbol(), "USD");
        assert_eq!(filled.quote().symbol(), "TUSC");
        assert!((filled.price().price() - 0.0512).abs() < 1e-12);
        assert_eq!(filled.time().unwrap().to_string(), "2021-03-04T05:06:07");
        assert_eq!(filled.side(), Some(OrderSide::Sell));
        assert_eq!(filled.account_id().unwrap().to_string(), "1.2.100");
        assert!(filled.to_string().starts_with("(2021-03-04T05:06:07) sell "));

        let numeric = json!({"date": "2021-03-04T05:06:07", "price": 0.25});
        let filled = FilledOrder::from_trade(&numeric, "USD", "TUSC", &instance()).await.unwrap();
        assert!(filled.side().is_none());
        assert!((filled.price().price() - 0.25).abs() < 1e-12);

        let no_price = json!({"date": "2021-03-04T05:06:07"});
        assert!(FilledOrder::from_trade(&no_price, "USD", "TUSC", &instance()).await.is_err());
    }
}
