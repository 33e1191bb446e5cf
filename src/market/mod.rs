//! Amount, price and order arithmetic.

pub mod amount;
pub mod feed;
pub mod order;
pub mod price;

pub use amount::{Amount, AssetSpec};
pub use feed::{PriceFeed, UpdateCallOrder};
pub use order::{FilledOrder, Order, OrderSide};
pub use price::Price;

use async_trait::async_trait;

use crate::blockchain::types::{ChainError, ChainResult, ObjectId, ObjectKind};

/// Looks up asset facts by id or symbol.
#[async_trait]
pub trait AssetResolver: Send + Sync {
    async fn resolve_asset(&self, identifier: &str) -> ChainResult<AssetSpec>;
}

/// A fixed asset table, for offline use.
#[async_trait]
impl AssetResolver for Vec<AssetSpec> {
    async fn resolve_asset(&self, identifier: &str) -> ChainResult<AssetSpec> {
        let by_id = identifier.parse::<ObjectId>().ok();
        self.iter()
            .find(|a| Some(a.id) == by_id || a.symbol.eq_ignore_ascii_case(identifier))
            .cloned()
            .ok_or_else(|| ChainError::not_found(ObjectKind::Asset, identifier))
    }
}
