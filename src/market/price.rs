//! Prices as ratios of two amounts.
//!
//! A price is `base / quote`. All arithmetic is carried out on the raw
//! minimal-unit integers with `i128` intermediates and reduced by their gcd,
//! so chained and inverted prices stay exact.

use serde_json::{json, Value};
use std::cmp::Ordering;
use std::fmt;

use crate::blockchain::types::{ChainError, ChainResult, ObjectId};
use crate::market::amount::{checked_mul, parse_decimal, pow10, to_i64, Amount, AssetSpec};
use crate::market::order::OrderSide;
use crate::market::AssetResolver;

fn gcd(mut a: i128, mut b: i128) -> i128 {
    a = a.abs();
    b = b.abs();
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Price {
    base: Amount,
    quote: Amount,
}

impl Price {
    /// Price from a quote and a base amount; the amounts define the ratio.
    pub fn new(quote: Amount, base: Amount) -> ChainResult<Self> {
        if base.asset().id == quote.asset().id {
            return Err(ChainError::malformed(format!(
                "price needs two different assets, got {} twice",
                base.symbol()
            )));
        }
        Ok(Self { base, quote })
    }

    fn from_raw(base_raw: i128, base: AssetSpec, quote_raw: i128, quote: AssetSpec) -> ChainResult<Self> {
        let divisor = match gcd(base_raw, quote_raw) {
            0 => 1,
            g => g,
        };
        Self::new(
            Amount::from_raw(to_i64(quote_raw / divisor, "price quote")?, quote),
            Amount::from_raw(to_i64(base_raw / divisor, "price base")?, base),
        )
    }

    /// Price of one `quote` expressed in `base`, from a decimal literal.
    pub fn from_decimal(price: &str, base: AssetSpec, quote: AssetSpec) -> ChainResult<Self> {
        let (mantissa, scale) = parse_decimal(price)?;
        if mantissa <= 0 {
            return Err(ChainError::malformed(format!("price must be positive, got '{}'", price)));
        }
        let base_raw = checked_mul(mantissa, pow10(u32::from(base.precision))?, "price base")?;
        let quote_raw = checked_mul(pow10(scale)?, pow10(u32::from(quote.precision))?, "price quote")?;
        Self::from_raw(base_raw, base, quote_raw, quote)
    }

    /// Price from a float ratio and the two assets.
    pub fn from_f64(price: f64, base: AssetSpec, quote: AssetSpec) -> ChainResult<Self> {
        if !price.is_finite() {
            return Err(ChainError::malformed(format!("invalid price {}", price)));
        }
        // Display of f64 is the shortest exact decimal round-trip
        Self::from_decimal(&price.to_string(), base, quote)
    }

    /// Parse `"0.315 USD/TUSC"` (base `USD`, quote `TUSC`).
    pub async fn parse(s: &str, resolver: &dyn AssetResolver) -> ChainResult<Self> {
        let bad = || ChainError::malformed(format!("expected '<price> <BASE>/<QUOTE>', got '{}'", s));
        let (price, market) = s.trim().split_once(char::is_whitespace).ok_or_else(bad)?;
        let (base, quote) = market.trim().split_once('/').ok_or_else(bad)?;
        let base = resolver.resolve_asset(base).await?;
        let quote = resolver.resolve_asset(quote).await?;
        Self::from_decimal(price, base, quote)
    }

    /// Price from a `{"base": {...}, "quote": {...}}` mapping.
    pub async fn from_value(value: &Value, resolver: &dyn AssetResolver) -> ChainResult<Self> {
        let (Some(base), Some(quote)) = (value.get("base"), value.get("quote")) else {
            return Err(ChainError::malformed(format!("price needs base and quote: {}", value)));
        };
        let base = Amount::from_value(base, resolver).await?;
        let quote = Amount::from_value(quote, resolver).await?;
        Self::new(quote, base)
    }

    /// Price of a fill from its `receives`/`pays` amounts.
    ///
    /// The side whose asset is `base_asset` becomes the base. Receiving the
    /// base asset is a sell; paying it is a buy.
    pub async fn from_fill(
        value: &Value,
        base_asset: Option<ObjectId>,
        resolver: &dyn AssetResolver,
    ) -> ChainResult<(Self, OrderSide)> {
        let (Some(receives), Some(pays)) = (value.get("receives"), value.get("pays")) else {
            return Err(ChainError::malformed(format!("fill needs receives and pays: {}", value)));
        };
        let receives = Amount::from_value(receives, resolver).await?;
        let pays = Amount::from_value(pays, resolver).await?;
        let base_asset = base_asset.unwrap_or(receives.asset().id);

        if receives.asset().id == base_asset {
            Ok((Self::new(pays, receives)?, OrderSide::Sell))
        } else {
            Ok((Self::new(receives, pays)?, OrderSide::Buy))
        }
    }

    pub fn base(&self) -> &Amount {
        &self.base
    }

    pub fn quote(&self) -> &Amount {
        &self.quote
    }

    /// `base / quote` in whole units.
    pub fn price(&self) -> f64 {
        let quote = self.quote.to_f64();
        if quote == 0.0 {
            return f64::INFINITY;
        }
        self.base.to_f64() / quote
    }

    /// The same market seen from the other side.
    pub fn invert(&self) -> Price {
        Price {
            base: self.quote.clone(),
            quote: self.base.clone(),
        }
    }

    /// Multiply the price by a scalar; the quote stays fixed.
    pub fn scale(&self, factor: f64) -> ChainResult<Price> {
        Price::from_f64(
            self.price() * factor,
            self.base.asset().clone(),
            self.quote.asset().clone(),
        )
    }

    /// Chain two markets through their shared asset.
    ///
    /// `a/b * b/c = a/c` and `a/b * c/a = c/b`.
    pub fn try_mul(&self, other: &Price) -> ChainResult<Price> {
        let base_raw = i128::from(self.base.amount()) * i128::from(other.base.amount());
        let quote_raw = i128::from(self.quote.amount()) * i128::from(other.quote.amount());

        if self.quote.asset().id == other.base.asset().id {
            Self::from_raw(
                base_raw,
                self.base.asset().clone(),
                quote_raw,
                other.quote.asset().clone(),
            )
        } else if self.base.asset().id == other.quote.asset().id {
            Self::from_raw(
                base_raw,
                other.base.asset().clone(),
                quote_raw,
                self.quote.asset().clone(),
            )
        } else {
            Err(self.mismatch(other))
        }
    }

    /// `a/b / c/b = a/c` and `a/b / a/c = c/b`.
    pub fn try_div(&self, other: &Price) -> ChainResult<Price> {
        self.try_mul(&other.invert())
    }

    /// Convert an amount across this market: quote into base, base into quote.
    ///
    /// Truncates toward zero.
    pub fn convert(&self, amount: &Amount) -> ChainResult<Amount> {
        let raw = i128::from(amount.amount());
        let (base, quote) = (i128::from(self.base.amount()), i128::from(self.quote.amount()));

        let (value, asset) = if amount.asset().id == self.quote.asset().id {
            (raw * base / quote.max(1), self.base.asset())
        } else if amount.asset().id == self.base.asset().id {
            (raw * quote / base.max(1), self.quote.asset())
        } else {
            return Err(ChainError::AssetMismatch {
                left: amount.symbol().to_string(),
                right: self.market(),
            });
        };
        Ok(Amount::from_raw(to_i64(value, "amount")?, asset.clone()))
    }

    /// Compare two prices of the same market.
    pub fn try_cmp(&self, other: &Price) -> ChainResult<Ordering> {
        if self.base.asset().id != other.base.asset().id || self.quote.asset().id != other.quote.asset().id {
            return Err(self.mismatch(other));
        }
        let left = i128::from(self.base.amount()) * i128::from(other.quote.amount());
        let right = i128::from(other.base.amount()) * i128::from(self.quote.amount());
        Ok(left.cmp(&right))
    }

    /// `BASE/QUOTE`.
    pub fn market(&self) -> String {
        format!("{}/{}", self.base.symbol(), self.quote.symbol())
    }

    pub fn json(&self) -> Value {
        json!({
            "base": self.base.to_asset_amount(),
            "quote": self.quote.to_asset_amount(),
        })
    }

    fn mismatch(&self, other: &Price) -> ChainError {
        ChainError::AssetMismatch {
            left: self.market(),
            right: other.market(),
        }
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let precision = usize::from(self.base.asset().precision) + usize::from(self.quote.asset().precision);
        write!(f, "{:.*} {}", precision, self.price(), self.market())
    }
}
