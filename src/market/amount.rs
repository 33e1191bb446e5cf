//! Fixed-point asset quantities.

use serde_json::Value;
use std::cmp::Ordering;
use std::fmt;

use crate::blockchain::types::{ChainError, ChainResult, ObjectId};
use crate::market::AssetResolver;
use crate::objects::Asset;
use crate::protocol::types::AssetAmount;

/// The asset facts amount arithmetic needs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AssetSpec {
    pub id: ObjectId,
    pub symbol: String,
    pub precision: u8,
}

impl AssetSpec {
    pub fn new(id: ObjectId, symbol: &str, precision: u8) -> Self {
        Self {
            id,
            symbol: symbol.to_string(),
            precision,
        }
    }

    /// `10^precision`, saturating for precisions no chain uses.
    pub(crate) fn scale(&self) -> i128 {
        10i128
            .checked_pow(u32::from(self.precision))
            .unwrap_or(i128::MAX)
    }
}

/// `10^exp`, or an error when it does not fit.
pub(crate) fn pow10(exp: u32) -> ChainResult<i128> {
    10i128
        .checked_pow(exp)
        .ok_or_else(|| ChainError::malformed(format!("10^{} out of range", exp)))
}

/// `a * b`, or an error naming `what` on overflow.
pub(crate) fn checked_mul(a: i128, b: i128, what: &str) -> ChainResult<i128> {
    a.checked_mul(b)
        .ok_or_else(|| ChainError::malformed(format!("{} out of range", what)))
}

impl From<&Asset> for AssetSpec {
    fn from(asset: &Asset) -> Self {
        Self::new(asset.id(), asset.symbol(), asset.precision())
    }
}

/// A decimal literal as `mantissa * 10^-scale`.
pub(crate) fn parse_decimal(s: &str) -> ChainResult<(i128, u32)> {
    let bad = || ChainError::malformed(format!("invalid decimal '{}'", s));
    let s = s.trim();
    let (negative, digits) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s.strip_prefix('+').unwrap_or(s)),
    };
    let (whole, fraction) = digits.split_once('.').unwrap_or((digits, ""));
    if whole.is_empty() && fraction.is_empty() {
        return Err(bad());
    }
    if !whole.chars().chain(fraction.chars()).all(|c| c.is_ascii_digit()) {
        return Err(bad());
    }
    let joined = format!("{}{}", whole, fraction);
    let mantissa: i128 = joined.parse().map_err(|_| bad())?;
    let scale = u32::try_from(fraction.len()).map_err(|_| bad())?;
    if scale > 30 {
        return Err(bad());
    }
    Ok((if negative { -mantissa } else { mantissa }, scale))
}

pub(crate) fn to_i64(value: i128, what: &str) -> ChainResult<i64> {
    i64::try_from(value).map_err(|_| ChainError::malformed(format!("{} out of range", what)))
}

/// A quantity of one asset in its minimal unit.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Amount {
    amount: i64,
    asset: AssetSpec,
}

impl Amount {
    /// Parse a decimal quantity such as `"1.5"` into minimal units.
    ///
    /// More fractional digits than the asset precision are rejected unless
    /// the excess digits are zero.
    pub fn new(quantity: &str, asset: AssetSpec) -> ChainResult<Self> {
        let (mantissa, scale) = parse_decimal(quantity)?;
        let precision = u32::from(asset.precision);
        let raw = if scale <= precision {
            checked_mul(mantissa, pow10(precision - scale)?, "amount")?
        } else {
            let divisor = pow10(scale - precision)?;
            if mantissa % divisor != 0 {
                return Err(ChainError::malformed(format!(
                    "'{}' has more decimals than {} supports ({})",
                    quantity, asset.symbol, asset.precision
                )));
            }
            mantissa / divisor
        };
        Ok(Self {
            amount: to_i64(raw, "amount")?,
            asset,
        })
    }

    /// Wrap an integer amount already in minimal units.
    pub fn from_raw(amount: i64, asset: AssetSpec) -> Self {
        Self { amount, asset }
    }

    /// Nearest representable amount to `quantity`.
    pub fn from_f64(quantity: f64, asset: AssetSpec) -> ChainResult<Self> {
        let raw = (quantity * asset.scale() as f64).round();
        if !raw.is_finite() || raw.abs() >= i64::MAX as f64 {
            return Err(ChainError::malformed(format!("amount {} out of range", quantity)));
        }
        Ok(Self::from_raw(raw as i64, asset))
    }

    /// Parse `"<quantity> <SYMBOL>"`, resolving the symbol.
    pub async fn parse(s: &str, resolver: &dyn AssetResolver) -> ChainResult<Self> {
        let (quantity, symbol) = s
            .trim()
            .split_once(char::is_whitespace)
            .ok_or_else(|| ChainError::malformed(format!("expected '<amount> <symbol>', got '{}'", s)))?;
        let asset = resolver.resolve_asset(symbol.trim()).await?;
        Self::new(quantity, asset)
    }

    /// Resolve the asset of a raw `{amount, asset_id}` pair.
    pub async fn from_asset_amount(raw: &AssetAmount, resolver: &dyn AssetResolver) -> ChainResult<Self> {
        let asset = resolver.resolve_asset(&raw.asset_id.to_string()).await?;
        Ok(Self::from_raw(raw.amount, asset))
    }

    /// Like [`Amount::from_asset_amount`] for an untyped JSON mapping.
    pub async fn from_value(value: &Value, resolver: &dyn AssetResolver) -> ChainResult<Self> {
        let raw: AssetAmount = serde_json::from_value(value.clone())
            .map_err(|e| ChainError::malformed(format!("invalid amount {}: {}", value, e)))?;
        Self::from_asset_amount(&raw, resolver).await
    }

    /// Amount in minimal units.
    pub fn amount(&self) -> i64 {
        self.amount
    }

    pub fn asset(&self) -> &AssetSpec {
        &self.asset
    }

    pub fn symbol(&self) -> &str {
        &self.asset.symbol
    }

    pub fn to_f64(&self) -> f64 {
        self.amount as f64 / self.asset.scale() as f64
    }

    /// The `{amount, asset_id}` form used in operations.
    pub fn to_asset_amount(&self) -> AssetAmount {
        AssetAmount::new(self.amount, self.asset.id)
    }

    fn same_asset(&self, other: &Amount) -> ChainResult<()> {
        if self.asset.id != other.asset.id {
            return Err(ChainError::AssetMismatch {
                left: self.asset.symbol.clone(),
                right: other.asset.symbol.clone(),
            });
        }
        Ok(())
    }

    fn with_raw(&self, raw: Option<i64>) -> ChainResult<Amount> {
        raw.map(|amount| Amount::from_raw(amount, self.asset.clone()))
            .ok_or_else(|| ChainError::malformed("amount overflow"))
    }

    pub fn try_add(&self, other: &Amount) -> ChainResult<Amount> {
        self.same_asset(other)?;
        self.with_raw(self.amount.checked_add(other.amount))
    }

    pub fn try_sub(&self, other: &Amount) -> ChainResult<Amount> {
        self.same_asset(other)?;
        self.with_raw(self.amount.checked_sub(other.amount))
    }

    pub fn try_rem(&self, other: &Amount) -> ChainResult<Amount> {
        self.same_asset(other)?;
        if other.amount == 0 {
            return Err(ChainError::malformed("remainder by zero amount"));
        }
        self.with_raw(self.amount.checked_rem(other.amount))
    }

    pub fn try_cmp(&self, other: &Amount) -> ChainResult<Ordering> {
        self.same_asset(other)?;
        Ok(self.amount.cmp(&other.amount))
    }

    /// Multiply by an integer, keeping the asset.
    pub fn try_mul(&self, factor: i64) -> ChainResult<Amount> {
        self.with_raw(self.amount.checked_mul(factor))
    }

    /// Multiply by a float, rounding to the nearest minimal unit.
    pub fn try_mul_f64(&self, factor: f64) -> ChainResult<Amount> {
        let raw = (self.amount as f64 * factor).round();
        if !raw.is_finite() || raw.abs() >= i64::MAX as f64 {
            return Err(ChainError::malformed(format!("{} * {} out of range", self, factor)));
        }
        Ok(Amount::from_raw(raw as i64, self.asset.clone()))
    }

    /// Divide by an integer, truncating toward zero.
    pub fn try_div(&self, divisor: i64) -> ChainResult<Amount> {
        if divisor == 0 {
            return Err(ChainError::malformed("division of an amount by zero"));
        }
        self.with_raw(self.amount.checked_div(divisor))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let precision = usize::from(self.asset.precision);
        let scale = self.asset.scale();
        let raw = i128::from(self.amount);
        let sign = if raw < 0 { "-" } else { "" };
        let (whole, fraction) = (raw.abs() / scale, raw.abs() % scale);
        if precision == 0 {
            write!(f, "{}{} {}", sign, whole, self.asset.symbol)
        } else {
            write!(
                f,
                "{}{}.{:0width$} {}",
                sign,
                whole,
                fraction,
                self.asset.symbol,
                width = precision
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tusc() -> AssetSpec {
        AssetSpec::new(ObjectId::protocol(3, 0), "TUSC", 5)
    }

    fn usd() -> AssetSpec {
        AssetSpec::new(ObjectId::protocol(3, 121), "USD", 4)
    }

    #[test]
    fn test_decimal_normalization() {
        assert_eq!(Amount::new("1.5", tusc()).unwrap().amount(), 150_000);
        assert_eq!(Amount::new("0.00001", tusc()).unwrap().amount(), 1);
        assert_eq!(Amount::new("-2", usd()).unwrap().amount(), -20_000);
        assert_eq!(Amount::new("1.000000", tusc()).unwrap().amount(), 100_000);
        assert!(Amount::new("0.000001", tusc()).is_err());
        assert!(Amount::new("1,5", tusc()).is_err());
        assert!(Amount::new(".", tusc()).is_err());
    }

    #[test]
    fn test_add_sub_roundtrip() {
        let a = Amount::new("10.12345", tusc()).unwrap();
        let b = Amount::new("3.5", tusc()).unwrap();
        assert_eq!(a.try_add(&b).unwrap().try_sub(&b).unwrap(), a);
        assert_eq!(a.try_rem(&b).unwrap().amount(), 1_012_345 % 350_000);
        assert_eq!(a.try_cmp(&b).unwrap(), Ordering::Greater);
    }

    #[test]
    fn test_cross_asset_fails() {
        let a = Amount::new("1", tusc()).unwrap();
        let b = Amount::new("1", usd()).unwrap();
        assert!(matches!(a.try_add(&b), Err(ChainError::AssetMismatch { .. })));
        assert!(matches!(a.try_cmp(&b), Err(ChainError::AssetMismatch { .. })));
    }

    #[test]
    fn test_scalar_ops_keep_asset() {
        let a = Amount::new("1.5", tusc()).unwrap();
        assert_eq!(a.try_mul(2).unwrap().to_string(), "3.00000 TUSC");
        assert_eq!(a.try_div(4).unwrap().amount(), 37_500);
        assert_eq!(a.try_mul_f64(0.5).unwrap().asset(), &tusc());
    }

    #[test]
    fn test_overflow_is_an_error() {
        let err = Amount::new("99999999999999999999999999999999999", tusc()).unwrap_err();
        assert!(matches!(err, ChainError::MalformedInput(_)));
        assert!(Amount::new("999999999999999999999999999999999999999", tusc()).is_err());

        let big = Amount::from_raw(i64::MAX, tusc());
        assert!(matches!(big.try_mul(2), Err(ChainError::MalformedInput(_))));
        assert!(matches!(big.try_mul_f64(2.0), Err(ChainError::MalformedInput(_))));
        assert!(matches!(big.try_div(0), Err(ChainError::MalformedInput(_))));
        assert!(Amount::from_raw(i64::MIN, tusc()).try_div(-1).is_err());
        assert!(big.try_rem(&Amount::from_raw(0, tusc())).is_err());

        let huge = AssetSpec::new(ObjectId::protocol(3, 7), "HUGE", 60);
        assert!(Amount::new("1", huge).is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(Amount::from_raw(-5, usd()).to_string(), "-0.0005 USD");
        let whole = AssetSpec::new(ObjectId::protocol(3, 9), "CNT", 0);
        assert_eq!(Amount::from_raw(42, whole).to_string(), "42 CNT");
    }
}
