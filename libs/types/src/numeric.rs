//! Fixed-point decimal types for prices and volumes
//!
//! Uses rust_decimal for deterministic arithmetic (no floating-point errors).
//! Prices are exact map keys; volumes never go negative, every subtraction
//! saturates at zero.

use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul};
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::NumericError;

/// Exact decimal price
///
/// Used directly as the key of price-level maps, so two prices compare equal
/// only when their decimal values are equal (`100` == `100.00`). Values are
/// normalized on every way in, so equal prices also print the same.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "Decimal")]
pub struct Price(Decimal);

impl Price {
    pub const ZERO: Price = Price(Decimal::ZERO);

    /// Create a price from a decimal value
    pub fn new(value: Decimal) -> Self {
        Self(value.normalize())
    }

    /// Create a whole-number price
    pub fn from_u64(value: u64) -> Self {
        Self(Decimal::from(value))
    }

    /// Get the underlying decimal
    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    /// Step the price down by one tick
    pub fn minus_tick(&self, tick: Decimal) -> Self {
        Self::new(self.0 - tick)
    }

    /// Step the price up by one tick
    pub fn plus_tick(&self, tick: Decimal) -> Self {
        Self::new(self.0 + tick)
    }
}

impl From<Decimal> for Price {
    fn from(value: Decimal) -> Self {
        Self::new(value)
    }
}

impl FromStr for Price {
    type Err = NumericError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Decimal::from_str_exact(s)
            .map(Price::new)
            .map_err(|_| NumericError::InvalidPrice(s.to_string()))
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Non-negative decimal volume
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "Decimal")]
pub struct Volume(Decimal);

impl Volume {
    pub const ZERO: Volume = Volume(Decimal::ZERO);

    /// Create a volume, rejecting negative values
    pub fn try_new(value: Decimal) -> Result<Self, NumericError> {
        if value.is_sign_negative() && !value.is_zero() {
            return Err(NumericError::NegativeVolume(value.to_string()));
        }
        Ok(Self(value))
    }

    /// Create a volume, clamping negative values to zero
    pub fn saturating(value: Decimal) -> Self {
        if value < Decimal::ZERO {
            Self::ZERO
        } else {
            Self(value)
        }
    }

    /// Create a whole-number volume
    pub fn from_u64(value: u64) -> Self {
        Self(Decimal::from(value))
    }

    /// Get the underlying decimal
    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// `self - other`, floored at zero
    pub fn saturating_sub(self, other: Volume) -> Volume {
        Volume::saturating(self.0 - other.0)
    }
}

impl TryFrom<Decimal> for Volume {
    type Error = NumericError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Volume::try_new(value)
    }
}

impl Add for Volume {
    type Output = Volume;

    fn add(self, rhs: Volume) -> Volume {
        Volume(self.0 + rhs.0)
    }
}

impl AddAssign for Volume {
    fn add_assign(&mut self, rhs: Volume) {
        self.0 += rhs.0;
    }
}

/// Volume scaled by an order count, used for busiest-row weighting
impl Mul<u64> for Volume {
    type Output = Decimal;

    fn mul(self, rhs: u64) -> Decimal {
        self.0 * Decimal::from(rhs)
    }
}

impl Sum for Volume {
    fn sum<I: Iterator<Item = Volume>>(iter: I) -> Volume {
        iter.fold(Volume::ZERO, |acc, v| acc + v)
    }
}

impl FromStr for Volume {
    type Err = NumericError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value =
            Decimal::from_str_exact(s).map_err(|_| NumericError::InvalidVolume(s.to_string()))?;
        Volume::try_new(value)
    }
}

impl fmt::Display for Volume {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_deserialized_price_is_normalized() {
        let a: Price = serde_json::from_str("\"100.00\"").unwrap();
        let b: Price = serde_json::from_str("\"100\"").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "100");
        assert_eq!(serde_json::to_string(&a).unwrap(), "\"100\"");
    }

    #[test]
    fn test_deserialize_rejects_negative_volume() {
        let err = serde_json::from_str::<Volume>("\"-5\"").unwrap_err();
        assert!(err.to_string().contains("Negative volume"), "{err}");
        let ok: Volume = serde_json::from_str("\"2.5\"").unwrap();
        assert_eq!(ok, "2.5".parse().unwrap());
    }

    #[test]
    fn test_price_scale_insensitive_equality() {
        let a: Price = "100".parse().unwrap();
        let b: Price = "100.00".parse().unwrap();
        assert_eq!(a, b);
        assert_eq!(a, Price::from_u64(100));
    }

    #[test]
    fn test_price_tick_steps() {
        let tick = Decimal::from_str_exact("0.25").unwrap();
        let p = Price::from_u64(100);
        assert_eq!(p.minus_tick(tick), "99.75".parse().unwrap());
        assert_eq!(p.plus_tick(tick).minus_tick(tick), p);
    }

    #[test]
    fn test_invalid_price_rejected() {
        let err = "abc".parse::<Price>().unwrap_err();
        assert_eq!(err, NumericError::InvalidPrice("abc".to_string()));
    }

    #[test]
    fn test_negative_volume_rejected() {
        assert!("-1".parse::<Volume>().is_err());
        assert!(Volume::try_new(Decimal::ZERO).is_ok());
    }

    #[test]
    fn test_volume_saturating_sub() {
        let a = Volume::from_u64(3);
        let b = Volume::from_u64(5);
        assert_eq!(a.saturating_sub(b), Volume::ZERO);
        assert_eq!(b.saturating_sub(a), Volume::from_u64(2));
    }

    #[test]
    fn test_volume_sum_and_weight() {
        let total: Volume = [1u64, 2, 3].iter().map(|v| Volume::from_u64(*v)).sum();
        assert_eq!(total, Volume::from_u64(6));
        assert_eq!(total * 2, Decimal::from(12));
    }

    #[test]
    fn test_price_serializes_as_string() {
        let json = serde_json::to_string(&Price::from_u64(50000)).unwrap();
        assert_eq!(json, "\"50000\"");
    }

    proptest! {
        #[test]
        fn prop_saturating_sub_never_negative(a in 0u64..1_000_000, b in 0u64..1_000_000) {
            let v = Volume::from_u64(a).saturating_sub(Volume::from_u64(b));
            prop_assert!(v.as_decimal() >= Decimal::ZERO);
        }
    }
}
