//! Fixed-point decimal types for prices and quantities
//!
//! Uses rust_decimal so comparisons and fill arithmetic are exact; binary
//! floating point never appears in matching, storage, or position math.
//! Values are serialized as strings to prevent JSON number precision loss.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Sub};
use std::str::FromStr;

/// Maximum fractional digits accepted for prices and quantities.
pub const MAX_PRECISION: u32 = 8;

/// Check that a decimal carries at most [`MAX_PRECISION`] fractional digits.
///
/// Trailing zeros are ignored, so `1.50000000000` passes.
pub fn within_precision(value: Decimal) -> bool {
    value.normalize().scale() <= MAX_PRECISION
}

/// Strictly positive price with exact decimal representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Price(Decimal);

impl Price {
    /// Create a new Price from a Decimal.
    ///
    /// # Panics
    /// Panics if the price is zero or negative.
    pub fn new(value: Decimal) -> Self {
        assert!(value > Decimal::ZERO, "Price must be positive");
        Self(value)
    }

    /// Try to create a Price, returning None if not strictly positive.
    pub fn try_new(value: Decimal) -> Option<Self> {
        if value > Decimal::ZERO {
            Some(Self(value))
        } else {
            None
        }
    }

    /// Create from integer (tests and fixtures).
    pub fn from_u64(value: u64) -> Self {
        Self::new(Decimal::from(value))
    }

    /// Create from string.
    pub fn from_str(s: &str) -> Result<Self, rust_decimal::Error> {
        let decimal = Decimal::from_str(s)?;
        Ok(Self::new(decimal))
    }

    pub fn as_decimal(&self) -> Decimal {
        self.0
    }
}

impl Serialize for Price {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for Price {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let decimal = Decimal::from_str(&s).map_err(serde::de::Error::custom)?;
        Self::try_new(decimal).ok_or_else(|| serde::de::Error::custom("Price must be positive"))
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Non-negative quantity with exact decimal representation.
///
/// Zero is a valid value (initial `filled_quantity`); order inputs are
/// required to be strictly positive at validation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Quantity(Decimal);

impl Quantity {
    /// Create a new Quantity from a Decimal.
    ///
    /// # Panics
    /// Panics if the quantity is negative.
    pub fn new(value: Decimal) -> Self {
        assert!(value >= Decimal::ZERO, "Quantity cannot be negative");
        Self(value)
    }

    /// Try to create a Quantity, returning None if negative.
    pub fn try_new(value: Decimal) -> Option<Self> {
        if value >= Decimal::ZERO {
            Some(Self(value))
        } else {
            None
        }
    }

    pub fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    /// Create from integer (tests and fixtures).
    pub fn from_u64(value: u64) -> Self {
        Self::new(Decimal::from(value))
    }

    /// Create from string.
    pub fn from_str(s: &str) -> Result<Self, rust_decimal::Error> {
        let decimal = Decimal::from_str(s)?;
        Ok(Self::new(decimal))
    }

    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == Decimal::ZERO
    }

    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    /// The smaller of two quantities.
    pub fn min(self, other: Self) -> Self {
        if self.0 <= other.0 {
            self
        } else {
            other
        }
    }
}

impl Add for Quantity {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Quantity {
    type Output = Self;

    /// # Panics
    /// Panics if the result would be negative.
    fn sub(self, rhs: Self) -> Self::Output {
        assert!(
            self.0 >= rhs.0,
            "Quantity subtraction would result in negative"
        );
        Self(self.0 - rhs.0)
    }
}

impl Serialize for Quantity {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for Quantity {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let decimal = Decimal::from_str(&s).map_err(serde::de::Error::custom)?;
        Self::try_new(decimal).ok_or_else(|| serde::de::Error::custom("Quantity cannot be negative"))
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_price_creation() {
        let price = Price::from_u64(70000);
        assert_eq!(price.as_decimal(), Decimal::from(70000));
    }

    #[test]
    #[should_panic(expected = "Price must be positive")]
    fn test_price_zero_panics() {
        Price::new(Decimal::ZERO);
    }

    #[test]
    fn test_price_try_new() {
        assert!(Price::try_new(Decimal::from(1)).is_some());
        assert!(Price::try_new(Decimal::ZERO).is_none());
        assert!(Price::try_new(Decimal::from(-5)).is_none());
    }

    #[test]
    fn test_price_ordering_is_exact() {
        let a = Price::from_str("70000.00000001").unwrap();
        let b = Price::from_str("70000.00000002").unwrap();
        assert!(a < b);
    }

    #[test]
    fn test_price_serialization() {
        let price = Price::from_str("70000.25").unwrap();
        let json = serde_json::to_string(&price).unwrap();
        assert_eq!(json, "\"70000.25\"");

        let deserialized: Price = serde_json::from_str(&json).unwrap();
        assert_eq!(price, deserialized);
    }

    #[test]
    fn test_quantity_zero_allowed() {
        let qty = Quantity::zero();
        assert!(qty.is_zero());
        assert!(!qty.is_positive());
    }

    #[test]
    #[should_panic(expected = "Quantity cannot be negative")]
    fn test_quantity_negative_panics() {
        Quantity::new(Decimal::from(-1));
    }

    #[test]
    fn test_quantity_arithmetic_exact() {
        let q1 = Quantity::from_str("0.1").unwrap();
        let q2 = Quantity::from_str("0.2").unwrap();
        let sum = q1 + q2;
        assert_eq!(sum.as_decimal(), Decimal::from_str("0.3").unwrap());

        let diff = sum - q1;
        assert_eq!(diff, q2);
    }

    #[test]
    #[should_panic(expected = "Quantity subtraction would result in negative")]
    fn test_quantity_underflow_panics() {
        let q1 = Quantity::from_str("0.1").unwrap();
        let q2 = Quantity::from_str("0.2").unwrap();
        let _ = q1 - q2;
    }

    #[test]
    fn test_quantity_min() {
        let q1 = Quantity::from_str("0.5").unwrap();
        let q2 = Quantity::from_str("1.0").unwrap();
        assert_eq!(q1.min(q2), q1);
        assert_eq!(q2.min(q1), q1);
    }

    #[test]
    fn test_within_precision() {
        assert!(within_precision(Decimal::from_str("0.00000001").unwrap()));
        assert!(!within_precision(Decimal::from_str("0.000000001").unwrap()));
        // Trailing zeros do not count against the limit
        assert!(within_precision(Decimal::from_str("1.5000000000").unwrap()));
    }

    #[test]
    fn test_quantity_serialization() {
        let qty = Quantity::from_str("1.5").unwrap();
        let json = serde_json::to_string(&qty).unwrap();
        assert_eq!(json, "\"1.5\"");

        let deserialized: Quantity = serde_json::from_str(&json).unwrap();
        assert_eq!(qty, deserialized);
    }
}
