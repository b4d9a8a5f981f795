//! Type-safe price representation using decimal arithmetic.
//!
//! Prices are non-negative decimals in the shop's single currency. They are
//! persisted as decimal strings so no precision is lost in `SQLite`.

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced when parsing or constructing a [`Price`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PriceError {
    /// The input was not a decimal number.
    #[error("invalid price: {0}")]
    Invalid(String),

    /// The amount was below zero.
    #[error("price must not be negative")]
    Negative,
}

/// A non-negative unit price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Price(Decimal);

impl Price {
    /// A price of zero.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Create a price from a decimal amount.
    ///
    /// # Errors
    ///
    /// Returns `PriceError::Negative` if the amount is below zero.
    pub fn new(amount: Decimal) -> Result<Self, PriceError> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(PriceError::Negative);
        }
        Ok(Self(amount.normalize()))
    }

    /// Get the underlying decimal amount.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Price of `quantity` units.
    #[must_use]
    pub fn times(&self, quantity: u32) -> Decimal {
        self.0 * Decimal::from(quantity)
    }
}

impl Default for Price {
    fn default() -> Self {
        Self::ZERO
    }
}

impl FromStr for Price {
    type Err = PriceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let amount =
            Decimal::from_str(s.trim()).map_err(|_| PriceError::Invalid(s.to_owned()))?;
        Self::new(amount)
    }
}

impl TryFrom<Decimal> for Price {
    type Error = PriceError;

    fn try_from(amount: Decimal) -> Result<Self, Self::Error> {
        Self::new(amount)
    }
}

impl From<Price> for Decimal {
    fn from(price: Price) -> Self {
        price.0
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_price() {
        let price: Price = "19.90".parse().unwrap();
        assert_eq!(price.amount(), Decimal::new(199, 1));
        assert_eq!(price.to_string(), "19.9");
    }

    #[test]
    fn test_parse_zero_price() {
        assert_eq!("0".parse::<Price>().unwrap(), Price::ZERO);
    }

    #[test]
    fn test_negative_price_rejected() {
        assert_eq!("-1.50".parse::<Price>(), Err(PriceError::Negative));
    }

    #[test]
    fn test_garbage_price_rejected() {
        assert!(matches!(
            "twelve".parse::<Price>(),
            Err(PriceError::Invalid(_))
        ));
    }

    #[test]
    fn test_times_quantity() {
        let price: Price = "2.50".parse().unwrap();
        assert_eq!(price.times(4), Decimal::new(10, 0));
    }

    #[test]
    fn test_deserialize_rejects_negative() {
        let result: Result<Price, _> = serde_json::from_str("\"-3\"");
        assert!(result.is_err());
    }
}
