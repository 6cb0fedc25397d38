use std::{fmt, iter::Sum, ops::Add, str::FromStr};

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Deserializer, Serialize, de};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValueError {
    #[error("amount must not be negative")]
    NegativeAmount,
    #[error("amount is not a number: {0:?}")]
    NotANumber(String),
    #[error("quantity must be a positive integer")]
    NonPositiveQuantity,
    #[error("quantity must not exceed {}", Quantity::MAX)]
    QuantityTooLarge,
}

/// Non-negative amount with two decimal places.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    pub const SCALE: u32 = 2;

    pub fn new(amount: Decimal) -> Result<Self, ValueError> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(ValueError::NegativeAmount);
        }
        Ok(Self(
            amount.round_dp_with_strategy(Self::SCALE, RoundingStrategy::MidpointAwayFromZero),
        ))
    }

    pub fn zero() -> Self {
        Self(Decimal::new(0, Self::SCALE))
    }

    pub fn amount(&self) -> Decimal {
        self.0
    }

    pub fn times(&self, quantity: Quantity) -> Money {
        Money(self.0 * Decimal::from(quantity.get()))
    }

    /// Absolute difference, used for tolerance checks.
    pub fn distance(&self, other: Money) -> Decimal {
        (self.0 - other.0).abs()
    }
}

impl FromStr for Money {
    type Err = ValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let amount = Decimal::from_str(s.trim()).map_err(|_| ValueError::NotANumber(s.to_string()))?;
        Money::new(amount)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money(self.0 + rhs.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::zero(), Add::add)
    }
}

impl TryFrom<Decimal> for Money {
    type Error = ValueError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Money::new(value)
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let amount = <Decimal as Deserialize>::deserialize(deserializer)?;
        Money::new(amount).map_err(de::Error::custom)
    }
}

/// Line quantity, between one and `Quantity::MAX`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Quantity(u32);

impl Quantity {
    /// Largest quantity accepted on one line. Fits the `INTEGER` column.
    pub const MAX: u32 = 10_000;

    pub fn new(value: i64) -> Result<Self, ValueError> {
        if value <= 0 {
            return Err(ValueError::NonPositiveQuantity);
        }
        match u32::try_from(value) {
            Ok(v) if v <= Self::MAX => Ok(Self(v)),
            _ => Err(ValueError::QuantityTooLarge),
        }
    }

    pub fn get(&self) -> u32 {
        self.0
    }
}

impl Default for Quantity {
    fn default() -> Self {
        Self(1)
    }
}

impl<'de> Deserialize<'de> for Quantity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = i64::deserialize(deserializer)?;
        Quantity::new(value).map_err(de::Error::custom)
    }
}
