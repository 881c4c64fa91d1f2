//! Fixed-point money type with 2 decimal places precision.
//!
//! Uses `rust_decimal` internally with scale enforcement so prices, line
//! subtotals and invoice totals never pick up floating-point drift.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub};
use std::str::FromStr;

/// Currency markers tolerated after a persisted amount.
const CURRENCY_SUFFIXES: [&str; 4] = ["VND", "USD", "đ", "$"];

/// A monetary amount that always carries exactly 2 decimal places.
///
/// # Examples
///
/// ```
/// use std::str::FromStr;
/// use retail_store::Money;
///
/// let price = Money::from_str("1,299.99").unwrap();
/// assert_eq!(price.times(3).to_string(), "3899.97");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Money(Decimal);

impl Money {
    /// The number of decimal places to maintain.
    pub const SCALE: u32 = 2;

    /// Zero value.
    pub const ZERO: Self = Money(Decimal::ZERO);

    /// Creates a new `Money` from a `Decimal`, rounding half away from zero to 2 places.
    pub fn new(value: Decimal) -> Self {
        let mut normalized =
            value.round_dp_with_strategy(Self::SCALE, RoundingStrategy::MidpointAwayFromZero);
        normalized.rescale(Self::SCALE);
        Money(normalized)
    }

    /// Creates an amount from a whole number of cents.
    pub fn from_cents(cents: i64) -> Self {
        Money::new(Decimal::new(cents, Self::SCALE))
    }

    /// Returns the underlying decimal.
    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    /// Returns `true` if this value is zero.
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Returns `true` if this value is strictly greater than zero.
    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    /// Returns `true` if this value is strictly below zero.
    pub fn is_negative(&self) -> bool {
        self.0 < Decimal::ZERO
    }

    /// Multiplies a unit price by a quantity.
    pub fn times(&self, quantity: u32) -> Self {
        Money::new(self.0 * Decimal::from(quantity))
    }

    /// Splits an amount evenly over a quantity. Returns `None` for a zero quantity.
    pub fn per_unit(&self, quantity: u32) -> Option<Self> {
        if quantity == 0 {
            return None;
        }
        Some(Money::new(self.0 / Decimal::from(quantity)))
    }

    /// Formats the amount with comma thousands separators, e.g. `1,299.99`.
    pub fn grouped(&self) -> String {
        let plain = format!("{:.2}", self.0.abs());
        let (int_part, frac_part) = plain.split_once('.').unwrap_or((plain.as_str(), "00"));

        let mut grouped = String::with_capacity(plain.len() + int_part.len() / 3 + 1);
        if self.is_negative() {
            grouped.push('-');
        }
        for (i, digit) in int_part.chars().enumerate() {
            if i > 0 && (int_part.len() - i) % 3 == 0 {
                grouped.push(',');
            }
            grouped.push(digit);
        }
        grouped.push('.');
        grouped.push_str(frac_part);
        grouped
    }
}

impl FromStr for Money {
    type Err = rust_decimal::Error;

    /// Parses an amount, ignoring thousands separators and a trailing currency marker.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let mut trimmed = s.trim();
        for suffix in CURRENCY_SUFFIXES {
            if let Some(stripped) = trimmed.strip_suffix(suffix) {
                trimmed = stripped.trim_end();
                break;
            }
        }
        let digits: String = trimmed.chars().filter(|c| *c != ',' && *c != '_').collect();
        let decimal = Decimal::from_str(&digits)?;
        Ok(Money::new(decimal))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl Add for Money {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Money::new(self.0 + rhs.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Sub for Money {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Money::new(self.0 - rhs.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Money::ZERO, |acc, m| acc + m)
    }
}

impl Serialize for Money {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("{:.2}", self.0))
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Money::from_str(&s).map_err(serde::de::Error::custom)
    }
}
