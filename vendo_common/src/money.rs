use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, Mul},
    str::FromStr,
};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

use crate::arith;

pub const CENTS_PER_UNIT: i64 = 100;
pub const BASIS_POINTS_SCALE: i64 = 10_000;

/// The storefront's pricing currency. Orders and wallets are denominated in this; providers
/// that settle in other assets quote against it.
pub const SITE_CURRENCY_CODE: &str = "CNY";

//--------------------------------------       Money         ---------------------------------------------------------
/// A monetary amount in minor units (cents). Payment providers exchange amounts as two-decimal
/// strings ("12.88"), which parse to and render from this type losslessly.
#[derive(Debug, Clone, Copy, Default, Type, Ord, PartialOrd, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct Money(i64);

arith!(Money: Add, Sub, AddAssign, SubAssign, Neg);

impl Mul<i64> for Money {
    type Output = Self;

    fn mul(self, rhs: i64) -> Self::Output {
        Self(self.0 * rhs)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[derive(Debug, Clone, Error)]
#[error("Value cannot be represented as a monetary amount: {0}")]
pub struct MoneyConversionError(String);

impl From<i64> for Money {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl PartialEq for Money {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for Money {}

impl TryFrom<u64> for Money {
    type Error = MoneyConversionError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        if value > i64::MAX as u64 {
            Err(MoneyConversionError(format!("Value {value} is too large to convert to Money")))
        } else {
            #[allow(clippy::cast_possible_wrap)]
            Ok(Self(value as i64))
        }
    }
}

impl FromStr for Money {
    type Err = MoneyConversionError;

    /// Parses a decimal string with at most two fraction digits, e.g. "15", "12.8" or "12.88".
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let (sign, digits) = match trimmed.strip_prefix('-') {
            Some(rest) => (-1i64, rest),
            None => (1i64, trimmed),
        };
        let (units, cents) = match digits.split_once('.') {
            Some((u, c)) => (u, c),
            None => (digits, ""),
        };
        if units.is_empty() || !units.bytes().all(|b| b.is_ascii_digit()) {
            return Err(MoneyConversionError(format!("Invalid amount: {s}")));
        }
        if cents.len() > 2 || !cents.bytes().all(|b| b.is_ascii_digit()) {
            return Err(MoneyConversionError(format!("Invalid amount: {s}")));
        }
        let whole = units.parse::<i64>().map_err(|e| MoneyConversionError(format!("Invalid amount {s}: {e}")))?;
        let mut frac = cents.parse::<i64>().unwrap_or_default();
        if cents.len() == 1 {
            frac *= 10;
        }
        whole
            .checked_mul(CENTS_PER_UNIT)
            .and_then(|v| v.checked_add(frac))
            .and_then(|v| v.checked_mul(sign))
            .map(Self)
            .ok_or_else(|| MoneyConversionError(format!("Amount {s} overflows the representable range")))
    }
}

impl Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let cents = self.0.unsigned_abs();
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{sign}{}.{:02}", cents / 100, cents % 100)
    }
}

impl Money {
    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    pub fn from_units(units: i64) -> Self {
        Self(units * CENTS_PER_UNIT)
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// The fee this amount attracts at the given rate in basis points, truncated toward zero.
    pub fn fee_at_bps(&self, rate_bps: i64) -> Self {
        let fee = (i128::from(self.0) * i128::from(rate_bps)) / i128::from(BASIS_POINTS_SCALE);
        #[allow(clippy::cast_possible_truncation)]
        Self(fee as i64)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parse_decimal_amounts() {
        assert_eq!("15".parse::<Money>().unwrap(), Money::from_cents(1500));
        assert_eq!("12.8".parse::<Money>().unwrap(), Money::from_cents(1280));
        assert_eq!("12.88".parse::<Money>().unwrap(), Money::from_cents(1288));
        assert_eq!("0.05".parse::<Money>().unwrap(), Money::from_cents(5));
        assert_eq!("-3.50".parse::<Money>().unwrap(), Money::from_cents(-350));
        assert!("12.888".parse::<Money>().is_err());
        assert!("".parse::<Money>().is_err());
        assert!(".5".parse::<Money>().is_err());
        assert!("12,88".parse::<Money>().is_err());
    }

    #[test]
    fn render_two_decimals() {
        assert_eq!(Money::from_cents(1288).to_string(), "12.88");
        assert_eq!(Money::from_cents(1500).to_string(), "15.00");
        assert_eq!(Money::from_cents(7).to_string(), "0.07");
        assert_eq!(Money::from_cents(-350).to_string(), "-3.50");
        assert_eq!(Money::default().to_string(), "0.00");
    }

    #[test]
    fn fee_truncates_toward_zero() {
        assert_eq!(Money::from_cents(10_000).fee_at_bps(250), Money::from_cents(250));
        assert_eq!(Money::from_cents(999).fee_at_bps(100), Money::from_cents(9));
        assert_eq!(Money::from_cents(5000).fee_at_bps(0), Money::default());
    }
}
