use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, Mul, Neg, Sub, SubAssign},
    str::FromStr,
};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

use crate::op;

/// Minor units per major unit (kopeks per rouble, cents per unit).
pub const MINOR_PER_MAJOR: i64 = 100;

//--------------------------------------      Money       -----------------------------------------------------------
/// A monetary amount in minor units (two decimal places).
///
/// `Money` is deliberately currency-blind. The engine stores every amount and balance as minor
/// units and lets the display layer attach the currency symbol.
#[derive(Debug, Clone, Copy, Default, Type, Ord, PartialOrd, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct Money(i64);

op!(binary Money, Add, add);
op!(binary Money, Sub, sub);
op!(inplace Money, SubAssign, sub_assign);
op!(unary Money, Neg, neg);

impl Mul<i64> for Money {
    type Output = Self;

    fn mul(self, rhs: i64) -> Self::Output {
        Self::from(self.value() * rhs)
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

impl Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / MINOR_PER_MAJOR as u64, abs % MINOR_PER_MAJOR as u64)
    }
}

impl FromStr for Money {
    type Err = MoneyConversionError;

    /// Parses a user-entered amount. Accepts `1500`, `1500.5`, `1500.50` and a comma decimal
    /// separator (`1500,50`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().replace(',', ".");
        // The sign comes from the string, not the parsed major part: "-0.50" has major 0.
        let negative = s.starts_with('-');
        let (major, minor) = match s.split_once('.') {
            Some((major, minor)) => (major, minor),
            None => (s.as_str(), ""),
        };
        if minor.len() > 2 {
            return Err(MoneyConversionError(format!("{s} has more than two decimal places")));
        }
        let major = major.parse::<i64>().map_err(|e| MoneyConversionError(format!("{s}: {e}")))?;
        let minor_val = if minor.is_empty() {
            0
        } else {
            if !minor.bytes().all(|b| b.is_ascii_digit()) {
                return Err(MoneyConversionError(format!("{s} is not a valid amount")));
            }
            let v = minor.parse::<i64>().map_err(|e| MoneyConversionError(format!("{s}: {e}")))?;
            if minor.len() == 1 {
                v * 10
            } else {
                v
            }
        };
        let value = major
            .checked_mul(MINOR_PER_MAJOR)
            .and_then(|v| if negative { v.checked_sub(minor_val) } else { v.checked_add(minor_val) })
            .ok_or_else(|| MoneyConversionError(format!("{s} overflows")))?;
        Ok(Self(value))
    }
}

impl Money {
    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn from_major(major: i64) -> Self {
        Self(major * MINOR_PER_MAJOR)
    }

    /// The whole-unit part of the amount, truncated towards zero.
    pub fn major(&self) -> i64 {
        self.0 / MINOR_PER_MAJOR
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }
}
