use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, AddAssign, Neg, Sub, SubAssign},
    str::FromStr,
};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sqlx::Type;
use thiserror::Error;

use crate::op;

/// Number of minor units in one major unit. All amounts carry exactly two decimal places.
pub const CURRENCY_SCALE: i64 = 100;

//--------------------------------------       Money        ---------------------------------------------------------
/// A monetary amount with a fixed 2-decimal scale, held as an integer number of cents.
///
/// Rounding (half-up, away from zero) only ever happens when an amount is computed, e.g. in [`Money::percentage`]
/// or when parsing more than two decimal places. Stored values are always exact.
#[derive(Debug, Clone, Copy, Default, Type, PartialEq, Eq, Hash, Ord, PartialOrd)]
#[sqlx(transparent)]
pub struct Money(i64);

op!(binary Money, Add, add);
op!(binary Money, Sub, sub);
op!(inplace Money, AddAssign, add_assign);
op!(inplace Money, SubAssign, sub_assign);
op!(unary Money, Neg, neg);

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Value cannot be represented as money: {0}")]
pub struct MoneyParseError(String);

impl Money {
    pub const fn zero() -> Self {
        Self(0)
    }

    pub const fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    /// Whole currency units, e.g. `Money::from_units(10_000)` is `10000.00`.
    pub const fn from_units(units: i64) -> Self {
        Self(units * CURRENCY_SCALE)
    }

    pub fn cents(&self) -> i64 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    pub fn checked_add(self, rhs: Self) -> Option<Self> {
        self.0.checked_add(rhs.0).map(Self)
    }

    pub fn checked_sub(self, rhs: Self) -> Option<Self> {
        self.0.checked_sub(rhs.0).map(Self)
    }

    pub fn checked_mul(self, factor: i64) -> Option<Self> {
        self.0.checked_mul(factor).map(Self)
    }

    /// `round_half_up(self × percent / 100)`, at cent precision.
    pub fn percentage(&self, percent: i64) -> Self {
        let scaled = i128::from(self.0) * i128::from(percent);
        let magnitude = (scaled.abs() + 50) / 100;
        let rounded = if scaled < 0 { -magnitude } else { magnitude };
        #[allow(clippy::cast_possible_truncation)]
        Self(rounded.clamp(i128::from(i64::MIN), i128::from(i64::MAX)) as i64)
    }
}

impl Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let scale = CURRENCY_SCALE.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / scale, abs % scale)
    }
}

impl FromStr for Money {
    type Err = MoneyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (negative, digits) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s.strip_prefix('+').unwrap_or(s)),
        };
        let (whole, frac) = digits.split_once('.').unwrap_or((digits, ""));
        let valid = |part: &str| part.chars().all(|c| c.is_ascii_digit());
        if whole.is_empty() || !valid(whole) || !valid(frac) {
            return Err(MoneyParseError(s.to_string()));
        }
        let whole = whole.parse::<i64>().map_err(|e| MoneyParseError(format!("{s}: {e}")))?;
        let mut frac_digits = frac.bytes().map(|b| i64::from(b - b'0'));
        let tenths = frac_digits.next().unwrap_or(0);
        let hundredths = frac_digits.next().unwrap_or(0);
        let round_up = frac_digits.next().map(|d| d >= 5).unwrap_or(false);
        let cents = whole
            .checked_mul(CURRENCY_SCALE)
            .and_then(|c| c.checked_add(tenths * 10 + hundredths + i64::from(round_up)))
            .ok_or_else(|| MoneyParseError(format!("{s} is out of range")))?;
        Ok(Self(if negative { -cents } else { cents }))
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum MoneyRepr {
    Text(String),
    Integer(i64),
    Float(f64),
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match MoneyRepr::deserialize(deserializer)? {
            MoneyRepr::Text(s) => s.parse().map_err(serde::de::Error::custom),
            MoneyRepr::Integer(units) => units
                .checked_mul(CURRENCY_SCALE)
                .map(Self)
                .ok_or_else(|| serde::de::Error::custom(format!("{units} is out of range"))),
            MoneyRepr::Float(f) if f.is_finite() => {
                #[allow(clippy::cast_precision_loss)]
                let cents = (f * CURRENCY_SCALE as f64).round();
                // i64::MAX is not representable as f64; 2^63 is the first value out of range
                let limit = 2f64.powi(63);
                if !(-limit..limit).contains(&cents) {
                    return Err(serde::de::Error::custom(format!("{f} is out of range")));
                }
                #[allow(clippy::cast_possible_truncation)]
                Ok(Self(cents as i64))
            },
            MoneyRepr::Float(f) => Err(serde::de::Error::custom(format!("{f} is not a valid amount"))),
        }
    }
}
