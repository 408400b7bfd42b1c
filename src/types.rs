// 1.0: all the primitives live here. account ids, sides, oracle timestamps, quote amounts.
// each is a newtype so the compiler catches type mixups.

use chrono::DateTime;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;

// funding and interest rates are annualised over this many seconds
pub const SECONDS_PER_YEAR: u64 = 31_536_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct AccountId(pub u64);

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// 1.1: the three position kinds. an account holds exactly one of them at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Maker,
    Long,
    Short,
}

impl Side {
    /// Sides that absorb this side's losses when a shortfall is socialized.
    pub fn opposing(&self) -> [Side; 2] {
        match self {
            Side::Maker => [Side::Long, Side::Short],
            Side::Long => [Side::Short, Side::Maker],
            Side::Short => [Side::Long, Side::Maker],
        }
    }
}

// 1.2: direction of a taker move on the skew. long opens and short closes push it positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SkewDirection {
    Positive,
    Negative,
}

impl SkewDirection {
    pub fn sign(&self) -> Decimal {
        match self {
            SkewDirection::Positive => dec!(1),
            SkewDirection::Negative => dec!(-1),
        }
    }

    pub fn opposite(&self) -> Self {
        match self {
            SkewDirection::Positive => SkewDirection::Negative,
            SkewDirection::Negative => SkewDirection::Positive,
        }
    }
}

// 1.3: quote currency amount. collateral, fees, claimables and deficits all use this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Quote(Decimal);

impl Quote {
    pub fn new(value: Decimal) -> Self {
        Self(value)
    }

    pub fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_negative(&self) -> bool {
        self.0 < Decimal::ZERO
    }

    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    pub fn abs(&self) -> Self {
        Self(self.0.abs())
    }

    pub fn add(&self, other: Quote) -> Self {
        Self(self.0 + other.0)
    }

    pub fn sub(&self, other: Quote) -> Self {
        Self(self.0 - other.0)
    }

    pub fn negate(&self) -> Self {
        Self(-self.0)
    }
}

impl fmt::Display for Quote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl PartialOrd for Quote {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Quote {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.cmp(&other.0)
    }
}

impl Sum for Quote {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::zero(), |acc, q| acc.add(q))
    }
}

// 1.4: oracle timestamp in whole seconds. versions and orders are keyed by it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Timestamp(pub u64);

impl Timestamp {
    pub fn as_secs(&self) -> u64 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Seconds from `earlier` to `self`, zero if `earlier` is later.
    pub fn elapsed_since(&self, earlier: Timestamp) -> u64 {
        self.0.saturating_sub(earlier.0)
    }

    pub fn add_secs(&self, secs: u64) -> Self {
        Self(self.0.saturating_add(secs))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match i64::try_from(self.0).ok().and_then(|secs| DateTime::from_timestamp(secs, 0)) {
            Some(datetime) => write!(f, "{}", datetime.to_rfc3339()),
            None => write!(f, "{}s", self.0),
        }
    }
}

/// Divides `amount` by `total`, or returns zero when there is nothing to divide over.
pub fn per_unit(amount: Decimal, total: Decimal) -> Decimal {
    if total.is_zero() {
        Decimal::ZERO
    } else {
        amount / total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn opposing_sides_exclude_self() {
        assert_eq!(Side::Long.opposing(), [Side::Short, Side::Maker]);
        assert_eq!(Side::Short.opposing(), [Side::Long, Side::Maker]);
        assert_eq!(Side::Maker.opposing(), [Side::Long, Side::Short]);
    }

    #[test]
    fn quote_ordering_and_sum() {
        let total: Quote = [Quote::new(dec!(1.5)), Quote::new(dec!(-0.5))].into_iter().sum();
        assert_eq!(total, Quote::new(dec!(1)));
        assert!(Quote::new(dec!(-1)) < Quote::zero());
    }

    #[test]
    fn timestamp_display_is_rfc3339() {
        assert_eq!(Timestamp(0).to_string(), "1970-01-01T00:00:00+00:00");
        assert_eq!(Timestamp(3600).elapsed_since(Timestamp(4000)), 0);
    }

    #[test]
    fn per_unit_handles_empty_total() {
        assert_eq!(per_unit(dec!(5), Decimal::ZERO), Decimal::ZERO);
        assert_eq!(per_unit(dec!(5), dec!(2)), dec!(2.5));
    }
}
