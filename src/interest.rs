//! Utilization-based interest paid by takers to makers.
//!
//! The rate follows a three segment curve over utilization: it rises linearly from
//! `min_rate` to `target_rate` at `target_utilization`, then to `max_rate` at full
//! utilization, and stays flat beyond that.

use crate::position::Position;
use crate::types::{per_unit, SECONDS_PER_YEAR};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UtilizationCurve {
    pub min_rate: Decimal,
    pub max_rate: Decimal,
    pub target_rate: Decimal,
    pub target_utilization: Decimal,
}

impl Default for UtilizationCurve {
    fn default() -> Self {
        Self {
            min_rate: dec!(0),
            max_rate: dec!(0.8),
            target_rate: dec!(0.08),
            target_utilization: dec!(0.8),
        }
    }
}

impl UtilizationCurve {
    /// Annualised rate at `utilization`.
    pub fn rate(&self, utilization: Decimal) -> Decimal {
        let utilization = utilization.max(Decimal::ZERO);
        if utilization < self.target_utilization {
            return interpolate(
                utilization,
                Decimal::ZERO,
                self.target_utilization,
                self.min_rate,
                self.target_rate,
            );
        }
        if utilization < Decimal::ONE {
            return interpolate(
                utilization,
                self.target_utilization,
                Decimal::ONE,
                self.target_rate,
                self.max_rate,
            );
        }
        self.max_rate
    }
}

fn interpolate(x: Decimal, x0: Decimal, x1: Decimal, y0: Decimal, y1: Decimal) -> Decimal {
    if x1 <= x0 {
        return y1;
    }
    y0 + (y1 - y0) * (x - x0) / (x1 - x0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct InterestSplit {
    pub maker: Decimal,
    pub long: Decimal,
    pub short: Decimal,
    pub fee: Decimal,
}

/// Interest over `elapsed` seconds. Takers pay pro rata by size; makers receive the
/// payment minus `interest_fee`.
pub fn accrue_interest(
    curve: &UtilizationCurve,
    position: &Position,
    price: Decimal,
    elapsed: u64,
    interest_fee: Decimal,
) -> InterestSplit {
    let takers = position.long + position.short;
    let utilization = position.utilization();
    let notional = position.maker.min(takers) * price;
    let interest = curve.rate(utilization) * Decimal::from(elapsed) * utilization * notional
        / Decimal::from(SECONDS_PER_YEAR);
    if interest.is_zero() {
        return InterestSplit::default();
    }

    let fee = interest * interest_fee;
    let long = interest * per_unit(position.long, takers);
    InterestSplit {
        maker: interest - fee,
        long: -long,
        short: -(interest - long),
        fee,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Timestamp;

    #[test]
    fn curve_segments() {
        let curve = UtilizationCurve::default();
        assert_eq!(curve.rate(dec!(0)), dec!(0));
        assert_eq!(curve.rate(dec!(0.4)), dec!(0.04));
        assert_eq!(curve.rate(dec!(0.8)), dec!(0.08));
        assert_eq!(curve.rate(dec!(0.9)), dec!(0.44));
        assert_eq!(curve.rate(dec!(1)), dec!(0.8));
        assert_eq!(curve.rate(dec!(3)), dec!(0.8));
    }

    #[test]
    fn no_makers_no_interest() {
        let position = Position::with_sizes(Timestamp(0), dec!(0), dec!(5), dec!(0));
        let split = accrue_interest(&UtilizationCurve::default(), &position, dec!(100), 3600, dec!(0.1));
        assert_eq!(split, InterestSplit::default());
    }

    #[test]
    fn takers_pay_makers_net_of_fee() {
        let position = Position::with_sizes(Timestamp(0), dec!(10), dec!(6), dec!(2));
        let split = accrue_interest(&UtilizationCurve::default(), &position, dec!(100), 86_400, dec!(0.1));
        assert!(split.maker > Decimal::ZERO);
        assert_eq!(split.maker + split.long + split.short, -split.fee);
        // longs hold three quarters of taker size
        assert!((split.long - split.short * dec!(3)).abs() < dec!(0.000000000001));
    }
}
