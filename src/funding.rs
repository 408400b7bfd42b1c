// 5.0: funding. a proportional controller drifts the annualised rate with skew, and takers
// owe the time integral of that rate on their matched exposure.
// 5.0 has the controller. 5.1 splits one interval's funding between makers, longs and shorts.

use crate::position::Position;
use crate::types::SECONDS_PER_YEAR;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/** 5.0: rate moves by skew / k per second, bounded to [min, max] */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundingController {
    // seconds of full skew needed to move the rate by 1 (100% apr)
    pub k: Decimal,
    pub min: Decimal,
    pub max: Decimal,
}

impl Default for FundingController {
    fn default() -> Self {
        Self {
            k: dec!(40000),
            min: dec!(-1.2),
            max: dec!(1.2),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FundingAccrual {
    // controller state at the end of the interval
    pub rate: Decimal,
    // ∫ rate dt over the interval, in rate-seconds
    pub integral: Decimal,
}

impl FundingController {
    pub fn clamp(&self, rate: Decimal) -> Decimal {
        rate.max(self.min).min(self.max)
    }

    /// Advance the controller from `rate` over `elapsed` seconds at a constant `skew`.
    /// When a bound is hit mid-interval the integral is split at the intercept.
    pub fn accrue(&self, rate: Decimal, skew: Decimal, elapsed: u64) -> FundingAccrual {
        let start = self.clamp(rate);
        let dt = Decimal::from(elapsed);
        if self.k.is_zero() || dt.is_zero() {
            return FundingAccrual {
                rate: start,
                integral: start * dt,
            };
        }

        let slope = skew / self.k;
        let unbounded = start + slope * dt;
        if unbounded > self.max {
            let hit = ((self.max - start) / slope).min(dt);
            return FundingAccrual {
                rate: self.max,
                integral: (start + self.max) / dec!(2) * hit + self.max * (dt - hit),
            };
        }
        if unbounded < self.min {
            let hit = ((self.min - start) / slope).min(dt);
            return FundingAccrual {
                rate: self.min,
                integral: (start + self.min) / dec!(2) * hit + self.min * (dt - hit),
            };
        }

        FundingAccrual {
            rate: unbounded,
            integral: (start + unbounded) / dec!(2) * dt,
        }
    }
}

// 5.1: one interval's funding. positive values are received, negative paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FundingSplit {
    pub maker: Decimal,
    pub long: Decimal,
    pub short: Decimal,
    pub fee: Decimal,
}

/// Funding owed over an interval: positive means longs pay.
pub fn funding_amount(integral: Decimal, position: &Position, price: Decimal) -> Decimal {
    integral / Decimal::from(SECONDS_PER_YEAR) * position.taker_socialized() * price
}

/// Splits `amount` between the sides of `position`. The fee comes off both legs evenly,
/// and the minor side's flow is shared with makers for the exposure they back.
pub fn split_funding(
    amount: Decimal,
    position: &Position,
    funding_fee: Decimal,
    maker_receive_only: bool,
) -> FundingSplit {
    let skew = position.net_taker();
    let mut funding = amount;
    // makers never pay: flip whenever the rate opposes the skew
    if maker_receive_only && !funding.is_zero() && funding.is_sign_positive() != skew.is_sign_positive() {
        funding = -funding;
    }

    let fee = funding.abs() * funding_fee;
    let half = fee / dec!(2);
    let mut split = FundingSplit {
        maker: Decimal::ZERO,
        long: -funding - fee + half,
        short: funding - half,
        fee,
    };

    let portion = position.socialized_maker_portion();
    if position.long > position.short {
        split.maker = split.short * portion;
        split.short -= split.maker;
    } else if position.short > position.long {
        split.maker = split.long * portion;
        split.long -= split.maker;
    }
    split
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Timestamp;

    #[test]
    fn controller_integrates_linear_drift() {
        let controller = FundingController::default();
        let accrual = controller.accrue(Decimal::ZERO, dec!(1), 3600);
        assert_eq!(accrual.rate, dec!(0.09));
        assert_eq!(accrual.integral, dec!(162));
    }

    #[test]
    fn controller_flattens_at_bound() {
        let controller = FundingController { k: dec!(100), min: dec!(-1), max: dec!(1) };
        // hits 1.0 after 100s, then flat for 100s
        let accrual = controller.accrue(Decimal::ZERO, dec!(1), 200);
        assert_eq!(accrual.rate, dec!(1));
        assert_eq!(accrual.integral, dec!(150));
    }

    #[test]
    fn split_conserves_everything_but_the_fee() {
        let position = Position::with_sizes(Timestamp(0), dec!(3), dec!(10), dec!(4));
        let split = split_funding(dec!(1.5), &position, dec!(0.1), false);
        assert_eq!(split.fee, dec!(0.15));
        assert_eq!(split.maker + split.long + split.short, -split.fee);
        assert!(split.long < Decimal::ZERO);
        assert!(split.maker > Decimal::ZERO);
    }

    #[test]
    fn maker_receive_only_flips_opposing_rate() {
        // shorts heavy, rate says longs pay: makers would pay, so flip
        let position = Position::with_sizes(Timestamp(0), dec!(10), dec!(0), dec!(5));
        let split = split_funding(dec!(1), &position, Decimal::ZERO, true);
        assert_eq!(split.short, dec!(-1));
        assert_eq!(split.maker, dec!(1));
        assert_eq!(split.long, dec!(0));
    }
}
