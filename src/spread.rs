// 5.2: price impact. takers moving the skew pay the integral of a cubic spread curve over
// the skew range they traverse. the curve is evaluated in the mover's own direction, so a
// symmetric curve charges buys and sells alike.

use crate::types::SkewDirection;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/** 5.2: spread(s) = d0 + d1 s + d2 s^2 + d3 s^3 over normalized skew */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpreadCurve {
    pub d0: Decimal,
    pub d1: Decimal,
    pub d2: Decimal,
    pub d3: Decimal,
}

impl Default for SpreadCurve {
    fn default() -> Self {
        Self {
            d0: dec!(0),
            d1: dec!(0.001),
            d2: dec!(0),
            d3: dec!(0),
        }
    }
}

impl SpreadCurve {
    pub fn zero() -> Self {
        Self {
            d0: Decimal::ZERO,
            d1: Decimal::ZERO,
            d2: Decimal::ZERO,
            d3: Decimal::ZERO,
        }
    }

    pub fn spread(&self, skew: Decimal) -> Decimal {
        self.d0 + skew * (self.d1 + skew * (self.d2 + skew * self.d3))
    }

    fn antiderivative(&self, s: Decimal) -> Decimal {
        let s2 = s * s;
        self.d0 * s + self.d1 * s2 / dec!(2) + self.d2 * s2 * s / dec!(3) + self.d3 * s2 * s2 / dec!(4)
    }

    pub fn integral(&self, from: Decimal, to: Decimal) -> Decimal {
        self.antiderivative(to) - self.antiderivative(from)
    }

    /// Quote cost of moving `volume` units in `direction` starting from normalized `skew`.
    /// Moves that earn a negative integral (rebalancing) cost nothing.
    pub fn impact(
        &self,
        skew: Decimal,
        volume: Decimal,
        direction: SkewDirection,
        skew_scale: Decimal,
        price: Decimal,
    ) -> Decimal {
        if volume.is_zero() || skew_scale.is_zero() {
            return Decimal::ZERO;
        }
        let from = direction.sign() * skew;
        let to = from + volume / skew_scale;
        (self.integral(from, to) * skew_scale * price).max(Decimal::ZERO)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SpreadCharge {
    // total paid by skew-positive volume
    pub pos: Decimal,
    // total paid by skew-negative volume
    pub neg: Decimal,
}

impl SpreadCharge {
    pub fn total(&self) -> Decimal {
        self.pos + self.neg
    }
}

/// Prices one version's taker volume against the pre-existing skew. The `lead` side
/// moves first; the other side is priced from where the lead left the skew.
pub fn charge_spread(
    curve: &SpreadCurve,
    skew: Decimal,
    pos_volume: Decimal,
    neg_volume: Decimal,
    lead: Option<SkewDirection>,
    skew_scale: Decimal,
    price: Decimal,
) -> SpreadCharge {
    let first = lead.unwrap_or(SkewDirection::Positive);
    let volume = |direction: SkewDirection| match direction {
        SkewDirection::Positive => pos_volume,
        SkewDirection::Negative => neg_volume,
    };

    let first_cost = curve.impact(skew, volume(first), first, skew_scale, price);
    let moved = if skew_scale.is_zero() {
        skew
    } else {
        skew + first.sign() * volume(first) / skew_scale
    };
    let second = first.opposite();
    let second_cost = curve.impact(moved, volume(second), second, skew_scale, price);

    match first {
        SkewDirection::Positive => SpreadCharge {
            pos: first_cost,
            neg: second_cost,
        },
        SkewDirection::Negative => SpreadCharge {
            pos: second_cost,
            neg: first_cost,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_curve_integral() {
        let curve = SpreadCurve { d0: dec!(0), d1: dec!(0.01), d2: dec!(0), d3: dec!(0) };
        // ∫0..1 0.01 s ds = 0.005, times scale 10 and price 100
        let cost = curve.impact(dec!(0), dec!(10), SkewDirection::Positive, dec!(10), dec!(100));
        assert_eq!(cost, dec!(5));
    }

    #[test]
    fn symmetric_in_direction() {
        let curve = SpreadCurve::default();
        let buy = curve.impact(dec!(0.2), dec!(3), SkewDirection::Positive, dec!(10), dec!(50));
        let sell = curve.impact(dec!(-0.2), dec!(3), SkewDirection::Negative, dec!(10), dec!(50));
        assert_eq!(buy, sell);
    }

    #[test]
    fn rebalancing_move_is_free_under_linear_curve() {
        let curve = SpreadCurve::default();
        let cost = curve.impact(dec!(0.5), dec!(2), SkewDirection::Negative, dec!(10), dec!(50));
        assert_eq!(cost, dec!(0));
    }

    #[test]
    fn lead_side_is_priced_first() {
        let curve = SpreadCurve { d0: dec!(0), d1: dec!(0.01), d2: dec!(0), d3: dec!(0) };
        let pos_first = charge_spread(&curve, dec!(0), dec!(10), dec!(10), Some(SkewDirection::Positive), dec!(10), dec!(100));
        let neg_first = charge_spread(&curve, dec!(0), dec!(10), dec!(10), Some(SkewDirection::Negative), dec!(10), dec!(100));
        // the leader moves from zero and pays; the follower rebalances for free
        assert_eq!(pos_first.pos, dec!(5));
        assert_eq!(pos_first.neg, dec!(0));
        assert_eq!(neg_first.neg, dec!(5));
        assert_eq!(neg_first.pos, dec!(0));
    }

    #[test]
    fn zero_volume_costs_nothing() {
        let charge = charge_spread(&SpreadCurve::default(), dec!(0.3), dec!(0), dec!(0), None, dec!(10), dec!(100));
        assert_eq!(charge.total(), dec!(0));
    }
}
