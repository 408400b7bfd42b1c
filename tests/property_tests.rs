//! Property-based tests for the accumulation math.
//!
//! These tests verify invariants hold under random inputs.

use perp_settlement::funding::{funding_amount, split_funding};
use perp_settlement::interest::accrue_interest;
use perp_settlement::spread::charge_spread;
use perp_settlement::*;
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

// Strategies for generating test data
fn price_strategy() -> impl Strategy<Value = Decimal> {
    (1i64..1_000_000i64).prop_map(|x| Decimal::new(x, 2)) // 0.01 to 10,000
}

fn size_strategy() -> impl Strategy<Value = Decimal> {
    (0i64..100_000i64).prop_map(|x| Decimal::new(x, 3)) // 0 to 100
}

fn rate_strategy() -> impl Strategy<Value = Decimal> {
    (-120i64..=120i64).prop_map(|x| Decimal::new(x, 2)) // -120% to +120%
}

fn cut_strategy() -> impl Strategy<Value = Decimal> {
    (0i64..=100i64).prop_map(|x| Decimal::new(x, 2))
}

fn position_strategy() -> impl Strategy<Value = Position> {
    (size_strategy(), size_strategy(), size_strategy())
        .prop_map(|(maker, long, short)| Position::with_sizes(Timestamp(0), maker, long, short))
}

proptest! {
    /// Funding moves between the sides and the fee; nothing is created or lost
    #[test]
    fn funding_split_is_zero_sum(
        position in position_strategy(),
        integral in -100_000i64..100_000i64,
        price in price_strategy(),
        fee in cut_strategy(),
        receive_only in any::<bool>(),
    ) {
        let amount = funding_amount(Decimal::from(integral), &position, price);
        let split = split_funding(amount, &position, fee, receive_only);
        let sum = split.maker + split.long + split.short + split.fee;
        prop_assert!(sum.abs() < dec!(0.0000000001), "split leaks {}", sum);
        prop_assert!(split.fee >= Decimal::ZERO);
    }

    /// Receive-only makers never pay funding
    #[test]
    fn receive_only_makers_never_pay(
        position in position_strategy(),
        integral in -100_000i64..100_000i64,
        price in price_strategy(),
    ) {
        let amount = funding_amount(Decimal::from(integral), &position, price);
        let split = split_funding(amount, &position, Decimal::ZERO, true);
        prop_assert!(split.maker >= Decimal::ZERO, "maker paid {}", split.maker);
    }

    /// An interval of zero length accrues nothing and leaves the rate where it was
    #[test]
    fn empty_interval_is_a_no_op(
        rate in rate_strategy(),
        skew in -200i64..200i64,
    ) {
        let controller = FundingController::default();
        let accrual = controller.accrue(rate, Decimal::new(skew, 2), 0);
        prop_assert_eq!(accrual.integral, Decimal::ZERO);
        prop_assert_eq!(accrual.rate, controller.clamp(rate));
    }

    /// The controller never leaves its bounds, and the integral is bounded by them
    #[test]
    fn funding_rate_stays_bounded(
        rate in rate_strategy(),
        skew in -200i64..200i64,
        elapsed in 1u64..2_000_000u64,
    ) {
        let controller = FundingController::default();
        let accrual = controller.accrue(rate, Decimal::new(skew, 2), elapsed);
        let dt = Decimal::from(elapsed);
        prop_assert!(accrual.rate >= controller.min && accrual.rate <= controller.max);
        prop_assert!(accrual.integral >= controller.min * dt - dec!(0.000001));
        prop_assert!(accrual.integral <= controller.max * dt + dec!(0.000001));
    }

    /// Interest is paid by takers and received by makers net of the fee
    #[test]
    fn interest_is_zero_sum(
        position in position_strategy(),
        price in price_strategy(),
        elapsed in 0u64..1_000_000u64,
        fee in cut_strategy(),
    ) {
        let split = accrue_interest(&UtilizationCurve::default(), &position, price, elapsed, fee);
        let sum = split.maker + split.long + split.short + split.fee;
        prop_assert!(sum.abs() < dec!(0.0000000001), "interest leaks {}", sum);
        prop_assert!(split.long <= Decimal::ZERO && split.short <= Decimal::ZERO);
        prop_assert!(split.maker >= Decimal::ZERO);
    }

    /// The utilization curve never decreases along utilization
    #[test]
    fn utilization_curve_is_monotone(
        a in 0i64..=150i64,
        b in 0i64..=150i64,
    ) {
        let curve = UtilizationCurve::default();
        let (low, high) = (a.min(b), a.max(b));
        prop_assert!(curve.rate(Decimal::new(low, 2)) <= curve.rate(Decimal::new(high, 2)));
    }

    /// Moving further against the skew never costs less
    #[test]
    fn spread_impact_grows_with_volume(
        skew in 0i64..100i64,
        smaller in 0i64..1_000i64,
        extra in 0i64..1_000i64,
        price in price_strategy(),
    ) {
        let curve = SpreadCurve { d0: dec!(0.0001), d1: dec!(0.002), d2: dec!(0.001), d3: dec!(0.0005) };
        let skew = Decimal::new(skew, 2);
        let small = curve.impact(skew, Decimal::new(smaller, 1), SkewDirection::Positive, dec!(100), price);
        let large = curve.impact(skew, Decimal::new(smaller + extra, 1), SkewDirection::Positive, dec!(100), price);
        prop_assert!(small >= Decimal::ZERO);
        prop_assert!(small <= large);
    }

    /// Following the other side through the skew is never dearer than leading
    #[test]
    fn leading_side_pays_at_least_as_much(
        pos_volume in 0i64..1_000i64,
        neg_volume in 0i64..1_000i64,
        price in price_strategy(),
    ) {
        let curve = SpreadCurve { d0: dec!(0), d1: dec!(0.01), d2: dec!(0), d3: dec!(0) };
        let pos = Decimal::new(pos_volume, 1);
        let neg = Decimal::new(neg_volume, 1);
        let pos_first = charge_spread(&curve, Decimal::ZERO, pos, neg, Some(SkewDirection::Positive), dec!(50), price);
        let neg_first = charge_spread(&curve, Decimal::ZERO, pos, neg, Some(SkewDirection::Negative), dec!(50), price);
        prop_assert!(pos_first.pos >= neg_first.pos);
        prop_assert!(neg_first.neg >= pos_first.neg);
    }
}

#[test]
fn lone_side_pays_the_same_whoever_leads() {
    let curve = SpreadCurve::default();
    let pos_first = charge_spread(&curve, dec!(0.1), dec!(4), dec!(0), Some(SkewDirection::Positive), dec!(10), dec!(100));
    let neg_first = charge_spread(&curve, dec!(0.1), dec!(4), dec!(0), Some(SkewDirection::Negative), dec!(10), dec!(100));
    assert_eq!(pos_first, neg_first);
    assert!(pos_first.pos > Decimal::ZERO);
}
