//! Market-wide accumulation at one oracle version.
//!
//! Produces the next [`Version`] from the last valid one: funding, interest and pnl
//! over the elapsed interval, shortfall charges queued by liquidations, and the
//! per-version fee rates and price impact for the global order settling here. Every
//! quote amount that leaves one side lands on another side or in a fee pool, so the
//! result totals are enough to check the books balance.

use crate::config::{MarketParameter, ProtocolParameter, RiskParameter};
use crate::funding::{funding_amount, split_funding};
use crate::interest::accrue_interest;
use crate::liquidation::Shortfall;
use crate::oracle::OracleVersion;
use crate::order::{Guarantee, Order};
use crate::position::Position;
use crate::spread::charge_spread;
use crate::types::per_unit;
use crate::version::Version;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy)]
pub struct AccumulationInput<'a> {
    // last valid version, where the previous interval ended
    pub from: &'a Version,
    // settled global position over the interval, before `order`
    pub position: &'a Position,
    pub order: &'a Order,
    pub guarantee: &'a Guarantee,
    pub oracle: &'a OracleVersion,
    pub funding_rate: Decimal,
    pub risk: &'a RiskParameter,
    pub market: &'a MarketParameter,
    pub protocol: &'a ProtocolParameter,
}

/// Totals moved by one accumulation. Side flows are signed, positive received.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AccumulationResult {
    pub funding_maker: Decimal,
    pub funding_long: Decimal,
    pub funding_short: Decimal,
    pub funding_fee: Decimal,
    pub interest_maker: Decimal,
    pub interest_long: Decimal,
    pub interest_short: Decimal,
    pub interest_fee: Decimal,
    pub pnl_maker: Decimal,
    pub pnl_long: Decimal,
    pub pnl_short: Decimal,
    pub spread: Decimal,
    pub trade_fee: Decimal,
    pub referral: Decimal,
    pub settlement_fee: Decimal,
    pub shortfall: Decimal,
    // trade fees net of referrals plus the funding and interest cuts
    pub market_fee: Decimal,
    pub protocol_fee: Decimal,
    pub oracle_fee: Decimal,
    pub risk_fee: Decimal,
    pub donation: Decimal,
    pub funding_rate: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Accumulation {
    pub version: Version,
    pub result: AccumulationResult,
}

// places kept by per-unit values; the division residue is donated
const VALUE_DP: u32 = 18;

// receivers are rounded down and payers up, never in their favour
fn round_per_unit(exact: Decimal) -> Decimal {
    let strategy = if exact < Decimal::ZERO {
        RoundingStrategy::AwayFromZero
    } else {
        RoundingStrategy::ToZero
    };
    exact.round_dp_with_strategy(VALUE_DP, strategy)
}

/// Adds `amount` spread over `size` to a per-unit accumulator. Returns what the holders
/// did not absorb: the whole amount when there are none, otherwise the non-negative
/// rounding residue.
fn increment(value: &mut Decimal, amount: Decimal, size: Decimal) -> Decimal {
    if amount.is_zero() {
        return Decimal::ZERO;
    }
    if size.is_zero() {
        return amount;
    }
    let mut per_unit = round_per_unit(amount / size);
    // the quotient itself is rounded to 28 digits and may land on the wrong side
    if amount - per_unit * size < Decimal::ZERO {
        per_unit -= Decimal::new(1, VALUE_DP);
    }
    *value += per_unit;
    amount - per_unit * size
}

/// Per-unit charge for `amount` over `volume`, rounded up so the payers cover it.
fn charge_per_unit(amount: Decimal, volume: Decimal) -> Decimal {
    let mut charge = per_unit(amount, volume).round_dp_with_strategy(VALUE_DP, RoundingStrategy::AwayFromZero);
    if charge * volume < amount {
        charge += Decimal::new(1, VALUE_DP);
    }
    charge
}

struct Sides<'a> {
    version: &'a mut Version,
    position: &'a Position,
    unabsorbed: Decimal,
}

impl Sides<'_> {
    fn credit(&mut self, maker: Decimal, long: Decimal, short: Decimal) {
        self.unabsorbed += increment(&mut self.version.maker_value, maker, self.position.maker);
        self.unabsorbed += increment(&mut self.version.long_value, long, self.position.long);
        self.unabsorbed += increment(&mut self.version.short_value, short, self.position.short);
    }
}

/// Accumulates the interval ending at `input.oracle` and prices `input.order` there.
/// `shortfall` is drained of whatever the open sides can absorb. Invalid versions only
/// charge the settlement fee.
pub fn accumulate(input: &AccumulationInput<'_>, shortfall: &mut Shortfall) -> Accumulation {
    let oracle = input.oracle;
    let order = input.order;
    let guarantee = input.guarantee;
    let mut result = AccumulationResult {
        funding_rate: input.funding_rate,
        ..AccumulationResult::default()
    };

    let price = if oracle.valid { oracle.price } else { input.from.price };
    let mut version = input.from.next(oracle.timestamp, oracle.valid, price);
    version.liquidation_fee = input.risk.liquidation_fee_schedule();

    // 1. settlement fee, split over orders outside guarantees. what the orders pay in
    // total may exceed the oracle's fee by the rounding, and the oracle pool keeps it
    let charged = Decimal::from(order.orders.saturating_sub(guarantee.orders));
    if !charged.is_zero() {
        version.settlement_fee = charge_per_unit(oracle.settlement_fee, charged);
        result.settlement_fee = version.settlement_fee * charged;
    }

    if !oracle.valid {
        result.oracle_fee = result.settlement_fee;
        return Accumulation { version, result };
    }

    let position = input.position;
    let mut sides = Sides {
        version: &mut version,
        position,
        unabsorbed: Decimal::ZERO,
    };

    // 2. interval flows need a previous price to measure against
    let previous = input.from.price;
    if !previous.is_zero() {
        let elapsed = oracle.timestamp.elapsed_since(input.from.timestamp);
        let risk = input.risk;

        let accrual = risk.funding.accrue(input.funding_rate, position.skew(risk.skew_scale), elapsed);
        result.funding_rate = accrual.rate;
        let amount = funding_amount(accrual.integral, position, price);
        let funding = split_funding(amount, position, input.market.funding_fee, risk.maker_receive_only);
        result.funding_maker = funding.maker;
        result.funding_long = funding.long;
        result.funding_short = funding.short;
        result.funding_fee = funding.fee;
        sides.credit(funding.maker, funding.long, funding.short);

        let interest = accrue_interest(&risk.utilization, position, price, elapsed, input.market.interest_fee);
        result.interest_maker = interest.maker;
        result.interest_long = interest.long;
        result.interest_short = interest.short;
        result.interest_fee = interest.fee;
        sides.credit(interest.maker, interest.long, interest.short);

        let change = price - previous;
        result.pnl_long = change * position.long_socialized();
        result.pnl_short = -change * position.short_socialized();
        result.pnl_maker = -(result.pnl_long + result.pnl_short);
        sides.credit(result.pnl_maker, result.pnl_long, result.pnl_short);
    }

    // 3. losses left by liquidated accounts
    let charge = shortfall.take(position);
    result.shortfall = charge.total();
    sides.credit(-charge.maker, -charge.long, -charge.short);

    // 4. price impact, paid by movers to the makers already in the book
    let risk = input.risk;
    let pos_volume = order.taker_pos() - guarantee.taker_pos;
    let neg_volume = order.taker_neg() - guarantee.taker_neg;
    let spread = charge_spread(
        &risk.spread,
        position.skew(risk.skew_scale),
        pos_volume,
        neg_volume,
        order.lead,
        risk.skew_scale,
        price,
    );
    sides.version.spread_pos = charge_per_unit(spread.pos, pos_volume);
    sides.version.spread_neg = charge_per_unit(spread.neg, neg_volume);
    result.spread = sides.version.spread_pos * pos_volume + sides.version.spread_neg * neg_volume;
    sides.credit(result.spread, Decimal::ZERO, Decimal::ZERO);

    // 5. trade fees per unit, referral shares carved out before the split
    sides.version.taker_fee = risk.taker_fee * price;
    sides.version.maker_fee = risk.maker_fee * price;
    let taker_volume = order.taker_total() - guarantee.taker_total() + guarantee.taker_fee;
    result.trade_fee = sides.version.taker_fee * taker_volume + sides.version.maker_fee * order.maker_total();
    result.referral = (order.taker_referral + guarantee.referral) * sides.version.taker_fee
        + order.maker_referral * sides.version.maker_fee;

    let unabsorbed = sides.unabsorbed;

    // 6. fee split: protocol first, then oracle and risk shares, the rest donated
    result.market_fee = result.trade_fee - result.referral + result.funding_fee + result.interest_fee;
    result.protocol_fee = result.market_fee * input.protocol.protocol_fee;
    let remaining = result.market_fee - result.protocol_fee;
    let oracle_share = remaining * input.market.oracle_fee;
    result.risk_fee = remaining * input.market.risk_fee;
    result.oracle_fee = oracle_share + result.settlement_fee;
    result.donation = remaining - oracle_share - result.risk_fee + unabsorbed;

    Accumulation { version, result }
}
