// 6.0: liquidation. a protected order force-closes an account that fails maintenance.
// the liquidator earns a capped fee, paid out of the risk pool before the account's own
// collateral, and any loss the account cannot cover is socialized to the opposing side.
// 6.1 protection rules. 6.2 maker reduction sizing. 6.3 shortfall queue.

use crate::config::RiskParameter;
use crate::margin::{is_maintained, InvariantError, Projection};
use crate::order::Order;
use crate::position::Position;
use crate::types::{Quote, Side};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

// kept maker size is rounded down to this many places so the remainder stays margined
const MAKER_KEEP_DP: u32 = 12;

/** 6.0: fee schedule captured in each version */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LiquidationFee {
    // fraction of the closed notional
    pub rate: Decimal,
    pub min: Quote,
    pub max: Quote,
}

impl LiquidationFee {
    pub fn compute(&self, closed_notional: Decimal) -> Quote {
        if closed_notional.is_zero() {
            return Quote::zero();
        }
        let fee = (self.rate * closed_notional)
            .max(self.min.value())
            .min(self.max.value());
        Quote::new(fee)
    }
}

/// 6.0: how a liquidation fee is paid: risk pool first, then the account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeFunding {
    pub from_pool: Quote,
    pub from_account: Quote,
}

pub fn fund_liquidation_fee(fee: Quote, pool: Quote) -> FeeFunding {
    let from_pool = fee.min(pool.max(Quote::zero()));
    FeeFunding {
        from_pool,
        from_account: fee.sub(from_pool),
    }
}

// 6.1: what a protected order is checked against
#[derive(Debug, Clone, Copy)]
pub struct ProtectionCheck<'a> {
    pub risk: &'a RiskParameter,
    pub order: &'a Order,
    pub latest_local: &'a Position,
    pub local: &'a Projection,
    pub collateral: Quote,
    pub price: Decimal,
    pub protection_pending: bool,
}

pub fn validate_protection(check: &ProtectionCheck<'_>) -> Result<(), InvariantError> {
    let order = check.order;
    if check.protection_pending {
        return Err(InvariantError::InvalidProtection {
            reason: "a liquidation is already pending",
        });
    }
    if !order.collateral.is_zero() {
        return Err(InvariantError::InvalidProtection {
            reason: "a liquidation cannot move collateral",
        });
    }
    if order.is_empty() || order.increases_position() {
        return Err(InvariantError::InvalidProtection {
            reason: "a liquidation must only close",
        });
    }
    if is_maintained(check.collateral, check.latest_local.magnitude(), check.price, check.risk) {
        return Err(InvariantError::InvalidProtection {
            reason: "account is maintained",
        });
    }

    if check.local.current.is_empty() {
        return Ok(());
    }

    let maker_reduction = check.latest_local.side() == Some(Side::Maker)
        && order.taker_total().is_zero()
        && order.maker_neg
            == required_maker_reduction(check.latest_local.maker, check.collateral, check.price, check.risk);
    if maker_reduction {
        return Ok(());
    }

    Err(InvariantError::InvalidProtection {
        reason: "a liquidation must close the whole position",
    })
}

// 6.2: maker size to remove so the rest is margined by what `collateral` has left once
// the account has paid the liquidation fee on the removed size. the fee is assumed to
// come entirely from the account; whatever the risk pool covers only adds headroom.
//
// with m the margin and r the fee per unit, keeping k of `maker` needs
//   collateral - fee(maker - k) >= m * k
// fee(cut) is at most max(r * cut, min fee), so k is bounded by both
//   (collateral - r * maker) / (m - r)   and   (collateral - min fee) / m
pub fn required_maker_reduction(maker: Decimal, collateral: Quote, price: Decimal, risk: &RiskParameter) -> Decimal {
    if is_maintained(collateral, maker, price, risk) {
        return Decimal::ZERO;
    }
    let schedule = risk.liquidation_fee_schedule();
    let per_unit_margin = risk.margin * price;
    let per_unit_fee = schedule.rate * price;
    if !collateral.is_positive() || per_unit_margin <= per_unit_fee {
        return maker;
    }

    let proportional = (collateral.value() - per_unit_fee * maker) / (per_unit_margin - per_unit_fee);
    let floored = (collateral.value() - schedule.min.value()) / per_unit_margin;
    let keep = proportional
        .min(floored)
        .round_dp_with_strategy(MAKER_KEEP_DP, RoundingStrategy::ToZero)
        .min(maker);
    if !keep.is_positive() {
        return maker;
    }

    let fee = schedule.compute((maker - keep) * price);
    if collateral.sub(fee) < risk.min_margin {
        return maker;
    }
    maker - keep
}

/** 6.3: losses waiting to be charged to each side at the next accumulation */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Shortfall {
    pub maker: Decimal,
    pub long: Decimal,
    pub short: Decimal,
    // no opposing position existed when it was queued
    pub unallocated: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ShortfallCharge {
    pub maker: Decimal,
    pub long: Decimal,
    pub short: Decimal,
}

impl ShortfallCharge {
    pub fn total(&self) -> Decimal {
        self.maker + self.long + self.short
    }
}

impl Shortfall {
    pub fn total(&self) -> Decimal {
        self.maker + self.long + self.short + self.unallocated
    }

    pub fn is_empty(&self) -> bool {
        self.total().is_zero()
    }

    /// Queues `amount` lost by a `closed` position across the opposing sides of `global`,
    /// pro rata by size.
    pub fn allocate(&mut self, amount: Decimal, closed: Side, global: &Position) {
        let [first, second] = closed.opposing();
        let total = global.size(first) + global.size(second);
        if total.is_zero() {
            self.unallocated += amount;
            return;
        }
        let first_share = amount * global.size(first) / total;
        self.add(first, first_share);
        self.add(second, amount - first_share);
    }

    fn add(&mut self, side: Side, amount: Decimal) {
        match side {
            Side::Maker => self.maker += amount,
            Side::Long => self.long += amount,
            Side::Short => self.short += amount,
        }
    }

    /// Removes and returns what `position` can absorb now. Sides with no holders keep
    /// their share queued; the unallocated bucket spreads over whoever is open.
    pub fn take(&mut self, position: &Position) -> ShortfallCharge {
        let mut charge = ShortfallCharge::default();
        if !position.maker.is_zero() {
            charge.maker = std::mem::take(&mut self.maker);
        }
        if !position.long.is_zero() {
            charge.long = std::mem::take(&mut self.long);
        }
        if !position.short.is_zero() {
            charge.short = std::mem::take(&mut self.short);
        }

        let open = position.maker + position.long + position.short;
        if !self.unallocated.is_zero() && !open.is_zero() {
            let amount = std::mem::take(&mut self.unallocated);
            let maker = amount * position.maker / open;
            let long = amount * position.long / open;
            charge.maker += maker;
            charge.long += long;
            charge.short += amount - maker - long;
        }
        charge
    }
}
