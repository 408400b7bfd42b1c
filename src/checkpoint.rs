//! Per-account reconciliation of one settled order against its version.
//!
//! Settling an order values the account's previous position across the versions it
//! spans, then books the order's transfer and charges, and finally merges the order
//! into the position. The result is written as a [`Checkpoint`], one per settled
//! timestamp, so replaying the same version cannot charge anything twice.

use crate::liquidation::fund_liquidation_fee;
use crate::pending::PendingEntry;
use crate::position::{Position, PositionError};
use crate::types::{AccountId, Quote, Side, Timestamp};
use crate::version::Version;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Checkpoint {
    pub timestamp: Timestamp,
    // collateral entering the version, before anything below
    pub collateral: Quote,
    pub transfer: Quote,
    pub pnl: Quote,
    pub trade_fee: Quote,
    pub spread: Quote,
    pub settlement_fee: Quote,
    pub liquidation_fee: Quote,
    pub price_adjustment: Quote,
    pub deficit_repaid: Quote,
}

impl Checkpoint {
    /// Collateral after the version: what entered plus every booked line.
    pub fn collateral_after(&self) -> Quote {
        self.collateral
            .add(self.transfer)
            .sub(self.deficit_repaid)
            .add(self.pnl)
            .sub(self.trade_fee)
            .sub(self.spread)
            .sub(self.settlement_fee)
            .add(self.price_adjustment)
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CheckpointError {
    #[error("checkpoint at {0} already written")]
    Duplicate(Timestamp),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckpointLog {
    entries: BTreeMap<Timestamp, Checkpoint>,
}

impl CheckpointLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, checkpoint: Checkpoint) -> Result<(), CheckpointError> {
        if self.entries.contains_key(&checkpoint.timestamp) {
            return Err(CheckpointError::Duplicate(checkpoint.timestamp));
        }
        self.entries.insert(checkpoint.timestamp, checkpoint);
        Ok(())
    }

    pub fn get(&self, timestamp: Timestamp) -> Option<&Checkpoint> {
        self.entries.get(&timestamp)
    }

    pub fn contains(&self, timestamp: Timestamp) -> bool {
        self.entries.contains_key(&timestamp)
    }

    pub fn latest(&self) -> Option<&Checkpoint> {
        self.entries.values().next_back()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Checkpoint> {
        self.entries.values()
    }
}

/// Value earned by holding `position` from version `from` to version `to`.
pub fn valuation(position: &Position, from: &Version, to: &Version) -> Decimal {
    position.maker * (to.maker_value - from.maker_value)
        + position.long * (to.long_value - from.long_value)
        + position.short * (to.short_value - from.short_value)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreditKind {
    Referral,
    Originator,
    Solver,
    Liquidation,
}

/// Amount owed to a third party's claimable balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credit {
    pub account: AccountId,
    pub amount: Quote,
    pub kind: CreditKind,
}

#[derive(Debug, Clone, Copy)]
pub struct LocalInput<'a> {
    pub entry: &'a PendingEntry,
    // version the position was last valued at
    pub from: &'a Version,
    pub version: &'a Version,
    pub position: &'a Position,
    pub collateral: Quote,
    pub deficit: Quote,
    pub risk_pool: Quote,
    pub liquidator: Option<AccountId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LocalSettlement {
    pub checkpoint: Checkpoint,
    pub collateral: Quote,
    pub deficit: Quote,
    pub position: Position,
    // liquidation fee paid out of the risk pool
    pub pool_debit: Quote,
    // deficit repaid into the risk pool
    pub pool_credit: Quote,
    pub credits: Vec<Credit>,
    // loss left after a liquidation closed the account, with the side it held
    pub shortfall: Option<(Side, Quote)>,
}

/// Books one pending entry at its version. At an invalid version only the valuation,
/// the transfer and the settlement fee apply; the deltas are carried by the caller.
pub fn settle_order(input: &LocalInput<'_>) -> Result<LocalSettlement, PositionError> {
    let version = input.version;
    let order = &input.entry.order;
    let guarantee = &input.entry.guarantee;

    let mut checkpoint = Checkpoint {
        timestamp: version.timestamp,
        collateral: input.collateral,
        transfer: order.collateral,
        pnl: Quote::new(valuation(input.position, input.from, version)),
        settlement_fee: Quote::new(version.settlement_fee * Decimal::from(order.orders.saturating_sub(guarantee.orders))),
        ..Checkpoint::default()
    };

    let mut deficit = input.deficit;
    if order.collateral.is_positive() && deficit.is_positive() {
        checkpoint.deficit_repaid = order.collateral.min(deficit);
        deficit = deficit.sub(checkpoint.deficit_repaid);
    }

    let mut settlement = LocalSettlement {
        checkpoint,
        collateral: Quote::zero(),
        deficit,
        position: Position {
            timestamp: version.timestamp,
            ..*input.position
        },
        pool_debit: Quote::zero(),
        pool_credit: checkpoint.deficit_repaid,
        credits: Vec::new(),
        shortfall: None,
    };

    if !version.valid {
        settlement.collateral = settlement.checkpoint.collateral_after();
        return Ok(settlement);
    }

    // 1. trade fees: guaranteed volume only pays when it was marked fee paying
    let taker_volume = order.taker_total() - guarantee.taker_total() + guarantee.taker_fee;
    settlement.checkpoint.trade_fee =
        Quote::new(version.taker_fee * taker_volume + version.maker_fee * order.maker_total());

    // 2. price impact on the non-guaranteed legs
    let spread = version.spread_pos * (order.taker_pos() - guarantee.taker_pos)
        + version.spread_neg * (order.taker_neg() - guarantee.taker_neg);
    settlement.checkpoint.spread = Quote::new(spread);

    settlement.checkpoint.price_adjustment = Quote::new(guarantee.price_adjustment(version.price));

    // 3. third party shares of the trade fee
    let entry = input.entry;
    let referral = order.taker_referral * version.taker_fee + order.maker_referral * version.maker_fee;
    if let Some(referrer) = entry.referrer {
        push_credit(&mut settlement.credits, referrer, referral, CreditKind::Referral);
    }
    let intent_referral = guarantee.referral * version.taker_fee;
    match (entry.originator, entry.solver) {
        (Some(originator), Some(solver)) => {
            let solver_share = intent_referral * entry.solver_fee;
            push_credit(&mut settlement.credits, solver, solver_share, CreditKind::Solver);
            push_credit(&mut settlement.credits, originator, intent_referral - solver_share, CreditKind::Originator);
        }
        (Some(originator), None) => {
            push_credit(&mut settlement.credits, originator, intent_referral, CreditKind::Originator);
        }
        (None, Some(solver)) => push_credit(&mut settlement.credits, solver, intent_referral, CreditKind::Solver),
        (None, None) => {}
    }

    let mut collateral = settlement.checkpoint.collateral_after();

    // 4. liquidation fee, risk pool first
    if order.is_protected() {
        let closed = order.maker_neg + order.long_neg + order.short_neg;
        let fee = version.liquidation_fee.compute(closed * version.price);
        let funding = fund_liquidation_fee(fee, input.risk_pool);
        settlement.checkpoint.liquidation_fee = fee;
        settlement.pool_debit = funding.from_pool;
        collateral = collateral.sub(funding.from_account);
        if let Some(liquidator) = input.liquidator {
            push_credit(&mut settlement.credits, liquidator, fee.value(), CreditKind::Liquidation);
        }
    }

    let closed_side = input.position.side();
    settlement.position = input.position.apply(order)?;
    settlement.position.timestamp = version.timestamp;

    // 5. an emptied, liquidated account cannot stay negative
    if order.is_protected() && settlement.position.is_empty() && collateral.is_negative() {
        let shortfall = collateral.negate();
        if let Some(side) = closed_side {
            settlement.shortfall = Some((side, shortfall));
        }
        settlement.deficit = settlement.deficit.add(shortfall);
        collateral = Quote::zero();
    }

    settlement.collateral = collateral;
    Ok(settlement)
}

fn push_credit(credits: &mut Vec<Credit>, account: AccountId, amount: Decimal, kind: CreditKind) {
    if amount > Decimal::ZERO {
        credits.push(Credit {
            account,
            amount: Quote::new(amount),
            kind,
        });
    }
}
