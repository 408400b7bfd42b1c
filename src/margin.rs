//! Margin, maintenance and the invariants an order must satisfy to be accepted.
//!
//! Requirements are a fraction of notional with an absolute floor, measured at the
//! latest settled price on the largest magnitude the account will hold while its
//! orders are pending. A pure reduction only has to cover where it leads. Every check here runs on projected copies of state; nothing is
//! mutated until the whole order has passed.

use crate::config::{EfficiencyMode, MarketParameter, RiskParameter};
use crate::order::Order;
use crate::position::{Position, PositionError};
use crate::types::{Quote, Side, Timestamp};
use rust_decimal::Decimal;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InvariantError {
    #[error("collateral {collateral} is negative after pending deltas")]
    InsufficientCollateral { collateral: Quote },

    #[error("collateral {collateral} below required margin {required}")]
    InsufficientMargin { collateral: Quote, required: Quote },

    #[error("maker position {maker} exceeds limit {limit}")]
    MakerOverLimit { maker: Decimal, limit: Decimal },

    #[error("efficiency {efficiency} under limit {limit}")]
    EfficiencyUnderLimit { efficiency: Decimal, limit: Decimal },

    #[error("taker position would exceed maker-backed liquidity")]
    InsufficientLiquidity,

    #[error("{pending} pending orders exceed limit {limit}")]
    PendingLimitExceeded { pending: u64, limit: u64 },

    #[error(transparent)]
    OverClose(#[from] PositionError),

    #[error("position must stay single sided: {held:?} then {requested:?}")]
    NotSingleSided { held: Option<Side>, requested: Option<Side> },

    #[error("market is settle only")]
    SettleOnly,

    #[error("market is closed to new positions")]
    MarketClosed,

    #[error("outstanding deficit {deficit} must be repaid before reopening")]
    OutstandingDeficit { deficit: Quote },

    #[error("latest price from {latest} is stale at {now}")]
    StalePrice { latest: Timestamp, now: Timestamp },

    #[error("invalid protection: {reason}")]
    InvalidProtection { reason: &'static str },
}

pub fn margin_requirement(magnitude: Decimal, price: Decimal, risk: &RiskParameter) -> Decimal {
    if magnitude.is_zero() {
        return Decimal::ZERO;
    }
    (risk.margin * magnitude * price).max(risk.min_margin.value())
}

pub fn maintenance_requirement(magnitude: Decimal, price: Decimal, risk: &RiskParameter) -> Decimal {
    if magnitude.is_zero() {
        return Decimal::ZERO;
    }
    (risk.maintenance * magnitude * price).max(risk.min_maintenance.value())
}

pub fn is_maintained(collateral: Quote, magnitude: Decimal, price: Decimal, risk: &RiskParameter) -> bool {
    collateral.value() >= maintenance_requirement(magnitude, price, risk)
}

/// Where an account's pending orders take it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Projection {
    pub current: Position,
    pub max_magnitude: Decimal,
    // largest magnitude reached by a pending order, settled position excluded
    pub pending_max: Decimal,
    // every side held along the way, settled position included
    pub side: Option<Side>,
    pub single_sided: bool,
}

impl Projection {
    pub fn from_position(position: &Position) -> Self {
        Self {
            current: *position,
            max_magnitude: position.magnitude(),
            pending_max: Decimal::ZERO,
            side: position.side(),
            single_sided: position.is_single_sided(),
        }
    }

    /// Folds one more pending order into the projection.
    pub fn push(&mut self, order: &Order) -> Result<(), PositionError> {
        self.current = self.current.apply(order)?;
        self.max_magnitude = self.max_magnitude.max(self.current.magnitude());
        self.pending_max = self.pending_max.max(self.current.magnitude());
        if !self.current.is_single_sided() {
            self.single_sided = false;
        }
        match (self.side, self.current.side()) {
            (Some(held), Some(next)) if held != next => self.single_sided = false,
            (None, Some(next)) => self.side = Some(next),
            _ => {}
        }
        Ok(())
    }
}

/// Everything the validator needs to judge one new order.
#[derive(Debug, Clone, Copy)]
pub struct OrderCheck<'a> {
    pub risk: &'a RiskParameter,
    pub market: &'a MarketParameter,
    pub order: &'a Order,
    pub latest_local: &'a Position,
    // settled position plus every pending order, the new one included
    pub local: &'a Projection,
    pub global: &'a Position,
    // settled collateral plus pending transfers, net of deficit
    pub collateral: Quote,
    pub uncovered_deficit: Quote,
    pub price: Decimal,
    pub latest: Timestamp,
    pub now: Timestamp,
    pub protected: bool,
}

impl OrderCheck<'_> {
    fn stale(&self) -> bool {
        self.now.elapsed_since(self.latest) >= self.risk.stale_after
    }
}

/// Runs the policy, validity and solvency checks in order. Protection rules are checked
/// separately by the liquidation module.
pub fn validate_order(check: &OrderCheck<'_>) -> Result<(), InvariantError> {
    let order = check.order;

    if check.market.settle_only && !order.is_empty() {
        return Err(InvariantError::SettleOnly);
    }
    if check.market.closed && order.increases_position() {
        return Err(InvariantError::MarketClosed);
    }
    if !order.is_empty() && check.stale() {
        return Err(InvariantError::StalePrice {
            latest: check.latest,
            now: check.now,
        });
    }

    if !check.local.single_sided {
        return Err(InvariantError::NotSingleSided {
            held: check.latest_local.side().or(check.local.side),
            requested: check.local.current.side(),
        });
    }

    if order.increases_maker() && check.global.maker > check.risk.maker_limit {
        return Err(InvariantError::MakerOverLimit {
            maker: check.global.maker,
            limit: check.risk.maker_limit,
        });
    }

    if let Some(efficiency) = check.global.efficiency() {
        if efficiency < check.risk.efficiency_limit {
            let rejected = match check.market.efficiency_mode {
                EfficiencyMode::Standard => order.decreases_efficiency(),
                EfficiencyMode::AlwaysClose => order.increases_position(),
            };
            if rejected {
                return Err(InvariantError::EfficiencyUnderLimit {
                    efficiency,
                    limit: check.risk.efficiency_limit,
                });
            }
        }
    }

    if order.increases_taker() && check.global.is_socialized() {
        return Err(InvariantError::InsufficientLiquidity);
    }

    if order.increases_position() && check.uncovered_deficit.is_positive() {
        return Err(InvariantError::OutstandingDeficit {
            deficit: check.uncovered_deficit,
        });
    }

    // a bare deposit can only help, even an underwater account may make one
    let deposit_only = order.is_empty() && !order.collateral.is_negative();
    if check.protected || deposit_only {
        return Ok(());
    }

    if check.collateral.is_negative() {
        return Err(InvariantError::InsufficientCollateral {
            collateral: check.collateral,
        });
    }

    // a pure reduction is measured where the pending orders take the account; anything
    // that opens or withdraws must also cover the position it holds until then
    let magnitude = if order.increases_position() || order.collateral.is_negative() {
        check.local.max_magnitude
    } else {
        check.local.pending_max
    };
    let required = margin_requirement(magnitude, check.price, check.risk);
    if check.collateral.value() < required {
        return Err(InvariantError::InsufficientMargin {
            collateral: check.collateral,
            required: Quote::new(required),
        });
    }

    Ok(())
}
