//! Maker, long and short sizes held at a settled oracle timestamp.
//!
//! The global position is the sum of every account's position. Account positions are
//! single sided: at most one of `maker`, `long` and `short` is non-zero. The socialized
//! sizes describe how much of each taker side is actually matched, either by the opposite
//! taker side or by makers; only matched exposure earns pnl and pays funding.

use crate::order::Order;
use crate::types::{per_unit, Side, Timestamp};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PositionError {
    #[error("order closes more {side:?} than held: held {held}, closing {closing}")]
    OverClose {
        side: Side,
        held: Decimal,
        closing: Decimal,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Position {
    pub timestamp: Timestamp,
    pub maker: Decimal,
    pub long: Decimal,
    pub short: Decimal,
}

impl Position {
    pub fn new(timestamp: Timestamp) -> Self {
        Self {
            timestamp,
            ..Self::default()
        }
    }

    pub fn with_sizes(timestamp: Timestamp, maker: Decimal, long: Decimal, short: Decimal) -> Self {
        Self {
            timestamp,
            maker,
            long,
            short,
        }
    }

    pub fn size(&self, side: Side) -> Decimal {
        match side {
            Side::Maker => self.maker,
            Side::Long => self.long,
            Side::Short => self.short,
        }
    }

    pub fn magnitude(&self) -> Decimal {
        self.maker.max(self.long).max(self.short)
    }

    pub fn major(&self) -> Decimal {
        self.long.max(self.short)
    }

    pub fn minor(&self) -> Decimal {
        self.long.min(self.short)
    }

    pub fn is_empty(&self) -> bool {
        self.maker.is_zero() && self.long.is_zero() && self.short.is_zero()
    }

    pub fn is_single_sided(&self) -> bool {
        let open = [self.maker, self.long, self.short]
            .iter()
            .filter(|size| !size.is_zero())
            .count();
        open <= 1
    }

    /// Side of a single-sided position, `None` when empty.
    pub fn side(&self) -> Option<Side> {
        if !self.maker.is_zero() {
            Some(Side::Maker)
        } else if !self.long.is_zero() {
            Some(Side::Long)
        } else if !self.short.is_zero() {
            Some(Side::Short)
        } else {
            None
        }
    }

    /// Long minus short, normalized by the market's skew scale.
    pub fn skew(&self, skew_scale: Decimal) -> Decimal {
        per_unit(self.long - self.short, skew_scale)
    }

    /// Raw long minus short, for sign checks.
    pub fn net_taker(&self) -> Decimal {
        self.long - self.short
    }

    // major / (maker + minor), clamped to [0, 1]
    pub fn utilization(&self) -> Decimal {
        let liquidity = self.maker + self.minor();
        if liquidity.is_zero() {
            return if self.major().is_zero() { Decimal::ZERO } else { Decimal::ONE };
        }
        (self.major() / liquidity).min(Decimal::ONE)
    }

    /// Maker size backing each unit of taker open interest. `None` without takers.
    pub fn efficiency(&self) -> Option<Decimal> {
        let takers = self.long + self.short;
        if takers.is_zero() {
            None
        } else {
            Some(self.maker / takers)
        }
    }

    /// True when the major side is not fully matched by the minor side plus makers.
    pub fn is_socialized(&self) -> bool {
        self.maker + self.minor() < self.major()
    }

    pub fn long_socialized(&self) -> Decimal {
        self.long.min(self.short + self.maker)
    }

    pub fn short_socialized(&self) -> Decimal {
        self.short.min(self.long + self.maker)
    }

    pub fn taker_socialized(&self) -> Decimal {
        self.major().min(self.minor() + self.maker)
    }

    /// Share of matched taker exposure that makers, not the minor side, stand behind.
    pub fn socialized_maker_portion(&self) -> Decimal {
        let taker = self.taker_socialized();
        if taker.is_zero() {
            return Decimal::ZERO;
        }
        Decimal::ONE - self.minor() / taker
    }

    pub fn notional(&self, price: Decimal) -> Decimal {
        self.magnitude() * price
    }

    /// Position after applying an order's deltas. Timestamp is left untouched.
    pub fn apply(&self, order: &Order) -> Result<Position, PositionError> {
        let maker = leg(Side::Maker, self.maker, order.maker_pos, order.maker_neg)?;
        let long = leg(Side::Long, self.long, order.long_pos, order.long_neg)?;
        let short = leg(Side::Short, self.short, order.short_pos, order.short_neg)?;
        Ok(Position {
            timestamp: self.timestamp,
            maker,
            long,
            short,
        })
    }
}

fn leg(side: Side, held: Decimal, open: Decimal, close: Decimal) -> Result<Decimal, PositionError> {
    let next = held + open - close;
    if next < Decimal::ZERO {
        return Err(PositionError::OverClose {
            side,
            held: held + open,
            closing: close,
        });
    }
    Ok(next)
}
