// 2.0: orders are pending position deltas keyed by the oracle timestamp they settle at.
// opening and closing legs are kept apart so fees and price impact see gross volume,
// not the net change.
// 2.1: guarantees are the fixed-price part of an order, created by intent fills.

use crate::position::Position;
use crate::types::{Quote, SkewDirection, Timestamp};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/** 2.0: one account's (or the market's aggregate) pending deltas at a timestamp */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Order {
    pub timestamp: Timestamp,
    // number of orders that pay the oracle settlement fee
    pub orders: u64,
    pub collateral: Quote,
    pub maker_pos: Decimal,
    pub maker_neg: Decimal,
    pub long_pos: Decimal,
    pub long_neg: Decimal,
    pub short_pos: Decimal,
    pub short_neg: Decimal,
    // number of liquidation (protected) orders
    pub protection: u64,
    // volume, in units, whose fee is shared with a referrer
    pub maker_referral: Decimal,
    pub taker_referral: Decimal,
    // skew direction of the first taker move submitted into this order
    pub lead: Option<SkewDirection>,
}

impl Order {
    pub fn new(timestamp: Timestamp) -> Self {
        Self {
            timestamp,
            ..Self::default()
        }
    }

    /// Order from signed position deltas. `referral_fee` is the fraction of the
    /// trade fee owed to the referrer, zero when there is none.
    pub fn from_deltas(
        timestamp: Timestamp,
        maker: Decimal,
        long: Decimal,
        short: Decimal,
        collateral: Quote,
        referral_fee: Decimal,
    ) -> Self {
        let mut order = Self {
            timestamp,
            collateral,
            maker_pos: maker.max(Decimal::ZERO),
            maker_neg: (-maker).max(Decimal::ZERO),
            long_pos: long.max(Decimal::ZERO),
            long_neg: (-long).max(Decimal::ZERO),
            short_pos: short.max(Decimal::ZERO),
            short_neg: (-short).max(Decimal::ZERO),
            ..Self::new(timestamp)
        };
        if !order.is_empty() {
            order.orders = 1;
        }
        order.maker_referral = order.maker_total() * referral_fee;
        order.taker_referral = order.taker_total() * referral_fee;
        order.lead = order.direction();
        order
    }

    /// Taker order for a signed skew move (positive buys). Closes the opposite side
    /// of `current` before opening.
    pub fn from_taker(
        timestamp: Timestamp,
        current: &Position,
        amount: Decimal,
        collateral: Quote,
        referral_fee: Decimal,
    ) -> Self {
        let (long, short) = if amount >= Decimal::ZERO {
            let close = amount.min(current.short);
            (amount - close, -close)
        } else {
            let close = (-amount).min(current.long);
            (-close, -amount - close)
        };
        Self::from_deltas(timestamp, Decimal::ZERO, long, short, collateral, referral_fee)
    }

    pub fn maker_total(&self) -> Decimal {
        self.maker_pos + self.maker_neg
    }

    pub fn long_total(&self) -> Decimal {
        self.long_pos + self.long_neg
    }

    pub fn short_total(&self) -> Decimal {
        self.short_pos + self.short_neg
    }

    pub fn taker_total(&self) -> Decimal {
        self.long_total() + self.short_total()
    }

    // volume pushing skew positive: long opens and short closes
    pub fn taker_pos(&self) -> Decimal {
        self.long_pos + self.short_neg
    }

    pub fn taker_neg(&self) -> Decimal {
        self.long_neg + self.short_pos
    }

    pub fn direction(&self) -> Option<SkewDirection> {
        if self.taker_pos() > Decimal::ZERO {
            Some(SkewDirection::Positive)
        } else if self.taker_neg() > Decimal::ZERO {
            Some(SkewDirection::Negative)
        } else {
            None
        }
    }

    /// No position change. Collateral-only orders are empty.
    pub fn is_empty(&self) -> bool {
        self.maker_total().is_zero() && self.taker_total().is_zero()
    }

    pub fn increases_position(&self) -> bool {
        self.increases_maker() || self.increases_taker()
    }

    pub fn increases_maker(&self) -> bool {
        self.maker_pos > Decimal::ZERO
    }

    pub fn increases_taker(&self) -> bool {
        self.long_pos > Decimal::ZERO || self.short_pos > Decimal::ZERO
    }

    // removing makers or adding takers both lower maker / taker
    pub fn decreases_efficiency(&self) -> bool {
        self.maker_neg > Decimal::ZERO || self.increases_taker()
    }

    pub fn is_protected(&self) -> bool {
        self.protection > 0
    }

    pub fn merge(&mut self, other: &Order) {
        self.orders += other.orders;
        self.collateral = self.collateral.add(other.collateral);
        self.maker_pos += other.maker_pos;
        self.maker_neg += other.maker_neg;
        self.long_pos += other.long_pos;
        self.long_neg += other.long_neg;
        self.short_pos += other.short_pos;
        self.short_neg += other.short_neg;
        self.protection += other.protection;
        self.maker_referral += other.maker_referral;
        self.taker_referral += other.taker_referral;
        self.lead = self.lead.or(other.lead);
    }

    /// What remains of an order whose version was invalid, re-keyed to `timestamp`.
    /// Its settlement fee and transfer were booked at the invalid version and its
    /// referrals lapse; deltas and protection still apply.
    pub fn carried(&self, timestamp: Timestamp) -> Order {
        Order {
            timestamp,
            orders: 0,
            collateral: Quote::zero(),
            maker_referral: Decimal::ZERO,
            taker_referral: Decimal::ZERO,
            ..*self
        }
    }
}

/** 2.1: fixed-price taker fill, excluded from price impact and the settlement fee */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Guarantee {
    pub orders: u64,
    pub taker_pos: Decimal,
    pub taker_neg: Decimal,
    // signed size times the guaranteed price
    pub notional: Decimal,
    // guaranteed volume that still pays the taker fee
    pub taker_fee: Decimal,
    // guaranteed volume whose fee is shared with the originator and solver
    pub referral: Decimal,
}

impl Guarantee {
    /// Fill of `amount` (positive buys) at `price`.
    pub fn fill(amount: Decimal, price: Decimal, pays_fee: bool, referral_fee: Decimal) -> Self {
        let size = amount.abs();
        let fee_volume = if pays_fee { size } else { Decimal::ZERO };
        Self {
            orders: 1,
            taker_pos: amount.max(Decimal::ZERO),
            taker_neg: (-amount).max(Decimal::ZERO),
            notional: amount * price,
            taker_fee: fee_volume,
            referral: fee_volume * referral_fee,
        }
    }

    pub fn taker_total(&self) -> Decimal {
        self.taker_pos + self.taker_neg
    }

    pub fn is_empty(&self) -> bool {
        self.taker_total().is_zero()
    }

    /// Difference between marking the fill at `price` and the guaranteed price.
    pub fn price_adjustment(&self, price: Decimal) -> Decimal {
        (self.taker_pos - self.taker_neg) * price - self.notional
    }

    pub fn merge(&mut self, other: &Guarantee) {
        self.orders += other.orders;
        self.taker_pos += other.taker_pos;
        self.taker_neg += other.taker_neg;
        self.notional += other.notional;
        self.taker_fee += other.taker_fee;
        self.referral += other.referral;
    }

    pub fn carried(&self) -> Guarantee {
        Guarantee {
            orders: 0,
            referral: Decimal::ZERO,
            ..*self
        }
    }
}
