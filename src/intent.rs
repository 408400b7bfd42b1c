//! Signed intents: off-chain orders filled at a guaranteed price.
//!
//! The signer commits to taking `amount` (positive buys) at `price`. Whoever submits the
//! intent becomes the counterparty and takes the opposite side at the same price. Both
//! fills carry a [`Guarantee`], so neither pays price impact or the settlement fee, and
//! only the signer pays the taker fee.

use crate::order::{Guarantee, Order};
use crate::position::Position;
use crate::types::{AccountId, Quote, Timestamp};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentCommon {
    pub account: AccountId,
    pub signer: AccountId,
    pub nonce: u64,
    pub group: u64,
    // zero never expires
    pub expiry: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Intent {
    pub amount: Decimal,
    pub price: Decimal,
    // solver's share of the referral fee
    pub fee: Decimal,
    pub originator: Option<AccountId>,
    pub solver: Option<AccountId>,
    // minimum collateral per unit of notional the signer must hold
    pub collateralization: Decimal,
    pub common: IntentCommon,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum IntentError {
    #[error("intent expired at {expiry}, now {now}")]
    Expired { expiry: Timestamp, now: Timestamp },
    #[error("intent amount is zero")]
    ZeroAmount,
    #[error("intent price {0} must be positive")]
    InvalidPrice(Decimal),
    #[error("solver fee {0} must be within [0, 1]")]
    InvalidFee(Decimal),
    #[error("collateral {collateral} below required {required}")]
    InsufficientCollateralization { collateral: Quote, required: Quote },
    #[error("nonce {nonce} already used by {account}")]
    NonceUsed { account: AccountId, nonce: u64 },
    #[error("signer and counterparty are the same account")]
    SelfMatch,
}

/// The two orders an intent produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntentFill {
    pub signer_order: Order,
    pub signer_guarantee: Guarantee,
    pub counter_order: Order,
    pub counter_guarantee: Guarantee,
}

impl Intent {
    /// Bytes a signature commits to.
    pub fn digest(&self) -> Vec<u8> {
        format!(
            "intent:{}:{}:{}:{}:{}:{}:{}:{}:{}:{}:{}",
            self.common.account.0,
            self.common.signer.0,
            self.common.nonce,
            self.common.group,
            self.common.expiry.0,
            self.amount,
            self.price,
            self.fee,
            self.originator.map_or(0, |a| a.0),
            self.solver.map_or(0, |a| a.0),
            self.collateralization,
        )
        .into_bytes()
    }

    /// Checks that do not depend on market state.
    pub fn validate(&self, counterparty: AccountId, now: Timestamp) -> Result<(), IntentError> {
        if !self.common.expiry.is_zero() && now > self.common.expiry {
            return Err(IntentError::Expired {
                expiry: self.common.expiry,
                now,
            });
        }
        if self.amount.is_zero() {
            return Err(IntentError::ZeroAmount);
        }
        if self.price <= Decimal::ZERO {
            return Err(IntentError::InvalidPrice(self.price));
        }
        if self.fee < Decimal::ZERO || self.fee > Decimal::ONE {
            return Err(IntentError::InvalidFee(self.fee));
        }
        if counterparty == self.common.account {
            return Err(IntentError::SelfMatch);
        }
        Ok(())
    }

    /// The signer must hold `collateralization` per unit of notional at `price`.
    pub fn check_collateralization(&self, collateral: Quote, price: Decimal) -> Result<(), IntentError> {
        let required = self.collateralization * self.amount.abs() * price;
        if collateral.value() < required {
            return Err(IntentError::InsufficientCollateralization {
                collateral,
                required: Quote::new(required),
            });
        }
        Ok(())
    }

    /// Both sides of the fill at `timestamp`. Each side closes its opposite exposure first.
    pub fn fill(
        &self,
        timestamp: Timestamp,
        signer_position: &Position,
        counter_position: &Position,
        referral_fee: Decimal,
    ) -> IntentFill {
        let mut signer_order = Order::from_taker(timestamp, signer_position, self.amount, Quote::zero(), Decimal::ZERO);
        let mut counter_order = Order::from_taker(timestamp, counter_position, -self.amount, Quote::zero(), Decimal::ZERO);
        // guaranteed volume never moves the price, so it cannot lead the spread ordering
        signer_order.lead = None;
        counter_order.lead = None;
        IntentFill {
            signer_order,
            signer_guarantee: Guarantee::fill(self.amount, self.price, true, referral_fee),
            counter_order,
            counter_guarantee: Guarantee::fill(-self.amount, self.price, false, Decimal::ZERO),
        }
    }
}
