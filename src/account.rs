//! Per-account ledger.
//!
//! An account is a single-sided position, a collateral balance that only moves when
//! orders settle, a claimable balance for fees earned from other accounts, and the
//! queue of orders still waiting on the oracle. Checkpoints are kept by the engine
//! next to the account so loading an account stays cheap.

use crate::margin::Projection;
use crate::pending::PendingQueue;
use crate::position::{Position, PositionError};
use crate::types::{AccountId, Quote};
use serde::{Deserialize, Serialize};

/// Ledger head of one account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Local {
    // id of the newest order; bumped whenever an action opens a new timestamp
    pub current_id: u64,
    // id of the newest fully settled order
    pub latest_id: u64,
    pub collateral: Quote,
    pub claimable: Quote,
    // loss left after liquidation, repaid by later deposits
    pub deficit: Quote,
    // liquidator of the pending protected order
    pub protection_initiator: Option<AccountId>,
}

impl Local {
    pub fn credit(&mut self, amount: Quote) {
        self.claimable = self.claimable.add(amount);
    }

    pub fn take_claimable(&mut self) -> Quote {
        std::mem::take(&mut self.claimable)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccountState {
    pub local: Local,
    pub position: Position,
    pub pending: PendingQueue,
}

impl AccountState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Settled position walked through the pending queue.
    pub fn projection(&self) -> Result<Projection, PositionError> {
        self.pending.project(&self.position)
    }

    /// Collateral once every pending transfer lands, net of the deficit.
    pub fn effective_collateral(&self) -> Quote {
        self.local
            .collateral
            .add(self.pending.collateral())
            .sub(self.local.deficit)
    }

    /// Deficit that pending deposits will not repay.
    pub fn uncovered_deficit(&self) -> Quote {
        self.local.deficit.sub(self.pending.deposits()).max(Quote::zero())
    }

    pub fn is_settled(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::{Guarantee, Order};
    use crate::types::Timestamp;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn deposit(state: &mut AccountState, timestamp: u64, amount: Decimal) {
        let order = Order::from_deltas(Timestamp(timestamp), dec!(0), dec!(0), dec!(0), Quote::new(amount), dec!(0));
        state.pending.stage(&mut state.local.current_id, &order, &Guarantee::default());
    }

    #[test]
    fn effective_collateral_counts_pending_and_deficit() {
        let mut state = AccountState::new();
        state.local.collateral = Quote::new(dec!(50));
        state.local.deficit = Quote::new(dec!(20));
        deposit(&mut state, 10, dec!(5));
        deposit(&mut state, 20, dec!(-10));
        assert_eq!(state.effective_collateral(), Quote::new(dec!(25)));
        assert_eq!(state.uncovered_deficit(), Quote::new(dec!(15)));
        assert!(!state.is_settled());
    }

    #[test]
    fn claimable_is_taken_whole() {
        let mut local = Local::default();
        local.credit(Quote::new(dec!(3)));
        local.credit(Quote::new(dec!(4)));
        assert_eq!(local.take_claimable(), Quote::new(dec!(7)));
        assert!(local.claimable.is_zero());
    }
}
