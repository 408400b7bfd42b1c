// 9.2 custody.rs: collateral transfer collaborator. the engine only books signed deltas;
// moving tokens in and out is someone else's job. InMemoryCustody is a wallet ledger with
// running totals so conservation can be checked against it.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::types::{AccountId, Quote};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferDirection {
    // wallet to market
    Pull,
    // market to wallet
    Push,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRecord {
    pub account: AccountId,
    pub amount: Quote,
    pub direction: TransferDirection,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransferError {
    #[error("wallet of {account} holds {available}, needs {requested}")]
    InsufficientFunds {
        account: AccountId,
        requested: Quote,
        available: Quote,
    },
    #[error("transfer amount {0} must be positive")]
    InvalidAmount(Quote),
    #[error("transfers are halted")]
    Halted,
}

pub trait CollateralTransfer {
    fn pull(&mut self, account: AccountId, amount: Quote) -> Result<(), TransferError>;
    fn push(&mut self, account: AccountId, amount: Quote) -> Result<(), TransferError>;
}

/// Moves a signed delta: positive pulls into the market, negative pushes out.
pub fn transfer_delta(
    custody: &mut dyn CollateralTransfer,
    account: AccountId,
    delta: Quote,
) -> Result<(), TransferError> {
    if delta.is_positive() {
        custody.pull(account, delta)
    } else if delta.is_negative() {
        custody.push(account, delta.abs())
    } else {
        Ok(())
    }
}

#[derive(Debug, Default)]
struct Ledger {
    wallets: HashMap<AccountId, Decimal>,
    pulled: Decimal,
    pushed: Decimal,
    records: Vec<TransferRecord>,
    halted: bool,
}

/// Wallet balances outside the market. Clones share the same ledger.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCustody {
    ledger: Rc<RefCell<Ledger>>,
}

impl InMemoryCustody {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fund(&self, account: AccountId, amount: Decimal) {
        *self.ledger.borrow_mut().wallets.entry(account).or_default() += amount;
    }

    pub fn wallet(&self, account: AccountId) -> Quote {
        Quote::new(self.ledger.borrow().wallets.get(&account).copied().unwrap_or_default())
    }

    pub fn total_pulled(&self) -> Quote {
        Quote::new(self.ledger.borrow().pulled)
    }

    pub fn total_pushed(&self) -> Quote {
        Quote::new(self.ledger.borrow().pushed)
    }

    // what the market should hold right now
    pub fn net_inflow(&self) -> Quote {
        self.total_pulled().sub(self.total_pushed())
    }

    pub fn records(&self) -> Vec<TransferRecord> {
        self.ledger.borrow().records.clone()
    }

    pub fn set_halted(&self, halted: bool) {
        self.ledger.borrow_mut().halted = halted;
    }
}

impl CollateralTransfer for InMemoryCustody {
    fn pull(&mut self, account: AccountId, amount: Quote) -> Result<(), TransferError> {
        if !amount.is_positive() {
            return Err(TransferError::InvalidAmount(amount));
        }
        let mut ledger = self.ledger.borrow_mut();
        if ledger.halted {
            return Err(TransferError::Halted);
        }
        let available = ledger.wallets.get(&account).copied().unwrap_or_default();
        if available < amount.value() {
            return Err(TransferError::InsufficientFunds {
                account,
                requested: amount,
                available: Quote::new(available),
            });
        }
        ledger.wallets.insert(account, available - amount.value());
        ledger.pulled += amount.value();
        ledger.records.push(TransferRecord {
            account,
            amount,
            direction: TransferDirection::Pull,
        });
        Ok(())
    }

    fn push(&mut self, account: AccountId, amount: Quote) -> Result<(), TransferError> {
        if !amount.is_positive() {
            return Err(TransferError::InvalidAmount(amount));
        }
        let mut ledger = self.ledger.borrow_mut();
        if ledger.halted {
            return Err(TransferError::Halted);
        }
        *ledger.wallets.entry(account).or_default() += amount.value();
        ledger.pushed += amount.value();
        ledger.records.push(TransferRecord {
            account,
            amount,
            direction: TransferDirection::Push,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn signed_delta_routes_to_pull_or_push() {
        let mut custody = InMemoryCustody::new();
        custody.fund(AccountId(1), dec!(100));

        transfer_delta(&mut custody, AccountId(1), Quote::new(dec!(60))).unwrap();
        assert_eq!(custody.wallet(AccountId(1)), Quote::new(dec!(40)));

        transfer_delta(&mut custody, AccountId(1), Quote::new(dec!(-25))).unwrap();
        assert_eq!(custody.wallet(AccountId(1)), Quote::new(dec!(65)));
        assert_eq!(custody.net_inflow(), Quote::new(dec!(35)));

        transfer_delta(&mut custody, AccountId(1), Quote::zero()).unwrap();
        assert_eq!(custody.records().len(), 2);
    }

    #[test]
    fn pull_beyond_wallet_fails_without_side_effects() {
        let mut custody = InMemoryCustody::new();
        custody.fund(AccountId(1), dec!(10));
        let result = custody.pull(AccountId(1), Quote::new(dec!(11)));
        assert!(matches!(result, Err(TransferError::InsufficientFunds { .. })));
        assert_eq!(custody.wallet(AccountId(1)), Quote::new(dec!(10)));
        assert_eq!(custody.total_pulled(), Quote::zero());
    }

    #[test]
    fn halted_custody_rejects_everything() {
        let mut custody = InMemoryCustody::new();
        custody.fund(AccountId(1), dec!(10));
        custody.set_halted(true);
        assert_eq!(custody.pull(AccountId(1), Quote::new(dec!(1))), Err(TransferError::Halted));
        assert_eq!(custody.push(AccountId(1), Quote::new(dec!(1))), Err(TransferError::Halted));
    }
}
