// 9.1 registry.rs: protocol parameters and authorization, owned by the protocol rather
// than the market. MockRegistry keeps operators, signers and referral overrides in memory.

use crate::config::ProtocolParameter;
use crate::types::AccountId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authorization {
    // sender may act on the account's behalf
    pub is_operator: bool,
    // signer may sign intents for the account
    pub is_signer: bool,
    // share of trade fees owed to the referrer, zero without one
    pub referral_fee: Decimal,
}

pub trait Registry {
    fn parameter(&self) -> ProtocolParameter;
    fn owner(&self) -> AccountId;
    fn coordinator(&self) -> Option<AccountId>;
    fn oracle_fee_receiver(&self) -> Option<AccountId>;
    fn authorize(
        &self,
        account: AccountId,
        sender: AccountId,
        signer: Option<AccountId>,
        referrer: Option<AccountId>,
    ) -> Authorization;
}

#[derive(Debug, Default)]
struct RegistryState {
    parameter: ProtocolParameter,
    owner: AccountId,
    coordinator: Option<AccountId>,
    oracle_fee_receiver: Option<AccountId>,
    operators: HashSet<(AccountId, AccountId)>,
    signers: HashSet<(AccountId, AccountId)>,
    referral_fees: HashMap<AccountId, Decimal>,
}

/// In-memory registry. Clones share the same state.
#[derive(Debug, Clone)]
pub struct MockRegistry {
    state: Rc<RefCell<RegistryState>>,
}

impl MockRegistry {
    pub fn new(owner: AccountId) -> Self {
        let state = RegistryState {
            owner,
            ..RegistryState::default()
        };
        Self {
            state: Rc::new(RefCell::new(state)),
        }
    }

    pub fn set_parameter(&self, parameter: ProtocolParameter) {
        self.state.borrow_mut().parameter = parameter;
    }

    pub fn set_paused(&self, paused: bool) {
        self.state.borrow_mut().parameter.paused = paused;
    }

    pub fn set_coordinator(&self, coordinator: AccountId) {
        self.state.borrow_mut().coordinator = Some(coordinator);
    }

    pub fn set_oracle_fee_receiver(&self, receiver: AccountId) {
        self.state.borrow_mut().oracle_fee_receiver = Some(receiver);
    }

    pub fn approve_operator(&self, account: AccountId, operator: AccountId) {
        self.state.borrow_mut().operators.insert((account, operator));
    }

    pub fn approve_signer(&self, account: AccountId, signer: AccountId) {
        self.state.borrow_mut().signers.insert((account, signer));
    }

    /// Per-referrer override of the protocol's default referral fee.
    pub fn set_referral_fee(&self, referrer: AccountId, fee: Decimal) {
        self.state.borrow_mut().referral_fees.insert(referrer, fee);
    }
}

impl Registry for MockRegistry {
    fn parameter(&self) -> ProtocolParameter {
        self.state.borrow().parameter.clone()
    }

    fn owner(&self) -> AccountId {
        self.state.borrow().owner
    }

    fn coordinator(&self) -> Option<AccountId> {
        self.state.borrow().coordinator
    }

    fn oracle_fee_receiver(&self) -> Option<AccountId> {
        self.state.borrow().oracle_fee_receiver
    }

    fn authorize(
        &self,
        account: AccountId,
        sender: AccountId,
        signer: Option<AccountId>,
        referrer: Option<AccountId>,
    ) -> Authorization {
        let state = self.state.borrow();
        let is_operator = account == sender || state.operators.contains(&(account, sender));
        let is_signer = signer.is_some_and(|signer| signer == account || state.signers.contains(&(account, signer)));
        let referral_fee = referrer.map_or(Decimal::ZERO, |referrer| {
            state
                .referral_fees
                .get(&referrer)
                .copied()
                .unwrap_or(state.parameter.referral_fee)
        });
        Authorization {
            is_operator,
            is_signer,
            referral_fee,
        }
    }
}
