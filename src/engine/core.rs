// 8.0 engine/core.rs: the market facade. owns the market ledger, every account, and
// the four collaborators. operations live in the sibling files as `impl Engine` blocks.

use super::config::EngineConfig;
use super::guard::ReentrancyGuard;
use super::results::EngineError;
use crate::account::{AccountState, Local};
use crate::checkpoint::CheckpointLog;
use crate::config::MarketConfig;
use crate::custody::CollateralTransfer;
use crate::events::{Event, EventId, EventPayload};
use crate::market::{Global, MarketState};
use crate::oracle::Oracle;
use crate::pending::PendingQueue;
use crate::position::Position;
use crate::registry::Registry;
use crate::types::{AccountId, Timestamp};
use crate::verifier::Verifier;
use crate::version::{Version, VersionLog};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

/// External services the market is wired to.
pub struct Collaborators {
    pub oracle: Box<dyn Oracle>,
    pub registry: Box<dyn Registry>,
    pub verifier: Box<dyn Verifier>,
    pub custody: Box<dyn CollateralTransfer>,
}

/** 8.1: main engine struct. all state lives here */
pub struct Engine {
    pub(super) config: EngineConfig,
    pub(super) market: MarketState,
    pub(super) accounts: BTreeMap<AccountId, AccountState>,
    pub(super) checkpoints: BTreeMap<AccountId, CheckpointLog>,
    pub(super) used_nonces: HashSet<(AccountId, u64)>,
    pub(super) beneficiary: Option<AccountId>,
    pub(super) oracle: Box<dyn Oracle>,
    pub(super) registry: Box<dyn Registry>,
    pub(super) verifier: Box<dyn Verifier>,
    pub(super) custody: Box<dyn CollateralTransfer>,
    pub(super) guard: ReentrancyGuard,
    pub(super) events: Vec<Event>,
    pub(super) next_event_id: u64,
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("market", &self.market)
            .field("accounts", &self.accounts.len())
            .field("beneficiary", &self.beneficiary)
            .field("events", &self.events.len())
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Market parameters are checked against the registry's protocol bounds up front.
    pub fn new(config: EngineConfig, market: MarketConfig, collaborators: Collaborators) -> Result<Self, EngineError> {
        config.validate()?;
        market.validate(&collaborators.registry.parameter())?;
        Ok(Self {
            config,
            market: MarketState::new(market),
            accounts: BTreeMap::new(),
            checkpoints: BTreeMap::new(),
            used_nonces: HashSet::new(),
            beneficiary: None,
            oracle: collaborators.oracle,
            registry: collaborators.registry,
            verifier: collaborators.verifier,
            custody: collaborators.custody,
            guard: ReentrancyGuard::new(),
            events: Vec::new(),
            next_event_id: 1,
        })
    }

    pub fn market_config(&self) -> &MarketConfig {
        &self.market.config
    }

    pub fn global(&self) -> &Global {
        &self.market.global
    }

    /// Settled aggregate position.
    pub fn position(&self) -> &Position {
        &self.market.position
    }

    pub fn pending(&self) -> &PendingQueue {
        &self.market.pending
    }

    pub fn versions(&self) -> &VersionLog {
        &self.market.versions
    }

    /// Invalid timestamps some account has yet to settle across, and where their orders
    /// went.
    pub fn carries(&self) -> &BTreeMap<Timestamp, Timestamp> {
        &self.market.carries
    }

    pub fn version(&self, timestamp: Timestamp) -> Option<&Version> {
        self.market.versions.get(timestamp)
    }

    pub fn account(&self, account: AccountId) -> Option<&AccountState> {
        self.accounts.get(&account)
    }

    pub fn accounts(&self) -> impl Iterator<Item = (&AccountId, &AccountState)> {
        self.accounts.iter()
    }

    /// Ledger head, zeroed for an account that never acted.
    pub fn local(&self, account: AccountId) -> Local {
        self.accounts.get(&account).map(|state| state.local).unwrap_or_default()
    }

    pub fn account_position(&self, account: AccountId) -> Position {
        self.accounts
            .get(&account)
            .map(|state| state.position)
            .unwrap_or_default()
    }

    pub fn checkpoints(&self, account: AccountId) -> Option<&CheckpointLog> {
        self.checkpoints.get(&account)
    }

    pub fn beneficiary(&self) -> Option<AccountId> {
        self.beneficiary
    }

    pub fn is_nonce_used(&self, account: AccountId, nonce: u64) -> bool {
        self.used_nonces.contains(&(account, nonce))
    }

    /// Handle on the call guard, for collaborators that need to detect re-entry.
    pub fn reentrancy_guard(&self) -> ReentrancyGuard {
        self.guard.clone()
    }

    pub fn recent_events(&self, count: usize) -> &[Event] {
        let start = self.events.len().saturating_sub(count);
        &self.events[start..]
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub(super) fn emit_event(&mut self, timestamp: Timestamp, payload: EventPayload) {
        let event = Event::new(EventId(self.next_event_id), timestamp, payload);
        self.next_event_id += 1;

        if self.config.echo.includes(&event.payload) {
            println!("[{} #{}] {:?}", event.timestamp, event.id.0, event.payload);
        }

        self.events.push(event);

        let overflow = self.events.len().saturating_sub(self.config.event_capacity);
        if overflow > 0 {
            self.events.drain(..overflow);
        }
    }
}
