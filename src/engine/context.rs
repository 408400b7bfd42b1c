// 8.2 engine/context.rs: every operation works on a loaded copy of the books. the copy
// is mutated freely, and only `commit` writes it back, after collateral has moved. an
// error anywhere before that drops the context and leaves the engine untouched.

use super::core::Engine;
use super::results::EngineError;
use crate::account::AccountState;
use crate::checkpoint::{Checkpoint, CheckpointError};
use crate::config::ProtocolParameter;
use crate::custody::transfer_delta;
use crate::events::EventPayload;
use crate::market::Global;
use crate::oracle::OracleStatus;
use crate::pending::PendingQueue;
use crate::position::Position;
use crate::types::{AccountId, Quote, Timestamp};
use crate::version::{Version, VersionError};
use std::collections::BTreeMap;

pub(super) struct Context {
    pub protocol: ProtocolParameter,
    pub status: OracleStatus,
    pub global: Global,
    pub position: Position,
    pub pending: PendingQueue,
    // staged, appended after the committed log
    pub versions: Vec<Version>,
    pub carries: BTreeMap<Timestamp, Timestamp>,
    pub accounts: BTreeMap<AccountId, AccountState>,
    pub checkpoints: Vec<(AccountId, Checkpoint)>,
    // claimable credits, to loaded accounts or not
    pub credits: Vec<(AccountId, Quote)>,
    // signed: positive pulls into the market
    pub transfers: Vec<(AccountId, Quote)>,
    pub requests: Vec<AccountId>,
    pub nonces: Vec<(AccountId, u64)>,
    pub events: Vec<EventPayload>,
}

impl Context {
    /// Timestamp orders placed in this call settle at; events are stamped with it.
    pub fn now(&self) -> Timestamp {
        self.status.next_timestamp
    }

    pub fn account(&self, account: AccountId) -> Result<&AccountState, EngineError> {
        self.accounts.get(&account).ok_or(EngineError::AccountNotLoaded(account))
    }

    pub fn account_mut(&mut self, account: AccountId) -> Result<&mut AccountState, EngineError> {
        self.accounts
            .get_mut(&account)
            .ok_or(EngineError::AccountNotLoaded(account))
    }
}

impl Engine {
    pub(super) fn load(&self, accounts: &[AccountId]) -> Result<Context, EngineError> {
        let status = self.oracle.status()?;
        let accounts = accounts
            .iter()
            .map(|&account| {
                let state = self.accounts.get(&account).cloned().unwrap_or_default();
                (account, state)
            })
            .collect();

        Ok(Context {
            protocol: self.registry.parameter(),
            status,
            global: self.market.global,
            position: self.market.position,
            pending: self.market.pending.clone(),
            versions: Vec::new(),
            carries: BTreeMap::new(),
            accounts,
            checkpoints: Vec::new(),
            credits: Vec::new(),
            transfers: Vec::new(),
            requests: Vec::new(),
            nonces: Vec::new(),
            events: Vec::new(),
        })
    }

    pub(super) fn version_at(&self, ctx: &Context, timestamp: Timestamp) -> Option<Version> {
        ctx.versions
            .iter()
            .rev()
            .find(|version| version.timestamp == timestamp)
            .or_else(|| self.market.versions.get(timestamp))
            .copied()
    }

    pub(super) fn latest_version(&self, ctx: &Context) -> Option<Version> {
        ctx.versions
            .last()
            .or_else(|| self.market.versions.latest())
            .copied()
    }

    /// Where the next accumulation starts from; genesis before the first valid reading.
    pub(super) fn latest_valid_version(&self, ctx: &Context) -> Version {
        ctx.versions
            .iter()
            .rev()
            .find(|version| version.valid)
            .or_else(|| self.market.versions.latest_valid())
            .copied()
            .unwrap_or_else(Version::genesis)
    }

    pub(super) fn carry_target(&self, ctx: &Context, timestamp: Timestamp) -> Option<Timestamp> {
        ctx.carries
            .get(&timestamp)
            .or_else(|| self.market.carries.get(&timestamp))
            .copied()
    }

    // 8.2.1: everything that could still fail on write is checked before funds move
    fn verify(&self, ctx: &Context) -> Result<(), EngineError> {
        let mut latest = self.market.versions.latest().map(|version| version.timestamp);
        for version in &ctx.versions {
            if self.market.versions.contains(version.timestamp) {
                return Err(VersionError::Duplicate {
                    timestamp: version.timestamp,
                }
                .into());
            }
            if let Some(latest) = latest.filter(|latest| version.timestamp <= *latest) {
                return Err(VersionError::OutOfOrder {
                    timestamp: version.timestamp,
                    latest,
                }
                .into());
            }
            latest = Some(version.timestamp);
        }
        for (account, checkpoint) in &ctx.checkpoints {
            let written = self
                .checkpoints
                .get(account)
                .is_some_and(|log| log.contains(checkpoint.timestamp));
            if written {
                return Err(CheckpointError::Duplicate(checkpoint.timestamp).into());
            }
        }
        Ok(())
    }

    pub(super) fn commit(&mut self, ctx: Context) -> Result<(), EngineError> {
        self.verify(&ctx)?;
        let now = ctx.now();

        for &account in &ctx.requests {
            self.oracle.request(account)?;
        }
        for &(account, delta) in &ctx.transfers {
            transfer_delta(self.custody.as_mut(), account, delta)?;
        }

        self.market.global = ctx.global;
        self.market.position = ctx.position;
        self.market.pending = ctx.pending;
        self.market.carries.extend(ctx.carries);
        for version in ctx.versions {
            self.market.versions.push(version)?;
        }

        self.accounts.extend(ctx.accounts);
        for (account, checkpoint) in ctx.checkpoints {
            self.checkpoints.entry(account).or_default().push(checkpoint)?;
        }
        for (account, amount) in ctx.credits {
            self.accounts.entry(account).or_default().local.credit(amount);
        }
        self.used_nonces.extend(ctx.nonces);
        self.prune_carries();

        for payload in ctx.events {
            self.emit_event(now, payload);
        }
        Ok(())
    }

    // a carry is only read by an account whose queue still starts at or before it
    fn prune_carries(&mut self) {
        if self.market.carries.is_empty() {
            return;
        }
        let oldest = self
            .accounts
            .values()
            .filter_map(|state| state.pending.first().map(|(_, entry)| entry.timestamp()))
            .min();
        match oldest {
            Some(oldest) => self.market.carries = self.market.carries.split_off(&oldest),
            None => self.market.carries.clear(),
        }
    }
}
