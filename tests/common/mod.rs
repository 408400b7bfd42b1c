//! Shared market harness for integration tests.
//!
//! Wires an [`Engine`] to in-memory collaborators and keeps handles on them, so a
//! test can move the oracle clock, commit prices and inspect wallets.

#![allow(dead_code)]

use perp_settlement::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

pub const OWNER: AccountId = AccountId(1);
pub const COORDINATOR: AccountId = AccountId(2);
pub const ORACLE_RECEIVER: AccountId = AccountId(3);
pub const GRANULARITY: u64 = 10;
pub const START: u64 = 1000;

pub struct Harness {
    pub engine: Engine,
    pub oracle: MockOracle,
    pub registry: MockRegistry,
    pub verifier: MockVerifier,
    pub custody: InMemoryCustody,
}

impl Harness {
    pub fn new(config: MarketConfig) -> Self {
        let oracle = MockOracle::new(GRANULARITY);
        oracle.set_time(Timestamp(START));
        let registry = MockRegistry::new(OWNER);
        registry.set_coordinator(COORDINATOR);
        registry.set_oracle_fee_receiver(ORACLE_RECEIVER);
        let verifier = MockVerifier::new();
        let custody = InMemoryCustody::new();

        let engine = Engine::new(
            EngineConfig::default(),
            config,
            Collaborators {
                oracle: Box::new(oracle.clone()),
                registry: Box::new(registry.clone()),
                verifier: Box::new(verifier.clone()),
                custody: Box::new(custody.clone()),
            },
        )
        .unwrap();

        Self {
            engine,
            oracle,
            registry,
            verifier,
            custody,
        }
    }

    /// Market with every fee, spread and interest rate switched off.
    pub fn frictionless() -> Self {
        Self::new(frictionless_config())
    }

    pub fn fund(&self, account: AccountId, amount: Decimal) {
        self.custody.fund(account, amount);
    }

    /// Timestamp an order placed now settles at.
    pub fn next(&self) -> Timestamp {
        self.oracle.next_timestamp()
    }

    /// Commits `price` at the pending timestamp and moves the clock past it.
    pub fn commit(&self, price: Decimal) -> Timestamp {
        let timestamp = self.oracle.next_timestamp();
        self.oracle.commit(timestamp, price).unwrap();
        self.oracle.set_time(timestamp.add_secs(1));
        timestamp
    }

    pub fn commit_invalid(&self) -> Timestamp {
        let timestamp = self.oracle.next_timestamp();
        self.oracle.commit_invalid(timestamp).unwrap();
        self.oracle.set_time(timestamp.add_secs(1));
        timestamp
    }

    /// Moves the clock forward so the next order lands `secs` later.
    pub fn advance(&self, secs: u64) {
        let next = self.oracle.next_timestamp();
        self.oracle.set_time(Timestamp(next.as_secs() + secs));
    }

    /// Funds `account` and deposits `collateral` while opening the given deltas.
    pub fn open(&mut self, account: AccountId, maker: Decimal, long: Decimal, short: Decimal, collateral: Decimal) {
        self.fund(account, collateral);
        self.engine
            .update(
                UpdateRequest::new(account)
                    .maker(maker)
                    .long(long)
                    .short(short)
                    .collateral(collateral),
            )
            .unwrap();
    }

    pub fn settle_all(&mut self, accounts: &[AccountId]) {
        for &account in accounts {
            self.engine.settle(account).unwrap();
        }
    }

    pub fn collateral(&self, account: AccountId) -> Decimal {
        self.engine.local(account).collateral.value()
    }

    /// Collateral the market owes minus what it actually received. Zero when the
    /// books balance.
    pub fn conservation_gap(&self) -> Decimal {
        let mut owed = Decimal::ZERO;
        for (_, state) in self.engine.accounts() {
            owed += state.local.collateral.value();
            owed += state.local.claimable.value();
            owed += state.pending.collateral().value();
        }
        let global = self.engine.global();
        owed += global.pools().value();
        owed -= global.shortfall.total();
        owed - self.custody.net_inflow().value()
    }
}

pub fn frictionless_config() -> MarketConfig {
    let mut config = MarketConfig::default();
    config.risk.taker_fee = Decimal::ZERO;
    config.risk.maker_fee = Decimal::ZERO;
    config.risk.spread = SpreadCurve::zero();
    config.risk.utilization = UtilizationCurve {
        min_rate: Decimal::ZERO,
        max_rate: Decimal::ZERO,
        target_rate: Decimal::ZERO,
        target_utilization: dec!(0.8),
    };
    config.risk.funding.k = Decimal::ZERO;
    config
}

pub fn close_to(a: Decimal, b: Decimal, tolerance: Decimal) -> bool {
    (a - b).abs() <= tolerance
}
