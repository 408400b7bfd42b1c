//! Perpetual market settlement simulation.
//!
//! Walks one market through funding accrual, an invalid oracle version, a liquidation
//! with socialized shortfall, and a signed intent fill.

use perp_settlement::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

const OWNER: AccountId = AccountId(1);
const MAKER: AccountId = AccountId(10);
const ALICE: AccountId = AccountId(11);
const BOB: AccountId = AccountId(12);
const KEEPER: AccountId = AccountId(20);

fn main() {
    println!("Perpetual Market Settlement Simulation");
    println!("Oracle Versions, Pending Orders, Lazy Local Settlement\n");

    scenario_1_funding();
    scenario_2_invalid_version();
    scenario_3_liquidation_and_shortfall();
    scenario_4_intent_fill();

    println!("\nAll simulations completed successfully.");
}

/// Engine wired to in-memory collaborators, with handles kept for driving the clock.
struct Market {
    engine: Engine,
    oracle: MockOracle,
    custody: InMemoryCustody,
}

impl Market {
    fn new(config: MarketConfig) -> Self {
        let oracle = MockOracle::new(10);
        oracle.set_time(Timestamp(1000));
        let custody = InMemoryCustody::new();
        let engine = Engine::new(
            EngineConfig::default(),
            config,
            Collaborators {
                oracle: Box::new(oracle.clone()),
                registry: Box::new(MockRegistry::new(OWNER)),
                verifier: Box::new(MockVerifier::new()),
                custody: Box::new(custody.clone()),
            },
        )
        .unwrap();
        Self { engine, oracle, custody }
    }

    fn commit(&self, price: Decimal) -> Timestamp {
        let timestamp = self.oracle.next_timestamp();
        self.oracle.commit(timestamp, price).unwrap();
        self.oracle.set_time(timestamp.add_secs(1));
        timestamp
    }

    fn commit_invalid(&self) -> Timestamp {
        let timestamp = self.oracle.next_timestamp();
        self.oracle.commit_invalid(timestamp).unwrap();
        self.oracle.set_time(timestamp.add_secs(1));
        timestamp
    }

    fn open(&mut self, account: AccountId, request: UpdateRequest, deposit: Decimal) {
        self.custody.fund(account, deposit);
        self.engine.update(request.collateral(deposit)).unwrap();
    }

    fn report(&self, label: &str, account: AccountId) {
        let position = self.engine.account_position(account);
        let local = self.engine.local(account);
        println!(
            "  {label}: maker {} long {} short {} | collateral ${} claimable ${}",
            position.maker,
            position.long,
            position.short,
            local.collateral.value().round_dp(6),
            local.claimable.value().round_dp(6)
        );
    }
}

fn quiet_config() -> MarketConfig {
    let mut config = MarketConfig::default();
    config.risk.taker_fee = Decimal::ZERO;
    config.risk.maker_fee = Decimal::ZERO;
    config.risk.spread = SpreadCurve::zero();
    config.risk.utilization.max_rate = Decimal::ZERO;
    config.risk.utilization.target_rate = Decimal::ZERO;
    config
}

/// Funding accrues continuously while the skew persists.
fn scenario_1_funding() {
    println!("Scenario 1: Funding Over One Hour\n");

    let mut config = quiet_config();
    config.risk.skew_scale = dec!(5);
    let mut market = Market::new(config);

    market.commit(dec!(123));
    market.open(MAKER, UpdateRequest::new(MAKER).maker(dec!(5)), dec!(10000));
    market.open(ALICE, UpdateRequest::new(ALICE).long(dec!(5)), dec!(10000));
    let opened = market.commit(dec!(123));
    market.engine.settle(MAKER).unwrap();
    market.engine.settle(ALICE).unwrap();
    println!("  Maker provides 5, Alice goes long 5 at $123 (skew 1.0)");

    market.oracle.set_time(opened.add_secs(3600));
    let settled = market.commit(dec!(123));
    market.engine.settle(MAKER).unwrap();
    market.engine.settle(ALICE).unwrap();

    println!("  One hour later, version {} settled", settled);
    println!("  Funding rate now {}% apr", (market.engine.global().funding_rate * dec!(100)).round_dp(4));
    market.report("Maker", MAKER);
    market.report("Alice", ALICE);
    println!("  Donation pool: ${}\n", market.engine.global().donation.value().round_dp(6));
}

/// Orders at an invalid version pay the settlement fee once and open at the next one.
fn scenario_2_invalid_version() {
    println!("Scenario 2: Invalid Oracle Version\n");

    let mut market = Market::new(quiet_config());
    market.commit(dec!(100));
    market.open(MAKER, UpdateRequest::new(MAKER).maker(dec!(10)), dec!(10000));
    market.commit(dec!(100));
    market.engine.settle(MAKER).unwrap();

    market.oracle.set_settlement_fee(dec!(1));
    market.open(ALICE, UpdateRequest::new(ALICE).long(dec!(1)), dec!(1000));
    market.open(BOB, UpdateRequest::new(BOB).short(dec!(1)), dec!(1000));
    let invalid = market.commit_invalid();
    market.commit(dec!(100));
    market.engine.settle(ALICE).unwrap();
    market.engine.settle(BOB).unwrap();

    println!("  Version {} had no valid price; orders carried forward", invalid);
    println!("  Oracle fee pool: ${}", market.engine.global().oracle_fee.value());
    market.report("Alice", ALICE);
    market.report("Bob", BOB);

    let opened = market.commit(dec!(100));
    market.engine.settle(ALICE).unwrap();
    market.engine.settle(BOB).unwrap();
    println!("  Carried orders opened at version {}", opened);
    market.report("Alice", ALICE);
    market.report("Bob", BOB);
    println!();
}

/// A keeper liquidates an underwater long; the loss beyond collateral hits makers.
fn scenario_3_liquidation_and_shortfall() {
    println!("Scenario 3: Liquidation and Shortfall\n");

    let mut market = Market::new(quiet_config());
    market.commit(dec!(100));
    market.open(MAKER, UpdateRequest::new(MAKER).maker(dec!(10)), dec!(10000));
    market.open(ALICE, UpdateRequest::new(ALICE).long(dec!(10)), dec!(110));
    market.commit(dec!(100));
    market.engine.settle(ALICE).unwrap();
    println!("  Alice: long 10 at $100 with $110 collateral");

    market.commit(dec!(80));
    let quote = market.engine.liquidation_quote(ALICE).unwrap();
    println!(
        "  Price drops to $80: liquidatable {}, keeper fee ${}",
        quote.liquidatable,
        quote.fee.value()
    );

    market.engine.close(ALICE, KEEPER, true, None).unwrap();
    market.commit(dec!(80));
    market.engine.settle(ALICE).unwrap();
    println!("  Keeper closes the position");
    market.report("Alice", ALICE);
    println!("  Alice deficit: ${}", market.engine.local(ALICE).deficit.value());
    println!("  Shortfall queued for makers: ${}", market.engine.global().shortfall.total());

    market.commit(dec!(80));
    market.engine.settle(MAKER).unwrap();
    market.report("Maker", MAKER);

    let claimed = market.engine.claim_fee(KEEPER, KEEPER).unwrap();
    println!("  Keeper claims ${}\n", claimed.value());
}

/// A signed intent fills at its own price, off the spread curve.
fn scenario_4_intent_fill() {
    println!("Scenario 4: Intent Fill\n");

    let mut config = quiet_config();
    config.risk.taker_fee = dec!(0.001);
    let mut market = Market::new(config);
    market.commit(dec!(100));
    market.open(MAKER, UpdateRequest::new(MAKER).maker(dec!(10)), dec!(10000));
    market.open(ALICE, UpdateRequest::new(ALICE), dec!(1000));
    market.open(BOB, UpdateRequest::new(BOB), dec!(1000));
    market.commit(dec!(100));

    let intent = Intent {
        amount: dec!(2),
        price: dec!(101),
        fee: dec!(0.5),
        originator: Some(AccountId(30)),
        solver: Some(AccountId(31)),
        collateralization: dec!(0.1),
        common: IntentCommon {
            account: ALICE,
            signer: ALICE,
            nonce: 1,
            group: 0,
            expiry: Timestamp(0),
        },
    };
    let signature = MockVerifier::sign(&intent);
    let outcome = market.engine.update_intent(BOB, &intent, &signature).unwrap();
    println!(
        "  Bob fills Alice's intent to buy 2 at $101 (orders {} and {})",
        outcome.signer_order_id, outcome.counter_order_id
    );

    match market.engine.update_intent(BOB, &intent, &signature) {
        Err(err) => println!("  Replay rejected: {err} ({:?})", err.category()),
        Ok(_) => println!("  Replay unexpectedly accepted"),
    }

    market.commit(dec!(100));
    market.engine.settle(ALICE).unwrap();
    market.engine.settle(BOB).unwrap();
    market.report("Alice", ALICE);
    market.report("Bob", BOB);
    market.report("Solver", AccountId(31));
    market.report("Originator", AccountId(30));
}
