//! Solvency invariant tests.
//!
//! These tests verify that collateral is conserved and settlement is repeatable no
//! matter how orders, prices, invalid versions, liquidations and intent fills
//! interleave.

mod common;

use common::*;
use perp_settlement::*;
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

#[derive(Debug, Clone)]
enum Step {
    Trade { account: usize, maker: i64, long: i64, short: i64 },
    Deposit { account: usize, amount: i64 },
    Withdraw { account: usize, amount: i64 },
    Commit { price: i64 },
    // a large move, enough to push leveraged accounts under maintenance
    Shock { price: i64 },
    Invalid,
    Wait { secs: u64 },
    Settle { account: usize },
    Claim { account: usize },
    Liquidate { account: usize },
    Intent { signer: usize, counter: usize, amount: i64, price: i64, nonce: u64 },
}

const ACCOUNTS: [AccountId; 4] = [AccountId(10), AccountId(11), AccountId(12), AccountId(13)];
const LIQUIDATOR: AccountId = AccountId(20);
const ORIGINATOR: AccountId = AccountId(30);
const SOLVER: AccountId = AccountId(31);

fn step_strategy() -> impl Strategy<Value = Step> {
    prop_oneof![
        4 => (0..4usize, -3i64..12, -3i64..12, -3i64..12)
            .prop_map(|(account, maker, long, short)| Step::Trade { account, maker, long, short }),
        2 => (0..4usize, 1i64..500).prop_map(|(account, amount)| Step::Deposit { account, amount }),
        1 => (0..4usize, 1i64..200).prop_map(|(account, amount)| Step::Withdraw { account, amount }),
        3 => (80i64..120).prop_map(|price| Step::Commit { price }),
        1 => (40i64..180).prop_map(|price| Step::Shock { price }),
        1 => Just(Step::Invalid),
        1 => (1u64..5000).prop_map(|secs| Step::Wait { secs }),
        2 => (0..4usize).prop_map(|account| Step::Settle { account }),
        1 => (0..4usize).prop_map(|account| Step::Claim { account }),
        2 => (0..4usize).prop_map(|account| Step::Liquidate { account }),
        2 => (0..4usize, 0..4usize, -5i64..6, 90i64..110, 0u64..8)
            .prop_map(|(signer, counter, amount, price, nonce)| Step::Intent { signer, counter, amount, price, nonce }),
    ]
}

fn market_config() -> MarketConfig {
    let mut config = MarketConfig::default();
    config.risk.skew_scale = dec!(10);
    config.risk.taker_fee = dec!(0.001);
    config.risk.maker_fee = dec!(0.0005);
    config
}

// applies one step, ignoring rejections: a rejected call must leave no trace anyway
fn apply(h: &mut Harness, step: &Step) {
    match *step {
        Step::Trade { account, maker, long, short } => {
            let request = UpdateRequest::new(ACCOUNTS[account])
                .maker(Decimal::from(maker))
                .long(Decimal::from(long))
                .short(Decimal::from(short));
            let _ = h.engine.update(request);
        }
        Step::Deposit { account, amount } => {
            let amount = Decimal::from(amount);
            h.fund(ACCOUNTS[account], amount);
            let _ = h.engine.update(UpdateRequest::new(ACCOUNTS[account]).collateral(amount));
        }
        Step::Withdraw { account, amount } => {
            let request = UpdateRequest::new(ACCOUNTS[account]).collateral(-Decimal::from(amount));
            let _ = h.engine.update(request);
        }
        Step::Commit { price } | Step::Shock { price } => {
            h.commit(Decimal::from(price));
        }
        Step::Invalid => {
            h.commit_invalid();
        }
        Step::Wait { secs } => h.advance(secs),
        Step::Settle { account } => {
            let _ = h.engine.settle(ACCOUNTS[account]);
        }
        Step::Claim { account } => {
            let _ = h.engine.claim_fee(ACCOUNTS[account], ACCOUNTS[account]);
        }
        Step::Liquidate { account } => {
            let target = ACCOUNTS[account];
            match h.engine.liquidation_quote(target) {
                // makers are cut back by the quoted amount, takers closed out
                Ok(quote) if quote.liquidatable => {
                    let request = UpdateRequest::new(target)
                        .maker(quote.maker)
                        .long(quote.long)
                        .short(quote.short)
                        .protect(LIQUIDATOR);
                    let _ = h.engine.update(request);
                }
                _ => {
                    let _ = h.engine.close(target, LIQUIDATOR, true, None);
                }
            }
        }
        Step::Intent { signer, counter, amount, price, nonce } => {
            let intent = Intent {
                amount: Decimal::from(amount),
                price: Decimal::from(price),
                fee: dec!(0.5),
                originator: Some(ORIGINATOR),
                solver: Some(SOLVER),
                collateralization: dec!(0.1),
                common: IntentCommon {
                    account: ACCOUNTS[signer],
                    signer: ACCOUNTS[signer],
                    nonce,
                    group: 0,
                    expiry: Timestamp(0),
                },
            };
            let signature = MockVerifier::sign(&intent);
            let _ = h.engine.update_intent(ACCOUNTS[counter], &intent, &signature);
        }
    }
}

fn seeded_harness() -> Harness {
    let mut h = Harness::new(market_config());
    h.oracle.set_settlement_fee(dec!(0.3));
    h.commit(dec!(100));
    h.open(AccountId(99), dec!(20), dec!(0), dec!(0), dec!(100_000));
    // thin enough that a full-size trade runs close to its margin
    for account in ACCOUNTS {
        h.fund(account, dec!(150));
        h.engine
            .update(UpdateRequest::new(account).collateral(dec!(150)))
            .unwrap();
    }
    h
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Collateral held by accounts, pools and claims always equals what custody took in
    #[test]
    fn collateral_is_conserved(steps in proptest::collection::vec(step_strategy(), 1..40)) {
        let mut h = seeded_harness();
        for step in &steps {
            apply(&mut h, step);
        }

        // accounts realize version accumulators lazily, so the books only balance
        // once everyone has settled to the same version
        h.commit(dec!(100));
        let mut everyone = ACCOUNTS.to_vec();
        everyone.push(AccountId(99));
        for account in everyone {
            h.engine.settle(account).unwrap();
        }
        let gap = h.conservation_gap();
        prop_assert!(gap.abs() < dec!(0.000001), "final gap {}", gap);
    }

    /// A second settle with no new oracle data changes nothing
    #[test]
    fn settle_is_idempotent(
        steps in proptest::collection::vec(step_strategy(), 1..30),
        account in 0..4usize,
    ) {
        let mut h = seeded_harness();
        for step in &steps {
            apply(&mut h, step);
        }
        let account = ACCOUNTS[account];
        if h.engine.settle(account).is_ok() {
            let local = h.engine.local(account);
            let global = *h.engine.global();
            let checkpoints = h.engine.checkpoints(account).map_or(0, |log| log.len());

            let again = h.engine.settle(account).unwrap();
            prop_assert_eq!(again, SettleOutcome::default());
            prop_assert_eq!(h.engine.local(account), local);
            prop_assert_eq!(*h.engine.global(), global);
            prop_assert_eq!(h.engine.checkpoints(account).map_or(0, |log| log.len()), checkpoints);
        }
    }

    /// Each pending order settles exactly once; nothing is left behind once the oracle
    /// has passed every pending timestamp
    #[test]
    fn every_order_eventually_settles(steps in proptest::collection::vec(step_strategy(), 1..30)) {
        let mut h = seeded_harness();
        for step in &steps {
            apply(&mut h, step);
        }
        // an invalid tail carries into the next timestamp, which this commit covers
        h.commit(dec!(100));
        h.commit(dec!(100));
        for account in ACCOUNTS {
            h.engine.settle(account).unwrap();
            prop_assert!(h.engine.account(account).map_or(true, |state| state.pending.is_empty()));
        }
        h.engine.settle(AccountId(99)).unwrap();
        prop_assert!(h.engine.pending().is_empty());
        prop_assert!(h.engine.carries().is_empty());
    }
}

#[test]
fn open_interest_matches_account_positions() {
    let mut h = seeded_harness();
    let steps = [
        Step::Commit { price: 100 },
        Step::Trade { account: 0, maker: 0, long: 2, short: 0 },
        Step::Trade { account: 1, maker: 0, long: 0, short: 3 },
        Step::Trade { account: 2, maker: 1, long: 0, short: 0 },
        Step::Commit { price: 104 },
        Step::Trade { account: 0, maker: 0, long: -1, short: 0 },
        Step::Invalid,
        Step::Commit { price: 97 },
        Step::Commit { price: 99 },
    ];
    for step in &steps {
        apply(&mut h, step);
    }
    let mut everyone = ACCOUNTS.to_vec();
    everyone.push(AccountId(99));
    let mut sum = Position::new(Timestamp(0));
    for &account in &everyone {
        h.engine.settle(account).unwrap();
        let position = h.engine.account_position(account);
        sum.maker += position.maker;
        sum.long += position.long;
        sum.short += position.short;
    }
    let global = h.engine.position();
    assert_eq!((global.maker, global.long, global.short), (sum.maker, sum.long, sum.short));
    assert_eq!(global.long, dec!(1));
    assert_eq!(global.short, dec!(3));
    assert!(close_to(h.conservation_gap(), Decimal::ZERO, dec!(0.000001)));
}

#[test]
fn liquidation_and_intent_keep_the_books_balanced() {
    let mut h = seeded_harness();
    let steps = [
        Step::Commit { price: 100 },
        Step::Trade { account: 0, maker: 0, long: 11, short: 0 },
        Step::Commit { price: 100 },
        // 16 a unit on 11 is more than the 150 deposited
        Step::Shock { price: 84 },
        Step::Liquidate { account: 0 },
        Step::Intent { signer: 1, counter: 2, amount: 2, price: 100, nonce: 1 },
        Step::Commit { price: 84 },
        Step::Commit { price: 84 },
    ];
    for step in &steps {
        apply(&mut h, step);
    }
    let mut everyone = ACCOUNTS.to_vec();
    everyone.push(AccountId(99));
    for &account in &everyone {
        h.engine.settle(account).unwrap();
    }

    assert!(h.engine.account_position(ACCOUNTS[0]).is_empty());
    assert!(h.engine.local(LIQUIDATOR).claimable.is_positive());
    let socialized = h
        .engine
        .events()
        .iter()
        .any(|event| matches!(&event.payload, EventPayload::ShortfallSocialized(e) if e.account == ACCOUNTS[0]));
    assert!(socialized);
    assert_eq!(h.engine.account_position(ACCOUNTS[1]).long, dec!(2));
    assert_eq!(h.engine.account_position(ACCOUNTS[2]).short, dec!(2));
    assert!(h.engine.local(SOLVER).claimable.is_positive());
    assert!(close_to(h.conservation_gap(), Decimal::ZERO, dec!(0.000001)));
}
