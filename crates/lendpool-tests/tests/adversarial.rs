//! Adversarial property tests for Lendpool.
//!
//! Attack vectors covered:
//! - Replaying operations with a clock that moves backwards
//! - Deposits without funds or approval, over-withdrawals, zero amounts
//! - Claims that the treasury cannot cover
//! - Activity under a successor authority leaking into a retired one
//! - Claiming often versus claiming once

use std::collections::BTreeMap;

use lendpool_core::types::{AccountId, Amount, AssetId, AuthorityId, Timestamp};
use lendpool_pool::{PoolError, RateScope};
use lendpool_rewards::StreamSpec;
use lendpool_tests::helpers::*;
use proptest::prelude::*;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const USERS: u8 = 4;
const TREASURY: u8 = 0xE1;

#[derive(Debug, Clone)]
enum Op {
    Deposit { user: u8, amount: Amount },
    Withdraw { user: u8, amount: Amount },
    Register { user: u8 },
    Claim { user: u8 },
    ClaimAll { user: u8 },
    SetRate { rate: u128 },
    Switch,
}

/// An operation together with a signed clock step.
fn op_strategy() -> impl Strategy<Value = (Op, i64)> {
    let user = 1..=USERS;
    let op = prop_oneof![
        (user.clone(), 0u128..300).prop_map(|(user, amount)| Op::Deposit { user, amount: n6(amount) }),
        (user.clone(), 0u128..300).prop_map(|(user, amount)| Op::Withdraw { user, amount: n6(amount) }),
        user.clone().prop_map(|user| Op::Register { user }),
        user.clone().prop_map(|user| Op::Claim { user }),
        user.prop_map(|user| Op::ClaimAll { user }),
        (0u128..=5_000).prop_map(|rate| Op::SetRate { rate }),
        Just(Op::Switch),
    ];
    (op, -(YEAR as i64) / 4..(YEAR as i64) / 2)
}

/// Everything a caller can observe about the pool.
#[derive(Debug, PartialEq, Eq)]
struct Snapshot {
    latest: Timestamp,
    active: AuthorityId,
    total_principal: Amount,
    idle: Amount,
    registrations: usize,
    principals: Vec<Amount>,
    balances: Vec<Amount>,
    rewards: Vec<BTreeMap<AssetId, Amount>>,
}

fn snapshot(pool: &TestPool) -> Snapshot {
    let now = pool.latest_time();
    let users: Vec<AccountId> = (1..=USERS).map(acct).collect();
    Snapshot {
        latest: now,
        active: pool.active().authority,
        total_principal: pool.total_principal(),
        idle: pool.idle_principal(),
        registrations: pool.registry().len(),
        principals: users.iter().map(|u| pool.principal_of(u)).collect(),
        balances: users
            .iter()
            .chain(std::iter::once(&acct(TREASURY)))
            .map(|u| balance(pool, *u, STABLE))
            .collect(),
        rewards: users
            .iter()
            .map(|u| pool.reward_across_chain(u, now).unwrap())
            .collect(),
    }
}

// ---------------------------------------------------------------------------
// Test 1: rejected operations leave every ledger untouched
//
// Random operation sequences with a clock that sometimes runs backwards,
// users with limited funds and a treasury that runs dry. Any operation
// that returns an error must not change anything observable.
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn rejected_operations_are_atomic(
        ops in proptest::collection::vec(op_strategy(), 1..40),
        treasury_funds in 0u128..50,
    ) {
        let treasury = acct(TREASURY);
        let (mut pool, op) = open_pool(treasury, vec![StreamSpec::bps(STABLE, 2000)]);
        let setter = pool.grant_rate_setter(&op, RateScope::AllAuthorities).unwrap();
        fund_treasury(&mut pool, treasury, STABLE, n6(treasury_funds));
        for user in 1..=USERS {
            fund(&mut pool, acct(user), n6(500));
        }

        let mut now: Timestamp = 0;
        for (action, step) in ops {
            let at = now.saturating_add_signed(step);
            let before = snapshot(&pool);
            let result: Result<(), PoolError> = match action {
                Op::Deposit { user, amount } => pool.deposit(acct(user), amount, at).map(|_| ()),
                Op::Withdraw { user, amount } => pool.withdraw_principal(acct(user), amount, at).map(|_| ()),
                Op::Register { user } => {
                    let active = pool.active().authority;
                    pool.register(acct(user), active, at).map(|_| ())
                }
                Op::Claim { user } => {
                    let active = pool.active().authority;
                    pool.claim(acct(user), active, at).map(|_| ())
                }
                Op::ClaimAll { user } => pool.claim_across_chain(acct(user), at).map(|_| ()),
                Op::SetRate { rate } => {
                    let active = pool.active().authority;
                    pool.set_rate(&setter, active, &asset(STABLE), rate, at)
                }
                Op::Switch => pool
                    .create_authority(&op, treasury, &[StreamSpec::bps(STABLE, 1000)], at)
                    .and_then(|id| pool.switch_authority(&op, id, at).map(|_| ())),
            };

            match result {
                Ok(()) => {
                    prop_assert!(pool.latest_time() >= before.latest);
                    now = pool.latest_time();
                }
                Err(err) => {
                    if at < before.latest {
                        prop_assert_eq!(
                            err,
                            PoolError::NonMonotonicTime { now: at, latest: before.latest }
                        );
                    }
                    prop_assert_eq!(snapshot(&pool), before);
                }
            }

            let principals: Amount = (1..=USERS).map(|u| pool.principal_of(&acct(u))).sum();
            prop_assert_eq!(principals, pool.total_principal());
        }
    }
}

// ---------------------------------------------------------------------------
// Test 2: switch isolation
//
// After a switch, nothing done under the successor changes what the
// retired authority owes.
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn successor_activity_does_not_touch_retired_authority(
        deposit in 1u128..1_000,
        switch_at in 1u64..YEAR,
        moves in proptest::collection::vec((any::<bool>(), 1u128..200, 1u64..YEAR / 8), 0..12),
    ) {
        let treasury = acct(TREASURY);
        let (mut pool, op) = open_pool(treasury, vec![StreamSpec::bps(STABLE, 1500)]);
        let holder = acct(1);
        let other = acct(2);
        fund(&mut pool, holder, n6(10_000));
        fund(&mut pool, other, n6(10_000));
        pool.deposit(holder, n6(deposit), 0).unwrap();
        pool.deposit(other, n6(deposit), 0).unwrap();

        let next = pool
            .create_authority(&op, treasury, &[StreamSpec::bps(STABLE, 3000)], switch_at)
            .unwrap();
        pool.switch_authority(&op, next, switch_at).unwrap();
        let frozen = pool.reward_of(&holder, AuthorityId::GENESIS, switch_at).unwrap();
        pool.register(holder, next, switch_at).unwrap();

        let mut now = switch_at;
        for (is_deposit, amount, step) in moves {
            now += step;
            let who = if amount % 2 == 0 { holder } else { other };
            if is_deposit {
                pool.deposit(who, n6(amount), now).unwrap();
            } else if pool.principal_of(&who) >= n6(amount) {
                pool.withdraw_principal(who, n6(amount), now).unwrap();
            }
            let owed = pool.reward_of(&holder, AuthorityId::GENESIS, now).unwrap();
            prop_assert_eq!(&owed, &frozen);
        }
    }
}

// ---------------------------------------------------------------------------
// Test 3: claim frequency
//
// Claiming at every step pays at most one base unit per settlement less
// than claiming once at the end, and never more.
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn frequent_claims_lose_only_truncation(
        principal in 1u128..1_000_000_000,
        rate in 0u128..=20_000,
        steps in proptest::collection::vec(1u64..YEAR / 4, 1..10),
    ) {
        let treasury = acct(TREASURY);
        let (mut pool, _op) = open_pool(treasury, vec![StreamSpec::bps(STABLE, rate)]);
        fund_treasury(&mut pool, treasury, STABLE, u128::MAX / 4);
        let (eager, lazy) = (acct(1), acct(2));
        fund(&mut pool, eager, principal);
        fund(&mut pool, lazy, principal);
        pool.deposit(eager, principal, 0).unwrap();
        pool.deposit(lazy, principal, 0).unwrap();

        let mut now = 0;
        let mut eager_total: Amount = 0;
        for step in &steps {
            now += step;
            match pool.claim(eager, AuthorityId::GENESIS, now) {
                Ok(paid) => eager_total += paid[0].amount,
                Err(PoolError::NothingToClaim { .. }) => {}
                Err(e) => return Err(TestCaseError::fail(format!("claim failed: {e}"))),
            }
        }
        let lazy_total = pool
            .reward_of(&lazy, AuthorityId::GENESIS, now)
            .unwrap()[0]
            .amount;
        prop_assert!(eager_total <= lazy_total);
        prop_assert!(lazy_total - eager_total <= steps.len() as u128);
    }
}

// ---------------------------------------------------------------------------
// Test 4: view and claim agree
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn claim_across_chain_pays_what_view_reports(
        switches in proptest::collection::vec(YEAR / 8..YEAR, 1..5),
        principal in 1u128..10_000,
    ) {
        let treasury = acct(TREASURY);
        let (mut pool, op) = open_pool(treasury, vec![StreamSpec::bps(STABLE, 1200)]);
        fund_treasury(&mut pool, treasury, STABLE, n6(1_000_000_000));
        let user = acct(1);
        fund(&mut pool, user, n6(principal));
        pool.deposit(user, n6(principal), 0).unwrap();

        let mut now = 0;
        for (i, gap) in switches.iter().enumerate() {
            now += gap;
            let rate = 500 * (i as u128 + 1);
            let id = pool
                .create_authority(&op, treasury, &[StreamSpec::bps(STABLE, rate)], now)
                .unwrap();
            pool.switch_authority(&op, id, now).unwrap();
            pool.register(user, id, now).unwrap();
        }
        now += YEAR;

        let view = pool.reward_across_chain(&user, now).unwrap();
        let claim = pool.claim_across_chain(user, now).unwrap();
        prop_assert_eq!(&claim.totals, &view);
        prop_assert_eq!(balance(&pool, user, STABLE), view[&asset(STABLE)]);
        prop_assert_eq!(claim.per_authority.len(), switches.len() + 1);
    }
}
