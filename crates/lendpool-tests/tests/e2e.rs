//! End-to-end scenarios for Lendpool.
//!
//! Each test drives a pool through deposits, withdrawals, rate changes and
//! authority switches over several simulated years and checks exact reward
//! amounts. Amounts are in base units of 6-decimal assets unless noted.

use lendpool_core::error::ChainError;
use lendpool_core::types::{AssetAmount, AuthorityId};
use lendpool_pool::{AllowListGate, IdleStrategy, PoolConfig, PoolError, RateScope};
use lendpool_rewards::StreamSpec;
use lendpool_tests::helpers::*;

// ======================================================================
// Scenario 1: constant rate over one year
// ======================================================================

#[test]
fn e2e_constant_rate_one_year() {
    let treasury = acct(0xE1);
    let (mut pool, _op) = open_pool(treasury, vec![StreamSpec::bps(STABLE, 1000)]);
    fund_treasury(&mut pool, treasury, STABLE, n6(1_000));
    let alice = acct(1);
    fund(&mut pool, alice, n6(100));

    pool.deposit(alice, n6(100), 0).unwrap();
    let reward = pool.reward_of(&alice, AuthorityId::GENESIS, YEAR).unwrap();
    assert_eq!(reward, vec![AssetAmount::new(asset(STABLE), n6(10))]);

    let paid = pool.claim(alice, AuthorityId::GENESIS, YEAR).unwrap();
    assert_eq!(paid, reward);
    assert_eq!(balance(&pool, alice, STABLE), n6(10));
    assert_eq!(
        pool.reward_of(&alice, AuthorityId::GENESIS, YEAR).unwrap()[0].amount,
        0,
        "reward should be zero right after a claim"
    );
}

// ======================================================================
// Scenario 2: rate change after one year
// ======================================================================

#[test]
fn e2e_rate_change_mid_holding() {
    let treasury = acct(0xE1);
    let (mut pool, op) = open_pool(treasury, vec![StreamSpec::bps(STABLE, 1000)]);
    let setter = pool.grant_rate_setter(&op, RateScope::AllAuthorities).unwrap();
    let alice = acct(1);
    fund(&mut pool, alice, n6(100));

    pool.deposit(alice, n6(100), 0).unwrap();
    pool.set_rate(&setter, AuthorityId::GENESIS, &asset(STABLE), 2000, YEAR).unwrap();
    let reward = pool.reward_of(&alice, AuthorityId::GENESIS, 2 * YEAR).unwrap();
    assert_eq!(reward[0].amount, n6(30));
}

// ======================================================================
// Scenario 3: withdrawal settles at the old principal
// ======================================================================

#[test]
fn e2e_withdraw_settles_before_reducing_principal() {
    let treasury = acct(0xE1);
    let (mut pool, _op) = open_pool(treasury, vec![StreamSpec::bps(STABLE, 10_000)]);
    fund_treasury(&mut pool, treasury, STABLE, n6(10_000));
    let alice = acct(1);
    fund(&mut pool, alice, n6(2000));

    pool.deposit(alice, n6(2000), 0).unwrap();
    pool.withdraw_principal(alice, n6(1000), YEAR).unwrap();
    // The first year accrued on the full 2000.
    let first = pool.claim(alice, AuthorityId::GENESIS, YEAR).unwrap();
    assert_eq!(first[0].amount, n6(2000));

    // The second year accrues on the remaining 1000, unaffected by the claim.
    let second = pool.claim(alice, AuthorityId::GENESIS, 2 * YEAR).unwrap();
    assert_eq!(second[0].amount, n6(1000));
    assert_eq!(pool.principal_of(&alice), n6(1000));
    assert_eq!(balance(&pool, alice, STABLE), n6(1000) + n6(3000));
}

// ======================================================================
// Scenario 4: switching requires re-registration
// ======================================================================

#[test]
fn e2e_switch_requires_registration_with_successor() {
    let t1 = acct(0xE1);
    let t2 = acct(0xE2);
    let (mut pool, op) = open_pool(t1, vec![StreamSpec::bps(STABLE, 1000)]);
    fund_treasury(&mut pool, t1, STABLE, n6(1_000));
    fund_treasury(&mut pool, t2, STABLE, n6(1_000));
    let alice = acct(1);
    fund(&mut pool, alice, n6(100));
    pool.deposit(alice, n6(100), 0).unwrap();

    let b = pool
        .create_authority(&op, t2, &[StreamSpec::bps(STABLE, 2000)], YEAR)
        .unwrap();
    pool.switch_authority(&op, b, YEAR).unwrap();

    let not_registered = PoolError::NotRegistered { account: alice, authority: b };
    assert_eq!(pool.reward_of(&alice, b, 2 * YEAR).unwrap_err(), not_registered);
    assert_eq!(pool.claim(alice, b, 2 * YEAR).unwrap_err(), not_registered);
    assert_eq!(pool.claim_across_chain(alice, 2 * YEAR).unwrap_err(), not_registered);

    // Accrual under the predecessor stays claimable.
    assert_eq!(pool.claim(alice, AuthorityId::GENESIS, 2 * YEAR).unwrap()[0].amount, n6(10));

    // Time between the switch and registration is forfeited.
    pool.register(alice, b, 2 * YEAR).unwrap();
    let paid = pool.claim(alice, b, 3 * YEAR).unwrap();
    assert_eq!(paid[0].amount, n6(20));
}

// ======================================================================
// Reference scenario: three authorities over seven years
//
//   A1 (t=0):  STABLE 25%, TRADE1 5%
//   A2 (t=2y): STABLE 20%, TRADE2 10%
//   A3 (t=6y): STABLE 200%, TRADE1 100%
// ======================================================================

struct Reference {
    pool: TestPool,
    a2: AuthorityId,
    a3: AuthorityId,
}

const U2: u8 = 2;
const U3: u8 = 3;
const U4: u8 = 4;
const U6: u8 = 6;

fn reference_until_six_years() -> Reference {
    let (t1, t2, t3) = (acct(0xE1), acct(0xE2), acct(0xE3));
    let (mut pool, op) = open_pool(
        t1,
        vec![StreamSpec::bps(STABLE, 2500), StreamSpec::bps("TRADE1", 500)],
    );
    for (treasury, symbol) in [
        (t1, STABLE),
        (t1, "TRADE1"),
        (t2, STABLE),
        (t2, "TRADE2"),
        (t3, STABLE),
        (t3, "TRADE1"),
    ] {
        fund_treasury(&mut pool, treasury, symbol, n6(1_000_000));
    }
    for seed in [U2, U3, U4, U6] {
        fund(&mut pool, acct(seed), n6(1_000));
    }

    for seed in [U2, U3, U6] {
        pool.deposit(acct(seed), n6(100), 0).unwrap();
    }
    pool.withdraw_principal(acct(U6), n6(50), YEAR).unwrap();

    let a2 = pool
        .create_authority(&op, t2, &[StreamSpec::bps(STABLE, 2000), StreamSpec::bps("TRADE2", 1000)], 2 * YEAR)
        .unwrap();
    pool.switch_authority(&op, a2, 2 * YEAR).unwrap();
    for seed in [U2, U3, U6] {
        assert!(pool.register(acct(seed), a2, 2 * YEAR).unwrap().created());
    }

    // Deposit under the new authority registers with it.
    pool.deposit(acct(U4), n6(100), half_years(5)).unwrap();
    assert!(pool.registry().is_registered(&acct(U4), a2));
    assert!(!pool.registry().is_registered(&acct(U4), AuthorityId::GENESIS));

    pool.withdraw_principal(acct(U6), n6(50), 3 * YEAR).unwrap();
    pool.deposit(acct(U6), n6(100), 4 * YEAR).unwrap();
    let a1_at_four = pool.reward_of(&acct(U6), AuthorityId::GENESIS, 4 * YEAR).unwrap();
    pool.deposit(acct(U6), n6(100), 5 * YEAR).unwrap();
    let a1_at_five = pool.reward_of(&acct(U6), AuthorityId::GENESIS, 5 * YEAR).unwrap();
    assert_eq!(a1_at_four, a1_at_five, "retired authority must not accrue");
    assert_eq!(a1_at_five[0].amount, 37_500_000);
    assert_eq!(a1_at_five[1].amount, 7_500_000);

    let a3 = pool
        .create_authority(&op, t3, &[StreamSpec::bps(STABLE, 20_000), StreamSpec::bps("TRADE1", 10_000)], 6 * YEAR)
        .unwrap();
    let pointer = pool.switch_authority(&op, a3, 6 * YEAR).unwrap();
    assert_eq!(pointer.version, 2);

    Reference { pool, a2, a3 }
}

fn register_all_with_third(r: &mut Reference) {
    for seed in [U2, U3, U4, U6] {
        r.pool.register(acct(seed), r.a3, 6 * YEAR).unwrap();
    }
}

#[test]
fn e2e_reference_claim_needs_active_registration() {
    let mut r = reference_until_six_years();
    assert_eq!(
        r.pool.claim_across_chain(acct(U6), 6 * YEAR).unwrap_err(),
        PoolError::NotRegistered { account: acct(U6), authority: r.a3 }
    );
    register_all_with_third(&mut r);
    assert_eq!(r.pool.registry().authorities_of(&acct(U6)), vec![r.a3, r.a2, AuthorityId::GENESIS]);
}

#[test]
fn e2e_reference_late_joiner() {
    let mut r = reference_until_six_years();
    register_all_with_third(&mut r);

    let claim = r.pool.claim_across_chain(acct(U4), 7 * YEAR).unwrap();
    assert_eq!(claim.per_authority.len(), 2);
    assert_eq!(claim.per_authority[0].0, r.a3);
    assert_eq!(claim.per_authority[1].0, r.a2);
    assert_eq!(
        claim.per_authority[1].1,
        vec![
            AssetAmount::new(asset(STABLE), n6(70)),
            AssetAmount::new(asset("TRADE2"), n6(35)),
        ]
    );
    assert_eq!(claim.total(&asset(STABLE)), n6(270));
    assert_eq!(claim.total(&asset("TRADE1")), n6(100));
    assert_eq!(claim.total(&asset("TRADE2")), n6(35));
    assert_eq!(balance(&r.pool, acct(U4), "TRADE2"), n6(35));
}

#[test]
fn e2e_reference_long_holder() {
    let mut r = reference_until_six_years();
    register_all_with_third(&mut r);

    let claim = r.pool.claim_across_chain(acct(U3), 7 * YEAR).unwrap();
    assert_eq!(claim.per_authority.len(), 3);
    assert_eq!(claim.total(&asset(STABLE)), n6(50 + 80 + 200));
    assert_eq!(claim.total(&asset("TRADE1")), n6(10 + 100));
    assert_eq!(claim.total(&asset("TRADE2")), n6(40));
    assert_eq!(balance(&r.pool, acct(U3), STABLE), n6(1_000 - 100 + 330));

    // A second holder with the same history is unaffected by the first claim.
    let a1 = r.pool.reward_of(&acct(U2), AuthorityId::GENESIS, 7 * YEAR).unwrap();
    assert_eq!(a1[0].amount, n6(50));
    let a2 = r.pool.reward_of(&acct(U2), r.a2, 7 * YEAR).unwrap();
    assert_eq!(a2[0].amount, n6(80));
    assert!(matches!(
        r.pool.claim_across_chain(acct(U3), 7 * YEAR),
        Err(PoolError::NothingToClaim { .. })
    ));
}

#[test]
fn e2e_reference_active_trader() {
    let mut r = reference_until_six_years();
    register_all_with_third(&mut r);
    let trader = acct(U6);
    assert_eq!(r.pool.principal_of(&trader), n6(200));

    let a2 = r.pool.reward_of(&trader, r.a2, 7 * YEAR).unwrap();
    assert_eq!(a2[0].amount, n6(10 + 20 + 40));
    assert_eq!(a2[1].amount, n6(5 + 10 + 20));

    let totals = r.pool.reward_across_chain(&trader, 7 * YEAR).unwrap();
    assert_eq!(totals[&asset(STABLE)], 37_500_000 + n6(70) + n6(400));
    assert_eq!(totals[&asset("TRADE1")], 7_500_000 + n6(200));
    assert_eq!(totals[&asset("TRADE2")], n6(35));

    let claim = r.pool.claim_across_chain(trader, 7 * YEAR).unwrap();
    assert_eq!(claim.totals, totals);
}

#[test]
fn e2e_claim_single_asset_across_authorities() {
    let mut r = reference_until_six_years();
    register_all_with_third(&mut r);
    let holder = acct(U2);

    let trade = r.pool.claim_asset(holder, AuthorityId::GENESIS, &asset("TRADE1"), 7 * YEAR).unwrap();
    assert_eq!(trade, vec![AssetAmount::new(asset("TRADE1"), n6(10))]);
    let left = r.pool.reward_of(&holder, AuthorityId::GENESIS, 7 * YEAR).unwrap();
    assert_eq!(left[0].amount, n6(50));
    assert_eq!(left[1].amount, 0);

    let err = r
        .pool
        .claim_asset(holder, r.a2, &asset("TRADE1"), 7 * YEAR)
        .unwrap_err();
    assert!(matches!(err, PoolError::Authority(_)));
}

// ======================================================================
// Reward asset with different decimals
// ======================================================================

#[test]
fn e2e_per_unit_reward_stream() {
    let treasury = acct(0xE1);
    let (mut pool, _op) = open_pool(
        treasury,
        vec![
            StreamSpec::bps(STABLE, 1000),
            StreamSpec::per_unit("TRADE", 1_000_000, 2 * 10u128.pow(16)),
        ],
    );
    fund_treasury(&mut pool, treasury, STABLE, n6(10_000));
    fund_treasury(&mut pool, treasury, "TRADE", n18(10_000));
    let lender = acct(1);
    fund(&mut pool, lender, n6(2000));

    pool.deposit(lender, n6(1000), 0).unwrap();
    let year_one = pool.reward_of(&lender, AuthorityId::GENESIS, YEAR).unwrap();
    assert_eq!(year_one[0].amount, n6(100));
    assert_eq!(year_one[1].amount, n18(20));

    pool.deposit(lender, n6(1000), YEAR).unwrap();
    let paid = pool.claim(lender, AuthorityId::GENESIS, 2 * YEAR).unwrap();
    assert_eq!(
        paid,
        vec![
            AssetAmount::new(asset(STABLE), n6(300)),
            AssetAmount::new(asset("TRADE"), n18(60)),
        ]
    );
    assert_eq!(balance(&pool, lender, "TRADE"), n18(60));
}

// ======================================================================
// Eligibility
// ======================================================================

#[test]
fn e2e_eligibility_threshold() {
    let config = PoolConfig {
        eligibility_threshold: 5_000_000_000,
        ..PoolConfig::default()
    };
    let (mut pool, op) = pool_with(config, AllowListGate::new(), acct(0xE1), vec![StreamSpec::bps(STABLE, 1000)]);
    let lender = acct(1);
    fund(&mut pool, lender, n6(10_000));

    assert_eq!(pool.deposit(lender, n6(5000), 0).unwrap_err(), PoolError::NotEligible(lender));
    assert_eq!(balance(&pool, lender, STABLE), n6(10_000));
    pool.deposit(lender, n6(1000), 0).unwrap();

    pool.gate_mut().allow(lender);
    pool.deposit(lender, n6(5000), 0).unwrap();
    assert_eq!(pool.principal_of(&lender), n6(6000));

    pool.gate_mut().revoke(&lender);
    pool.set_eligibility_threshold(&op, n6(100_000)).unwrap();
    pool.deposit(lender, n6(1000), 0).unwrap();
}

// ======================================================================
// Idle principal and strategy
// ======================================================================

#[test]
fn e2e_strategy_does_not_affect_accrual() {
    let treasury = acct(0xE1);
    let (mut pool, op) = open_pool(treasury, vec![StreamSpec::bps(STABLE, 1000)]);
    fund_treasury(&mut pool, treasury, STABLE, n6(1_000));
    let (alice, bob) = (acct(1), acct(2));
    fund(&mut pool, alice, n6(100));
    fund(&mut pool, bob, n6(100));
    pool.deposit(alice, n6(100), 0).unwrap();
    pool.deposit(bob, n6(100), 0).unwrap();

    pool.switch_strategy(&op, Box::new(IdleStrategy::new("vault-a"))).unwrap();
    assert_eq!(pool.invest_all_idle(&op).unwrap(), n6(200));
    assert_eq!(pool.idle_principal(), 0);

    let moved = pool.switch_strategy(&op, Box::new(IdleStrategy::new("vault-b"))).unwrap();
    assert_eq!(moved.moved, n6(200));
    assert_eq!(pool.strategy_name(), Some("vault-b"));

    pool.withdraw_principal(alice, n6(100), YEAR).unwrap();
    assert_eq!(pool.strategy_balance(), n6(100));
    assert_eq!(pool.total_principal(), n6(100));

    let a = pool.reward_of(&alice, AuthorityId::GENESIS, YEAR).unwrap();
    let b = pool.reward_of(&bob, AuthorityId::GENESIS, YEAR).unwrap();
    assert_eq!(a, b);
    assert_eq!(a[0].amount, n6(10));
}

// ======================================================================
// Chain-wide views are bounded by the account's own registrations
// ======================================================================

#[test]
fn e2e_long_chain_does_not_block_recent_joiners() {
    let config = PoolConfig {
        max_chain_hops: 2,
        ..PoolConfig::default()
    };
    let treasury = acct(0xE1);
    let (mut pool, op) = pool_with(config, AllowListGate::open(), treasury, vec![StreamSpec::bps(STABLE, 1000)]);
    fund_treasury(&mut pool, treasury, STABLE, n6(1_000));
    let (veteran, newcomer) = (acct(1), acct(2));
    fund(&mut pool, veteran, n6(100));
    fund(&mut pool, newcomer, n6(100));
    pool.deposit(veteran, n6(100), 0).unwrap();

    for t in 1..=4 {
        let id = pool.create_authority(&op, treasury, &[StreamSpec::bps(STABLE, 1000)], t).unwrap();
        pool.switch_authority(&op, id, t).unwrap();
        if t <= 2 {
            pool.register(veteran, id, t).unwrap();
        }
    }
    pool.deposit(newcomer, n6(100), 4).unwrap();
    assert_eq!(pool.registry().authorities_of(&newcomer), vec![pool.active().authority]);

    // Four switches exceed the bound, but the newcomer joined only one authority.
    let at = YEAR + 4;
    let view = pool.reward_across_chain(&newcomer, at).unwrap();
    assert_eq!(view[&asset(STABLE)], n6(10));
    let claim = pool.claim_across_chain(newcomer, at).unwrap();
    assert_eq!(claim.total(&asset(STABLE)), n6(10));
    assert_eq!(claim.per_authority.len(), 1);

    // The veteran joined three authorities, one more than the bound allows.
    assert_eq!(
        pool.reward_across_chain(&veteran, at).unwrap_err(),
        PoolError::Chain(ChainError::HopLimitExceeded { max: 2 })
    );
}
