//! Shared helpers for the E2E and adversarial tests.

use lendpool_core::constants::SECONDS_PER_YEAR;
use lendpool_core::types::{AccountId, Amount, AssetId, Timestamp};
use lendpool_pool::{AllowListGate, GenesisAuthority, LendingPool, MemoryAssetLedger, OperatorCap, PoolConfig};
use lendpool_rewards::StreamSpec;

pub type TestPool = LendingPool<MemoryAssetLedger, AllowListGate>;

pub const YEAR: Timestamp = SECONDS_PER_YEAR;

/// Symbol of the principal asset used throughout the suite.
pub const STABLE: &str = "STABLE";

/// Account id from a seed byte.
pub fn acct(seed: u8) -> AccountId {
    AccountId::from_seed(seed)
}

pub fn asset(symbol: &str) -> AssetId {
    AssetId::new(symbol)
}

/// Whole units of a 6-decimal asset in base units.
pub fn n6(units: u128) -> Amount {
    units * 1_000_000
}

/// Whole units of an 18-decimal asset in base units.
pub fn n18(units: u128) -> Amount {
    units * 10u128.pow(18)
}

/// Timestamp `halves` half-years after zero.
pub fn half_years(halves: u64) -> Timestamp {
    halves * (YEAR / 2)
}

/// Pool over `STABLE` with an open gate and a genesis authority at `t = 0`.
pub fn open_pool(treasury: AccountId, streams: Vec<StreamSpec>) -> (TestPool, OperatorCap) {
    pool_with(PoolConfig::default(), AllowListGate::open(), treasury, streams)
}

pub fn pool_with(
    config: PoolConfig,
    gate: AllowListGate,
    treasury: AccountId,
    streams: Vec<StreamSpec>,
) -> (TestPool, OperatorCap) {
    let config = PoolConfig {
        principal_asset: asset(STABLE),
        ..config
    };
    let genesis = GenesisAuthority { treasury, streams };
    LendingPool::new(config, MemoryAssetLedger::new(), gate, genesis, 0).unwrap()
}

/// Mint `amount` of principal to `account` and approve the pool's custody for it.
pub fn fund(pool: &mut TestPool, account: AccountId, amount: Amount) {
    let principal = pool.config().principal_asset.clone();
    let custody = pool.config().custody_account;
    let ledger = pool.assets_mut();
    ledger.mint(&principal, &account, amount);
    let allowance = ledger.allowance(&principal, &account, &custody);
    ledger.approve(&principal, &account, &custody, allowance + amount);
}

/// Mint reward assets into a treasury.
pub fn fund_treasury(pool: &mut TestPool, treasury: AccountId, symbol: &str, amount: Amount) {
    pool.assets_mut().mint(&asset(symbol), &treasury, amount);
}

pub fn balance(pool: &TestPool, account: AccountId, symbol: &str) -> Amount {
    use lendpool_core::traits::AssetLedger;
    pool.assets().balance_of(&asset(symbol), &account)
}
