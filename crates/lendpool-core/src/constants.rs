//! Protocol constants. Time is measured in whole seconds.

use crate::types::Amount;

/// Seconds in one day.
pub const SECONDS_PER_DAY: u64 = 86_400;

/// Seconds in one accrual year. Rates are quoted per year of 365 days.
pub const SECONDS_PER_YEAR: u64 = 365 * SECONDS_PER_DAY;

/// Denominator for rates expressed in basis points (10_000 bps = 100% per year).
pub const BPS_PRECISION: u128 = 10_000;

/// Largest accepted basis-point rate (10_000% per year).
pub const MAX_RATE_BPS: u128 = 1_000_000;

/// Maximum number of reward streams a single authority may carry.
pub const MAX_REWARD_STREAMS: usize = 2;

/// Default bound on the number of authorities one chain-wide view or claim visits.
pub const DEFAULT_MAX_CHAIN_HOPS: usize = 64;

/// Default cumulative principal at which the eligibility gate is consulted.
///
/// Zero means every deposit is checked.
pub const DEFAULT_ELIGIBILITY_THRESHOLD: Amount = 0;

/// Decimals of the reference stable principal asset (1 unit = 10^6 base units).
pub const STABLE_DECIMALS: u32 = 6;

/// Decimals of an 18-decimal reward asset.
pub const WIDE_DECIMALS: u32 = 18;
