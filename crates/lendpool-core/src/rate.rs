//! Per-asset reward rate ledger.
//!
//! A [`RateLedger`] is an append-only series of `(effective_time, rate)`
//! checkpoints with strictly increasing times. It integrates the resulting
//! piecewise-constant rate over any window:
//!
//! ```text
//! accrued(P, from, to) = Σ  P * rate_i * (min(t_{i+1}, to) - max(t_i, from))
//!                           ─────────────────────────────────────────────────
//!                                        YEAR * denominator
//! ```
//!
//! Each sub-interval is truncated on its own, so the sum over a split window
//! can be at most one base unit per sub-interval below the whole window.
//! All arithmetic is integer-only with checked u128 multiplication.

use serde::{Deserialize, Serialize};

use crate::constants::{BPS_PRECISION, MAX_RATE_BPS, SECONDS_PER_YEAR};
use crate::error::RateError;
use crate::types::{amount_serde, Amount, Timestamp};

/// How a ledger's rate number is interpreted.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RateBasis {
    /// Annual rate in basis points of principal (`2500` = 25% per year).
    /// Reward is paid in the principal's base units.
    #[default]
    Bps,
    /// Reward base units paid per `principal_unit` of principal per year.
    ///
    /// Used when the reward asset has different decimals from the
    /// principal, e.g. `2 * 10^16` (0.02 of an 18-decimal token) per
    /// `10^6` base units of a 6-decimal stable.
    PerUnit {
        #[serde(with = "amount_serde")]
        principal_unit: u128,
    },
}

impl RateBasis {
    /// Divisor applied to `principal * rate` to obtain an annual reward.
    pub fn denominator(&self) -> u128 {
        match self {
            Self::Bps => BPS_PRECISION,
            Self::PerUnit { principal_unit } => *principal_unit,
        }
    }

    /// Largest rate accepted under this basis.
    pub fn max_rate(&self) -> u128 {
        match self {
            Self::Bps => MAX_RATE_BPS,
            Self::PerUnit { .. } => u128::MAX,
        }
    }

    pub fn validate(&self) -> Result<(), RateError> {
        match self {
            Self::PerUnit { principal_unit: 0 } => Err(RateError::ZeroPrincipalUnit),
            _ => Ok(()),
        }
    }

    fn check_rate(&self, rate: u128) -> Result<(), RateError> {
        let max = self.max_rate();
        if rate > max {
            return Err(RateError::MalformedRate { rate, max });
        }
        Ok(())
    }
}

/// A rate that takes effect at `effective_time` and holds until the next one.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct RateCheckpoint {
    pub effective_time: Timestamp,
    pub rate: u128,
}

/// Reward owed on `principal` held for `seconds` at a constant `rate`.
///
/// Truncates toward zero.
pub fn interval_reward(
    principal: Amount,
    rate: u128,
    seconds: u64,
    denominator: u128,
) -> Result<Amount, RateError> {
    if principal == 0 || rate == 0 || seconds == 0 {
        return Ok(0);
    }
    let numerator = principal
        .checked_mul(rate)
        .ok_or(RateError::ArithmeticOverflow)?
        .checked_mul(seconds as u128)
        .ok_or(RateError::ArithmeticOverflow)?;
    let divisor = (SECONDS_PER_YEAR as u128)
        .checked_mul(denominator)
        .ok_or(RateError::ArithmeticOverflow)?;
    Ok(numerator / divisor)
}

/// Append-only, strictly time-ordered rate checkpoints for one reward asset.
///
/// Never empty: construction records the initial rate.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct RateLedger {
    basis: RateBasis,
    checkpoints: Vec<RateCheckpoint>,
}

impl RateLedger {
    /// Create a ledger whose first checkpoint is `initial_rate` at `at`.
    pub fn new(basis: RateBasis, initial_rate: u128, at: Timestamp) -> Result<Self, RateError> {
        basis.validate()?;
        basis.check_rate(initial_rate)?;
        Ok(Self {
            basis,
            checkpoints: vec![RateCheckpoint {
                effective_time: at,
                rate: initial_rate,
            }],
        })
    }

    pub fn basis(&self) -> RateBasis {
        self.basis
    }

    pub fn checkpoints(&self) -> &[RateCheckpoint] {
        &self.checkpoints
    }

    /// The most recent checkpoint.
    pub fn last(&self) -> RateCheckpoint {
        // Non-empty by construction.
        self.checkpoints[self.checkpoints.len() - 1]
    }

    /// Rate in force at `t`, or zero before the first checkpoint.
    pub fn rate_at(&self, t: Timestamp) -> u128 {
        let idx = self.checkpoints.partition_point(|cp| cp.effective_time <= t);
        if idx == 0 {
            0
        } else {
            self.checkpoints[idx - 1].rate
        }
    }

    /// Record `rate` effective from `at`.
    ///
    /// A checkpoint at the same time as the last one replaces its rate, since
    /// the last checkpoint has not covered any interval yet. Earlier times
    /// are rejected and leave the ledger untouched.
    pub fn set_rate(&mut self, rate: u128, at: Timestamp) -> Result<(), RateError> {
        self.basis.check_rate(rate)?;
        let last = self.last();
        if at < last.effective_time {
            return Err(RateError::NonMonotonicTime {
                at,
                last: last.effective_time,
            });
        }
        if at == last.effective_time {
            let idx = self.checkpoints.len() - 1;
            self.checkpoints[idx].rate = rate;
        } else {
            self.checkpoints.push(RateCheckpoint {
                effective_time: at,
                rate,
            });
        }
        Ok(())
    }

    /// Time-weighted reward for `principal` held over `[from, to]`.
    ///
    /// O(log n) to locate the starting checkpoint plus O(k) over the `k`
    /// checkpoints inside the window.
    pub fn accrued(&self, principal: Amount, from: Timestamp, to: Timestamp) -> Result<Amount, RateError> {
        if from > to {
            return Err(RateError::InvalidWindow { from, to });
        }
        if from == to || principal == 0 {
            return Ok(0);
        }

        let denominator = self.basis.denominator();
        let start = self
            .checkpoints
            .partition_point(|cp| cp.effective_time <= from)
            .saturating_sub(1);

        let mut total: Amount = 0;
        for (i, cp) in self.checkpoints.iter().enumerate().skip(start) {
            if cp.effective_time >= to {
                break;
            }
            let seg_start = cp.effective_time.max(from);
            let seg_end = self
                .checkpoints
                .get(i + 1)
                .map_or(to, |next| next.effective_time.min(to));
            if seg_end <= seg_start {
                continue;
            }
            let reward = interval_reward(principal, cp.rate, seg_end - seg_start, denominator)?;
            total = total.checked_add(reward).ok_or(RateError::ArithmeticOverflow)?;
        }
        Ok(total)
    }
}
