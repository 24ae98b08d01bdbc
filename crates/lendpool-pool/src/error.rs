//! Pool error types.

use lendpool_core::error::{AuthorityError, ChainError, RateError, StrategyError, TransferError};
use lendpool_core::types::{AccountId, Amount, AuthorityId, Timestamp};
use thiserror::Error;

/// Input rejected before any state is read.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("amount must be non-zero")] ZeroAmount,
    #[error("amount overflow")] AmountOverflow,
    #[error("{0} is not the active authority")] AuthorityNotActive(AuthorityId),
    #[error("invalid config: {0}")] Config(String),
}

/// Errors returned by pool operations. A failed operation leaves the pool unchanged.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    #[error("validation: {0}")]
    Validation(#[from] ValidationError),

    #[error("{0} is not eligible for this deposit")]
    NotEligible(AccountId),

    /// Withdrawal larger than the account's principal.
    #[error("insufficient principal: have {have}, need {need}")]
    InsufficientPrincipal { have: Amount, need: Amount },

    /// The asset ledger refused to pull the deposit.
    #[error("insufficient authorization: {0}")]
    InsufficientAuthorization(TransferError),

    #[error("{account} is not registered with {authority}")]
    NotRegistered { account: AccountId, authority: AuthorityId },

    #[error("nothing to claim for {account}")]
    NothingToClaim { account: AccountId },

    #[error("non-monotonic time: {now} precedes {latest}")]
    NonMonotonicTime { now: Timestamp, latest: Timestamp },

    /// Capability belongs to another pool or does not cover the target.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error(transparent)] Rate(#[from] RateError),
    #[error(transparent)] Chain(#[from] ChainError),
    #[error(transparent)] Transfer(#[from] TransferError),
    #[error(transparent)] Strategy(#[from] StrategyError),
    #[error(transparent)] Authority(AuthorityError),
}

impl From<AuthorityError> for PoolError {
    fn from(err: AuthorityError) -> Self {
        match err {
            AuthorityError::NotRegistered { account, authority } => Self::NotRegistered { account, authority },
            AuthorityError::NothingToClaim { account, .. } => Self::NothingToClaim { account },
            AuthorityError::Rate(e) => Self::Rate(e),
            other => Self::Authority(other),
        }
    }
}
