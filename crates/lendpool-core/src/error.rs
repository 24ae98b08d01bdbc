//! Error types for the Lendpool engine.
use thiserror::Error;

use crate::types::{AccountId, Amount, AssetId, AuthorityId, Timestamp};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdError {
    #[error("invalid hex: {0}")] InvalidHex(String),
    #[error("invalid account id length: {0} bytes, expected 32")] InvalidLength(usize),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RateError {
    #[error("non-monotonic time: {at} precedes last checkpoint {last}")] NonMonotonicTime { at: Timestamp, last: Timestamp },
    #[error("invalid window: from {from} > to {to}")] InvalidWindow { from: Timestamp, to: Timestamp },
    #[error("malformed rate: {rate} > {max}")] MalformedRate { rate: u128, max: u128 },
    #[error("malformed rate basis: zero principal unit")] ZeroPrincipalUnit,
    #[error("arithmetic overflow")] ArithmeticOverflow,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthorityError {
    #[error("{account} is not registered with {authority}")] NotRegistered { account: AccountId, authority: AuthorityId },
    #[error("nothing to claim for {account} at {authority}")] NothingToClaim { account: AccountId, authority: AuthorityId },
    #[error("unknown asset {asset} at {authority}")] UnknownAsset { authority: AuthorityId, asset: AssetId },
    #[error("authority needs at least one reward stream")] NoStreams,
    #[error("too many reward streams: {count} > {max}")] TooManyStreams { count: usize, max: usize },
    #[error("duplicate reward asset: {0}")] DuplicateAsset(AssetId),
    #[error("non-monotonic time: {now} precedes last settlement {last_settled}")] NonMonotonicTime { now: Timestamp, last_settled: Timestamp },
    #[error("rate: {0}")] Rate(#[from] RateError),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChainError {
    #[error("unknown authority: {0}")] UnknownAuthority(AuthorityId),
    #[error("{candidate} is not the successor of active {active}")] NotSuccessor { candidate: AuthorityId, active: AuthorityId },
    #[error("pending successor already exists: {0}")] PendingSuccessor(AuthorityId),
    #[error("more than {max} authorities to visit")] HopLimitExceeded { max: usize },
    #[error("authority already active: {0}")] AlreadyActive(AuthorityId),
    #[error("switch time {now} precedes activation {activated_at} of active authority")] SwitchBeforeActivation { now: Timestamp, activated_at: Timestamp },
    #[error(transparent)] Authority(#[from] AuthorityError),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransferError {
    #[error("insufficient {asset} balance for {account}: have {have}, need {need}")] InsufficientBalance { account: AccountId, asset: AssetId, have: Amount, need: Amount },
    #[error("insufficient {asset} allowance from {owner}: have {have}, need {need}")] InsufficientAllowance { owner: AccountId, asset: AssetId, have: Amount, need: Amount },
    #[error("balance overflow")] Overflow,
    #[error("transfer rejected: {0}")] Rejected(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StrategyError {
    #[error("balance less than requested: have {have}, need {need}")] InsufficientBalance { have: Amount, need: Amount },
    #[error("insufficient idle principal: have {have}, need {need}")] InsufficientIdle { have: Amount, need: Amount },
    #[error("no strategy installed")] NoStrategy,
    #[error("strategy unavailable: {0}")] Unavailable(String),
}
