//! # lendpool-rewards — Reward accrual authorities.
//!
//! All calculations use integer arithmetic only, truncating at every
//! rate sub-interval.
//!
//! This crate implements the accrual side of the pool:
//! - **Reward authorities**: one or two reward streams, each backed by a
//!   [`RateLedger`](lendpool_core::rate::RateLedger), and per-account
//!   principal basis, settlement time and unclaimed balances.
//! - **Registrations**: explicit per-(account, authority) opt-in records with
//!   a per-account index.
//! - **Authority chain**: append-only arena of authorities linked newest to
//!   oldest, with a versioned active pointer and per-link tenure so a
//!   superseded authority stops accruing at the switch.

pub mod authority;
pub mod chain;
pub mod registry;

pub use authority::{AccountState, ClaimPlan, ClaimScope, RewardAuthority, Settlement, StreamSpec, Tenure};
pub use chain::{ActivePointer, AuthorityChain, ChainLink};
pub use registry::{RegisterOutcome, Registration, RegistrationRegistry};
