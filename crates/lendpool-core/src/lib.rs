//! # lendpool-core
//! Foundation types, the per-asset rate ledger and the collaborator
//! traits shared by every Lendpool crate.

pub mod constants;
pub mod error;
pub mod rate;
pub mod traits;
pub mod types;
