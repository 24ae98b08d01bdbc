//! # lendpool-pool
//!
//! The lending pool: per-account principal, the active reward authority
//! pointer and the switch protocol that retires it, capability-gated
//! operator actions, and in-memory collaborators for tests and simulation.

pub mod capability;
pub mod config;
pub mod error;
pub mod memory;
pub mod pool;
pub mod shared;

pub use capability::{OperatorCap, PoolId, RateScope, RateSetterCap};
pub use crate::config::{LoadError, PoolConfig};
pub use error::{PoolError, ValidationError};
pub use memory::{AllowListGate, IdleStrategy, MemoryAssetLedger};
pub use pool::{ChainClaim, GenesisAuthority, LendingPool, Position, StrategySwitch};
pub use shared::SharedPool;
