//! Capability tokens for privileged pool operations.
//!
//! Holding an [`OperatorCap`] or [`RateSetterCap`] is the authorization.
//! Tokens cannot be constructed outside this crate and are bound to the
//! [`PoolId`] that minted them.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use lendpool_core::types::AuthorityId;

static NEXT_POOL_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a pool instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PoolId(u64);

impl PoolId {
    pub(crate) fn fresh() -> Self {
        Self(NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for PoolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pool#{}", self.0)
    }
}

/// Authorizes authority creation and switching, strategy management,
/// threshold changes and minting of [`RateSetterCap`]s.
#[derive(Debug)]
pub struct OperatorCap {
    pool: PoolId,
}

impl OperatorCap {
    pub(crate) fn new(pool: PoolId) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> PoolId {
        self.pool
    }
}

/// Which authorities a [`RateSetterCap`] may change rates on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateScope {
    AllAuthorities,
    Authority(AuthorityId),
}

impl RateScope {
    pub fn covers(&self, authority: AuthorityId) -> bool {
        match self {
            Self::AllAuthorities => true,
            Self::Authority(id) => *id == authority,
        }
    }
}

/// Authorizes appending rate checkpoints.
#[derive(Debug)]
pub struct RateSetterCap {
    pool: PoolId,
    scope: RateScope,
}

impl RateSetterCap {
    pub(crate) fn new(pool: PoolId, scope: RateScope) -> Self {
        Self { pool, scope }
    }

    pub fn pool(&self) -> PoolId {
        self.pool
    }

    pub fn scope(&self) -> RateScope {
        self.scope
    }
}
