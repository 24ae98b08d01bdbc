//! Thread-safe handle to a [`LendingPool`].
//!
//! Every operation takes the lock once, so each call is serialized with
//! respect to every other mutation of the same pool. Views take a read lock.

use std::collections::BTreeMap;
use std::sync::Arc;

use lendpool_core::traits::{AssetLedger, EligibilityGate};
use lendpool_core::types::{AccountId, Amount, AssetAmount, AssetId, AuthorityId, Timestamp};
use lendpool_rewards::{ActivePointer, RegisterOutcome};
use parking_lot::RwLock;

use crate::error::PoolError;
use crate::pool::{ChainClaim, LendingPool, Position};

pub struct SharedPool<L, G> {
    inner: Arc<RwLock<LendingPool<L, G>>>,
}

impl<L, G> Clone for SharedPool<L, G> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<L: AssetLedger, G: EligibilityGate> SharedPool<L, G> {
    pub fn new(pool: LendingPool<L, G>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(pool)),
        }
    }

    /// Run `f` with shared access to the pool.
    pub fn read<R>(&self, f: impl FnOnce(&LendingPool<L, G>) -> R) -> R {
        f(&self.inner.read())
    }

    /// Run `f` with exclusive access, e.g. for operator actions.
    pub fn write<R>(&self, f: impl FnOnce(&mut LendingPool<L, G>) -> R) -> R {
        f(&mut self.inner.write())
    }

    pub fn deposit(&self, account: AccountId, amount: Amount, now: Timestamp) -> Result<Position, PoolError> {
        self.inner.write().deposit(account, amount, now)
    }

    pub fn withdraw_principal(&self, account: AccountId, amount: Amount, now: Timestamp) -> Result<Position, PoolError> {
        self.inner.write().withdraw_principal(account, amount, now)
    }

    pub fn register(&self, account: AccountId, authority: AuthorityId, now: Timestamp) -> Result<RegisterOutcome, PoolError> {
        self.inner.write().register(account, authority, now)
    }

    pub fn claim(&self, account: AccountId, authority: AuthorityId, now: Timestamp) -> Result<Vec<AssetAmount>, PoolError> {
        self.inner.write().claim(account, authority, now)
    }

    pub fn claim_across_chain(&self, account: AccountId, now: Timestamp) -> Result<ChainClaim, PoolError> {
        self.inner.write().claim_across_chain(account, now)
    }

    pub fn reward_of(&self, account: &AccountId, authority: AuthorityId, now: Timestamp) -> Result<Vec<AssetAmount>, PoolError> {
        self.inner.read().reward_of(account, authority, now)
    }

    pub fn reward_across_chain(&self, account: &AccountId, now: Timestamp) -> Result<BTreeMap<AssetId, Amount>, PoolError> {
        self.inner.read().reward_across_chain(account, now)
    }

    pub fn principal_of(&self, account: &AccountId) -> Amount {
        self.inner.read().principal_of(account)
    }

    pub fn total_principal(&self) -> Amount {
        self.inner.read().total_principal()
    }

    pub fn active(&self) -> ActivePointer {
        self.inner.read().active()
    }
}
