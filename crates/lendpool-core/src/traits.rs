//! Collaborator interfaces for the Lendpool engine.
//!
//! The engine never custodies value itself. These traits define the
//! contracts it relies on:
//! - [`AssetLedger`] — moves and reports balances of fungible assets
//! - [`EligibilityGate`] — decides whether an account may hold more principal
//! - [`YieldStrategy`] — external yield source idle principal can be parked in
//!
//! In-memory implementations live in `lendpool-pool::memory`.

use crate::error::{StrategyError, TransferError};
use crate::types::{AccountId, Amount, AssetId};

/// Custody of fungible assets.
pub trait AssetLedger: Send + Sync {
    /// Pull `amount` of `asset` from `from` into `custody`.
    ///
    /// Fails unless `from` has approved `custody` for at least `amount` and
    /// holds that much.
    fn transfer_in(
        &mut self,
        asset: &AssetId,
        from: &AccountId,
        custody: &AccountId,
        amount: Amount,
    ) -> Result<(), TransferError>;

    /// Push `amount` of `asset` from `from` (custody or a treasury) to `to`.
    fn transfer_out(
        &mut self,
        asset: &AssetId,
        from: &AccountId,
        to: &AccountId,
        amount: Amount,
    ) -> Result<(), TransferError>;

    /// Current balance of `account` in `asset`.
    fn balance_of(&self, asset: &AssetId, account: &AccountId) -> Amount;

    /// Whether `account` holds at least `amount` of `asset`.
    ///
    /// Default implementation delegates to [`balance_of`](Self::balance_of).
    fn can_pay(&self, asset: &AssetId, account: &AccountId, amount: Amount) -> bool {
        self.balance_of(asset, account) >= amount
    }
}

/// Identity or eligibility check consulted before large deposits.
pub trait EligibilityGate: Send + Sync {
    /// Whether `account` may add `requested` to its principal.
    fn is_eligible(&self, account: &AccountId, requested: Amount) -> bool;
}

/// External yield source holding part of the pool's principal.
pub trait YieldStrategy: Send + Sync {
    /// Human readable name used in logs.
    fn name(&self) -> &str;

    /// Move `amount` of idle principal into the strategy.
    fn invest(&mut self, amount: Amount) -> Result<(), StrategyError>;

    /// Withdraw `amount` from the strategy. Returns the amount released.
    fn divest(&mut self, amount: Amount) -> Result<Amount, StrategyError>;

    /// Principal currently held by the strategy.
    fn balance(&self) -> Amount;

    /// Withdraw everything. Returns the amount released.
    fn divest_all(&mut self) -> Result<Amount, StrategyError> {
        let all = self.balance();
        if all == 0 {
            return Ok(0);
        }
        self.divest(all)
    }
}
