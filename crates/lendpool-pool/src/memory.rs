//! In-memory collaborators for tests and the simulator.
//!
//! - [`MemoryAssetLedger`] — balances and allowances in hash maps
//! - [`AllowListGate`] — eligibility by explicit allow list
//! - [`IdleStrategy`] — a strategy that simply holds what it is given

use std::collections::{HashMap, HashSet};

use lendpool_core::error::{StrategyError, TransferError};
use lendpool_core::traits::{AssetLedger, EligibilityGate, YieldStrategy};
use lendpool_core::types::{AccountId, Amount, AssetId};

/// Fungible balances with owner → spender allowances.
#[derive(Debug, Clone, Default)]
pub struct MemoryAssetLedger {
    balances: HashMap<(AssetId, AccountId), Amount>,
    allowances: HashMap<(AssetId, AccountId, AccountId), Amount>,
}

impl MemoryAssetLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit `amount` of `asset` to `account` out of thin air.
    pub fn mint(&mut self, asset: &AssetId, account: &AccountId, amount: Amount) {
        *self.balances.entry((asset.clone(), *account)).or_default() += amount;
    }

    /// Allow `spender` to pull up to `amount` of `owner`'s `asset`.
    pub fn approve(&mut self, asset: &AssetId, owner: &AccountId, spender: &AccountId, amount: Amount) {
        self.allowances.insert((asset.clone(), *owner, *spender), amount);
    }

    pub fn allowance(&self, asset: &AssetId, owner: &AccountId, spender: &AccountId) -> Amount {
        self.allowances
            .get(&(asset.clone(), *owner, *spender))
            .copied()
            .unwrap_or(0)
    }

    fn move_balance(
        &mut self,
        asset: &AssetId,
        from: &AccountId,
        to: &AccountId,
        amount: Amount,
    ) -> Result<(), TransferError> {
        let have = self.balance_of(asset, from);
        if have < amount {
            return Err(TransferError::InsufficientBalance {
                account: *from,
                asset: asset.clone(),
                have,
                need: amount,
            });
        }
        if from == to {
            return Ok(());
        }
        let credited = self
            .balance_of(asset, to)
            .checked_add(amount)
            .ok_or(TransferError::Overflow)?;
        self.balances.insert((asset.clone(), *from), have - amount);
        self.balances.insert((asset.clone(), *to), credited);
        Ok(())
    }
}

impl AssetLedger for MemoryAssetLedger {
    fn transfer_in(
        &mut self,
        asset: &AssetId,
        from: &AccountId,
        custody: &AccountId,
        amount: Amount,
    ) -> Result<(), TransferError> {
        let allowed = self.allowance(asset, from, custody);
        if allowed < amount {
            return Err(TransferError::InsufficientAllowance {
                owner: *from,
                asset: asset.clone(),
                have: allowed,
                need: amount,
            });
        }
        self.move_balance(asset, from, custody, amount)?;
        self.allowances
            .insert((asset.clone(), *from, *custody), allowed - amount);
        Ok(())
    }

    fn transfer_out(
        &mut self,
        asset: &AssetId,
        from: &AccountId,
        to: &AccountId,
        amount: Amount,
    ) -> Result<(), TransferError> {
        self.move_balance(asset, from, to, amount)
    }

    fn balance_of(&self, asset: &AssetId, account: &AccountId) -> Amount {
        self.balances
            .get(&(asset.clone(), *account))
            .copied()
            .unwrap_or(0)
    }
}

/// Eligibility by allow list, or everyone when open.
#[derive(Debug, Clone, Default)]
pub struct AllowListGate {
    allowed: HashSet<AccountId>,
    open: bool,
}

impl AllowListGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// A gate that approves every account.
    pub fn open() -> Self {
        Self {
            allowed: HashSet::new(),
            open: true,
        }
    }

    pub fn allow(&mut self, account: AccountId) {
        self.allowed.insert(account);
    }

    pub fn revoke(&mut self, account: &AccountId) {
        self.allowed.remove(account);
    }
}

impl EligibilityGate for AllowListGate {
    fn is_eligible(&self, account: &AccountId, _requested: Amount) -> bool {
        self.open || self.allowed.contains(account)
    }
}

/// A strategy that holds principal without yield. `add_yield` simulates gains.
#[derive(Debug, Clone)]
pub struct IdleStrategy {
    name: String,
    held: Amount,
}

impl IdleStrategy {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            held: 0,
        }
    }

    pub fn add_yield(&mut self, amount: Amount) {
        self.held = self.held.saturating_add(amount);
    }
}

impl YieldStrategy for IdleStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    fn invest(&mut self, amount: Amount) -> Result<(), StrategyError> {
        self.held = self
            .held
            .checked_add(amount)
            .ok_or_else(|| StrategyError::Unavailable("strategy balance overflow".into()))?;
        Ok(())
    }

    fn divest(&mut self, amount: Amount) -> Result<Amount, StrategyError> {
        if amount > self.held {
            return Err(StrategyError::InsufficientBalance {
                have: self.held,
                need: amount,
            });
        }
        self.held -= amount;
        Ok(amount)
    }

    fn balance(&self) -> Amount {
        self.held
    }
}
