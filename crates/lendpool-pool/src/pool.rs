//! Lending pool ledger and authority switch protocol.
//!
//! [`LendingPool`] owns per-account principal, the chain of reward
//! authorities with its active pointer, the registration registry and the
//! collaborators that move value. Every mutating operation follows the same
//! shape:
//!
//! 1. validate inputs and the caller-supplied clock
//! 2. project the accrual changes without mutating anything
//! 3. call collaborators (transfers, strategy)
//! 4. commit the projections, which cannot fail
//!
//! A rejected operation therefore leaves every ledger as it was.

use std::collections::{BTreeMap, HashMap};

use lendpool_core::error::{AuthorityError, StrategyError, TransferError};
use lendpool_core::traits::{AssetLedger, EligibilityGate, YieldStrategy};
use lendpool_core::types::{AccountId, Amount, AssetAmount, AssetId, AuthorityId, Timestamp};
use lendpool_rewards::{
    ActivePointer, AuthorityChain, ChainLink, ClaimPlan, ClaimScope, RegisterOutcome, RegistrationRegistry,
    Settlement, StreamSpec,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::capability::{OperatorCap, PoolId, RateScope, RateSetterCap};
use crate::config::PoolConfig;
use crate::error::{PoolError, ValidationError};

/// Treasury and reward streams of a pool's first authority.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct GenesisAuthority {
    pub treasury: AccountId,
    pub streams: Vec<StreamSpec>,
}

/// Principal held by one account.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct Position {
    pub principal: Amount,
    pub deposited_total: Amount,
    pub withdrawn_total: Amount,
    pub last_change: Timestamp,
}

/// Result of a claim across the authority chain.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct ChainClaim {
    /// Payout per authority, newest first.
    pub per_authority: Vec<(AuthorityId, Vec<AssetAmount>)>,
    /// Payout summed per asset.
    pub totals: BTreeMap<AssetId, Amount>,
}

impl ChainClaim {
    pub fn total(&self, asset: &AssetId) -> Amount {
        self.totals.get(asset).copied().unwrap_or(0)
    }
}

/// Outcome of replacing the yield strategy.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct StrategySwitch {
    /// Amount withdrawn from the outgoing strategy.
    pub moved: Amount,
    /// Amount placed in the incoming strategy.
    pub reinvested: Amount,
}

pub struct LendingPool<L, G> {
    id: PoolId,
    config: PoolConfig,
    eligibility_threshold: Amount,
    positions: HashMap<AccountId, Position>,
    total_principal: Amount,
    idle: Amount,
    chain: AuthorityChain,
    registry: RegistrationRegistry,
    assets: L,
    gate: G,
    strategy: Option<Box<dyn YieldStrategy>>,
    latest: Timestamp,
}

impl<L: AssetLedger, G: EligibilityGate> LendingPool<L, G> {
    /// Create a pool whose genesis authority is active from `now`.
    ///
    /// Returns the pool and its only [`OperatorCap`].
    pub fn new(
        config: PoolConfig,
        assets: L,
        gate: G,
        genesis: GenesisAuthority,
        now: Timestamp,
    ) -> Result<(Self, OperatorCap), PoolError> {
        config.validate()?;
        let chain = AuthorityChain::genesis(genesis.treasury, &genesis.streams, now, config.max_chain_hops)?;
        let id = PoolId::fresh();
        info!(pool = %id, asset = %config.principal_asset, "pool created");
        let pool = Self {
            id,
            eligibility_threshold: config.eligibility_threshold(),
            config,
            positions: HashMap::new(),
            total_principal: 0,
            idle: 0,
            chain,
            registry: RegistrationRegistry::new(),
            assets,
            gate,
            strategy: None,
            latest: now,
        };
        Ok((pool, OperatorCap::new(id)))
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn id(&self) -> PoolId {
        self.id
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    pub fn position(&self, account: &AccountId) -> Option<&Position> {
        self.positions.get(account)
    }

    pub fn principal_of(&self, account: &AccountId) -> Amount {
        self.positions.get(account).map_or(0, |p| p.principal)
    }

    pub fn total_principal(&self) -> Amount {
        self.total_principal
    }

    /// Principal sitting in custody rather than in the strategy.
    pub fn idle_principal(&self) -> Amount {
        self.idle
    }

    pub fn active(&self) -> ActivePointer {
        self.chain.active()
    }

    pub fn chain(&self) -> &AuthorityChain {
        &self.chain
    }

    pub fn registry(&self) -> &RegistrationRegistry {
        &self.registry
    }

    pub fn assets(&self) -> &L {
        &self.assets
    }

    /// Direct access to the asset ledger, e.g. to fund treasuries.
    pub fn assets_mut(&mut self) -> &mut L {
        &mut self.assets
    }

    pub fn gate(&self) -> &G {
        &self.gate
    }

    pub fn gate_mut(&mut self) -> &mut G {
        &mut self.gate
    }

    pub fn eligibility_threshold(&self) -> Amount {
        self.eligibility_threshold
    }

    /// Latest `now` accepted by a mutating operation.
    pub fn latest_time(&self) -> Timestamp {
        self.latest
    }

    pub fn strategy_name(&self) -> Option<&str> {
        self.strategy.as_ref().map(|s| s.name())
    }

    pub fn strategy_balance(&self) -> Amount {
        self.strategy.as_ref().map_or(0, |s| s.balance())
    }

    // ------------------------------------------------------------------
    // Guards
    // ------------------------------------------------------------------

    fn check_time(&self, now: Timestamp) -> Result<(), PoolError> {
        if now < self.latest {
            return Err(PoolError::NonMonotonicTime {
                now,
                latest: self.latest,
            });
        }
        Ok(())
    }

    fn check_operator(&self, cap: &OperatorCap) -> Result<(), PoolError> {
        if cap.pool() != self.id {
            return Err(PoolError::Unauthorized(format!(
                "operator capability of {} used on {}",
                cap.pool(),
                self.id
            )));
        }
        Ok(())
    }

    fn check_rate_setter(&self, cap: &RateSetterCap, authority: AuthorityId) -> Result<(), PoolError> {
        if cap.pool() != self.id {
            return Err(PoolError::Unauthorized(format!(
                "rate setter capability of {} used on {}",
                cap.pool(),
                self.id
            )));
        }
        if !cap.scope().covers(authority) {
            return Err(PoolError::Unauthorized(format!(
                "rate setter capability does not cover {authority}"
            )));
        }
        Ok(())
    }

    /// Settlement of `account` against the active authority re-based onto
    /// `principal`, or `None` when the account is not registered there.
    fn active_settlement(
        &self,
        account: &AccountId,
        principal: Amount,
        now: Timestamp,
    ) -> Result<Option<Settlement>, PoolError> {
        let active = self.chain.active_id();
        if !self.registry.is_registered(account, active) {
            return Ok(None);
        }
        let tenure = self.chain.tenure(active)?;
        let settlement = self
            .chain
            .authority(active)?
            .settlement(account, tenure, now)?
            .with_principal(principal);
        Ok(Some(settlement))
    }

    /// Chain links of the authorities `account` registered with, newest
    /// first. Authorities it never joined are not visited.
    fn joined_links(&self, account: &AccountId) -> Result<Vec<&ChainLink>, PoolError> {
        Ok(self.chain.links_of(&self.registry.authorities_of(account))?)
    }

    // ------------------------------------------------------------------
    // Principal
    // ------------------------------------------------------------------

    /// Deposit `amount` of the principal asset from `account`.
    ///
    /// Settles the account against the active authority at its previous
    /// principal before adding to it.
    pub fn deposit(&mut self, account: AccountId, amount: Amount, now: Timestamp) -> Result<Position, PoolError> {
        self.check_time(now)?;
        if amount == 0 {
            return Err(ValidationError::ZeroAmount.into());
        }
        let mut position = self.positions.get(&account).cloned().unwrap_or_default();
        let principal = position
            .principal
            .checked_add(amount)
            .ok_or(ValidationError::AmountOverflow)?;
        let total = self
            .total_principal
            .checked_add(amount)
            .ok_or(ValidationError::AmountOverflow)?;
        if principal >= self.eligibility_threshold && !self.gate.is_eligible(&account, amount) {
            return Err(PoolError::NotEligible(account));
        }
        let settlement = self.active_settlement(&account, principal, now)?;

        self.assets
            .transfer_in(
                &self.config.principal_asset,
                &account,
                &self.config.custody_account,
                amount,
            )
            .map_err(PoolError::InsufficientAuthorization)?;

        match settlement {
            Some(settlement) => self.chain.commit(settlement),
            None if self.config.auto_register_on_deposit => {
                self.register_on_active(account, principal, now);
            }
            None => {}
        }
        position.principal = principal;
        position.deposited_total = position.deposited_total.saturating_add(amount);
        position.last_change = now;
        self.positions.insert(account, position.clone());
        self.total_principal = total;
        self.idle = self.idle.saturating_add(amount);
        self.latest = now;

        info!(account = %account.short(), amount, principal, "deposit");
        Ok(position)
    }

    /// Return `amount` of principal to `account`.
    ///
    /// Divests the shortfall from the strategy when idle custody cannot
    /// cover the withdrawal.
    pub fn withdraw_principal(
        &mut self,
        account: AccountId,
        amount: Amount,
        now: Timestamp,
    ) -> Result<Position, PoolError> {
        self.check_time(now)?;
        if amount == 0 {
            return Err(ValidationError::ZeroAmount.into());
        }
        let mut position = self.positions.get(&account).cloned().unwrap_or_default();
        if amount > position.principal {
            return Err(PoolError::InsufficientPrincipal {
                have: position.principal,
                need: amount,
            });
        }
        let principal = position.principal - amount;
        let settlement = self.active_settlement(&account, principal, now)?;

        let asset = &self.config.principal_asset;
        let custody = &self.config.custody_account;
        if !self.assets.can_pay(asset, custody, amount) {
            return Err(TransferError::InsufficientBalance {
                account: *custody,
                asset: asset.clone(),
                have: self.assets.balance_of(asset, custody),
                need: amount,
            }
            .into());
        }

        if self.idle < amount {
            let shortfall = amount - self.idle;
            let reachable = self.idle.saturating_add(self.strategy_balance());
            let strategy = match self.strategy.as_mut() {
                Some(strategy) if reachable >= amount => strategy,
                _ => {
                    return Err(StrategyError::InsufficientIdle {
                        have: reachable,
                        need: amount,
                    }
                    .into());
                }
            };
            let released = strategy.divest(shortfall)?;
            // A strategy that releases less than asked still moved funds into custody.
            self.idle = self.idle.saturating_add(released);
            debug!(shortfall, released, strategy = strategy.name(), "divested for withdrawal");
            if self.idle < amount {
                return Err(StrategyError::InsufficientIdle {
                    have: self.idle,
                    need: amount,
                }
                .into());
            }
        }

        self.assets.transfer_out(
            &self.config.principal_asset,
            &self.config.custody_account,
            &account,
            amount,
        )?;

        if let Some(settlement) = settlement {
            self.chain.commit(settlement);
        }
        position.principal = principal;
        position.withdrawn_total = position.withdrawn_total.saturating_add(amount);
        position.last_change = now;
        self.positions.insert(account, position.clone());
        self.total_principal -= amount;
        self.idle -= amount;
        self.latest = now;

        info!(account = %account.short(), amount, principal, "withdraw");
        Ok(position)
    }

    // ------------------------------------------------------------------
    // Registration
    // ------------------------------------------------------------------

    fn register_on_active(&mut self, account: AccountId, principal: Amount, now: Timestamp) -> RegisterOutcome {
        let active = self.chain.active_id();
        let outcome = self.registry.register(account, active, principal, now);
        if outcome.created() {
            self.chain.open_on_active(&account, principal, now);
        }
        outcome
    }

    /// Register `account` with `authority`, which must be the active one.
    ///
    /// Registering twice is a no-op.
    pub fn register(
        &mut self,
        account: AccountId,
        authority: AuthorityId,
        now: Timestamp,
    ) -> Result<RegisterOutcome, PoolError> {
        self.check_time(now)?;
        self.chain.link(authority)?;
        if authority != self.chain.active_id() {
            return Err(ValidationError::AuthorityNotActive(authority).into());
        }
        let principal = self.principal_of(&account);
        let outcome = self.register_on_active(account, principal, now);
        self.latest = now;
        Ok(outcome)
    }

    // ------------------------------------------------------------------
    // Claims
    // ------------------------------------------------------------------

    /// Pay every `(treasury, payout)` pair to `to`, or nothing at all.
    fn pay(&mut self, debits: &[(AccountId, &[AssetAmount])], to: &AccountId) -> Result<(), PoolError> {
        let mut needed: BTreeMap<(AccountId, AssetId), Amount> = BTreeMap::new();
        for (treasury, payout) in debits {
            for reward in payout.iter() {
                let entry = needed.entry((*treasury, reward.asset.clone())).or_default();
                *entry = entry.checked_add(reward.amount).ok_or(TransferError::Overflow)?;
            }
        }
        for ((treasury, asset), need) in &needed {
            if !self.assets.can_pay(asset, treasury, *need) {
                let have = self.assets.balance_of(asset, treasury);
                warn!(treasury = %treasury.short(), %asset, have, need, "treasury cannot cover claim");
                return Err(TransferError::InsufficientBalance {
                    account: *treasury,
                    asset: asset.clone(),
                    have,
                    need: *need,
                }
                .into());
            }
        }
        for (treasury, payout) in debits {
            for reward in payout.iter() {
                self.assets.transfer_out(&reward.asset, treasury, to, reward.amount)?;
            }
        }
        Ok(())
    }

    fn claim_scoped(
        &mut self,
        account: AccountId,
        authority: AuthorityId,
        now: Timestamp,
        scope: ClaimScope<'_>,
    ) -> Result<Vec<AssetAmount>, PoolError> {
        self.check_time(now)?;
        let tenure = self.chain.tenure(authority)?;
        let auth = self.chain.authority(authority)?;
        let plan = auth.claim_plan(&account, tenure, now, scope)?;
        let treasury = *auth.treasury();

        self.pay(&[(treasury, plan.payout())], &account)?;

        let payout = self.chain.commit_claim(plan);
        self.latest = now;
        info!(account = %account.short(), %authority, rewards = payout.len(), "claim");
        Ok(payout)
    }

    /// Settle `account` at `authority` and pay out every stream.
    pub fn claim(
        &mut self,
        account: AccountId,
        authority: AuthorityId,
        now: Timestamp,
    ) -> Result<Vec<AssetAmount>, PoolError> {
        self.claim_scoped(account, authority, now, ClaimScope::All)
    }

    /// Settle `account` at `authority` and pay out the stream of `asset` only.
    pub fn claim_asset(
        &mut self,
        account: AccountId,
        authority: AuthorityId,
        asset: &AssetId,
        now: Timestamp,
    ) -> Result<Vec<AssetAmount>, PoolError> {
        self.claim_scoped(account, authority, now, ClaimScope::Asset(asset))
    }

    /// Claim from every authority `account` is registered with, newest
    /// first. Requires registration with the active authority.
    pub fn claim_across_chain(&mut self, account: AccountId, now: Timestamp) -> Result<ChainClaim, PoolError> {
        self.check_time(now)?;
        let active = self.chain.active_id();
        if !self.registry.is_registered(&account, active) {
            return Err(PoolError::NotRegistered {
                account,
                authority: active,
            });
        }

        let mut plans: Vec<(AccountId, ClaimPlan)> = Vec::new();
        for link in self.joined_links(&account)? {
            let authority = link.authority();
            match authority.claim_plan(&account, link.tenure(), now, ClaimScope::All) {
                Ok(plan) => plans.push((*authority.treasury(), plan)),
                Err(AuthorityError::NothingToClaim { .. }) => {}
                Err(e) => return Err(e.into()),
            }
        }
        if plans.is_empty() {
            return Err(PoolError::NothingToClaim { account });
        }

        let debits: Vec<(AccountId, &[AssetAmount])> =
            plans.iter().map(|(treasury, plan)| (*treasury, plan.payout())).collect();
        self.pay(&debits, &account)?;

        let mut claim = ChainClaim::default();
        for (_, plan) in plans {
            let authority = plan.authority();
            let payout = self.chain.commit_claim(plan);
            for reward in &payout {
                let total = claim.totals.entry(reward.asset.clone()).or_default();
                *total = total.saturating_add(reward.amount);
            }
            claim.per_authority.push((authority, payout));
        }
        self.latest = now;
        info!(account = %account.short(), authorities = claim.per_authority.len(), "claim across chain");
        Ok(claim)
    }

    // ------------------------------------------------------------------
    // Views
    // ------------------------------------------------------------------

    /// What `claim(account, authority, now)` would pay. Does not mutate.
    pub fn reward_of(
        &self,
        account: &AccountId,
        authority: AuthorityId,
        now: Timestamp,
    ) -> Result<Vec<AssetAmount>, PoolError> {
        self.check_time(now)?;
        let tenure = self.chain.tenure(authority)?;
        Ok(self.chain.authority(authority)?.reward_of(account, tenure, now)?)
    }

    /// Reward owed to `account` summed per asset over every authority it
    /// is registered with.
    pub fn reward_across_chain(
        &self,
        account: &AccountId,
        now: Timestamp,
    ) -> Result<BTreeMap<AssetId, Amount>, PoolError> {
        self.check_time(now)?;
        let mut totals: BTreeMap<AssetId, Amount> = BTreeMap::new();
        for link in self.joined_links(account)? {
            for reward in link.authority().reward_of(account, link.tenure(), now)? {
                let total = totals.entry(reward.asset).or_default();
                *total = total.saturating_add(reward.amount);
            }
        }
        Ok(totals)
    }

    // ------------------------------------------------------------------
    // Operator
    // ------------------------------------------------------------------

    /// Mint a rate setter capability for `scope`.
    pub fn grant_rate_setter(&self, op: &OperatorCap, scope: RateScope) -> Result<RateSetterCap, PoolError> {
        self.check_operator(op)?;
        if let RateScope::Authority(id) = scope {
            self.chain.link(id)?;
        }
        Ok(RateSetterCap::new(self.id, scope))
    }

    /// Change the rate of `asset` at `authority` from `now` on.
    pub fn set_rate(
        &mut self,
        cap: &RateSetterCap,
        authority: AuthorityId,
        asset: &AssetId,
        rate: u128,
        now: Timestamp,
    ) -> Result<(), PoolError> {
        self.check_rate_setter(cap, authority)?;
        self.check_time(now)?;
        let (auth, _) = self.chain.authority_mut(authority)?;
        auth.set_rate(asset, rate, now)?;
        self.latest = now;
        info!(%authority, %asset, rate, at = now, "rate set");
        Ok(())
    }

    /// Append a pending successor to the authority chain.
    pub fn create_authority(
        &mut self,
        op: &OperatorCap,
        treasury: AccountId,
        streams: &[StreamSpec],
        now: Timestamp,
    ) -> Result<AuthorityId, PoolError> {
        self.check_operator(op)?;
        self.check_time(now)?;
        let id = self.chain.append(treasury, streams, now)?;
        self.latest = now;
        Ok(id)
    }

    /// Make `new` the active authority. O(1): no account is visited.
    pub fn switch_authority(
        &mut self,
        op: &OperatorCap,
        new: AuthorityId,
        now: Timestamp,
    ) -> Result<ActivePointer, PoolError> {
        self.check_operator(op)?;
        self.check_time(now)?;
        let pointer = self.chain.activate(new, now)?;
        self.latest = now;
        Ok(pointer)
    }

    pub fn set_eligibility_threshold(&mut self, op: &OperatorCap, threshold: Amount) -> Result<(), PoolError> {
        self.check_operator(op)?;
        info!(from = self.eligibility_threshold, to = threshold, "eligibility threshold updated");
        self.eligibility_threshold = threshold;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Strategy
    // ------------------------------------------------------------------

    fn strategy_mut(&mut self) -> Result<&mut Box<dyn YieldStrategy>, PoolError> {
        self.strategy.as_mut().ok_or_else(|| StrategyError::NoStrategy.into())
    }

    /// Move `amount` of idle principal into the strategy.
    pub fn invest_idle(&mut self, op: &OperatorCap, amount: Amount) -> Result<(), PoolError> {
        self.check_operator(op)?;
        if amount == 0 {
            return Err(ValidationError::ZeroAmount.into());
        }
        let idle = self.idle;
        if amount > idle {
            return Err(StrategyError::InsufficientIdle { have: idle, need: amount }.into());
        }
        self.strategy_mut()?.invest(amount)?;
        self.idle -= amount;
        debug!(amount, idle = self.idle, "invested idle principal");
        Ok(())
    }

    /// Move all idle principal into the strategy. Returns the amount moved.
    pub fn invest_all_idle(&mut self, op: &OperatorCap) -> Result<Amount, PoolError> {
        let idle = self.idle;
        if idle == 0 {
            self.check_operator(op)?;
            return Ok(0);
        }
        self.invest_idle(op, idle)?;
        Ok(idle)
    }

    /// Withdraw `amount` from the strategy into custody. Returns the amount released.
    pub fn divest(&mut self, op: &OperatorCap, amount: Amount) -> Result<Amount, PoolError> {
        self.check_operator(op)?;
        if amount == 0 {
            return Err(ValidationError::ZeroAmount.into());
        }
        let released = self.strategy_mut()?.divest(amount)?;
        self.idle = self.idle.saturating_add(released);
        debug!(amount, released, idle = self.idle, "divested");
        Ok(released)
    }

    /// Withdraw everything from the strategy. Returns the amount released.
    pub fn divest_all(&mut self, op: &OperatorCap) -> Result<Amount, PoolError> {
        self.check_operator(op)?;
        let released = self.strategy_mut()?.divest_all()?;
        self.idle = self.idle.saturating_add(released);
        Ok(released)
    }

    /// Replace the yield strategy, moving everything the old one holds
    /// into the new one.
    ///
    /// If the new strategy refuses the funds they stay idle in custody and
    /// the new strategy is still installed.
    pub fn switch_strategy(
        &mut self,
        op: &OperatorCap,
        mut next: Box<dyn YieldStrategy>,
    ) -> Result<StrategySwitch, PoolError> {
        self.check_operator(op)?;
        let moved = match self.strategy.as_mut() {
            Some(current) => current.divest_all()?,
            None => 0,
        };
        let reinvested = if moved > 0 {
            match next.invest(moved) {
                Ok(()) => moved,
                Err(e) => {
                    warn!(strategy = next.name(), moved, "new strategy refused funds: {e}");
                    self.idle = self.idle.saturating_add(moved);
                    0
                }
            }
        } else {
            0
        };
        info!(
            from = self.strategy_name().unwrap_or("none"),
            to = next.name(),
            moved,
            "strategy switched"
        );
        self.strategy = Some(next);
        Ok(StrategySwitch { moved, reinvested })
    }
}
