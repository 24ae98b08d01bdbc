//! Reward authority: per-account accrual against one or two rate ledgers.
//!
//! Every mutation is split into a pure projection and a commit. The pool
//! projects a [`Settlement`] or [`ClaimPlan`], performs any collaborator
//! calls, and only then commits, so a failed transfer leaves the authority
//! untouched.

use std::collections::HashMap;

use lendpool_core::constants::MAX_REWARD_STREAMS;
use lendpool_core::error::{AuthorityError, RateError};
use lendpool_core::rate::{RateBasis, RateLedger};
use lendpool_core::types::{amount_serde, AccountId, Amount, AssetAmount, AssetId, AuthorityId, Timestamp};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Declaration of one reward stream of a new authority.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct StreamSpec {
    pub asset: AssetId,
    #[serde(default)]
    pub basis: RateBasis,
    #[serde(with = "amount_serde")]
    pub initial_rate: u128,
}

impl StreamSpec {
    /// A stream paying `rate_bps` basis points of principal per year.
    pub fn bps(asset: impl Into<AssetId>, rate_bps: u128) -> Self {
        Self {
            asset: asset.into(),
            basis: RateBasis::Bps,
            initial_rate: rate_bps,
        }
    }

    /// A stream paying `rate` reward base units per `principal_unit` per year.
    pub fn per_unit(asset: impl Into<AssetId>, principal_unit: u128, rate: u128) -> Self {
        Self {
            asset: asset.into(),
            basis: RateBasis::PerUnit { principal_unit },
            initial_rate: rate,
        }
    }
}

/// The span during which an authority accrues.
///
/// Pending authorities have no activation; the active one has no retirement.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Tenure {
    pub activated_at: Option<Timestamp>,
    pub retired_at: Option<Timestamp>,
}

impl Tenure {
    /// Tenure of an authority created but not yet switched to.
    pub const PENDING: Self = Self {
        activated_at: None,
        retired_at: None,
    };

    pub fn since(activated_at: Timestamp) -> Self {
        Self {
            activated_at: Some(activated_at),
            retired_at: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.activated_at.is_some() && self.retired_at.is_none()
    }

    /// Intersect `[from, to]` with this tenure. `None` when nothing overlaps.
    pub fn clamp(&self, from: Timestamp, to: Timestamp) -> Option<(Timestamp, Timestamp)> {
        let start = from.max(self.activated_at?);
        let end = self.retired_at.map_or(to, |retired| retired.min(to));
        (start < end).then_some((start, end))
    }
}

/// Per-account accrual record held by an authority.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct AccountState {
    /// Principal accruing under this authority since `last_settled`.
    pub principal: Amount,
    pub last_settled: Timestamp,
    /// Unclaimed reward per stream, in stream order.
    pub unclaimed: Vec<Amount>,
}

/// A projected settlement of one account, applied with [`RewardAuthority::commit`].
#[derive(Clone, Debug, PartialEq, Eq)]
#[must_use]
pub struct Settlement {
    authority: AuthorityId,
    account: AccountId,
    state: AccountState,
    credited: Vec<Amount>,
}

impl Settlement {
    pub fn authority(&self) -> AuthorityId {
        self.authority
    }

    pub fn account(&self) -> &AccountId {
        &self.account
    }

    /// Account state after the settlement.
    pub fn state(&self) -> &AccountState {
        &self.state
    }

    /// Reward credited by this settlement, per stream.
    pub fn credited(&self) -> &[Amount] {
        &self.credited
    }

    /// Re-base the settled account onto a new principal.
    pub fn with_principal(mut self, principal: Amount) -> Self {
        self.state.principal = principal;
        self
    }
}

/// Which streams a claim drains.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClaimScope<'a> {
    All,
    Asset(&'a AssetId),
}

/// A projected claim: the settlement with drained streams and the payout.
#[derive(Clone, Debug, PartialEq, Eq)]
#[must_use]
pub struct ClaimPlan {
    settlement: Settlement,
    payout: Vec<AssetAmount>,
}

impl ClaimPlan {
    pub fn authority(&self) -> AuthorityId {
        self.settlement.authority
    }

    /// Non-zero amounts to pay, in stream order.
    pub fn payout(&self) -> &[AssetAmount] {
        &self.payout
    }
}

/// An accounting authority for reward accrual.
///
/// Identity, predecessor, treasury and stream assets are fixed at
/// construction. Rates may change over time through each stream's ledger.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct RewardAuthority {
    id: AuthorityId,
    predecessor: Option<AuthorityId>,
    treasury: AccountId,
    created_at: Timestamp,
    streams: Vec<(AssetId, RateLedger)>,
    accounts: HashMap<AccountId, AccountState>,
}

impl RewardAuthority {
    /// Create an authority with 1..=[`MAX_REWARD_STREAMS`] distinct reward assets.
    pub fn new(
        id: AuthorityId,
        predecessor: Option<AuthorityId>,
        treasury: AccountId,
        specs: &[StreamSpec],
        created_at: Timestamp,
    ) -> Result<Self, AuthorityError> {
        if specs.is_empty() {
            return Err(AuthorityError::NoStreams);
        }
        if specs.len() > MAX_REWARD_STREAMS {
            return Err(AuthorityError::TooManyStreams {
                count: specs.len(),
                max: MAX_REWARD_STREAMS,
            });
        }
        let mut streams: Vec<(AssetId, RateLedger)> = Vec::with_capacity(specs.len());
        for spec in specs {
            if streams.iter().any(|(asset, _)| *asset == spec.asset) {
                return Err(AuthorityError::DuplicateAsset(spec.asset.clone()));
            }
            let ledger = RateLedger::new(spec.basis, spec.initial_rate, created_at)?;
            streams.push((spec.asset.clone(), ledger));
        }
        Ok(Self {
            id,
            predecessor,
            treasury,
            created_at,
            streams,
            accounts: HashMap::new(),
        })
    }

    pub fn id(&self) -> AuthorityId {
        self.id
    }

    pub fn predecessor(&self) -> Option<AuthorityId> {
        self.predecessor
    }

    /// Account rewards are paid from.
    pub fn treasury(&self) -> &AccountId {
        &self.treasury
    }

    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    /// Reward assets in stream order.
    pub fn assets(&self) -> impl Iterator<Item = &AssetId> {
        self.streams.iter().map(|(asset, _)| asset)
    }

    pub fn ledger(&self, asset: &AssetId) -> Result<&RateLedger, AuthorityError> {
        let idx = self.stream_index(asset)?;
        Ok(&self.streams[idx].1)
    }

    fn stream_index(&self, asset: &AssetId) -> Result<usize, AuthorityError> {
        self.streams
            .iter()
            .position(|(a, _)| a == asset)
            .ok_or_else(|| AuthorityError::UnknownAsset {
                authority: self.id,
                asset: asset.clone(),
            })
    }

    /// Append a rate checkpoint to the stream paying `asset`.
    pub fn set_rate(&mut self, asset: &AssetId, rate: u128, at: Timestamp) -> Result<(), AuthorityError> {
        let idx = self.stream_index(asset)?;
        self.streams[idx].1.set_rate(rate, at)?;
        debug!(authority = %self.id, %asset, rate, at, "rate checkpoint recorded");
        Ok(())
    }

    /// Start tracking `account` with `principal` from `at`.
    ///
    /// Returns `false` and changes nothing if the account is already tracked.
    pub fn open_account(&mut self, account: &AccountId, principal: Amount, at: Timestamp) -> bool {
        if self.accounts.contains_key(account) {
            return false;
        }
        self.accounts.insert(
            *account,
            AccountState {
                principal,
                last_settled: at,
                unclaimed: vec![0; self.streams.len()],
            },
        );
        true
    }

    pub fn is_open(&self, account: &AccountId) -> bool {
        self.accounts.contains_key(account)
    }

    pub fn account(&self, account: &AccountId) -> Option<&AccountState> {
        self.accounts.get(account)
    }

    pub fn account_count(&self) -> usize {
        self.accounts.len()
    }

    /// Project the settlement of `account` up to `now`.
    ///
    /// Accrual covers `[max(last_settled, activation), min(now, retirement)]`
    /// at the recorded principal basis.
    pub fn settlement(&self, account: &AccountId, tenure: Tenure, now: Timestamp) -> Result<Settlement, AuthorityError> {
        let state = self
            .accounts
            .get(account)
            .ok_or(AuthorityError::NotRegistered {
                account: *account,
                authority: self.id,
            })?;
        if now < state.last_settled {
            return Err(AuthorityError::NonMonotonicTime {
                now,
                last_settled: state.last_settled,
            });
        }

        let mut next = state.clone();
        let mut credited = vec![0; self.streams.len()];
        if let Some((from, to)) = tenure.clamp(state.last_settled, now) {
            for (i, (_, ledger)) in self.streams.iter().enumerate() {
                let amount = ledger.accrued(state.principal, from, to)?;
                credited[i] = amount;
                next.unclaimed[i] = next.unclaimed[i]
                    .checked_add(amount)
                    .ok_or(RateError::ArithmeticOverflow)?;
            }
        }
        next.last_settled = now;

        Ok(Settlement {
            authority: self.id,
            account: *account,
            state: next,
            credited,
        })
    }

    /// Apply a projected settlement.
    ///
    /// Settlements must be committed before any other mutation of the same
    /// account, otherwise the later state wins.
    pub fn commit(&mut self, settlement: Settlement) {
        debug!(
            authority = %self.id,
            account = %settlement.account.short(),
            at = settlement.state.last_settled,
            principal = settlement.state.principal,
            "account settled"
        );
        self.accounts.insert(settlement.account, settlement.state);
    }

    /// Credit pending accrual to `account` up to `now`. Idempotent at the same `now`.
    pub fn settle(&mut self, account: &AccountId, tenure: Tenure, now: Timestamp) -> Result<Vec<AssetAmount>, AuthorityError> {
        let settlement = self.settlement(account, tenure, now)?;
        let credited = self.tagged(settlement.credited());
        self.commit(settlement);
        Ok(credited)
    }

    /// Settle at the old principal basis, then record `principal` as the new basis.
    pub fn apply_principal(
        &mut self,
        account: &AccountId,
        principal: Amount,
        tenure: Tenure,
        now: Timestamp,
    ) -> Result<(), AuthorityError> {
        let settlement = self.settlement(account, tenure, now)?.with_principal(principal);
        self.commit(settlement);
        Ok(())
    }

    /// What a claim at `now` would pay, per stream. Pure.
    pub fn reward_of(&self, account: &AccountId, tenure: Tenure, now: Timestamp) -> Result<Vec<AssetAmount>, AuthorityError> {
        let settlement = self.settlement(account, tenure, now)?;
        Ok(self.tagged(&settlement.state.unclaimed))
    }

    /// Project a claim: settle, then drain the streams selected by `scope`.
    ///
    /// Fails with `NothingToClaim` when every selected stream is zero.
    pub fn claim_plan(
        &self,
        account: &AccountId,
        tenure: Tenure,
        now: Timestamp,
        scope: ClaimScope<'_>,
    ) -> Result<ClaimPlan, AuthorityError> {
        let mut settlement = self.settlement(account, tenure, now)?;
        let selected: Vec<usize> = match scope {
            ClaimScope::All => (0..self.streams.len()).collect(),
            ClaimScope::Asset(asset) => vec![self.stream_index(asset)?],
        };

        let mut payout = Vec::with_capacity(selected.len());
        for i in selected {
            let amount = std::mem::take(&mut settlement.state.unclaimed[i]);
            if amount > 0 {
                payout.push(AssetAmount::new(self.streams[i].0.clone(), amount));
            }
        }
        if payout.is_empty() {
            return Err(AuthorityError::NothingToClaim {
                account: *account,
                authority: self.id,
            });
        }
        Ok(ClaimPlan { settlement, payout })
    }

    /// Apply a projected claim and return its payout.
    pub fn commit_claim(&mut self, plan: ClaimPlan) -> Vec<AssetAmount> {
        let ClaimPlan { settlement, payout } = plan;
        self.commit(settlement);
        payout
    }

    /// Settle and drain without paying anyone. The caller moves the funds.
    pub fn claim(
        &mut self,
        account: &AccountId,
        tenure: Tenure,
        now: Timestamp,
        scope: ClaimScope<'_>,
    ) -> Result<Vec<AssetAmount>, AuthorityError> {
        let plan = self.claim_plan(account, tenure, now, scope)?;
        Ok(self.commit_claim(plan))
    }

    fn tagged(&self, amounts: &[Amount]) -> Vec<AssetAmount> {
        self.streams
            .iter()
            .zip(amounts)
            .map(|((asset, _), amount)| AssetAmount::new(asset.clone(), *amount))
            .collect()
    }
}
