//! Per-(account, authority) registration records.
//!
//! Registration is an explicit opt-in and is required before an account can
//! accrue under or claim from an authority. Records are immutable: a second
//! registration is a no-op and never moves `registered_at`.

use std::collections::{BTreeSet, HashMap};

use lendpool_core::types::{AccountId, Amount, AuthorityId, Timestamp};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Registration {
    pub account: AccountId,
    pub authority: AuthorityId,
    pub registered_at: Timestamp,
    pub principal_at_registration: Amount,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterOutcome {
    Created,
    AlreadyRegistered,
}

impl RegisterOutcome {
    pub fn created(&self) -> bool {
        matches!(self, Self::Created)
    }
}

/// All registrations of a pool, with a per-account index of authorities.
#[derive(Debug, Clone, Default)]
pub struct RegistrationRegistry {
    records: HashMap<(AccountId, AuthorityId), Registration>,
    by_account: HashMap<AccountId, BTreeSet<AuthorityId>>,
}

impl RegistrationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `account` joined `authority` at `now` holding `principal`.
    pub fn register(
        &mut self,
        account: AccountId,
        authority: AuthorityId,
        principal: Amount,
        now: Timestamp,
    ) -> RegisterOutcome {
        if self.records.contains_key(&(account, authority)) {
            return RegisterOutcome::AlreadyRegistered;
        }
        self.records.insert(
            (account, authority),
            Registration {
                account,
                authority,
                registered_at: now,
                principal_at_registration: principal,
            },
        );
        self.by_account.entry(account).or_default().insert(authority);
        debug!(account = %account.short(), %authority, principal, now, "registered");
        RegisterOutcome::Created
    }

    pub fn is_registered(&self, account: &AccountId, authority: AuthorityId) -> bool {
        self.records.contains_key(&(*account, authority))
    }

    pub fn get(&self, account: &AccountId, authority: AuthorityId) -> Option<&Registration> {
        self.records.get(&(*account, authority))
    }

    /// Authorities `account` registered with, newest first.
    pub fn authorities_of(&self, account: &AccountId) -> Vec<AuthorityId> {
        self.by_account
            .get(account)
            .map(|set| set.iter().rev().copied().collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
