//! Append-only chain of reward authorities.
//!
//! Authorities live in an arena indexed by [`AuthorityId`]; each one records
//! its predecessor. Lookups across the chain go through the ids an account
//! registered with, bounded by `max_hops`, never through a full traversal.
//! At most one authority may be pending (created but not yet active), and
//! switching stamps tenure on two links in O(1) without touching accounts.

use lendpool_core::error::ChainError;
use lendpool_core::types::{AccountId, Amount, AssetAmount, AuthorityId, Timestamp};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::authority::{ClaimPlan, RewardAuthority, Settlement, StreamSpec, Tenure};

/// Versioned reference to the active authority.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct ActivePointer {
    pub authority: AuthorityId,
    /// Incremented on every switch.
    pub version: u64,
}

#[derive(Debug, Clone)]
pub struct ChainLink {
    authority: RewardAuthority,
    tenure: Tenure,
}

impl ChainLink {
    pub fn authority(&self) -> &RewardAuthority {
        &self.authority
    }

    pub fn tenure(&self) -> Tenure {
        self.tenure
    }

    pub fn id(&self) -> AuthorityId {
        self.authority.id()
    }
}

#[derive(Debug, Clone)]
pub struct AuthorityChain {
    links: Vec<ChainLink>,
    active: ActivePointer,
    max_hops: usize,
}

impl AuthorityChain {
    /// Start a chain whose genesis authority is active from `now`.
    pub fn genesis(
        treasury: AccountId,
        specs: &[StreamSpec],
        now: Timestamp,
        max_hops: usize,
    ) -> Result<Self, ChainError> {
        let genesis = RewardAuthority::new(AuthorityId::GENESIS, None, treasury, specs, now)?;
        Ok(Self {
            links: vec![ChainLink {
                authority: genesis,
                tenure: Tenure::since(now),
            }],
            active: ActivePointer {
                authority: AuthorityId::GENESIS,
                version: 0,
            },
            max_hops,
        })
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    pub fn active(&self) -> ActivePointer {
        self.active
    }

    pub fn active_id(&self) -> AuthorityId {
        self.active.authority
    }

    /// Newest authority, which is either active or pending.
    pub fn tip(&self) -> AuthorityId {
        self.links
            .last()
            .map_or(AuthorityId::GENESIS, ChainLink::id)
    }

    /// The pending successor, if one has been created.
    pub fn pending(&self) -> Option<AuthorityId> {
        let tip = self.tip();
        (tip != self.active.authority).then_some(tip)
    }

    pub fn max_hops(&self) -> usize {
        self.max_hops
    }

    pub fn link(&self, id: AuthorityId) -> Result<&ChainLink, ChainError> {
        self.links
            .get(id.index())
            .ok_or(ChainError::UnknownAuthority(id))
    }

    pub fn authority(&self, id: AuthorityId) -> Result<&RewardAuthority, ChainError> {
        Ok(&self.link(id)?.authority)
    }

    /// Mutable access to an authority together with its tenure.
    pub fn authority_mut(&mut self, id: AuthorityId) -> Result<(&mut RewardAuthority, Tenure), ChainError> {
        let link = self
            .links
            .get_mut(id.index())
            .ok_or(ChainError::UnknownAuthority(id))?;
        Ok((&mut link.authority, link.tenure))
    }

    pub fn tenure(&self, id: AuthorityId) -> Result<Tenure, ChainError> {
        Ok(self.link(id)?.tenure)
    }

    /// Create a pending successor of the current tip.
    pub fn append(
        &mut self,
        treasury: AccountId,
        specs: &[StreamSpec],
        now: Timestamp,
    ) -> Result<AuthorityId, ChainError> {
        if let Some(pending) = self.pending() {
            return Err(ChainError::PendingSuccessor(pending));
        }
        let predecessor = self.tip();
        let id = AuthorityId(self.links.len() as u32);
        let authority = RewardAuthority::new(id, Some(predecessor), treasury, specs, now)?;
        self.links.push(ChainLink {
            authority,
            tenure: Tenure::PENDING,
        });
        info!(%id, %predecessor, "authority created");
        Ok(id)
    }

    /// Make `candidate` the active authority from `now`.
    ///
    /// `candidate` must be the direct successor of the active authority.
    /// The outgoing link is retired at `now` and keeps every balance.
    pub fn activate(&mut self, candidate: AuthorityId, now: Timestamp) -> Result<ActivePointer, ChainError> {
        let outgoing = self.active.authority;
        let link = self.link(candidate)?;
        if candidate == outgoing {
            return Err(ChainError::AlreadyActive(candidate));
        }
        if link.authority.predecessor() != Some(outgoing) {
            return Err(ChainError::NotSuccessor {
                candidate,
                active: outgoing,
            });
        }
        let activated_at = self.tenure(outgoing)?.activated_at.unwrap_or(0);
        if now < activated_at {
            return Err(ChainError::SwitchBeforeActivation { now, activated_at });
        }

        self.links[outgoing.index()].tenure.retired_at = Some(now);
        self.links[candidate.index()].tenure.activated_at = Some(now);
        self.active = ActivePointer {
            authority: candidate,
            version: self.active.version + 1,
        };
        info!(from = %outgoing, to = %candidate, version = self.active.version, at = now, "authority switched");
        Ok(self.active)
    }

    /// Open `account` on the active authority. Returns `false` if already open.
    pub fn open_on_active(&mut self, account: &AccountId, principal: Amount, at: Timestamp) -> bool {
        let idx = self.active.authority.index();
        self.links[idx].authority.open_account(account, principal, at)
    }

    /// Apply a settlement projected by one of this chain's authorities.
    pub fn commit(&mut self, settlement: Settlement) {
        if let Some(link) = self.links.get_mut(settlement.authority().index()) {
            link.authority.commit(settlement);
        }
    }

    /// Apply a claim projected by one of this chain's authorities.
    pub fn commit_claim(&mut self, plan: ClaimPlan) -> Vec<AssetAmount> {
        match self.links.get_mut(plan.authority().index()) {
            Some(link) => link.authority.commit_claim(plan),
            None => Vec::new(),
        }
    }

    /// Links for `ids`, usually the authorities one account registered
    /// with. More than `max_hops` ids is refused, however long the chain.
    pub fn links_of(&self, ids: &[AuthorityId]) -> Result<Vec<&ChainLink>, ChainError> {
        if ids.len() > self.max_hops {
            return Err(ChainError::HopLimitExceeded { max: self.max_hops });
        }
        ids.iter().map(|id| self.link(*id)).collect()
    }
}
