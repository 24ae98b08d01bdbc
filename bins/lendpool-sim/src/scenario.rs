//! JSON scenarios replayed against an in-memory pool.
//!
//! A scenario names accounts by short labels (`"alice"`, `"treasury-1"`)
//! instead of 64-character hex ids. Labels of up to 32 bytes map to the
//! account whose id is the label's bytes, zero padded; full hex ids are
//! accepted too.

use std::collections::BTreeMap;

use anyhow::{bail, Context, Result};
use lendpool_core::types::{amount_serde, AccountId, Amount, AssetId, AuthorityId, Timestamp};
use lendpool_pool::{
    AllowListGate, GenesisAuthority, IdleStrategy, LendingPool, MemoryAssetLedger, OperatorCap, PoolConfig,
    PoolError, RateScope, RateSetterCap,
};
use lendpool_rewards::{ActivePointer, StreamSpec};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

pub type SimPool = LendingPool<MemoryAssetLedger, AllowListGate>;

#[derive(Deserialize, Debug, Clone)]
pub struct Scenario {
    pub genesis: AuthoritySpec,
    /// Approve every account at the eligibility gate.
    #[serde(default = "default_open_gate")]
    pub open_gate: bool,
    #[serde(default)]
    pub start: Timestamp,
    #[serde(default)]
    pub steps: Vec<Step>,
}

fn default_open_gate() -> bool {
    true
}

#[derive(Deserialize, Debug, Clone)]
pub struct AuthoritySpec {
    pub treasury: String,
    pub streams: Vec<StreamSpec>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    /// Credit an account out of thin air.
    Mint {
        account: String,
        asset: AssetId,
        #[serde(with = "amount_serde")]
        amount: Amount,
    },
    /// Approve the pool's custody to pull principal from `account`.
    Approve {
        account: String,
        #[serde(with = "amount_serde")]
        amount: Amount,
    },
    Allow { account: String },
    Deposit {
        account: String,
        #[serde(with = "amount_serde")]
        amount: Amount,
        at: Timestamp,
    },
    Withdraw {
        account: String,
        #[serde(with = "amount_serde")]
        amount: Amount,
        at: Timestamp,
    },
    /// Register with `authority`, or the active authority when omitted.
    Register { account: String, authority: Option<AuthorityId>, at: Timestamp },
    Claim { account: String, authority: AuthorityId, at: Timestamp },
    ClaimAsset { account: String, authority: AuthorityId, asset: AssetId, at: Timestamp },
    ClaimAll { account: String, at: Timestamp },
    /// Reward owed across the chain. Does not mutate.
    Reward { account: String, at: Timestamp },
    SetRate {
        authority: AuthorityId,
        asset: AssetId,
        #[serde(with = "amount_serde")]
        rate: u128,
        at: Timestamp,
    },
    CreateAuthority { treasury: String, streams: Vec<StreamSpec>, at: Timestamp },
    Switch { authority: AuthorityId, at: Timestamp },
    SetThreshold {
        #[serde(with = "amount_serde")]
        threshold: Amount,
    },
    UseStrategy { name: String },
    /// Invest `amount` of idle principal, or all of it.
    Invest {
        #[serde(default, with = "amount_serde::option")]
        amount: Option<Amount>,
    },
    /// Divest `amount` from the strategy, or all of it.
    Divest {
        #[serde(default, with = "amount_serde::option")]
        amount: Option<Amount>,
    },
    Balance { account: String, asset: AssetId },
}

impl Step {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Mint { .. } => "mint",
            Self::Approve { .. } => "approve",
            Self::Allow { .. } => "allow",
            Self::Deposit { .. } => "deposit",
            Self::Withdraw { .. } => "withdraw",
            Self::Register { .. } => "register",
            Self::Claim { .. } => "claim",
            Self::ClaimAsset { .. } => "claim_asset",
            Self::ClaimAll { .. } => "claim_all",
            Self::Reward { .. } => "reward",
            Self::SetRate { .. } => "set_rate",
            Self::CreateAuthority { .. } => "create_authority",
            Self::Switch { .. } => "switch",
            Self::SetThreshold { .. } => "set_threshold",
            Self::UseStrategy { .. } => "use_strategy",
            Self::Invest { .. } => "invest",
            Self::Divest { .. } => "divest",
            Self::Balance { .. } => "balance",
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct StepReport {
    pub index: usize,
    pub op: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ok: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Serialize, Debug, Clone)]
pub struct Report {
    pub active: ActivePointer,
    pub total_principal: Amount,
    pub idle_principal: Amount,
    pub strategy_balance: Amount,
    pub failures: usize,
    pub steps: Vec<StepReport>,
    /// Principal per labelled account at the end of the run.
    pub principals: BTreeMap<String, Amount>,
}

/// Resolve a label or hex id to an account.
pub fn account(label: &str) -> Result<AccountId> {
    if label.len() == 64 {
        if let Ok(id) = AccountId::from_hex(label) {
            return Ok(id);
        }
    }
    let bytes = label.as_bytes();
    if bytes.is_empty() || bytes.len() > 32 {
        bail!("account label must be 1..=32 bytes: {label:?}");
    }
    let mut id = [0u8; 32];
    id[..bytes.len()].copy_from_slice(bytes);
    Ok(AccountId::from_bytes(id))
}

pub struct Simulator {
    pool: SimPool,
    op: OperatorCap,
    rates: RateSetterCap,
    labels: BTreeMap<String, AccountId>,
}

impl Simulator {
    pub fn new(config: PoolConfig, scenario: &Scenario) -> Result<Self> {
        let gate = if scenario.open_gate {
            AllowListGate::open()
        } else {
            AllowListGate::new()
        };
        let genesis = GenesisAuthority {
            treasury: account(&scenario.genesis.treasury)?,
            streams: scenario.genesis.streams.clone(),
        };
        let (pool, op) = LendingPool::new(config, MemoryAssetLedger::new(), gate, genesis, scenario.start)
            .context("failed to create pool")?;
        let rates = pool.grant_rate_setter(&op, RateScope::AllAuthorities)?;
        Ok(Self {
            pool,
            op,
            rates,
            labels: BTreeMap::new(),
        })
    }

    pub fn pool(&self) -> &SimPool {
        &self.pool
    }

    fn resolve(&mut self, label: &str) -> Result<AccountId> {
        let id = account(label)?;
        self.labels.insert(label.to_string(), id);
        Ok(id)
    }

    /// Apply one step. Pool rejections come back as [`PoolError`] inside the
    /// `anyhow::Error`; anything else is a malformed scenario.
    pub fn apply(&mut self, step: &Step) -> Result<Value> {
        let value = match step {
            Step::Mint { account, asset, amount } => {
                let id = self.resolve(account)?;
                self.pool.assets_mut().mint(asset, &id, *amount);
                Value::Null
            }
            Step::Approve { account, amount } => {
                let id = self.resolve(account)?;
                let asset = self.pool.config().principal_asset.clone();
                let custody = self.pool.config().custody_account;
                self.pool.assets_mut().approve(&asset, &id, &custody, *amount);
                Value::Null
            }
            Step::Allow { account } => {
                let id = self.resolve(account)?;
                self.pool.gate_mut().allow(id);
                Value::Null
            }
            Step::Deposit { account, amount, at } => {
                let id = self.resolve(account)?;
                serde_json::to_value(self.pool.deposit(id, *amount, *at)?)?
            }
            Step::Withdraw { account, amount, at } => {
                let id = self.resolve(account)?;
                serde_json::to_value(self.pool.withdraw_principal(id, *amount, *at)?)?
            }
            Step::Register { account, authority, at } => {
                let id = self.resolve(account)?;
                let authority = authority.unwrap_or(self.pool.active().authority);
                let created = self.pool.register(id, authority, *at)?.created();
                serde_json::json!({ "authority": authority, "created": created })
            }
            Step::Claim { account, authority, at } => {
                let id = self.resolve(account)?;
                serde_json::to_value(self.pool.claim(id, *authority, *at)?)?
            }
            Step::ClaimAsset { account, authority, asset, at } => {
                let id = self.resolve(account)?;
                serde_json::to_value(self.pool.claim_asset(id, *authority, asset, *at)?)?
            }
            Step::ClaimAll { account, at } => {
                let id = self.resolve(account)?;
                serde_json::to_value(self.pool.claim_across_chain(id, *at)?)?
            }
            Step::Reward { account, at } => {
                let id = self.resolve(account)?;
                serde_json::to_value(self.pool.reward_across_chain(&id, *at)?)?
            }
            Step::SetRate { authority, asset, rate, at } => {
                self.pool.set_rate(&self.rates, *authority, asset, *rate, *at)?;
                Value::Null
            }
            Step::CreateAuthority { treasury, streams, at } => {
                let treasury = self.resolve(treasury)?;
                serde_json::to_value(self.pool.create_authority(&self.op, treasury, streams, *at)?)?
            }
            Step::Switch { authority, at } => {
                serde_json::to_value(self.pool.switch_authority(&self.op, *authority, *at)?)?
            }
            Step::SetThreshold { threshold } => {
                self.pool.set_eligibility_threshold(&self.op, *threshold)?;
                Value::Null
            }
            Step::UseStrategy { name } => {
                let moved = self.pool.switch_strategy(&self.op, Box::new(IdleStrategy::new(name.clone())))?;
                serde_json::to_value(moved)?
            }
            Step::Invest { amount } => {
                let invested = match amount {
                    Some(amount) => {
                        self.pool.invest_idle(&self.op, *amount)?;
                        *amount
                    }
                    None => self.pool.invest_all_idle(&self.op)?,
                };
                serde_json::to_value(invested)?
            }
            Step::Divest { amount } => {
                let released = match amount {
                    Some(amount) => self.pool.divest(&self.op, *amount)?,
                    None => self.pool.divest_all(&self.op)?,
                };
                serde_json::to_value(released)?
            }
            Step::Balance { account, asset } => {
                use lendpool_core::traits::AssetLedger;
                let id = self.resolve(account)?;
                serde_json::to_value(self.pool.assets().balance_of(asset, &id))?
            }
        };
        Ok(value)
    }

    /// Apply every step in order. Rejected operations are recorded in the
    /// report unless `fail_fast` is set.
    pub fn run(&mut self, steps: &[Step], fail_fast: bool) -> Result<Report> {
        let mut reports = Vec::with_capacity(steps.len());
        let mut failures = 0;
        for (index, step) in steps.iter().enumerate() {
            let (ok, error) = match self.apply(step) {
                Ok(value) => (Some(value), None),
                Err(e) => {
                    let rejected = e.downcast_ref::<PoolError>().map(ToString::to_string);
                    match rejected {
                        Some(reason) if !fail_fast => {
                            warn!(index, op = step.name(), "step rejected: {reason}");
                            failures += 1;
                            (None, Some(reason))
                        }
                        _ => return Err(e.context(format!("step {index} ({}) failed", step.name()))),
                    }
                }
            };
            debug!(index, op = step.name(), "step applied");
            reports.push(StepReport {
                index,
                op: step.name(),
                ok,
                error,
            });
        }

        let principals = self
            .labels
            .iter()
            .map(|(label, id)| (label.clone(), self.pool.principal_of(id)))
            .filter(|(_, principal)| *principal > 0)
            .collect();
        Ok(Report {
            active: self.pool.active(),
            total_principal: self.pool.total_principal(),
            idle_principal: self.pool.idle_principal(),
            strategy_balance: self.pool.strategy_balance(),
            failures,
            steps: reports,
            principals,
        })
    }
}
