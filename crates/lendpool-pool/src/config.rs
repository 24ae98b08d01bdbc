//! Pool configuration.
//!
//! Provides [`PoolConfig`] with defaults for the principal asset, custody
//! account, eligibility threshold and chain-wide visit bound. The configuration can
//! be built programmatically or loaded from a TOML file, with `LENDPOOL_*`
//! environment variables overriding file values.

use std::path::Path;

use ::config::{Config, Environment, File};
use lendpool_core::constants::{DEFAULT_ELIGIBILITY_THRESHOLD, DEFAULT_MAX_CHAIN_HOPS};
use lendpool_core::types::{amount_serde, AccountId, Amount, AssetId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::ValidationError;

/// Prefix of environment variables that override file values.
pub const ENV_PREFIX: &str = "LENDPOOL";

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("config source: {0}")] Source(#[from] ::config::ConfigError),
    #[error(transparent)] Invalid(#[from] ValidationError),
}

/// Configuration for a pool instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Asset depositors lend.
    pub principal_asset: AssetId,
    /// Account holding pooled principal.
    pub custody_account: AccountId,
    /// Cumulative principal at which the eligibility gate is consulted.
    /// Values beyond `u64::MAX` are written as decimal strings.
    #[serde(with = "amount_serde")]
    pub eligibility_threshold: Amount,
    /// Register depositors with the active authority on deposit.
    pub auto_register_on_deposit: bool,
    /// Upper bound on authorities one account's chain-wide view or claim visits.
    pub max_chain_hops: usize,
    /// Log level filter string (e.g. "info", "lendpool_pool=debug").
    pub log_level: String,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            principal_asset: AssetId::new("USDC"),
            custody_account: AccountId::from_seed(0xCC),
            eligibility_threshold: DEFAULT_ELIGIBILITY_THRESHOLD,
            auto_register_on_deposit: true,
            max_chain_hops: DEFAULT_MAX_CHAIN_HOPS,
            log_level: "info".to_string(),
        }
    }
}

impl PoolConfig {
    /// Load from a config file (format inferred from its extension) with
    /// environment overrides, then validate.
    pub fn load(path: &Path) -> Result<Self, LoadError> {
        let cfg: Self = Config::builder()
            .add_source(File::from(path))
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?
            .try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load from environment variables alone, falling back to defaults.
    pub fn from_env() -> Result<Self, LoadError> {
        let cfg: Self = Config::builder()
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?
            .try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.max_chain_hops == 0 {
            return Err(ValidationError::Config("max_chain_hops must be at least 1".into()));
        }
        if self.principal_asset.as_str().is_empty() {
            return Err(ValidationError::Config("principal_asset must not be empty".into()));
        }
        if self.custody_account.is_zero() {
            return Err(ValidationError::Config("custody_account must not be zero".into()));
        }
        Ok(())
    }

    pub fn eligibility_threshold(&self) -> Amount {
        self.eligibility_threshold
    }
}
