//! Lendpool scenario simulator.
//!
//! Loads a pool configuration, replays a JSON scenario of deposits,
//! withdrawals, rate changes and authority switches against an in-memory
//! pool, and prints a JSON report of every step.

mod scenario;

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use lendpool_pool::PoolConfig;
use tracing::info;

use crate::scenario::{Scenario, Simulator};

#[derive(Parser, Debug)]
#[command(
    name = "lendpool-sim",
    version,
    about = "Replay a lending scenario against an in-memory Lendpool"
)]
struct Args {
    /// Scenario file (JSON)
    scenario: PathBuf,

    /// Pool config file (TOML). Defaults plus LENDPOOL_* variables when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error). Overrides the config file.
    #[arg(long)]
    log_level: Option<String>,

    /// Log output format ("text" or "json")
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Abort on the first rejected step instead of recording it
    #[arg(long)]
    fail_fast: bool,

    /// Pretty-print the report
    #[arg(long)]
    pretty: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => PoolConfig::load(path)
            .with_context(|| format!("Failed to load config: {}", path.display()))?,
        None => PoolConfig::from_env().context("Failed to read config from environment")?,
    };
    let level = args.log_level.clone().unwrap_or_else(|| config.log_level.clone());
    init_logging(&level, &args.log_format);

    info!("Lendpool simulator v{}", env!("CARGO_PKG_VERSION"));
    info!(asset = %config.principal_asset, custody = %config.custody_account.short(), "pool config");

    let raw = fs::read_to_string(&args.scenario)
        .with_context(|| format!("Failed to read scenario: {}", args.scenario.display()))?;
    let scenario: Scenario = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse scenario: {}", args.scenario.display()))?;

    let mut sim = Simulator::new(config, &scenario)?;
    let report = sim.run(&scenario.steps, args.fail_fast)?;
    info!(
        steps = report.steps.len(),
        failures = report.failures,
        authorities = sim.pool().chain().len(),
        "scenario complete"
    );

    let out = if args.pretty {
        serde_json::to_string_pretty(&report)?
    } else {
        serde_json::to_string(&report)?
    };
    println!("{out}");
    Ok(())
}

/// Initialize tracing subscriber with the given log level and output format.
///
/// Logs go to stderr so the report on stdout stays machine readable.
fn init_logging(level_str: &str, format: &str) {
    use tracing_subscriber::filter::EnvFilter;
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level_str));

    if format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr).with_target(true).with_level(true))
            .init();
    }
}
