//! strategy-settlement CLI
//!
//! Commands:
//! - `strategy-settlement replay <scenario.json>` - Drive an engine through a scenario
//! - `strategy-settlement hash` - Compute an order hash
//! - `strategy-settlement check-config` - Validate configuration

pub mod replay;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use crate::adapters::RecordingEventSink;
use crate::config::{EngineConfig, HashAlgorithm, HashingConfig};
use crate::domain::codec::{parse_address, parse_b256};
use crate::domain::{OrderHashInput, StrategyKind};
use crate::engine::SettlementEngine;
use crate::persistence::LedgerSnapshot;

pub use replay::{Action, ReplayReport, Replayer, Scenario, ScenarioStep, StepOutcome};

/// Strategy-order settlement engine
#[derive(Parser, Debug)]
#[command(name = "strategy-settlement")]
#[command(author, version, about = "Settlement engine for TWAP, DCA, grid, option and liquidity orders")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Directory holding default.toml and environment overrides
    #[arg(long, global = true, default_value = "config", env = "SETTLE_CONFIG_DIR")]
    pub config_dir: PathBuf,

    /// Emit JSON logs
    #[arg(long, global = true)]
    pub json_logs: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Replay a JSON scenario against a fresh (or restored) engine
    Replay {
        /// Scenario file
        scenario: PathBuf,

        /// Start from a saved snapshot instead of an empty ledger
        #[arg(long)]
        restore: Option<PathBuf>,

        /// Save a snapshot of the final state
        #[arg(long)]
        snapshot_out: Option<PathBuf>,

        /// Abort on the first failing step
        #[arg(long)]
        fail_fast: bool,
    },

    /// Compute the order hash for a maker, kind, nonce and salt
    Hash {
        /// Maker address (0x-hex)
        #[arg(long)]
        maker: String,

        /// Strategy kind (twap, option, dca, grid, liquidity)
        #[arg(long)]
        kind: String,

        #[arg(long, default_value = "0")]
        nonce: u64,

        /// 32-byte salt (0x-hex, left-padded)
        #[arg(long, default_value = "0x0")]
        salt: String,

        /// Hash function (keccak256 or sha256); defaults to the configured one
        #[arg(long)]
        algorithm: Option<String>,
    },

    /// Load and validate configuration
    CheckConfig,
}

impl Commands {
    pub fn run(self, config_dir: &Path) -> Result<()> {
        match self {
            Self::Replay {
                scenario,
                restore,
                snapshot_out,
                fail_fast,
            } => run_replay(
                config_dir,
                &scenario,
                restore.as_deref(),
                snapshot_out.as_deref(),
                fail_fast,
            ),
            Self::Hash {
                maker,
                kind,
                nonce,
                salt,
                algorithm,
            } => run_hash(config_dir, &maker, &kind, nonce, &salt, algorithm.as_deref()),
            Self::CheckConfig => check_config(config_dir),
        }
    }
}

fn load_config(config_dir: &Path) -> Result<EngineConfig> {
    let config = EngineConfig::load_from(config_dir)
        .with_context(|| format!("Failed to load config from {}", config_dir.display()))?;
    if let Err(errors) = config.validate() {
        bail!("Invalid configuration:\n  {}", errors.join("\n  "));
    }
    Ok(config)
}

fn run_replay(
    config_dir: &Path,
    scenario_path: &Path,
    restore: Option<&Path>,
    snapshot_out: Option<&Path>,
    fail_fast: bool,
) -> Result<()> {
    let config = load_config(config_dir)?;
    let scenario = Scenario::load(scenario_path)
        .with_context(|| format!("Failed to read scenario {}", scenario_path.display()))?;

    let engine = match restore {
        Some(path) => {
            let snapshot = LedgerSnapshot::load_from(path)
                .with_context(|| format!("Failed to read snapshot {}", path.display()))?;
            SettlementEngine::restore(&config, snapshot)?
        }
        None => SettlementEngine::new(&config),
    };
    let recorder = Arc::new(RecordingEventSink::new());
    let engine = engine.with_event_sink(recorder.clone());

    info!(
        "Replaying {} steps from {}",
        scenario.steps.len(),
        scenario_path.display()
    );
    let mut report = Replayer::new(&engine).fail_fast(fail_fast).run(&scenario)?;
    report.events = recorder.drain();

    println!("{}", serde_json::to_string_pretty(&report)?);

    if let Some(path) = snapshot_out {
        engine.snapshot().save_to(path)?;
    }

    info!(
        "Replay done: {} steps, {} failed, {} events",
        report.steps.len(),
        report.failures(),
        report.events.len()
    );
    Ok(())
}

fn run_hash(
    config_dir: &Path,
    maker: &str,
    kind: &str,
    nonce: u64,
    salt: &str,
    algorithm: Option<&str>,
) -> Result<()> {
    let hashing = match algorithm {
        Some(name) => HashingConfig {
            algorithm: parse_algorithm(name)?,
        },
        None => load_config(config_dir)?.hashing,
    };

    let input = OrderHashInput {
        maker: parse_address(maker).map_err(|e| anyhow!("Invalid maker: {e}"))?,
        kind: StrategyKind::try_from(kind).map_err(|e| anyhow!(e))?,
        nonce,
        salt: parse_b256(salt).map_err(|e| anyhow!("Invalid salt: {e}"))?,
    };
    let hasher = hashing.hasher();
    println!("{}", hasher.order_hash(&input));
    Ok(())
}

fn parse_algorithm(name: &str) -> Result<HashAlgorithm> {
    match name.to_lowercase().as_str() {
        "keccak256" | "keccak" => Ok(HashAlgorithm::Keccak256),
        "sha256" => Ok(HashAlgorithm::Sha256),
        other => bail!("Unknown hash algorithm: {other}"),
    }
}

fn check_config(config_dir: &Path) -> Result<()> {
    let config = load_config(config_dir)?;
    println!("Configuration OK ({})", config_dir.display());
    println!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}
