use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

use crate::domain::{Keccak256OrderHasher, OrderHasher, Sha256OrderHasher, BPS_DENOMINATOR};

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub policy: PolicyConfig,
    #[serde(default)]
    pub hashing: HashingConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Strategy policy knobs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Minimum DCA frequency in seconds
    #[serde(default = "default_min_dca_frequency_secs")]
    pub min_dca_frequency_secs: u64,
    /// Accepted deviation of a grid fill from its level's target price
    #[serde(default = "default_grid_tolerance_bps")]
    pub grid_tolerance_bps: u32,
    /// Upper bound accepted for a DCA order's max_slippage_bps
    #[serde(default = "default_max_slippage_bps_cap")]
    pub max_slippage_bps_cap: u32,
    /// Largest grid a single order may span; each level costs a bitmap bit
    #[serde(default = "default_max_grid_levels")]
    pub max_grid_levels: u32,
    #[serde(default)]
    pub grid_split: GridSplit,
    #[serde(default)]
    pub option_payout: OptionPayoutPolicy,
}

/// How grid levels map onto target prices
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GridSplit {
    /// Levels below `levels / 2` buy at `base − (half − level) × step`,
    /// the rest sell at `base + (level − half + 1) × step`
    #[default]
    Symmetric,
    /// Buy levels at `base − level × step`, sell levels at `base + level × step`
    LevelOffset,
}

/// Option exercise payout curve
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptionPayoutPolicy {
    /// `min(collateral, collateral × |current − strike| / strike)`
    #[default]
    LinearCapped,
    /// Whole collateral once in the money
    FullCollateral,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            min_dca_frequency_secs: default_min_dca_frequency_secs(),
            grid_tolerance_bps: default_grid_tolerance_bps(),
            max_slippage_bps_cap: default_max_slippage_bps_cap(),
            max_grid_levels: default_max_grid_levels(),
            grid_split: GridSplit::default(),
            option_payout: OptionPayoutPolicy::default(),
        }
    }
}

fn default_min_dca_frequency_secs() -> u64 {
    3600
}

fn default_grid_tolerance_bps() -> u32 {
    100
}

fn default_max_slippage_bps_cap() -> u32 {
    BPS_DENOMINATOR as u32
}

fn default_max_grid_levels() -> u32 {
    1024
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    #[default]
    Keccak256,
    Sha256,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashingConfig {
    #[serde(default)]
    pub algorithm: HashAlgorithm,
}

impl HashingConfig {
    pub fn hasher(&self) -> Arc<dyn OrderHasher> {
        match self.algorithm {
            HashAlgorithm::Keccak256 => Arc::new(Keccak256OrderHasher),
            HashAlgorithm::Sha256 => Arc::new(Sha256OrderHasher),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Enable JSON formatted logs
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl LoggingConfig {
    /// `EnvFilter` directives used when `RUST_LOG` is unset
    pub fn filter_directives(&self) -> String {
        self.level.to_lowercase()
    }

    /// JSON output if either the config or the command line asks for it
    pub fn json_enabled(&self, cli_flag: bool) -> bool {
        self.json || cli_flag
    }
}

impl EngineConfig {
    /// Load configuration from files and environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config")
    }

    /// Load configuration from a specific directory
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            .set_default("policy.min_dca_frequency_secs", default_min_dca_frequency_secs() as i64)?
            .set_default("policy.grid_tolerance_bps", i64::from(default_grid_tolerance_bps()))?
            .set_default("policy.max_slippage_bps_cap", i64::from(default_max_slippage_bps_cap()))?
            .set_default("policy.max_grid_levels", i64::from(default_max_grid_levels()))?
            .set_default("policy.grid_split", "symmetric")?
            .set_default("policy.option_payout", "linear_capped")?
            .set_default("hashing.algorithm", "keccak256")?
            .set_default("logging.level", "info")?
            .set_default("logging.json", false)?
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Environment-specific overrides (e.g., config/production.toml)
            .add_source(
                File::from(config_dir.join(
                    std::env::var("SETTLE_ENV").unwrap_or_else(|_| "development".to_string()),
                ))
                .required(false),
            )
            // SETTLE__POLICY__MIN_DCA_FREQUENCY_SECS, etc.
            .add_source(
                Environment::with_prefix("SETTLE")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();
        let max_bps = BPS_DENOMINATOR as u32;

        if self.policy.min_dca_frequency_secs == 0 {
            errors.push("policy.min_dca_frequency_secs must be positive".to_string());
        }

        if self.policy.grid_tolerance_bps > max_bps {
            errors.push(format!(
                "policy.grid_tolerance_bps must be at most {max_bps}, got {}",
                self.policy.grid_tolerance_bps
            ));
        }

        if self.policy.max_slippage_bps_cap == 0 || self.policy.max_slippage_bps_cap > max_bps {
            errors.push(format!(
                "policy.max_slippage_bps_cap must be within 1..={max_bps}, got {}",
                self.policy.max_slippage_bps_cap
            ));
        }

        if self.policy.max_grid_levels == 0 {
            errors.push("policy.max_grid_levels must be positive".to_string());
        }

        if !matches!(
            self.logging.level.to_lowercase().as_str(),
            "trace" | "debug" | "info" | "warn" | "error"
        ) {
            errors.push(format!("logging.level '{}' is not a valid level", self.logging.level));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
