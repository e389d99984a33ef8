use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::rl::{PolicyKind, TradingEnvConfig};

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub dataset: DatasetConfig,
    #[serde(default)]
    pub environment: TradingEnvConfig,
    #[serde(default)]
    pub rollout: RolloutConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatasetConfig {
    /// CSV file with a `date` column followed by one column per asset
    #[serde(default)]
    pub data_path: Option<PathBuf>,
    /// Episode length in calendar days
    #[serde(default = "default_period_days")]
    pub period_days: usize,
    /// Seed for episode start sampling; entropy when unset
    #[serde(default)]
    pub seed: Option<u64>,
    /// Forward-fill gaps in the input instead of rejecting them
    #[serde(default = "default_fill_missing")]
    pub fill_missing: bool,
}

fn default_period_days() -> usize {
    365
}

fn default_fill_missing() -> bool {
    false
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            data_path: None,
            period_days: default_period_days(),
            seed: None,
            fill_missing: default_fill_missing(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RolloutConfig {
    /// Episodes per simulation run
    #[serde(default = "default_episodes")]
    pub episodes: usize,
    /// Baseline policy driving the environment
    #[serde(default = "default_policy")]
    pub policy: PolicyKind,
    /// Steps between policy rebalances
    #[serde(default = "default_rebalance_every")]
    pub rebalance_every: usize,
}

fn default_episodes() -> usize {
    100
}

fn default_policy() -> PolicyKind {
    PolicyKind::BuyAndHold
}

fn default_rebalance_every() -> usize {
    30
}

impl Default for RolloutConfig {
    fn default() -> Self {
        Self {
            episodes: default_episodes(),
            policy: default_policy(),
            rebalance_every: default_rebalance_every(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Enable JSON formatted logs
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            dataset: DatasetConfig::default(),
            environment: TradingEnvConfig::default(),
            rollout: RolloutConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from files and environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config")
    }

    /// Load configuration from a specific directory
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            // Start with default values
            .set_default("logging.level", "info")?
            .set_default("logging.json", false)?
            .set_default("environment.fee", 0.01)?
            .set_default("dataset.period_days", 365)?
            // Load default config file
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Load environment-specific config (e.g., config/backtest.toml)
            .add_source(
                File::from(config_dir.join(
                    std::env::var("STONKS_ENV").unwrap_or_else(|_| "development".to_string()),
                ))
                .required(false),
            )
            // Override with environment variables (STONKS__ENVIRONMENT__FEE, etc.)
            .add_source(
                Environment::with_prefix("STONKS")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.dataset.period_days == 0 {
            errors.push("period_days must be at least 1".to_string());
        }

        if !(0.0..=1.0).contains(&self.environment.fee) {
            errors.push(format!(
                "fee must be between 0 and 1, got {}",
                self.environment.fee
            ));
        }

        if let Some(weights) = &self.environment.initial_portfolio {
            if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
                errors.push("initial_portfolio weights must be non-negative".to_string());
            }
            let total: f64 = weights.iter().sum();
            if !crate::domain::sums_to_one(weights) {
                errors.push(format!("initial_portfolio sums to {total}, expected 1"));
            }
        }

        if self.rollout.rebalance_every == 0 {
            errors.push("rebalance_every must be at least 1".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
