//! Stonks CLI - portfolio gym tooling
//!
//! Commands:
//! - `stonks simulate` - Run baseline policies over sampled episodes
//! - `stonks inspect` - Describe a price table
//! - `stonks reallocate` - Evaluate a sell-then-buy rebalance
//! - `stonks fill` - Forward-fill a sparse CSV into a daily table
//! - `stonks yield-index` - Turn a yield column into a total-return index

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::AppConfig;
use crate::error::Result;
use crate::rl::PolicyKind;
use output::OutputMode;

/// Episodic portfolio rebalancing gym
#[derive(Parser, Debug)]
#[command(name = "stonks")]
#[command(author, version, about = "Episodic portfolio rebalancing gym over daily price tables")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config directory
    #[arg(short, long, default_value = "config", env = "STONKS_CONFIG_DIR")]
    pub config: PathBuf,

    /// Print JSON instead of tables
    #[arg(long, global = true)]
    pub json: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Run baseline-policy episodes over a price table
    Simulate {
        /// Price CSV (overrides dataset.data_path)
        #[arg(short, long)]
        data: Option<PathBuf>,
        /// Number of episodes
        #[arg(short, long)]
        episodes: Option<usize>,
        /// Episode length in days
        #[arg(short, long)]
        period: Option<usize>,
        /// Baseline policy
        #[arg(long, value_enum)]
        policy: Option<PolicyKind>,
        /// Steps between policy rebalances
        #[arg(long)]
        rebalance_every: Option<usize>,
        /// Proportional rebalancing fee
        #[arg(long)]
        fee: Option<f64>,
        /// Seed for episode sampling and the random policy
        #[arg(long)]
        seed: Option<u64>,
        /// Show every episode, not just the summary
        #[arg(short, long)]
        verbose: bool,
    },
    /// Describe a price table and its episode capacity
    Inspect {
        /// Price CSV (overrides dataset.data_path)
        #[arg(short, long)]
        data: Option<PathBuf>,
        /// Episode length in days
        #[arg(short, long)]
        period: Option<usize>,
    },
    /// Evaluate a sell-then-buy rebalance of a weight vector
    Reallocate {
        /// Current weights (comma-separated, summing to 1)
        #[arg(long, value_delimiter = ',', allow_hyphen_values = true, required = true)]
        weights: Vec<f64>,
        /// Signed instruction: negative sells, positive buy shares sum to 1
        #[arg(long, value_delimiter = ',', allow_hyphen_values = true, required = true)]
        instruction: Vec<f64>,
        /// Proportional fee charged on each leg
        #[arg(long, default_value = "0.01")]
        fee: f64,
    },
    /// Forward-fill a sparse CSV into a gap-free daily CSV
    Fill {
        /// Sparse input CSV
        input: PathBuf,
        /// Daily output CSV
        output: PathBuf,
    },
    /// Convert a yield column into a bond total-return index CSV
    YieldIndex {
        /// Yield CSV
        input: PathBuf,
        /// Output CSV
        output: PathBuf,
        /// Column holding the yields
        #[arg(long)]
        column: String,
        /// Bond maturity in years
        #[arg(long, default_value = "10")]
        maturity: f64,
        /// Yields are quoted in percent
        #[arg(long)]
        percent: bool,
    },
}

impl Commands {
    /// Whether the command produces enough log output to want the full subscriber
    pub fn is_long_running(&self) -> bool {
        matches!(self, Commands::Simulate { .. })
    }
}

/// Dispatch a parsed command line
pub fn run(cli: Cli, config: AppConfig) -> Result<()> {
    let mode = OutputMode::from_json_flag(cli.json);

    match cli.command {
        Commands::Simulate {
            data,
            episodes,
            period,
            policy,
            rebalance_every,
            fee,
            seed,
            verbose,
        } => {
            let mut config = config;
            if let Some(data) = data {
                config.dataset.data_path = Some(data);
            }
            if let Some(episodes) = episodes {
                config.rollout.episodes = episodes;
            }
            if let Some(period) = period {
                config.dataset.period_days = period;
            }
            if let Some(policy) = policy {
                config.rollout.policy = policy;
            }
            if let Some(every) = rebalance_every {
                config.rollout.rebalance_every = every;
            }
            if let Some(fee) = fee {
                config.environment.fee = fee;
            }
            if seed.is_some() {
                config.dataset.seed = seed;
            }
            commands::simulate(&config, verbose, mode)
        }
        Commands::Inspect { data, period } => {
            let path = data.or_else(|| config.dataset.data_path.clone());
            let period = period.unwrap_or(config.dataset.period_days);
            commands::inspect(path, period, config.dataset.fill_missing, mode)
        }
        Commands::Reallocate {
            weights,
            instruction,
            fee,
        } => commands::reallocate(&weights, &instruction, fee, mode),
        Commands::Fill { input, output } => commands::fill(&input, &output),
        Commands::YieldIndex {
            input,
            output,
            column,
            maturity,
            percent,
        } => commands::yield_index(&input, &output, &column, maturity, percent),
    }
}
