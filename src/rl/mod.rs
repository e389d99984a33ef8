//! Reinforcement Learning Module
//!
//! Gym-style portfolio allocation environment over historical daily prices.
//!
//! # Features
//!
//! - **Episodes**: fixed-length windows sampled from one continuous price table
//! - **Action Space**: rebalance flag plus target portfolio weights
//! - **Reward**: fee-adjusted one-day portfolio return
//! - **Baselines**: buy-and-hold, constant-mix, and random allocation policies
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use stonks_gym::domain::io::load_price_table;
//! use stonks_gym::rl::{EnvAction, EpisodicDataset, TradingEnvConfig, TradingEnvironment};
//!
//! # fn main() -> stonks_gym::Result<()> {
//! let table = Arc::new(load_price_table("data/prices.csv")?);
//! let dataset = EpisodicDataset::new(table, 365)?;
//! let mut env = TradingEnvironment::new(dataset, TradingEnvConfig::default())?;
//!
//! let obs = env.reset()?;
//! let result = env.step(EnvAction::hold(obs.weights().to_vec()))?;
//! println!("reward {:.4}", result.reward);
//! # Ok(())
//! # }
//! ```

pub mod core;
pub mod environment;
pub mod training;

// Core exports
pub use core::{normalize, reallocate, rebalance_cost, total_return, value_retained};

// Environment exports
pub use environment::{
    EnvAction, EnvState, EpisodicDataset, Observation, RngSampler, Sample, SequenceSampler,
    StartSampler, StepInfo, StepResult, TradingEnvConfig, TradingEnvironment,
    WindowedSeriesIterator,
};

// Training exports
pub use training::{
    run_episode, run_episodes, summarize_episodes, EpisodeResult, Policy, PolicyKind,
    RolloutSummary,
};
