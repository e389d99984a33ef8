//! Episodic Portfolio Environment for RL Training
//!
//! This module provides a gym-like environment over historical daily prices:
//! a windowed row iterator, an episodic dataset that samples fixed-length
//! windows, and the trading environment that scores rebalancing decisions.

mod dataset;
mod series;
mod trading;

pub use dataset::{EpisodicDataset, RngSampler, Sample, SequenceSampler, StartSampler};
pub use series::WindowedSeriesIterator;
pub use trading::{
    EnvAction, EnvState, Observation, StepInfo, StepResult, TradingEnvConfig, TradingEnvironment,
};
