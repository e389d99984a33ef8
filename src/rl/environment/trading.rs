//! Trading Environment for RL Training
//!
//! Provides a gym-like interface with step/reset over episodic daily prices.
//! An action names a target portfolio and whether rebalancing into it is
//! charged the proportional fee; the reward is the fee-adjusted return of the
//! portfolio that was held over the step.
//!
//! ```md
//! State          | Call        | Next state | Notes
//! ---------------|-------------|------------|------------------------------------
//! any            | reset()     | Active     | first row becomes the price anchor
//! any            | reset()     | Closed     | single-row episode, or no episode drawn
//! Active         | step()      | Active     | rows left in the episode
//! Active         | step()      | Closed     | last row of the episode consumed
//! Active         | step()      | Closed     | target weights broke the invariant
//! any            | close()     | Closed     |
//! ```

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::dataset::{EpisodicDataset, Sample};
use crate::domain::{PriceRow, WeightVector};
use crate::error::{GymError, Result};
use crate::rl::core::total_return;

/// Trading environment configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradingEnvConfig {
    /// Proportional fee charged on a rebalance
    pub fee: f64,
    /// Portfolio at the start of every episode; equal weights when `None`
    #[serde(default)]
    pub initial_portfolio: Option<Vec<f64>>,
}

impl Default for TradingEnvConfig {
    fn default() -> Self {
        Self {
            fee: 0.01,
            initial_portfolio: None,
        }
    }
}

/// Action taken in the environment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvAction {
    /// 1 to pay the rebalancing fee this step, 0 otherwise
    pub rebalance: f64,
    /// Portfolio to hold from this step on
    pub target: Vec<f64>,
}

impl EnvAction {
    pub fn new(rebalance: f64, target: Vec<f64>) -> Self {
        Self { rebalance, target }
    }

    /// Keep `target` without paying a fee
    pub fn hold(target: Vec<f64>) -> Self {
        Self::new(0.0, target)
    }

    /// Rebalance into `target`, paying the fee
    pub fn rebalance(target: Vec<f64>) -> Self {
        Self::new(1.0, target)
    }

    /// Parse the flat `[flag, w_1 .. w_n]` form
    pub fn from_slice(raw: &[f64]) -> Result<Self> {
        match raw.split_first() {
            Some((flag, weights)) => Ok(Self::new(*flag, weights.to_vec())),
            None => Err(GymError::InvalidAction("empty action vector".to_string())),
        }
    }

    /// Flat `[flag, w_1 .. w_n]` form
    pub fn to_vec(&self) -> Vec<f64> {
        std::iter::once(self.rebalance)
            .chain(self.target.iter().copied())
            .collect()
    }

    fn rebalance_flag(&self) -> Result<f64> {
        if self.rebalance == 0.0 || self.rebalance == 1.0 {
            Ok(self.rebalance)
        } else {
            Err(GymError::InvalidAction(format!(
                "rebalance flag {} should be 0 or 1",
                self.rebalance
            )))
        }
    }
}

/// What the agent sees after reset and each step
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Observation {
    /// Current dataset sample
    pub env: Sample,
    /// Portfolio in effect when the sample was produced
    pub portfolio: WeightVector,
}

impl Observation {
    pub fn date(&self) -> NaiveDate {
        self.env.date()
    }

    pub fn prices(&self) -> &[f64] {
        self.env.prices()
    }

    pub fn weights(&self) -> &[f64] {
        self.portfolio.as_slice()
    }

    /// Prices followed by weights, as model input
    pub fn to_features(&self) -> Vec<f32> {
        self.prices()
            .iter()
            .chain(self.weights())
            .map(|v| *v as f32)
            .collect()
    }
}

/// Environment lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnvState {
    Uninitialized,
    Active,
    Closed,
}

/// Additional step information
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepInfo {
    /// Date of the new observation
    pub date: NaiveDate,
    /// Steps taken this episode, including this one
    pub step: usize,
    /// Whether the rebalancing fee was charged
    pub rebalanced: bool,
    /// Fee rate applied to this step's return
    pub fee_rate: f64,
    /// Compounded episode value, starting at 1
    pub episode_value: f64,
    /// Rebalances charged this episode
    pub num_rebalances: usize,
    /// Rows left in the episode
    pub remaining: usize,
}

/// Result of taking a step in the environment
#[derive(Debug, Clone)]
pub struct StepResult {
    /// New observation after action
    pub observation: Observation,
    /// Fee-adjusted one-day portfolio return
    pub reward: f64,
    /// Whether the episode is done
    pub done: bool,
    /// Additional info
    pub info: StepInfo,
}

/// Portfolio trading environment for RL training
pub struct TradingEnvironment {
    config: TradingEnvConfig,
    dataset: EpisodicDataset,
    initial_portfolio: WeightVector,
    portfolio: WeightVector,
    /// Prices at the last step, the base of the next return
    rebalance_price: Option<PriceRow>,
    state: EnvState,
    step_count: usize,
    episode_value: f64,
    num_rebalances: usize,
}

impl TradingEnvironment {
    /// Create a new trading environment
    pub fn new(dataset: EpisodicDataset, config: TradingEnvConfig) -> Result<Self> {
        if !(0.0..=1.0).contains(&config.fee) {
            return Err(GymError::Config(::config::ConfigError::Message(format!(
                "fee {} must lie in [0, 1]",
                config.fee
            ))));
        }

        let num_assets = dataset.assets().len();
        let initial_portfolio = match &config.initial_portfolio {
            Some(weights) => {
                if weights.len() != num_assets {
                    return Err(GymError::InvalidAction(format!(
                        "initial portfolio has {} weights for {} assets",
                        weights.len(),
                        num_assets
                    )));
                }
                WeightVector::new(weights.clone()).map_err(|e| {
                    GymError::Inconsistent(format!("initial portfolio rejected: {}", e))
                })?
            }
            None => WeightVector::equal(num_assets)?,
        };

        Ok(Self {
            portfolio: initial_portfolio.clone(),
            initial_portfolio,
            config,
            dataset,
            rebalance_price: None,
            state: EnvState::Uninitialized,
            step_count: 0,
            episode_value: 1.0,
            num_rebalances: 0,
        })
    }

    /// Reset the environment for a new episode
    pub fn reset(&mut self) -> Result<Observation> {
        let first = match self.dataset.reset() {
            Ok(()) => self.dataset.step(),
            Err(e) => Err(e),
        };
        let first = match first {
            Ok(first) => first,
            Err(e) => {
                self.state = EnvState::Closed;
                return Err(e);
            }
        };

        self.rebalance_price = Some(first.price.clone());
        self.portfolio = self.initial_portfolio.clone();
        self.step_count = 0;
        self.episode_value = 1.0;
        self.num_rebalances = 0;
        // A one-row episode has nothing left to step through
        self.state = if self.dataset.closed() {
            EnvState::Closed
        } else {
            EnvState::Active
        };

        debug!(date = %first.date(), remaining = self.dataset.remaining(), "environment reset");

        Ok(Observation {
            env: first,
            portfolio: self.portfolio.clone(),
        })
    }

    /// Step environment with action
    pub fn step(&mut self, action: EnvAction) -> Result<StepResult> {
        // Validate before touching any state
        let flag = action.rebalance_flag()?;
        if action.target.len() != self.num_assets() {
            return Err(GymError::InvalidAction(format!(
                "target has {} weights for {} assets",
                action.target.len(),
                self.num_assets()
            )));
        }

        let sample = match self.dataset.step() {
            Ok(sample) => sample,
            Err(e) => {
                if matches!(e, GymError::DatasetClosed(_)) && self.state == EnvState::Active {
                    self.state = EnvState::Closed;
                }
                return Err(e);
            }
        };

        let anchor = self.rebalance_price.as_ref().ok_or_else(|| {
            GymError::Internal("active episode without a price anchor".to_string())
        })?;

        let fee_rate = self.config.fee * flag;
        let reward = total_return(
            sample.prices(),
            &anchor.prices,
            self.portfolio.as_slice(),
            fee_rate,
        )?;

        self.rebalance_price = Some(sample.price.clone());
        self.step_count += 1;
        self.episode_value *= 1.0 + reward;
        let rebalanced = flag == 1.0;
        if rebalanced {
            self.num_rebalances += 1;
        }

        self.portfolio = match WeightVector::new(action.target) {
            Ok(weights) => weights,
            Err(e) => {
                warn!(
                    date = %sample.date(),
                    error = %e,
                    "portfolio invariant broken, closing episode"
                );
                self.close();
                return Err(GymError::Inconsistent(format!(
                    "portfolio weights should always sum to 1: {}",
                    e
                )));
            }
        };

        let done = self.dataset.closed();
        if done {
            self.state = EnvState::Closed;
            debug!(
                steps = self.step_count,
                episode_value = self.episode_value,
                rebalances = self.num_rebalances,
                "episode finished"
            );
        }

        let info = StepInfo {
            date: sample.date(),
            step: self.step_count,
            rebalanced,
            fee_rate,
            episode_value: self.episode_value,
            num_rebalances: self.num_rebalances,
            remaining: self.dataset.remaining(),
        };

        Ok(StepResult {
            observation: Observation {
                env: sample,
                portfolio: self.portfolio.clone(),
            },
            reward,
            done,
            info,
        })
    }

    /// Close the current episode. Always safe to call.
    pub fn close(&mut self) {
        self.dataset.close();
        self.state = EnvState::Closed;
    }

    pub fn state(&self) -> EnvState {
        self.state
    }

    /// Whether the episode can no longer be stepped
    pub fn is_done(&self) -> bool {
        self.state != EnvState::Active || self.dataset.closed()
    }

    pub fn portfolio(&self) -> &WeightVector {
        &self.portfolio
    }

    pub fn assets(&self) -> &[String] {
        self.dataset.assets()
    }

    pub fn num_assets(&self) -> usize {
        self.dataset.assets().len()
    }

    /// Length of `Observation::to_features`
    pub fn observation_dim(&self) -> usize {
        2 * self.num_assets()
    }

    /// Length of `EnvAction::to_vec`
    pub fn action_dim(&self) -> usize {
        1 + self.num_assets()
    }

    pub fn config(&self) -> &TradingEnvConfig {
        &self.config
    }

    pub fn dataset(&self) -> &EpisodicDataset {
        &self.dataset
    }

    pub fn step_count(&self) -> usize {
        self.step_count
    }

    pub fn episode_value(&self) -> f64 {
        self.episode_value
    }
}
