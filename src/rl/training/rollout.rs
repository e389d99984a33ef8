//! Episode Rollouts
//!
//! Drives a [`TradingEnvironment`] with a [`Policy`] and aggregates the
//! outcome of many episodes. The baseline policies here need no training and
//! give reference numbers to compare learned agents against.

use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::domain::{WeightVector, WEIGHT_TOLERANCE};
use crate::error::{GymError, Result};
use crate::rl::core::normalize;
use crate::rl::environment::{EnvAction, Observation, TradingEnvironment};

/// Decides an action from the latest observation
pub trait Policy {
    /// Short name for logs and reports
    fn name(&self) -> &str;

    /// Called at the start of every episode
    fn reset(&mut self) {}

    fn act(&mut self, observation: &Observation) -> Result<EnvAction>;
}

/// Portfolio weights after prices have moved since the last observation.
///
/// The environment reports the weights it was handed; a policy that wants to
/// leave positions untouched has to let them float with prices itself. A
/// target governs returns from the step after it is submitted, so the drifted
/// weights trail the true holdings by one day.
#[derive(Debug, Clone, Default)]
pub struct PriceDrift {
    last_prices: Option<Vec<f64>>,
}

impl PriceDrift {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget the previous prices at an episode boundary
    pub fn reset(&mut self) {
        self.last_prices = None;
    }

    /// `w_i * now_i / before_i`, renormalized. Unchanged on the first call.
    pub fn drifted(&mut self, observation: &Observation) -> Result<Vec<f64>> {
        let prices = observation.prices();
        let weights = observation.weights();

        let drifted = match &self.last_prices {
            Some(before) if before.len() == prices.len() => {
                let grown: Vec<f64> = weights
                    .iter()
                    .zip(prices)
                    .zip(before)
                    .map(|((w, now), before)| w * now / before)
                    .collect();
                normalize(&grown)?
            }
            _ => weights.to_vec(),
        };

        self.last_prices = Some(prices.to_vec());
        Ok(drifted)
    }
}

fn same_weights(a: &[f64], b: &[f64]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| (x - y).abs() < WEIGHT_TOLERANCE)
}

/// Never trades: lets the starting positions float with prices
#[derive(Debug, Clone, Default)]
pub struct BuyAndHold {
    drift: PriceDrift,
}

impl BuyAndHold {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Policy for BuyAndHold {
    fn name(&self) -> &str {
        "buy-and-hold"
    }

    fn reset(&mut self) {
        self.drift.reset();
    }

    fn act(&mut self, observation: &Observation) -> Result<EnvAction> {
        Ok(EnvAction::hold(self.drift.drifted(observation)?))
    }
}

/// Rebalances back to fixed target weights every `every` steps
#[derive(Debug, Clone)]
pub struct ConstantMix {
    target: WeightVector,
    every: usize,
    steps: usize,
    drift: PriceDrift,
}

impl ConstantMix {
    pub fn new(target: WeightVector, every: usize) -> Result<Self> {
        if every == 0 {
            return Err(GymError::InvalidPeriod(
                "rebalance interval must be at least one step".to_string(),
            ));
        }
        Ok(Self {
            target,
            every,
            steps: 0,
            drift: PriceDrift::new(),
        })
    }

    pub fn target(&self) -> &WeightVector {
        &self.target
    }
}

impl Policy for ConstantMix {
    fn name(&self) -> &str {
        "constant-mix"
    }

    fn reset(&mut self) {
        self.steps = 0;
        self.drift.reset();
    }

    fn act(&mut self, observation: &Observation) -> Result<EnvAction> {
        self.steps += 1;
        let current = self.drift.drifted(observation)?;
        if self.steps % self.every == 0 && !same_weights(&current, self.target.as_slice()) {
            Ok(EnvAction::rebalance(self.target.as_slice().to_vec()))
        } else {
            Ok(EnvAction::hold(current))
        }
    }
}

/// Moves into uniformly drawn, normalized weights every `every` steps
#[derive(Debug, Clone)]
pub struct RandomAllocation {
    rng: StdRng,
    every: usize,
    steps: usize,
    drift: PriceDrift,
}

impl RandomAllocation {
    pub fn new(rng: StdRng, every: usize) -> Result<Self> {
        if every == 0 {
            return Err(GymError::InvalidPeriod(
                "rebalance interval must be at least one step".to_string(),
            ));
        }
        Ok(Self {
            rng,
            every,
            steps: 0,
            drift: PriceDrift::new(),
        })
    }

    pub fn seeded(seed: u64, every: usize) -> Result<Self> {
        Self::new(StdRng::seed_from_u64(seed), every)
    }

    pub fn from_entropy(every: usize) -> Result<Self> {
        Self::new(StdRng::from_entropy(), every)
    }
}

impl Policy for RandomAllocation {
    fn name(&self) -> &str {
        "random"
    }

    fn reset(&mut self) {
        self.steps = 0;
        self.drift.reset();
    }

    fn act(&mut self, observation: &Observation) -> Result<EnvAction> {
        self.steps += 1;
        let current = self.drift.drifted(observation)?;
        if self.steps % self.every != 0 {
            return Ok(EnvAction::hold(current));
        }

        // Shift away from zero so the draw can always be normalized
        let raw: Vec<f64> = (0..current.len())
            .map(|_| self.rng.gen::<f64>() + f64::EPSILON)
            .collect();
        let target = WeightVector::normalized(&raw)?;
        Ok(EnvAction::rebalance(target.into_inner()))
    }
}

/// Baseline policy selector used by configuration and the CLI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum PolicyKind {
    BuyAndHold,
    ConstantMix,
    Random,
}

impl PolicyKind {
    /// Build the policy.
    ///
    /// `target` is the constant-mix allocation; `seed` makes the random policy
    /// reproducible.
    pub fn build(
        self,
        target: WeightVector,
        rebalance_every: usize,
        seed: Option<u64>,
    ) -> Result<Box<dyn Policy>> {
        Ok(match self {
            PolicyKind::BuyAndHold => Box::new(BuyAndHold::new()),
            PolicyKind::ConstantMix => Box::new(ConstantMix::new(target, rebalance_every)?),
            PolicyKind::Random => Box::new(match seed {
                Some(seed) => RandomAllocation::seeded(seed, rebalance_every)?,
                None => RandomAllocation::from_entropy(rebalance_every)?,
            }),
        })
    }
}

/// Outcome of a single episode
#[derive(Debug, Clone, Serialize)]
pub struct EpisodeResult {
    /// Date of the first observation
    pub start_date: NaiveDate,
    /// Date of the last observation
    pub end_date: NaiveDate,
    /// Steps taken
    pub length: usize,
    /// Sum of step rewards
    pub total_reward: f64,
    /// Compounded portfolio value, starting at 1
    pub final_value: f64,
    /// Rebalances charged
    pub num_rebalances: usize,
    /// Share of steps with a positive reward
    pub win_rate: f64,
    /// Largest peak-to-trough fall of the portfolio value
    pub max_drawdown: f64,
}

/// Run one full episode, resetting the environment first
pub fn run_episode(env: &mut TradingEnvironment, policy: &mut dyn Policy) -> Result<EpisodeResult> {
    let mut obs = env.reset()?;
    policy.reset();

    let start_date = obs.date();
    let mut total_reward = 0.0;
    let mut length = 0;
    let mut wins = 0;
    let mut num_rebalances = 0;
    let mut value = 1.0f64;
    let mut peak = 1.0f64;
    let mut max_drawdown = 0.0f64;

    while !env.is_done() {
        let action = policy.act(&obs)?;
        let result = env.step(action)?;

        total_reward += result.reward;
        length += 1;
        if result.reward > 0.0 {
            wins += 1;
        }
        num_rebalances = result.info.num_rebalances;
        value = result.info.episode_value;
        peak = peak.max(value);
        max_drawdown = max_drawdown.max((peak - value) / peak);

        obs = result.observation;
    }

    let episode = EpisodeResult {
        start_date,
        end_date: obs.date(),
        length,
        total_reward,
        final_value: value,
        num_rebalances,
        win_rate: if length > 0 { wins as f64 / length as f64 } else { 0.0 },
        max_drawdown,
    };

    debug!(
        policy = policy.name(),
        start = %episode.start_date,
        end = %episode.end_date,
        final_value = episode.final_value,
        rebalances = episode.num_rebalances,
        "episode complete"
    );

    Ok(episode)
}

/// Run `num_episodes` episodes back to back
pub fn run_episodes(
    env: &mut TradingEnvironment,
    policy: &mut dyn Policy,
    num_episodes: usize,
) -> Result<Vec<EpisodeResult>> {
    let mut results = Vec::with_capacity(num_episodes);

    for episode in 0..num_episodes {
        let result = run_episode(env, policy)?;

        if (episode + 1) % 10 == 0 {
            info!(
                "Episode {}/{}: value={:.4}, rebalances={}, window={}..{}",
                episode + 1,
                num_episodes,
                result.final_value,
                result.num_rebalances,
                result.start_date,
                result.end_date
            );
        }

        results.push(result);
    }

    Ok(results)
}

/// Summary statistics over many episodes
#[derive(Debug, Clone, Default, Serialize)]
pub struct RolloutSummary {
    /// Number of episodes
    pub num_episodes: usize,
    /// Average final value
    pub avg_final_value: f64,
    /// Best final value
    pub best_final_value: f64,
    /// Worst final value
    pub worst_final_value: f64,
    /// Average summed reward
    pub avg_reward: f64,
    /// Share of episodes that ended above their starting value
    pub episode_win_rate: f64,
    /// Average rebalances per episode
    pub avg_rebalances: f64,
    /// Average within-episode drawdown
    pub avg_max_drawdown: f64,
}

/// Summarize rollout results
pub fn summarize_episodes(results: &[EpisodeResult]) -> RolloutSummary {
    if results.is_empty() {
        return RolloutSummary::default();
    }

    let n = results.len() as f64;

    let avg_final_value = results.iter().map(|r| r.final_value).sum::<f64>() / n;
    let best_final_value = results
        .iter()
        .map(|r| r.final_value)
        .fold(f64::NEG_INFINITY, f64::max);
    let worst_final_value = results
        .iter()
        .map(|r| r.final_value)
        .fold(f64::INFINITY, f64::min);
    let avg_reward = results.iter().map(|r| r.total_reward).sum::<f64>() / n;
    let avg_rebalances = results.iter().map(|r| r.num_rebalances as f64).sum::<f64>() / n;
    let avg_max_drawdown = results.iter().map(|r| r.max_drawdown).sum::<f64>() / n;

    let winning_episodes = results.iter().filter(|r| r.final_value > 1.0).count();

    RolloutSummary {
        num_episodes: results.len(),
        avg_final_value,
        best_final_value,
        worst_final_value,
        avg_reward,
        episode_win_rate: winning_episodes as f64 / n,
        avg_rebalances,
        avg_max_drawdown,
    }
}
