//! Rollout Infrastructure
//!
//! Episode runners, baseline policies, and evaluation summaries.

pub mod rollout;

pub use rollout::{
    run_episode, run_episodes, summarize_episodes, BuyAndHold, ConstantMix, EpisodeResult, Policy,
    PolicyKind, RandomAllocation, RolloutSummary,
};
