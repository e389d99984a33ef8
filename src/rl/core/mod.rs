//! Core RL abstractions
//!
//! Portfolio arithmetic shared by the environment and the rollout tooling.

pub mod rebalance;

pub use rebalance::{normalize, reallocate, rebalance_cost, total_return, value_retained};
