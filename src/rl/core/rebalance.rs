//! Portfolio Rebalancing Arithmetic
//!
//! Pure functions behind the environment reward:
//!
//! - [`reallocate`]: sell-then-buy reallocation under a proportional fee that is
//!   charged on both legs of every trade
//! - [`total_return`]: fee-adjusted one-period return of a held portfolio
//!
//! Instructions are signed vectors aligned with the asset order. A negative
//! entry sells that fraction of the current weight; non-negative entries split
//! the freed capital and must sum to one.

use crate::domain::{sums_to_one, WEIGHT_TOLERANCE};
use crate::error::{GymError, Result};

/// Weights after executing `instruction` against `current` with a proportional `fee`.
///
/// The result does not sum to one when fees are charged; use [`normalize`] if a
/// weight vector is needed.
pub fn reallocate(fee: f64, current: &[f64], instruction: &[f64]) -> Result<Vec<f64>> {
    check_fee(fee)?;

    if current.len() != instruction.len() {
        return Err(GymError::InvalidAllocation(format!(
            "{} weights but {} instructions",
            current.len(),
            instruction.len()
        )));
    }
    if current.iter().chain(instruction).any(|v| !v.is_finite()) {
        return Err(GymError::InvalidAllocation(
            "weights and instructions must be finite".to_string(),
        ));
    }
    if !sums_to_one(current) {
        return Err(GymError::InvalidAllocation(format!(
            "current weights sum to {}, expected 1",
            current.iter().sum::<f64>()
        )));
    }
    if let Some(bad) = instruction.iter().find(|i| **i < -1.0) {
        return Err(GymError::InvalidAllocation(format!(
            "cannot sell more than the whole position (instruction {})",
            bad
        )));
    }

    let buy_total: f64 = instruction.iter().filter(|i| **i > 0.0).sum();
    if (buy_total - 1.0).abs() >= WEIGHT_TOLERANCE {
        return Err(GymError::InvalidAllocation(format!(
            "buy allocations sum to {}, expected 1",
            buy_total
        )));
    }

    let freed: f64 = current
        .iter()
        .zip(instruction)
        .filter(|(_, i)| **i < 0.0)
        .map(|(w, i)| -w * i * (1.0 - fee))
        .sum();

    Ok(current
        .iter()
        .zip(instruction)
        .map(|(w, i)| {
            if *i < 0.0 {
                w * (1.0 + i)
            } else {
                w + i * freed * (1.0 - fee)
            }
        })
        .collect())
}

/// Share of portfolio value that survives a rebalance
pub fn value_retained(fee: f64, current: &[f64], instruction: &[f64]) -> Result<f64> {
    Ok(reallocate(fee, current, instruction)?.iter().sum())
}

/// Share of portfolio value lost to fees by a rebalance
pub fn rebalance_cost(fee: f64, current: &[f64], instruction: &[f64]) -> Result<f64> {
    Ok(1.0 - value_retained(fee, current, instruction)?)
}

/// Rescale weights so they sum to one
pub fn normalize(weights: &[f64]) -> Result<Vec<f64>> {
    let total: f64 = weights.iter().sum();
    if !total.is_finite() || total <= 0.0 {
        return Err(GymError::InvalidAllocation(format!(
            "cannot normalize weights summing to {}",
            total
        )));
    }
    Ok(weights.iter().map(|w| w / total).collect())
}

/// Realized one-period return of holding `weights_before` from `price_before`
/// to `price_now`, net of `rebalance_fee`.
///
/// Callers charge the fee only when a rebalance happened, passing
/// `fee * rebalance_flag`.
pub fn total_return(
    price_now: &[f64],
    price_before: &[f64],
    weights_before: &[f64],
    rebalance_fee: f64,
) -> Result<f64> {
    check_fee(rebalance_fee)?;

    if price_now.len() != price_before.len() || price_now.len() != weights_before.len() {
        return Err(GymError::InvalidAllocation(format!(
            "length mismatch: {} current prices, {} previous prices, {} weights",
            price_now.len(),
            price_before.len(),
            weights_before.len()
        )));
    }

    let mut gross = 0.0;
    for ((now, before), w) in price_now.iter().zip(price_before).zip(weights_before) {
        if !before.is_finite() || *before <= 0.0 {
            return Err(GymError::InvalidPrice(format!(
                "previous price {} cannot be used as a return denominator",
                before
            )));
        }
        if !now.is_finite() {
            return Err(GymError::InvalidPrice(format!("current price {} is not finite", now)));
        }
        gross += w * now / before;
    }

    Ok((1.0 - rebalance_fee) * gross - 1.0)
}

fn check_fee(fee: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&fee) {
        return Err(GymError::InvalidAllocation(format!(
            "fee {} must lie in [0, 1]",
            fee
        )));
    }
    Ok(())
}
