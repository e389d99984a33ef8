//! Portfolio weight vectors

use serde::{Deserialize, Serialize};

use crate::error::{GymError, Result};

/// Tolerance for every "weights sum to one" check
pub const WEIGHT_TOLERANCE: f64 = 1e-10;

/// Whether `values` sum to one within `WEIGHT_TOLERANCE`
pub fn sums_to_one(values: &[f64]) -> bool {
    (values.iter().sum::<f64>() - 1.0).abs() < WEIGHT_TOLERANCE
}

/// Fractional capital allocation across assets.
///
/// Entries are finite and non-negative and sum to one. The invariant is checked
/// on construction and never repaired silently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct WeightVector(Vec<f64>);

impl WeightVector {
    pub fn new(weights: Vec<f64>) -> Result<Self> {
        if weights.is_empty() {
            return Err(GymError::InvalidAllocation(
                "weight vector is empty".to_string(),
            ));
        }
        if let Some(bad) = weights.iter().find(|w| !w.is_finite() || **w < 0.0) {
            return Err(GymError::InvalidAllocation(format!(
                "weight {} is negative or not finite",
                bad
            )));
        }
        if !sums_to_one(&weights) {
            return Err(GymError::InvalidAllocation(format!(
                "weights sum to {}, expected 1",
                weights.iter().sum::<f64>()
            )));
        }
        Ok(Self(weights))
    }

    /// Equal allocation across `n` assets
    pub fn equal(n: usize) -> Result<Self> {
        if n == 0 {
            return Err(GymError::InvalidAllocation(
                "cannot split capital across zero assets".to_string(),
            ));
        }
        Self::new(vec![1.0 / n as f64; n])
    }

    /// Scale raw non-negative values so they sum to one
    pub fn normalized(raw: &[f64]) -> Result<Self> {
        let total: f64 = raw.iter().sum();
        if !total.is_finite() || total <= 0.0 {
            return Err(GymError::InvalidAllocation(format!(
                "cannot normalize values summing to {}",
                total
            )));
        }
        Self::new(raw.iter().map(|v| v / total).collect())
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<f64> {
        self.0.get(idx).copied()
    }

    pub fn into_inner(self) -> Vec<f64> {
        self.0
    }
}

impl TryFrom<Vec<f64>> for WeightVector {
    type Error = GymError;

    fn try_from(weights: Vec<f64>) -> Result<Self> {
        Self::new(weights)
    }
}

impl From<WeightVector> for Vec<f64> {
    fn from(weights: WeightVector) -> Self {
        weights.0
    }
}
