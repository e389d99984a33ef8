use thiserror::Error;

/// Main error type for the portfolio gym
#[derive(Error, Debug)]
pub enum GymError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    // Price table shape errors
    #[error("Non-contiguous daily index: {0}")]
    NonContiguousIndex(String),

    #[error("Invalid episode period: {0}")]
    InvalidPeriod(String),

    #[error("Invalid price table: {0}")]
    InvalidPriceTable(String),

    // Episode lifecycle errors
    #[error("Dataset closed: {0}")]
    DatasetClosed(String),

    #[error("Series iterator exhausted after {rows} rows")]
    IterationExhausted { rows: usize },

    // Portfolio math errors
    #[error("Invalid allocation: {0}")]
    InvalidAllocation(String),

    #[error("Invalid price: {0}")]
    InvalidPrice(String),

    // Environment errors
    #[error("Invalid action: {0}")]
    InvalidAction(String),

    #[error("Inconsistent environment state: {0}")]
    Inconsistent(String),

    // Serialization errors
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl GymError {
    /// Whether the environment must be reset before it can be stepped again
    pub fn requires_reset(&self) -> bool {
        matches!(
            self,
            GymError::DatasetClosed(_)
                | GymError::IterationExhausted { .. }
                | GymError::Inconsistent(_)
        )
    }
}

/// Result type alias for GymError
pub type Result<T> = std::result::Result<T, GymError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requires_reset() {
        assert!(GymError::DatasetClosed("no episode".into()).requires_reset());
        assert!(GymError::IterationExhausted { rows: 3 }.requires_reset());
        assert!(GymError::Inconsistent("sum 0.9".into()).requires_reset());
        assert!(!GymError::InvalidAction("flag 2".into()).requires_reset());
        assert!(!GymError::InvalidAllocation("len".into()).requires_reset());
    }

    #[test]
    fn test_error_messages() {
        let err = GymError::IterationExhausted { rows: 5 };
        assert_eq!(err.to_string(), "Series iterator exhausted after 5 rows");

        let err = GymError::InvalidPeriod("period 0".into());
        assert!(err.to_string().contains("period 0"));
    }
}
