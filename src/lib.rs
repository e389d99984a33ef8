pub mod cli;
pub mod config;
pub mod domain;
pub mod error;
pub mod rl;

pub use config::AppConfig;
pub use domain::{PriceRow, PriceTable, WeightVector};
pub use error::{GymError, Result};
pub use rl::{
    reallocate, total_return, EnvAction, EpisodicDataset, Observation, StepResult,
    TradingEnvConfig, TradingEnvironment, WindowedSeriesIterator,
};
