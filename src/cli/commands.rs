//! Command handlers for the `stonks` binary.

use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tabled::Tabled;
use tracing::info;

use super::output::{self, pct, OutputMode};
use crate::config::AppConfig;
use crate::domain::io::{load_price_table, load_series, save_price_table};
use crate::domain::yields::yield_index_table;
use crate::domain::{PriceTable, WeightVector};
use crate::error::{GymError, Result};
use crate::rl::training::{run_episodes, summarize_episodes, EpisodeResult, RolloutSummary};
use crate::rl::{
    reallocate as reallocate_weights, EpisodicDataset, RngSampler, StartSampler,
    TradingEnvironment,
};

fn config_error(message: impl Into<String>) -> GymError {
    GymError::Config(::config::ConfigError::Message(message.into()))
}

/// Load a price table, forward-filling gaps when `fill` is set
pub fn load_table(path: &Path, fill: bool) -> Result<PriceTable> {
    if fill {
        load_series(path)?.into_filled_table()
    } else {
        load_price_table(path)
    }
}

fn require_path(path: Option<PathBuf>) -> Result<PathBuf> {
    path.ok_or_else(|| config_error("no price file: pass --data or set dataset.data_path"))
}

#[derive(Debug, Serialize, Tabled)]
struct EpisodeRow {
    start: String,
    end: String,
    steps: usize,
    final_value: String,
    rebalances: usize,
    up_days: String,
    max_drawdown: String,
}

impl From<&EpisodeResult> for EpisodeRow {
    fn from(r: &EpisodeResult) -> Self {
        Self {
            start: r.start_date.to_string(),
            end: r.end_date.to_string(),
            steps: r.length,
            final_value: format!("{:.4}", r.final_value),
            rebalances: r.num_rebalances,
            up_days: pct(r.win_rate),
            max_drawdown: pct(r.max_drawdown),
        }
    }
}

#[derive(Debug, Serialize, Tabled)]
struct MetricRow {
    metric: &'static str,
    value: String,
}

fn summary_rows(summary: &RolloutSummary) -> Vec<MetricRow> {
    vec![
        MetricRow {
            metric: "Episodes",
            value: summary.num_episodes.to_string(),
        },
        MetricRow {
            metric: "Avg final value",
            value: format!("{:.4}", summary.avg_final_value),
        },
        MetricRow {
            metric: "Best final value",
            value: format!("{:.4}", summary.best_final_value),
        },
        MetricRow {
            metric: "Worst final value",
            value: format!("{:.4}", summary.worst_final_value),
        },
        MetricRow {
            metric: "Avg reward",
            value: format!("{:.4}", summary.avg_reward),
        },
        MetricRow {
            metric: "Episode win %",
            value: pct(summary.episode_win_rate),
        },
        MetricRow {
            metric: "Avg rebalances",
            value: format!("{:.1}", summary.avg_rebalances),
        },
        MetricRow {
            metric: "Avg max drawdown",
            value: pct(summary.avg_max_drawdown),
        },
    ]
}

#[derive(Debug, Serialize)]
struct SimulationReport<'a> {
    policy: &'a str,
    assets: &'a [String],
    period_days: usize,
    fee: f64,
    summary: RolloutSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    episodes: Option<&'a [EpisodeResult]>,
}

/// Run baseline-policy episodes and report the outcome
pub fn simulate(config: &AppConfig, verbose: bool, mode: OutputMode) -> Result<()> {
    config
        .validate()
        .map_err(|errors| config_error(errors.join("; ")))?;

    let path = require_path(config.dataset.data_path.clone())?;
    let table = Arc::new(load_table(&path, config.dataset.fill_missing)?);
    info!(
        path = %path.display(),
        rows = table.len(),
        assets = table.num_assets(),
        "loaded price table"
    );

    let sampler: Box<dyn StartSampler> = match config.dataset.seed {
        Some(seed) => Box::new(RngSampler::seeded(seed)),
        None => Box::new(RngSampler::from_entropy()),
    };
    let dataset = EpisodicDataset::with_sampler(
        Arc::clone(&table),
        config.dataset.period_days,
        sampler,
    )?;
    let mut env = TradingEnvironment::new(dataset, config.environment.clone())?;

    let target = match &config.environment.initial_portfolio {
        Some(weights) => WeightVector::new(weights.clone())?,
        None => WeightVector::equal(table.num_assets())?,
    };
    // Offset so the policy stream differs from the start sampler
    let policy_seed = config.dataset.seed.map(|s| s.wrapping_add(1));
    let mut policy = config
        .rollout
        .policy
        .build(target, config.rollout.rebalance_every, policy_seed)?;

    info!(
        "Starting {} episodes of {} days with policy '{}'",
        config.rollout.episodes,
        config.dataset.period_days,
        policy.name()
    );

    let results = run_episodes(&mut env, policy.as_mut(), config.rollout.episodes)?;
    let summary = summarize_episodes(&results);

    match mode {
        OutputMode::Json => output::print_json(&SimulationReport {
            policy: policy.name(),
            assets: table.assets(),
            period_days: config.dataset.period_days,
            fee: config.environment.fee,
            summary,
            episodes: verbose.then_some(results.as_slice()),
        }),
        OutputMode::Table => {
            if verbose {
                let rows: Vec<EpisodeRow> = results.iter().map(EpisodeRow::from).collect();
                output::print_items(&rows, mode)?;
            }
            output::print_kv("Policy", policy.name());
            output::print_kv("Assets", &table.assets().join(", "));
            output::print_items(&summary_rows(&summary), mode)
        }
    }
}

#[derive(Debug, Serialize, Tabled)]
struct TableInfo {
    assets: String,
    first_date: String,
    last_date: String,
    rows: usize,
    period_days: usize,
    valid_starts: usize,
}

/// Describe a price table
pub fn inspect(
    path: Option<PathBuf>,
    period_days: usize,
    fill: bool,
    mode: OutputMode,
) -> Result<()> {
    let path = require_path(path)?;
    let table = Arc::new(load_table(&path, fill)?);

    // A period longer than the history leaves no valid start
    let valid_starts = EpisodicDataset::new(Arc::clone(&table), period_days)
        .map(|ds| ds.num_valid_starts())
        .unwrap_or(0);

    output::print_item(
        &TableInfo {
            assets: table.assets().join(", "),
            first_date: table.first_date().to_string(),
            last_date: table.last_date().to_string(),
            rows: table.len(),
            period_days,
            valid_starts,
        },
        mode,
    )
}

#[derive(Debug, Serialize, Tabled)]
struct ReallocationRow {
    asset: usize,
    current: f64,
    instruction: f64,
    new_weight: String,
}

#[derive(Debug, Serialize)]
struct ReallocationReport {
    fee: f64,
    weights: Vec<f64>,
    instruction: Vec<f64>,
    new_weights: Vec<f64>,
    value_retained: f64,
}

/// Evaluate a rebalance instruction against current weights
pub fn reallocate(weights: &[f64], instruction: &[f64], fee: f64, mode: OutputMode) -> Result<()> {
    let new_weights = reallocate_weights(fee, weights, instruction)?;
    let value_retained: f64 = new_weights.iter().sum();

    match mode {
        OutputMode::Json => output::print_json(&ReallocationReport {
            fee,
            weights: weights.to_vec(),
            instruction: instruction.to_vec(),
            new_weights,
            value_retained,
        }),
        OutputMode::Table => {
            let rows: Vec<ReallocationRow> = weights
                .iter()
                .zip(instruction)
                .zip(&new_weights)
                .enumerate()
                .map(|(asset, ((current, instruction), new))| ReallocationRow {
                    asset,
                    current: *current,
                    instruction: *instruction,
                    new_weight: format!("{:.6}", new),
                })
                .collect();
            output::print_items(&rows, mode)?;
            output::print_kv("Value retained", &format!("{:.6}", value_retained));
            output::print_kv("Fee cost", &pct(1.0 - value_retained));
            Ok(())
        }
    }
}

/// Forward-fill a sparse CSV into a daily table
pub fn fill(input: &Path, output: &Path) -> Result<()> {
    let series = load_series(input)?;
    let observed = series.rows.len();
    let table = series.into_filled_table()?;
    save_price_table(&table, output)?;

    info!(observed, rows = table.len(), "wrote filled table");
    output::print_kv("Rows", &table.len().to_string());
    output::print_kv("Range", &format!("{} .. {}", table.first_date(), table.last_date()));
    Ok(())
}

/// Convert a yield column into a total-return index
pub fn yield_index(
    input: &Path,
    output: &Path,
    column: &str,
    maturity: f64,
    percent: bool,
) -> Result<()> {
    let yields = load_series(input)?.into_filled_table()?;
    let index = yield_index_table(&yields, column, maturity, percent)?;
    save_price_table(&index, output)?;

    info!(column, maturity, rows = index.len(), "wrote total-return index");
    output::print_kv("Rows", &index.len().to_string());
    if let Some(last) = index.prices_at(index.len() - 1).and_then(|p| p.first()) {
        output::print_kv("Final level", &format!("{:.6}", last));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_prices(dir: &Path) -> PathBuf {
        let path = dir.join("prices.csv");
        let mut csv = String::from("date,SPY,TLT\n");
        for day in 1..=20 {
            csv.push_str(&format!("2024-01-{:02},{},{}\n", day, 100 + day, 50));
        }
        fs::write(&path, csv).unwrap();
        path
    }

    #[test]
    fn test_simulate_runs_with_config() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.dataset.data_path = Some(write_prices(dir.path()));
        config.dataset.period_days = 5;
        config.dataset.seed = Some(1);
        config.rollout.episodes = 3;

        simulate(&config, true, OutputMode::Json).unwrap();
        simulate(&config, false, OutputMode::Table).unwrap();
    }

    #[test]
    fn test_simulate_requires_data() {
        let config = AppConfig::default();
        assert!(matches!(
            simulate(&config, false, OutputMode::Table),
            Err(GymError::Config(_))
        ));
    }

    #[test]
    fn test_gaps_rejected_unless_filling() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sparse.csv");
        fs::write(&path, "date,A\n2024-01-01,1.0\n2024-01-04,2.0\n").unwrap();

        let config = AppConfig::default();
        assert!(matches!(
            inspect(Some(path.clone()), 2, config.dataset.fill_missing, OutputMode::Json),
            Err(GymError::NonContiguousIndex(_))
        ));
        inspect(Some(path), 2, true, OutputMode::Json).unwrap();
    }

    #[test]
    fn test_fill_writes_daily_table() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("sparse.csv");
        let output = dir.path().join("daily.csv");
        fs::write(&input, "date,A\n2024-01-01,1.0\n2024-01-04,2.0\n").unwrap();

        fill(&input, &output).unwrap();
        let table = load_price_table(&output).unwrap();
        assert_eq!(table.len(), 4);
        assert_eq!(table.column("A").unwrap(), vec![1.0, 1.0, 1.0, 2.0]);
    }

    #[test]
    fn test_reallocate_rejects_bad_instruction() {
        assert!(reallocate(&[0.5, 0.5], &[-0.5, 0.5], 0.1, OutputMode::Table).is_err());
        assert!(reallocate(&[0.5, 0.5], &[-0.5, 1.0], 0.1, OutputMode::Json).is_ok());
    }
}
