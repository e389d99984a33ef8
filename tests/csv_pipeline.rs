use std::fs;
use std::sync::Arc;

use stonks_gym::domain::io::{load_price_table, load_series, save_price_table};
use stonks_gym::domain::yields::yield_index_table;
use stonks_gym::rl::training::{run_episodes, summarize_episodes, ConstantMix};
use stonks_gym::rl::{EpisodicDataset, SequenceSampler, TradingEnvConfig, TradingEnvironment};
use stonks_gym::{GymError, PriceTable, WeightVector};

const SPARSE: &str = "\
date,EQ,UST10
2021-03-01,100.0,1.40
2021-03-02,101.0,
2021-03-04,99.5,1.45
2021-03-05,,1.50
2021-03-08,102.0,1.48
";

/// Sparse CSV -> filled daily table -> file -> strict reload keeps every value.
#[test]
fn sparse_csv_fills_to_daily_table() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sparse.csv");
    fs::write(&path, SPARSE).unwrap();

    let table = load_series(&path).unwrap().into_filled_table().unwrap();
    assert_eq!(table.len(), 8);
    assert_eq!(table.column("EQ").unwrap()[2], 101.0);
    assert_eq!(table.column("UST10").unwrap()[1], 1.40);

    let daily = dir.path().join("daily.csv");
    save_price_table(&table, &daily).unwrap();
    assert_eq!(load_price_table(&daily).unwrap(), table);
}

/// The strict loader refuses calendar gaps.
#[test]
fn strict_loader_rejects_gaps() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("gappy.csv");
    fs::write(&path, "date,A\n2021-01-01,1.0\n2021-01-03,1.0\n").unwrap();

    let err = load_price_table(&path).expect_err("a missing day should be rejected");
    assert!(matches!(err, GymError::NonContiguousIndex(_)), "got {err}");
}

/// Missing files surface with the path in the message.
#[test]
fn missing_file_reports_path() {
    let err = load_price_table("/nonexistent/prices.csv").expect_err("file does not exist");
    assert!(err.to_string().contains("/nonexistent/prices.csv"), "got {err}");
}

/// Yields become a bond index that joins an equity column and drives episodes.
#[test]
fn yield_index_joins_and_simulates() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sparse.csv");
    fs::write(&path, SPARSE).unwrap();
    let table = load_series(&path).unwrap().into_filled_table().unwrap();

    let bonds = yield_index_table(&table, "UST10", 10.0, true).unwrap();
    let equity = PriceTable::new(
        vec!["EQ".to_string()],
        table.dates().to_vec(),
        table.column("EQ").unwrap().into_iter().map(|p| vec![p]).collect(),
    )
    .unwrap();
    let joined = PriceTable::inner_join(&[&equity, &bonds]).unwrap();
    assert_eq!(joined.assets(), &["EQ".to_string(), "UST10".to_string()]);
    assert_eq!(joined.first_date(), bonds.first_date());
    assert_eq!(joined.len(), 7);

    let dataset = EpisodicDataset::with_sampler(
        Arc::new(joined),
        4,
        Box::new(SequenceSampler::new(vec![0, 1, 2, 3])),
    )
    .unwrap();
    let mut env = TradingEnvironment::new(dataset, TradingEnvConfig::default()).unwrap();
    let mut policy = ConstantMix::new(WeightVector::new(vec![0.6, 0.4]).unwrap(), 1).unwrap();

    let results = run_episodes(&mut env, &mut policy, 4).unwrap();
    let summary = summarize_episodes(&results);
    assert_eq!(summary.num_episodes, 4);
    assert!(results.iter().all(|r| r.length == 3));
    assert!(summary.avg_rebalances >= 1.0);
}
