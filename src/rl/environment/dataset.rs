//! Episodic Dataset
//!
//! Turns one continuous daily price table into repeatable fixed-length
//! episodes. Every `reset` samples a new start date and replaces the window
//! iterator; the table itself is shared and never copied.

use std::fmt;
use std::sync::Arc;

use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::series::WindowedSeriesIterator;
use crate::domain::{PriceRow, PriceTable};
use crate::error::{GymError, Result};

/// One step of the dataset: the current price row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub price: PriceRow,
}

impl Sample {
    pub fn date(&self) -> NaiveDate {
        self.price.date
    }

    pub fn prices(&self) -> &[f64] {
        &self.price.prices
    }
}

/// Source of episode start indices
#[cfg_attr(test, mockall::automock)]
pub trait StartSampler: Send {
    /// Pick a start index in `0..num_starts` (`num_starts >= 1`)
    fn sample_start(&mut self, num_starts: usize) -> usize;
}

/// Uniform sampler backed by any `rand` generator
pub struct RngSampler<R> {
    rng: R,
}

impl<R: Rng + Send> RngSampler<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }
}

impl RngSampler<StdRng> {
    /// Deterministic sampler for reproducible runs
    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }

    pub fn from_entropy() -> Self {
        Self::new(StdRng::from_entropy())
    }
}

impl<R: Rng + Send> StartSampler for RngSampler<R> {
    fn sample_start(&mut self, num_starts: usize) -> usize {
        self.rng.gen_range(0..num_starts)
    }
}

/// Replays a fixed list of start indices, cycling when it runs out
#[derive(Debug, Clone)]
pub struct SequenceSampler {
    starts: Vec<usize>,
    next: usize,
}

impl SequenceSampler {
    pub fn new(starts: Vec<usize>) -> Self {
        Self { starts, next: 0 }
    }
}

impl StartSampler for SequenceSampler {
    fn sample_start(&mut self, _num_starts: usize) -> usize {
        if self.starts.is_empty() {
            return 0;
        }
        let start = self.starts[self.next % self.starts.len()];
        self.next += 1;
        start
    }
}

/// Fixed-period episodes over a shared price table.
///
/// `reset` does not return a sample: the first row of each episode is read by
/// the first `step`.
pub struct EpisodicDataset {
    table: Arc<PriceTable>,
    period_days: usize,
    sampler: Box<dyn StartSampler>,
    iter: Option<WindowedSeriesIterator>,
    episodes: usize,
}

impl EpisodicDataset {
    /// Create a dataset with an entropy-seeded start sampler
    pub fn new(table: Arc<PriceTable>, period_days: usize) -> Result<Self> {
        Self::with_sampler(table, period_days, Box::new(RngSampler::from_entropy()))
    }

    /// Create a dataset drawing episode starts from `sampler`
    pub fn with_sampler(
        table: Arc<PriceTable>,
        period_days: usize,
        sampler: Box<dyn StartSampler>,
    ) -> Result<Self> {
        if period_days == 0 {
            return Err(GymError::InvalidPeriod(
                "episode period must be at least one day".to_string(),
            ));
        }
        if period_days > table.len() {
            return Err(GymError::InvalidPeriod(format!(
                "period of {} days exceeds the {} days of history ({} to {})",
                period_days,
                table.len(),
                table.first_date(),
                table.last_date()
            )));
        }

        Ok(Self {
            table,
            period_days,
            sampler,
            iter: None,
            episodes: 0,
        })
    }

    /// Start a new episode over a freshly sampled window
    pub fn reset(&mut self) -> Result<()> {
        // The previous episode ends even if no new one can be drawn
        self.iter = None;
        let num_starts = self.num_valid_starts();
        let start = self.sampler.sample_start(num_starts);
        if start >= num_starts {
            return Err(GymError::Internal(format!(
                "start sampler returned {} but only {} starts are valid",
                start, num_starts
            )));
        }

        self.iter = Some(WindowedSeriesIterator::new(
            Arc::clone(&self.table),
            start..start + self.period_days,
        )?);
        self.episodes += 1;

        debug!(
            episode = self.episodes,
            start,
            start_date = ?self.table.date(start),
            period_days = self.period_days,
            "dataset reset"
        );
        Ok(())
    }

    /// Advance one day
    pub fn step(&mut self) -> Result<Sample> {
        match self.iter.as_mut() {
            Some(iter) if !iter.is_exhausted() => {
                let (price, _is_last) = iter.next_row()?;
                Ok(Sample { price })
            }
            Some(_) => Err(GymError::DatasetClosed(
                "episode exhausted; call reset to start another".to_string(),
            )),
            None => Err(GymError::DatasetClosed(
                "no active episode; call reset first".to_string(),
            )),
        }
    }

    /// Drop the current episode. Safe to call repeatedly.
    pub fn close(&mut self) {
        self.iter = None;
    }

    /// No live episode, or the live one has produced its last row
    pub fn closed(&self) -> bool {
        self.iter.as_ref().map_or(true, |iter| iter.is_exhausted())
    }

    /// Number of start indices that leave room for a full episode
    pub fn num_valid_starts(&self) -> usize {
        self.table.len() - self.period_days + 1
    }

    /// First and last date of the current episode
    pub fn window(&self) -> Option<(NaiveDate, NaiveDate)> {
        let range = self.iter.as_ref()?.window();
        Some((self.table.date(range.start)?, self.table.date(range.end - 1)?))
    }

    /// Rows left in the current episode
    pub fn remaining(&self) -> usize {
        self.iter.as_ref().map_or(0, |iter| iter.remaining())
    }

    pub fn period_days(&self) -> usize {
        self.period_days
    }

    pub fn assets(&self) -> &[String] {
        self.table.assets()
    }

    pub fn table(&self) -> &Arc<PriceTable> {
        &self.table
    }

    /// Episodes started since construction
    pub fn episodes(&self) -> usize {
        self.episodes
    }
}

impl fmt::Display for EpisodicDataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = if self.closed() { "closed" } else { "active" };
        write!(
            f,
            "<Dataset period={}d; assets={:?}; {}>",
            self.period_days,
            self.table.assets(),
            state
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn table(rows: usize) -> Arc<PriceTable> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        Arc::new(
            PriceTable::new(
                vec!["A".to_string(), "B".to_string()],
                (0..rows).map(|i| start + Duration::days(i as i64)).collect(),
                (0..rows)
                    .map(|i| vec![100.0 + i as f64, 50.0 - i as f64 * 0.5])
                    .collect(),
            )
            .unwrap(),
        )
    }

    #[test]
    fn test_ten_rows_period_three() {
        let mut sampler = MockStartSampler::new();
        sampler
            .expect_sample_start()
            .withf(|n| *n == 8)
            .times(1)
            .return_const(7usize);

        let mut ds = EpisodicDataset::with_sampler(table(10), 3, Box::new(sampler)).unwrap();
        assert_eq!(ds.num_valid_starts(), 8);
        assert!(ds.closed());

        ds.reset().unwrap();
        assert!(!ds.closed());

        let first = ds.step().unwrap();
        assert_eq!(first.prices(), &[107.0, 46.5]);
        ds.step().unwrap();
        assert!(!ds.closed());
        let last = ds.step().unwrap();
        assert_eq!(last.date(), NaiveDate::from_ymd_opt(2024, 1, 10).unwrap());
        assert!(ds.closed());

        assert!(matches!(ds.step(), Err(GymError::DatasetClosed(_))));
    }

    #[test]
    fn test_every_reset_yields_full_period() {
        let mut ds =
            EpisodicDataset::with_sampler(table(30), 7, Box::new(RngSampler::seeded(42)))
                .unwrap();

        for _ in 0..20 {
            ds.reset().unwrap();
            let mut rows = 0;
            let mut prev: Option<NaiveDate> = None;
            while !ds.closed() {
                let sample = ds.step().unwrap();
                if let Some(prev) = prev {
                    assert_eq!((sample.date() - prev).num_days(), 1);
                }
                prev = Some(sample.date());
                rows += 1;
            }
            assert_eq!(rows, 7);
            assert!(matches!(ds.step(), Err(GymError::DatasetClosed(_))));
        }
        assert_eq!(ds.episodes(), 20);
    }

    #[test]
    fn test_step_before_reset() {
        let mut ds = EpisodicDataset::new(table(5), 2).unwrap();
        assert!(matches!(ds.step(), Err(GymError::DatasetClosed(_))));
    }

    #[test]
    fn test_close_is_idempotent() {
        let mut ds = EpisodicDataset::new(table(5), 2).unwrap();
        ds.reset().unwrap();
        ds.close();
        ds.close();
        assert!(ds.closed());
        assert_eq!(ds.remaining(), 0);
        assert!(matches!(ds.step(), Err(GymError::DatasetClosed(_))));
    }

    #[test]
    fn test_invalid_period() {
        assert!(matches!(
            EpisodicDataset::new(table(5), 6),
            Err(GymError::InvalidPeriod(_))
        ));
        assert!(matches!(
            EpisodicDataset::new(table(5), 0),
            Err(GymError::InvalidPeriod(_))
        ));
        // the whole history as one episode is allowed
        let ds = EpisodicDataset::new(table(5), 5).unwrap();
        assert_eq!(ds.num_valid_starts(), 1);
    }

    #[test]
    fn test_sampler_out_of_range() {
        let mut ds =
            EpisodicDataset::with_sampler(table(5), 3, Box::new(SequenceSampler::new(vec![3])))
                .unwrap();
        assert!(matches!(ds.reset(), Err(GymError::Internal(_))));
        assert!(ds.closed());
    }

    #[test]
    fn test_failed_reset_drops_live_episode() {
        let mut ds =
            EpisodicDataset::with_sampler(table(3), 2, Box::new(SequenceSampler::new(vec![0, 5])))
                .unwrap();
        ds.reset().unwrap();
        ds.step().unwrap();
        assert!(!ds.closed());

        assert!(matches!(ds.reset(), Err(GymError::Internal(_))));
        assert!(ds.closed());
        assert_eq!(ds.window(), None);
        assert!(matches!(ds.step(), Err(GymError::DatasetClosed(_))));
    }

    #[test]
    fn test_sequence_sampler_windows() {
        let mut ds = EpisodicDataset::with_sampler(
            table(10),
            4,
            Box::new(SequenceSampler::new(vec![0, 6])),
        )
        .unwrap();

        ds.reset().unwrap();
        let (start, end) = ds.window().unwrap();
        assert_eq!(start, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(end, NaiveDate::from_ymd_opt(2024, 1, 4).unwrap());

        ds.reset().unwrap();
        let (start, end) = ds.window().unwrap();
        assert_eq!(start, NaiveDate::from_ymd_opt(2024, 1, 7).unwrap());
        assert_eq!(end, NaiveDate::from_ymd_opt(2024, 1, 10).unwrap());
        assert_eq!(ds.remaining(), 4);
    }

    #[test]
    fn test_display() {
        let ds = EpisodicDataset::new(table(5), 2).unwrap();
        assert_eq!(ds.to_string(), "<Dataset period=2d; assets=[\"A\", \"B\"]; closed>");
    }
}
