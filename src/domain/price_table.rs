//! Daily Price Tables
//!
//! A `PriceTable` is an immutable, gap-free daily series with one column per
//! asset. Every constructor validates the index, so downstream code can rely on
//! exactly one row per calendar day.

use std::collections::HashSet;
use std::ops::Range;

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::{GymError, Result};

/// Snapshot of all asset prices at one date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRow {
    /// Calendar date of the snapshot
    pub date: NaiveDate,
    /// One closing price per asset, in table column order
    pub prices: Vec<f64>,
}

impl PriceRow {
    /// Price of the asset at `idx`
    pub fn price(&self, idx: usize) -> Option<f64> {
        self.prices.get(idx).copied()
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }
}

/// A dated record that may have missing values, as read from a raw source
#[derive(Debug, Clone, PartialEq)]
pub struct DatedValues {
    pub date: NaiveDate,
    pub values: Vec<Option<f64>>,
}

/// Gap-free daily price table
#[derive(Debug, Clone, PartialEq)]
pub struct PriceTable {
    assets: Vec<String>,
    dates: Vec<NaiveDate>,
    /// Row-major prices, `dates.len() * assets.len()`
    prices: Vec<f64>,
}

impl PriceTable {
    /// Create a table from complete rows.
    ///
    /// Fails with `NonContiguousIndex` when dates skip a day, repeat, or run
    /// backwards, and with `InvalidPrice` on a non-positive or non-finite price.
    pub fn new(assets: Vec<String>, dates: Vec<NaiveDate>, rows: Vec<Vec<f64>>) -> Result<Self> {
        validate_assets(&assets)?;

        if dates.is_empty() {
            return Err(GymError::InvalidPriceTable(
                "price table has no rows".to_string(),
            ));
        }
        if rows.len() != dates.len() {
            return Err(GymError::InvalidPriceTable(format!(
                "{} dates but {} price rows",
                dates.len(),
                rows.len()
            )));
        }

        check_daily(&dates)?;

        let mut prices = Vec::with_capacity(dates.len() * assets.len());
        for (date, row) in dates.iter().zip(rows) {
            if row.len() != assets.len() {
                return Err(GymError::InvalidPriceTable(format!(
                    "row {} has {} prices, expected {}",
                    date,
                    row.len(),
                    assets.len()
                )));
            }
            for (asset, price) in assets.iter().zip(&row) {
                if !price.is_finite() || *price <= 0.0 {
                    return Err(GymError::InvalidPrice(format!(
                        "{} price on {} is {}",
                        asset, date, price
                    )));
                }
            }
            prices.extend(row);
        }

        Ok(Self {
            assets,
            dates,
            prices,
        })
    }

    /// Build a daily table from sparse observations.
    ///
    /// Observations must be strictly ascending by date. Calendar days absent
    /// from the input and missing values are forward-filled from the last known
    /// value; leading days that still miss a value for some asset are dropped.
    pub fn from_observations(assets: Vec<String>, observations: Vec<DatedValues>) -> Result<Self> {
        validate_assets(&assets)?;

        let (first, last) = match (observations.first(), observations.last()) {
            (Some(first), Some(last)) => (first.date, last.date),
            _ => {
                return Err(GymError::InvalidPriceTable(
                    "no observations to build a table from".to_string(),
                ))
            }
        };

        for pair in observations.windows(2) {
            if pair[1].date <= pair[0].date {
                return Err(GymError::NonContiguousIndex(format!(
                    "observation dates must be strictly ascending: {} follows {}",
                    pair[1].date, pair[0].date
                )));
            }
        }

        let mut last_known: Vec<Option<f64>> = vec![None; assets.len()];
        let mut pending = observations.into_iter().peekable();
        let mut dates = Vec::new();
        let mut rows = Vec::new();

        let mut date = first;
        while date <= last {
            if let Some(obs) = pending.next_if(|obs| obs.date == date) {
                if obs.values.len() != assets.len() {
                    return Err(GymError::InvalidPriceTable(format!(
                        "observation on {} has {} values, expected {}",
                        obs.date,
                        obs.values.len(),
                        assets.len()
                    )));
                }
                for (known, value) in last_known.iter_mut().zip(obs.values) {
                    if value.is_some() {
                        *known = value;
                    }
                }
            }

            if let Some(row) = last_known.iter().copied().collect::<Option<Vec<f64>>>() {
                dates.push(date);
                rows.push(row);
            }

            date += Duration::days(1);
        }

        if dates.is_empty() {
            return Err(GymError::InvalidPriceTable(
                "no date has a value for every asset".to_string(),
            ));
        }

        Self::new(assets, dates, rows)
    }

    /// Align tables on their common date range and concatenate their columns.
    pub fn inner_join(tables: &[&PriceTable]) -> Result<Self> {
        let start = tables.iter().map(|t| t.first_date()).max();
        let end = tables.iter().map(|t| t.last_date()).min();
        let (start, end) = match (start, end) {
            (Some(start), Some(end)) => (start, end),
            _ => {
                return Err(GymError::InvalidPriceTable(
                    "nothing to join".to_string(),
                ))
            }
        };
        if start > end {
            return Err(GymError::InvalidPriceTable(format!(
                "tables do not overlap (latest start {}, earliest end {})",
                start, end
            )));
        }

        let assets: Vec<String> = tables
            .iter()
            .flat_map(|t| t.assets.iter().cloned())
            .collect();

        let mut dates = Vec::new();
        let mut rows = Vec::new();
        let mut date = start;
        while date <= end {
            let mut row = Vec::with_capacity(assets.len());
            for table in tables {
                let prices = table.index_of(date).and_then(|idx| table.prices_at(idx));
                match prices {
                    Some(prices) => row.extend_from_slice(prices),
                    None => {
                        return Err(GymError::Internal(format!(
                            "date {} missing inside the overlap of a validated table",
                            date
                        )))
                    }
                }
            }
            dates.push(date);
            rows.push(row);
            date += Duration::days(1);
        }

        Self::new(assets, dates, rows)
    }

    /// Copy of the rows in `range`
    pub fn slice_rows(&self, range: Range<usize>) -> Result<Self> {
        if range.start >= range.end || range.end > self.len() {
            return Err(GymError::InvalidPeriod(format!(
                "row range {:?} is empty or exceeds {} rows",
                range,
                self.len()
            )));
        }
        let width = self.num_assets();
        Ok(Self {
            assets: self.assets.clone(),
            dates: self.dates[range.clone()].to_vec(),
            prices: self.prices[range.start * width..range.end * width].to_vec(),
        })
    }

    pub fn assets(&self) -> &[String] {
        &self.assets
    }

    pub fn num_assets(&self) -> usize {
        self.assets.len()
    }

    /// Number of daily rows
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn first_date(&self) -> NaiveDate {
        self.dates[0]
    }

    pub fn last_date(&self) -> NaiveDate {
        self.dates[self.dates.len() - 1]
    }

    /// Row index of `date`, derived from the contiguous index
    pub fn index_of(&self, date: NaiveDate) -> Option<usize> {
        let offset = (date - self.first_date()).num_days();
        usize::try_from(offset).ok().filter(|idx| *idx < self.len())
    }

    pub fn date(&self, idx: usize) -> Option<NaiveDate> {
        self.dates.get(idx).copied()
    }

    /// Prices of row `idx` without copying
    pub fn prices_at(&self, idx: usize) -> Option<&[f64]> {
        if idx >= self.len() {
            return None;
        }
        let width = self.num_assets();
        Some(&self.prices[idx * width..(idx + 1) * width])
    }

    /// Owned snapshot of row `idx`
    pub fn row(&self, idx: usize) -> Option<PriceRow> {
        let prices = self.prices_at(idx)?;
        Some(PriceRow {
            date: self.dates[idx],
            prices: prices.to_vec(),
        })
    }

    /// All prices of one asset
    pub fn column(&self, asset: &str) -> Option<Vec<f64>> {
        let col = self.assets.iter().position(|a| a == asset)?;
        Some(
            self.prices
                .chunks(self.num_assets())
                .map(|row| row[col])
                .collect(),
        )
    }
}

fn validate_assets(assets: &[String]) -> Result<()> {
    if assets.is_empty() {
        return Err(GymError::InvalidPriceTable(
            "price table needs at least one asset".to_string(),
        ));
    }
    let mut seen = HashSet::new();
    for asset in assets {
        if !seen.insert(asset.as_str()) {
            return Err(GymError::InvalidPriceTable(format!(
                "duplicate asset column {:?}",
                asset
            )));
        }
    }
    Ok(())
}

/// Every date must follow its predecessor by exactly one day
fn check_daily(dates: &[NaiveDate]) -> Result<()> {
    for pair in dates.windows(2) {
        let step = (pair[1] - pair[0]).num_days();
        if step != 1 {
            let problem = match step {
                0 => "duplicate date".to_string(),
                s if s < 0 => "dates out of order".to_string(),
                s => format!("gap of {} days", s - 1),
            };
            return Err(GymError::NonContiguousIndex(format!(
                "{} between {} and {}",
                problem, pair[0], pair[1]
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn assets(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_table_creation() {
        let table = PriceTable::new(
            assets(&["A", "B"]),
            vec![d(2024, 1, 1), d(2024, 1, 2), d(2024, 1, 3)],
            vec![vec![1.0, 10.0], vec![2.0, 20.0], vec![3.0, 30.0]],
        )
        .unwrap();

        assert_eq!(table.len(), 3);
        assert_eq!(table.num_assets(), 2);
        assert_eq!(table.first_date(), d(2024, 1, 1));
        assert_eq!(table.last_date(), d(2024, 1, 3));
        assert_eq!(table.prices_at(1), Some(&[2.0, 20.0][..]));
        assert_eq!(table.row(2).unwrap().price(1), Some(30.0));
        assert_eq!(table.column("B"), Some(vec![10.0, 20.0, 30.0]));
        assert_eq!(table.index_of(d(2024, 1, 3)), Some(2));
        assert_eq!(table.index_of(d(2023, 12, 31)), None);
    }

    #[test]
    fn test_rejects_gap() {
        let err = PriceTable::new(
            assets(&["A"]),
            vec![d(2024, 1, 1), d(2024, 1, 3)],
            vec![vec![1.0], vec![1.0]],
        )
        .unwrap_err();
        assert!(matches!(err, GymError::NonContiguousIndex(_)));
        assert!(err.to_string().contains("gap of 1 days"));
    }

    #[test]
    fn test_rejects_duplicate_dates() {
        let err = PriceTable::new(
            assets(&["A"]),
            vec![d(2024, 1, 1), d(2024, 1, 1)],
            vec![vec![1.0], vec![1.0]],
        )
        .unwrap_err();
        assert!(matches!(err, GymError::NonContiguousIndex(_)));
    }

    #[test]
    fn test_rejects_bad_prices() {
        let err = PriceTable::new(assets(&["A"]), vec![d(2024, 1, 1)], vec![vec![0.0]])
            .unwrap_err();
        assert!(matches!(err, GymError::InvalidPrice(_)));

        let err = PriceTable::new(assets(&["A"]), vec![d(2024, 1, 1)], vec![vec![f64::NAN]])
            .unwrap_err();
        assert!(matches!(err, GymError::InvalidPrice(_)));
    }

    #[test]
    fn test_rejects_shape_errors() {
        assert!(matches!(
            PriceTable::new(assets(&["A", "A"]), vec![d(2024, 1, 1)], vec![vec![1.0, 1.0]]),
            Err(GymError::InvalidPriceTable(_))
        ));
        assert!(matches!(
            PriceTable::new(assets(&["A", "B"]), vec![d(2024, 1, 1)], vec![vec![1.0]]),
            Err(GymError::InvalidPriceTable(_))
        ));
        assert!(matches!(
            PriceTable::new(assets(&["A"]), vec![], vec![]),
            Err(GymError::InvalidPriceTable(_))
        ));
    }

    #[test]
    fn test_from_observations_forward_fills() {
        let observations = vec![
            DatedValues {
                date: d(2024, 1, 1),
                values: vec![Some(1.0), None],
            },
            DatedValues {
                date: d(2024, 1, 2),
                values: vec![None, Some(5.0)],
            },
            // weekend gap
            DatedValues {
                date: d(2024, 1, 5),
                values: vec![Some(2.0), None],
            },
        ];

        let table = PriceTable::from_observations(assets(&["A", "B"]), observations).unwrap();

        // Jan 1 is dropped because B has no value yet
        assert_eq!(table.first_date(), d(2024, 1, 2));
        assert_eq!(table.last_date(), d(2024, 1, 5));
        assert_eq!(table.column("A"), Some(vec![1.0, 1.0, 1.0, 2.0]));
        assert_eq!(table.column("B"), Some(vec![5.0, 5.0, 5.0, 5.0]));
    }

    #[test]
    fn test_from_observations_rejects_unordered() {
        let observations = vec![
            DatedValues {
                date: d(2024, 1, 2),
                values: vec![Some(1.0)],
            },
            DatedValues {
                date: d(2024, 1, 2),
                values: vec![Some(1.0)],
            },
        ];
        let err = PriceTable::from_observations(assets(&["A"]), observations).unwrap_err();
        assert!(matches!(err, GymError::NonContiguousIndex(_)));
    }

    #[test]
    fn test_inner_join() {
        let left = PriceTable::new(
            assets(&["A"]),
            vec![d(2024, 1, 1), d(2024, 1, 2), d(2024, 1, 3)],
            vec![vec![1.0], vec![2.0], vec![3.0]],
        )
        .unwrap();
        let right = PriceTable::new(
            assets(&["B"]),
            vec![d(2024, 1, 2), d(2024, 1, 3), d(2024, 1, 4)],
            vec![vec![20.0], vec![30.0], vec![40.0]],
        )
        .unwrap();

        let joined = PriceTable::inner_join(&[&left, &right]).unwrap();
        assert_eq!(joined.assets(), &["A".to_string(), "B".to_string()]);
        assert_eq!(joined.len(), 2);
        assert_eq!(joined.prices_at(0), Some(&[2.0, 20.0][..]));
        assert_eq!(joined.prices_at(1), Some(&[3.0, 30.0][..]));
    }

    #[test]
    fn test_inner_join_without_overlap() {
        let left =
            PriceTable::new(assets(&["A"]), vec![d(2024, 1, 1)], vec![vec![1.0]]).unwrap();
        let right =
            PriceTable::new(assets(&["B"]), vec![d(2024, 2, 1)], vec![vec![1.0]]).unwrap();
        assert!(matches!(
            PriceTable::inner_join(&[&left, &right]),
            Err(GymError::InvalidPriceTable(_))
        ));
    }

    #[test]
    fn test_slice_rows() {
        let table = PriceTable::new(
            assets(&["A", "B"]),
            vec![d(2024, 1, 1), d(2024, 1, 2), d(2024, 1, 3)],
            vec![vec![1.0, 10.0], vec![2.0, 20.0], vec![3.0, 30.0]],
        )
        .unwrap();

        let slice = table.slice_rows(1..3).unwrap();
        assert_eq!(slice.first_date(), d(2024, 1, 2));
        assert_eq!(slice.prices_at(1), Some(&[3.0, 30.0][..]));
        assert!(table.slice_rows(2..5).is_err());
    }
}
