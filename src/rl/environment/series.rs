//! Windowed Series Iterator
//!
//! Single forward pass over a contiguous window of a shared price table.

use std::ops::Range;
use std::sync::Arc;

use crate::domain::{PriceRow, PriceTable};
use crate::error::{GymError, Result};

/// Yields the rows of one window, flagging the last one.
///
/// Only the cursor is stored; rows are copied out of the shared table on
/// demand, so memory use does not depend on the window length.
#[derive(Debug, Clone)]
pub struct WindowedSeriesIterator {
    table: Arc<PriceTable>,
    window: Range<usize>,
    /// Absolute row index of the next row to yield
    cursor: usize,
}

impl WindowedSeriesIterator {
    /// Create an iterator over `window` (row indices into `table`)
    pub fn new(table: Arc<PriceTable>, window: Range<usize>) -> Result<Self> {
        if window.start >= window.end || window.end > table.len() {
            return Err(GymError::InvalidPeriod(format!(
                "window {:?} is empty or exceeds {} rows",
                window,
                table.len()
            )));
        }
        Ok(Self {
            cursor: window.start,
            table,
            window,
        })
    }

    /// Next row and whether it is the final row of the window
    pub fn next_row(&mut self) -> Result<(PriceRow, bool)> {
        if self.is_exhausted() {
            return Err(GymError::IterationExhausted { rows: self.len() });
        }

        let row = self.table.row(self.cursor).ok_or_else(|| {
            GymError::Internal(format!("row {} missing from price table", self.cursor))
        })?;
        self.cursor += 1;

        Ok((row, self.is_exhausted()))
    }

    /// True once the final row has been returned
    pub fn is_exhausted(&self) -> bool {
        self.cursor >= self.window.end
    }

    /// Rows not yet yielded
    pub fn remaining(&self) -> usize {
        self.window.end.saturating_sub(self.cursor)
    }

    /// Window length in rows
    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    /// Row index range covered by this iterator
    pub fn window(&self) -> Range<usize> {
        self.window.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn table(rows: usize) -> Arc<PriceTable> {
        let start = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        Arc::new(
            PriceTable::new(
                vec!["A".to_string()],
                (0..rows).map(|i| start + Duration::days(i as i64)).collect(),
                (0..rows).map(|i| vec![1.0 + i as f64]).collect(),
            )
            .unwrap(),
        )
    }

    #[test]
    fn test_yields_window_in_order() {
        let mut iter = WindowedSeriesIterator::new(table(5), 1..4).unwrap();
        assert_eq!(iter.len(), 3);

        let (row, last) = iter.next_row().unwrap();
        assert_eq!(row.prices, vec![2.0]);
        assert!(!last);

        let (row, last) = iter.next_row().unwrap();
        assert_eq!(row.prices, vec![3.0]);
        assert!(!last);
        assert_eq!(iter.remaining(), 1);

        let (row, last) = iter.next_row().unwrap();
        assert_eq!(row.prices, vec![4.0]);
        assert!(last);
        assert!(iter.is_exhausted());
    }

    #[test]
    fn test_exhausted_iterator_errors() {
        let mut iter = WindowedSeriesIterator::new(table(2), 0..1).unwrap();
        let (_, last) = iter.next_row().unwrap();
        assert!(last);

        let err = iter.next_row().unwrap_err();
        assert!(matches!(err, GymError::IterationExhausted { rows: 1 }));
    }

    #[test]
    fn test_rejects_bad_windows() {
        assert!(WindowedSeriesIterator::new(table(3), 2..2).is_err());
        assert!(WindowedSeriesIterator::new(table(3), 1..4).is_err());
    }
}
