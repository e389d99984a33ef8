//! Yield to Total Return Conversion
//!
//! Bond benchmarks are often published as yields rather than prices. These
//! helpers approximate the daily total return of a constant-maturity bond from
//! its daily yield series (carry plus duration and convexity terms) so a yield
//! series can be turned into a price-like index column.

use super::price_table::PriceTable;
use crate::error::{GymError, Result};

/// Trading days per year used for daily carry
pub const TRADING_DAYS_PER_YEAR: f64 = 253.0;

fn z(y: f64) -> f64 {
    1.0 + 0.5 * y
}

/// Approximate modified duration of a semi-annual coupon bond priced at par
pub fn modified_duration(y: f64, maturity: f64) -> f64 {
    1.0 / y * (1.0 - 1.0 / z(y).powf(2.0 * maturity))
}

/// Approximate convexity of a semi-annual coupon bond priced at par
pub fn convexity(y: f64, maturity: f64) -> f64 {
    let c1 = 2.0 / y.powi(2) * (1.0 - z(y).powf(-2.0 * maturity));
    let c2 = 2.0 * maturity / y * z(y).powf(-2.0 * maturity + 1.0);
    c1 - c2
}

/// Daily total returns from daily yields (decimal, e.g. `0.04` for 4%).
///
/// The result has one element fewer than the input: the first day has no
/// previous yield to difference against.
pub fn daily_total_returns(yields: &[f64], maturity: f64) -> Result<Vec<f64>> {
    if !maturity.is_finite() || maturity <= 0.0 {
        return Err(GymError::InvalidPeriod(format!(
            "bond maturity must be positive, got {}",
            maturity
        )));
    }
    if let Some((idx, y)) = yields
        .iter()
        .enumerate()
        .find(|(_, y)| !y.is_finite() || **y <= 0.0)
    {
        return Err(GymError::InvalidPrice(format!(
            "yield {} at index {} must be positive",
            y, idx
        )));
    }

    let dt = 1.0 / TRADING_DAYS_PER_YEAR;
    Ok(yields
        .windows(2)
        .map(|pair| {
            let (prev, y) = (pair[0], pair[1]);
            let dy = y - prev;
            let income = (1.0 + y).powf(dt) - 1.0;
            income - modified_duration(y, maturity) * dy
                + 0.5 * convexity(y, maturity) * dy.powi(2)
        })
        .collect())
}

/// Compound returns into an index starting from `base`
pub fn total_return_index(returns: &[f64], base: f64) -> Vec<f64> {
    returns
        .iter()
        .scan(base, |level, r| {
            *level *= 1.0 + r;
            Some(*level)
        })
        .collect()
}

/// Build a single-column total-return index table from one yield column.
///
/// `percent` divides yields by 100 first. The index starts on the table's
/// second date.
pub fn yield_index_table(
    yields: &PriceTable,
    column: &str,
    maturity: f64,
    percent: bool,
) -> Result<PriceTable> {
    let raw = yields.column(column).ok_or_else(|| {
        GymError::InvalidPriceTable(format!("no column named {:?}", column))
    })?;
    if raw.len() < 2 {
        return Err(GymError::InvalidPriceTable(
            "need at least two yields to compute a return".to_string(),
        ));
    }

    let scaled: Vec<f64> = if percent {
        raw.iter().map(|y| y / 100.0).collect()
    } else {
        raw
    };

    let returns = daily_total_returns(&scaled, maturity)?;
    let index = total_return_index(&returns, 1.0);

    PriceTable::new(
        vec![column.to_string()],
        yields.dates()[1..].to_vec(),
        index.into_iter().map(|level| vec![level]).collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_flat_yield_earns_carry() {
        let returns = daily_total_returns(&[0.05, 0.05, 0.05], 10.0).unwrap();
        assert_eq!(returns.len(), 2);

        let carry = 1.05f64.powf(1.0 / TRADING_DAYS_PER_YEAR) - 1.0;
        for r in returns {
            assert!((r - carry).abs() < 1e-15);
        }
    }

    #[test]
    fn test_rising_yield_loses_value() {
        let returns = daily_total_returns(&[0.04, 0.05], 10.0).unwrap();
        assert!(returns[0] < 0.0);

        let returns = daily_total_returns(&[0.05, 0.04], 10.0).unwrap();
        assert!(returns[0] > 0.0);
    }

    #[test]
    fn test_duration_grows_with_maturity() {
        assert!(modified_duration(0.04, 30.0) > modified_duration(0.04, 10.0));
        assert!(modified_duration(0.04, 10.0) > 0.0);
        assert!(convexity(0.04, 10.0) > 0.0);
    }

    #[test]
    fn test_rejects_bad_inputs() {
        assert!(matches!(
            daily_total_returns(&[0.04, 0.0], 10.0),
            Err(GymError::InvalidPrice(_))
        ));
        assert!(matches!(
            daily_total_returns(&[0.04, 0.05], 0.0),
            Err(GymError::InvalidPeriod(_))
        ));
    }

    #[test]
    fn test_total_return_index() {
        let index = total_return_index(&[0.1, -0.5], 1.0);
        assert_eq!(index.len(), 2);
        assert!((index[0] - 1.1).abs() < 1e-12);
        assert!((index[1] - 0.55).abs() < 1e-12);
    }

    #[test]
    fn test_yield_index_table() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let dates: Vec<NaiveDate> = (0..3).map(|i| start + chrono::Duration::days(i)).collect();
        let yields = PriceTable::new(
            vec!["ust10".to_string()],
            dates,
            vec![vec![4.0], vec![4.1], vec![4.0]],
        )
        .unwrap();

        let table = yield_index_table(&yields, "ust10", 10.0, true).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.first_date(), NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert!(table.prices_at(0).unwrap()[0] < 1.0);

        assert!(yield_index_table(&yields, "missing", 10.0, true).is_err());
    }
}
