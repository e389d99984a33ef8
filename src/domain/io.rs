//! CSV ingestion and export for price tables
//!
//! Files carry a header row `date,<asset>,<asset>...` and one row per date
//! formatted `YYYY-MM-DD`. Empty cells, `-` and `.` mark missing values, which
//! only the sparse reader accepts.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use anyhow::Context;
use chrono::NaiveDate;
use csv::{ReaderBuilder, Trim, Writer};
use tracing::debug;

use super::price_table::{DatedValues, PriceTable};
use crate::error::{GymError, Result};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Raw series as read from a file, before gap handling
#[derive(Debug, Clone)]
pub struct RawSeries {
    pub assets: Vec<String>,
    pub rows: Vec<DatedValues>,
}

impl RawSeries {
    /// Forward-fill into a gap-free daily table
    pub fn into_filled_table(self) -> Result<PriceTable> {
        PriceTable::from_observations(self.assets, self.rows)
    }

    /// Strict conversion: every cell must be present and the index already daily
    pub fn into_table(self) -> Result<PriceTable> {
        let mut dates = Vec::with_capacity(self.rows.len());
        let mut rows = Vec::with_capacity(self.rows.len());
        for row in self.rows {
            let prices = row
                .values
                .into_iter()
                .collect::<Option<Vec<f64>>>()
                .ok_or_else(|| {
                    GymError::InvalidPriceTable(format!("missing value on {}", row.date))
                })?;
            dates.push(row.date);
            rows.push(prices);
        }
        PriceTable::new(self.assets, dates, rows)
    }
}

/// Read a possibly sparse series from CSV
pub fn read_series<R: Read>(reader: R) -> Result<RawSeries> {
    let mut reader = ReaderBuilder::new().trim(Trim::All).from_reader(reader);

    let headers = reader.headers()?.clone();
    if headers.len() < 2 {
        return Err(GymError::InvalidPriceTable(
            "header needs a date column and at least one asset".to_string(),
        ));
    }
    let assets: Vec<String> = headers.iter().skip(1).map(str::to_string).collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let line = record.position().map(|p| p.line()).unwrap_or_default();

        let date_field = record.get(0).unwrap_or_default();
        let date = NaiveDate::parse_from_str(date_field, DATE_FORMAT).map_err(|e| {
            GymError::InvalidPriceTable(format!("line {}: bad date {:?}: {}", line, date_field, e))
        })?;

        let values = record
            .iter()
            .skip(1)
            .map(|cell| parse_cell(cell, line))
            .collect::<Result<Vec<_>>>()?;

        rows.push(DatedValues { date, values });
    }

    debug!(assets = assets.len(), rows = rows.len(), "read price series");
    Ok(RawSeries { assets, rows })
}

fn parse_cell(cell: &str, line: u64) -> Result<Option<f64>> {
    match cell {
        "" | "-" | "." => Ok(None),
        _ => cell.parse::<f64>().map(Some).map_err(|e| {
            GymError::InvalidPriceTable(format!("line {}: bad value {:?}: {}", line, cell, e))
        }),
    }
}

/// Read a complete, gap-free table from CSV
pub fn read_price_table<R: Read>(reader: R) -> Result<PriceTable> {
    read_series(reader)?.into_table()
}

/// Open a sparse series file
pub fn load_series<P: AsRef<Path>>(path: P) -> Result<RawSeries> {
    let file = File::open(&path)
        .with_context(|| format!("Failed to open price file: {:?}", path.as_ref()))?;
    read_series(file)
}

/// Open a complete price table file
pub fn load_price_table<P: AsRef<Path>>(path: P) -> Result<PriceTable> {
    load_series(path)?.into_table()
}

/// Write a table as CSV
pub fn write_price_table<W: Write>(table: &PriceTable, writer: W) -> Result<()> {
    let mut writer = Writer::from_writer(writer);

    let mut header = vec!["date".to_string()];
    header.extend(table.assets().iter().cloned());
    writer.write_record(&header)?;

    for (idx, date) in table.dates().iter().enumerate() {
        let prices = table.prices_at(idx).unwrap_or_default();
        let mut record = Vec::with_capacity(prices.len() + 1);
        record.push(date.format(DATE_FORMAT).to_string());
        record.extend(prices.iter().map(|p| p.to_string()));
        writer.write_record(&record)?;
    }

    writer.flush()?;
    Ok(())
}

/// Create `path` and write the table into it
pub fn save_price_table<P: AsRef<Path>>(table: &PriceTable, path: P) -> Result<()> {
    let file = File::create(&path)
        .with_context(|| format!("Failed to create price file: {:?}", path.as_ref()))?;
    write_price_table(table, file)
}
