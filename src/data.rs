//! Transaction CSV input, monthly aggregation and the forecast table output.

use std::collections::BTreeMap;
use std::io;
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{ForecastError, Result};
use crate::model::ForecastResult;
use crate::series::{Period, TimeSeries};

/// One cleaned transaction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SalesRecord {
    pub order_date: NaiveDate,
    pub sales: f64,
}

#[derive(Debug, Deserialize)]
struct RawRecord {
    order_date: String,
    sales: f64,
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .or_else(|| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").ok().map(|dt| dt.date()))
        .or_else(|| NaiveDate::parse_from_str(s, "%m/%d/%Y").ok())
}

/// Read transactions from any CSV source with `order_date` and `sales`
/// columns; other columns are ignored.
pub fn read_sales<R: io::Read>(reader: R) -> Result<Vec<SalesRecord>> {
    let mut rdr = csv::Reader::from_reader(reader);
    let mut out = Vec::new();
    for (i, row) in rdr.deserialize::<RawRecord>().enumerate() {
        // header is line 1
        let line = i + 2;
        let raw = row.map_err(|e| ForecastError::Data(format!("line {}: {}", line, e)))?;
        let order_date = parse_date(&raw.order_date)
            .ok_or_else(|| ForecastError::Data(format!("line {}: bad order_date '{}'", line, raw.order_date)))?;
        if !raw.sales.is_finite() || raw.sales < 0.0 {
            return Err(ForecastError::Data(format!(
                "line {}: sales must be finite and non-negative, got {}",
                line, raw.sales
            )));
        }
        out.push(SalesRecord {
            order_date,
            sales: raw.sales,
        });
    }
    Ok(out)
}

pub fn read_sales_csv(path: impl AsRef<Path>) -> Result<Vec<SalesRecord>> {
    let path = path.as_ref();
    let file = std::fs::File::open(path).map_err(|e| ForecastError::persistence(path, e))?;
    let records = read_sales(io::BufReader::new(file))?;
    info!(path = %path.display(), records = records.len(), "sales loaded");
    Ok(records)
}

/// Sum sales per calendar month. Months between the first and last
/// transaction with no sales are filled with 0.
pub fn monthly_totals(records: &[SalesRecord]) -> Result<TimeSeries> {
    let mut totals: BTreeMap<Period, f64> = BTreeMap::new();
    for r in records {
        *totals.entry(Period::from_date(r.order_date)).or_insert(0.0) += r.sales;
    }
    let (Some((&first, _)), Some((&last, _))) = (totals.first_key_value(), totals.last_key_value()) else {
        return Err(ForecastError::InsufficientData { needed: 1, got: 0 });
    };
    let len = first.months_until(last) + 1;
    let values = (0..len)
        .map(|i| totals.get(&first.offset(i)).copied().unwrap_or(0.0))
        .collect();
    TimeSeries::new(first, values)
}

#[derive(Debug, Serialize)]
struct ForecastRow {
    period: String,
    point_forecast: f64,
    lower_bound: f64,
    upper_bound: f64,
}

/// Write the forecast table: `period,point_forecast,lower_bound,upper_bound`.
pub fn write_forecast<W: io::Write>(writer: W, forecast: &ForecastResult) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    for p in &forecast.points {
        wtr.serialize(ForecastRow {
            period: p.period.to_string(),
            point_forecast: p.point_estimate,
            lower_bound: p.lower_bound,
            upper_bound: p.upper_bound,
        })
        .map_err(|e| ForecastError::Data(e.to_string()))?;
    }
    wtr.flush().map_err(|e| ForecastError::Data(e.to_string()))
}

pub fn write_forecast_csv(path: impl AsRef<Path>, forecast: &ForecastResult) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| ForecastError::persistence(parent, e))?;
    }
    let file = std::fs::File::create(path).map_err(|e| ForecastError::persistence(path, e))?;
    write_forecast(file, forecast)?;
    info!(path = %path.display(), rows = forecast.points.len(), "forecast table written");
    Ok(())
}
