//! Monthly periods and contiguous monthly series.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::{ForecastError, Result};

/// A calendar month. Text form is `YYYY-MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Period {
    year: i32,
    month: u32,
}

impl Period {
    pub fn new(year: i32, month: u32) -> Result<Self> {
        if !(1..=12).contains(&month) {
            return Err(ForecastError::Data(format!(
                "month must be in 1..=12, got {month}"
            )));
        }
        Ok(Self { year, month })
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// Month containing `date`.
    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// Months since year 0, used for arithmetic.
    fn ordinal(&self) -> i64 {
        self.year as i64 * 12 + (self.month as i64 - 1)
    }

    fn from_ordinal(ord: i64) -> Self {
        Self {
            year: ord.div_euclid(12) as i32,
            month: (ord.rem_euclid(12) + 1) as u32,
        }
    }

    /// Shift by `months` (negative moves backwards).
    pub fn offset(&self, months: i64) -> Self {
        Self::from_ordinal(self.ordinal() + months)
    }

    pub fn succ(&self) -> Self {
        self.offset(1)
    }

    /// Signed number of months from `self` to `other`.
    pub fn months_until(&self, other: Period) -> i64 {
        other.ordinal() - self.ordinal()
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for Period {
    type Err = ForecastError;

    fn from_str(s: &str) -> Result<Self> {
        let date = NaiveDate::parse_from_str(&format!("{}-01", s.trim()), "%Y-%m-%d")
            .map_err(|e| ForecastError::Data(format!("invalid period '{s}': {e}")))?;
        Ok(Self::from_date(date))
    }
}

impl TryFrom<String> for Period {
    type Error = ForecastError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<Period> for String {
    fn from(p: Period) -> String {
        p.to_string()
    }
}

/// Inclusive range of months.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodRange {
    pub start: Period,
    pub end: Period,
}

impl PeriodRange {
    pub fn len(&self) -> usize {
        (self.start.months_until(self.end) + 1).max(0) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Display for PeriodRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..={}", self.start, self.end)
    }
}

/// Contiguous monthly series: one finite value per month from `start`,
/// no gaps. Never mutated in place; transforms return new series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeries {
    start: Period,
    values: Vec<f64>,
}

impl TimeSeries {
    pub fn new(start: Period, values: Vec<f64>) -> Result<Self> {
        if values.is_empty() {
            return Err(ForecastError::InsufficientData { needed: 1, got: 0 });
        }
        if let Some(i) = values.iter().position(|v| !v.is_finite()) {
            return Err(ForecastError::Data(format!(
                "non-finite value {} at {}",
                values[i],
                start.offset(i as i64)
            )));
        }
        Ok(Self { start, values })
    }

    /// Build from `(period, value)` observations. Periods must be strictly
    /// increasing and contiguous; gaps are rejected, never filled.
    pub fn from_observations<I>(observations: I) -> Result<Self>
    where
        I: IntoIterator<Item = (Period, f64)>,
    {
        let mut iter = observations.into_iter();
        let (start, first) = iter
            .next()
            .ok_or(ForecastError::InsufficientData { needed: 1, got: 0 })?;
        let mut values = vec![first];
        let mut expected = start.succ();
        for (period, value) in iter {
            if period != expected {
                return Err(ForecastError::PeriodGap {
                    expected,
                    found: period,
                });
            }
            values.push(value);
            expected = expected.succ();
        }
        Self::new(start, values)
    }

    pub fn start(&self) -> Period {
        self.start
    }

    pub fn end(&self) -> Period {
        self.start.offset(self.values.len() as i64 - 1)
    }

    pub fn range(&self) -> PeriodRange {
        PeriodRange {
            start: self.start,
            end: self.end(),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn period_at(&self, index: usize) -> Period {
        self.start.offset(index as i64)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Period, f64)> + '_ {
        self.values
            .iter()
            .enumerate()
            .map(move |(i, &v)| (self.period_at(i), v))
    }

    /// The `n` months following the last observation.
    pub fn next_periods(&self, n: usize) -> Vec<Period> {
        let end = self.end();
        (1..=n as i64).map(|k| end.offset(k)).collect()
    }

    /// Chronological split: first `at` observations, then the rest.
    pub fn split_at(&self, at: usize) -> Result<(TimeSeries, TimeSeries)> {
        if at == 0 || at >= self.len() {
            return Err(ForecastError::Data(format!(
                "split point {at} must lie inside a series of length {}",
                self.len()
            )));
        }
        let head = TimeSeries {
            start: self.start,
            values: self.values[..at].to_vec(),
        };
        let tail = TimeSeries {
            start: self.period_at(at),
            values: self.values[at..].to_vec(),
        };
        Ok((head, tail))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(y: i32, m: u32) -> Period {
        Period::new(y, m).unwrap()
    }

    #[test]
    fn test_period_arithmetic_crosses_years() {
        assert_eq!(p(2014, 12).succ(), p(2015, 1));
        assert_eq!(p(2015, 1).offset(-1), p(2014, 12));
        assert_eq!(p(2014, 1).offset(47), p(2017, 12));
        assert_eq!(p(2014, 1).months_until(p(2017, 12)), 47);
    }

    #[test]
    fn test_period_text_form() {
        assert_eq!(p(2018, 3).to_string(), "2018-03");
        assert_eq!("2018-03".parse::<Period>().unwrap(), p(2018, 3));
        assert!("2018-13".parse::<Period>().is_err());
        assert!(Period::new(2018, 0).is_err());
    }

    #[test]
    fn test_period_serde_as_string() {
        let json = serde_json::to_string(&p(2016, 7)).unwrap();
        assert_eq!(json, "\"2016-07\"");
        let back: Period = serde_json::from_str(&json).unwrap();
        assert_eq!(back, p(2016, 7));
    }

    #[test]
    fn test_from_observations_rejects_gap() {
        let obs = vec![(p(2014, 1), 1.0), (p(2014, 2), 2.0), (p(2014, 4), 3.0)];
        match TimeSeries::from_observations(obs) {
            Err(ForecastError::PeriodGap { expected, found }) => {
                assert_eq!(expected, p(2014, 3));
                assert_eq!(found, p(2014, 4));
            }
            other => panic!("expected PeriodGap, got {:?}", other),
        }
    }

    #[test]
    fn test_from_observations_rejects_out_of_order() {
        let obs = vec![(p(2014, 2), 1.0), (p(2014, 1), 2.0)];
        assert!(TimeSeries::from_observations(obs).is_err());
    }

    #[test]
    fn test_new_rejects_empty_and_nan() {
        assert!(TimeSeries::new(p(2014, 1), vec![]).is_err());
        assert!(TimeSeries::new(p(2014, 1), vec![1.0, f64::NAN]).is_err());
    }

    #[test]
    fn test_split_is_chronological() {
        let s = TimeSeries::new(p(2014, 1), (0..48).map(|i| i as f64).collect()).unwrap();
        let (train, test) = s.split_at(36).unwrap();
        assert_eq!(train.len(), 36);
        assert_eq!(test.len(), 12);
        assert_eq!(train.end(), p(2016, 12));
        assert_eq!(test.start(), p(2017, 1));
        assert_eq!(test.values()[0], 36.0);
        assert!(s.split_at(0).is_err());
        assert!(s.split_at(48).is_err());
    }

    #[test]
    fn test_next_periods_and_range() {
        let s = TimeSeries::new(p(2017, 11), vec![1.0, 2.0]).unwrap();
        assert_eq!(s.end(), p(2017, 12));
        assert_eq!(s.next_periods(2), vec![p(2018, 1), p(2018, 2)]);
        assert_eq!(s.range().len(), 2);
    }
}
