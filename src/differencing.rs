//! Ordinary and seasonal differencing and its inverse.
//!
//! Ordinary differences are applied first, then seasonal ones:
//! `w_t = (1 - L^s)^D (1 - L)^d y_t`. Undoing the transform needs the
//! `d + D*s` level values that precede the differenced series.

use serde::{Deserialize, Serialize};

use crate::error::{ForecastError, Result};
use crate::series::TimeSeries;
use crate::types::ModelSpec;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DifferencingSpec {
    pub order: usize,
    pub seasonal_order: usize,
    pub seasonal_period: usize,
}

impl DifferencingSpec {
    pub fn new(order: usize, seasonal_order: usize, seasonal_period: usize) -> Result<Self> {
        if seasonal_period == 0 {
            return Err(ForecastError::InvalidSpec(
                "seasonal period must be positive".into(),
            ));
        }
        Ok(Self {
            order,
            seasonal_order,
            seasonal_period,
        })
    }

    /// No differencing at all.
    pub fn identity(seasonal_period: usize) -> Self {
        Self {
            order: 0,
            seasonal_order: 0,
            seasonal_period: seasonal_period.max(1),
        }
    }

    /// Observations consumed by the transform.
    pub fn reduction(&self) -> usize {
        self.order + self.seasonal_order * self.seasonal_period
    }

    pub fn is_identity(&self) -> bool {
        self.order == 0 && self.seasonal_order == 0
    }

    /// Lag applied by each stage, in application order.
    fn lags(&self) -> Vec<usize> {
        std::iter::repeat(1)
            .take(self.order)
            .chain(std::iter::repeat(self.seasonal_period).take(self.seasonal_order))
            .collect()
    }
}

impl From<&ModelSpec> for DifferencingSpec {
    fn from(spec: &ModelSpec) -> Self {
        Self {
            order: spec.d,
            seasonal_order: spec.dd,
            seasonal_period: spec.s,
        }
    }
}

impl std::fmt::Display for DifferencingSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "d={}, D={} (s={})",
            self.order, self.seasonal_order, self.seasonal_period
        )
    }
}

/// Difference raw values; returns an empty vector when too short.
pub fn difference_values(values: &[f64], spec: &DifferencingSpec) -> Vec<f64> {
    let mut out = values.to_vec();
    for lag in spec.lags() {
        if out.len() <= lag {
            return vec![];
        }
        out = (lag..out.len()).map(|i| out[i] - out[i - lag]).collect();
    }
    out
}

/// Differenced series, starting `spec.reduction()` months after `series`.
pub fn difference(series: &TimeSeries, spec: &DifferencingSpec) -> Result<TimeSeries> {
    let required = spec.reduction();
    if series.len() <= required {
        return Err(ForecastError::SeriesTooShort {
            len: series.len(),
            required,
        });
    }
    if spec.is_identity() {
        return Ok(series.clone());
    }
    TimeSeries::new(
        series.start().offset(required as i64),
        difference_values(series.values(), spec),
    )
}

/// Invert `difference`. `seed` holds the `spec.reduction()` level values
/// immediately preceding `differenced`; the result covers the seed months
/// followed by the reconstructed levels.
pub fn integrate(differenced: &TimeSeries, spec: &DifferencingSpec, seed: &[f64]) -> Result<TimeSeries> {
    let r = spec.reduction();
    if seed.len() != r {
        return Err(ForecastError::SeedLengthMismatch {
            expected: r,
            got: seed.len(),
        });
    }
    let levels = integrate_values(differenced.values(), spec, seed);
    TimeSeries::new(differenced.start().offset(-(r as i64)), levels)
}

/// Value-level inverse; output is `seed ++ levels`.
///
/// Each stage is held on absolute positions `0..r+n`. The seed fixes every
/// stage on positions below `r`, then stages are rebuilt top-down.
pub fn integrate_values(differenced: &[f64], spec: &DifferencingSpec, seed: &[f64]) -> Vec<f64> {
    let r = seed.len();
    let total = r + differenced.len();
    let lags = spec.lags();

    let mut stages: Vec<Vec<f64>> = Vec::with_capacity(lags.len() + 1);
    let mut level = vec![0.0; total];
    level[..r].copy_from_slice(seed);
    stages.push(level);

    let mut offset = 0;
    for &lag in &lags {
        offset += lag;
        let prev = &stages[stages.len() - 1];
        let mut next = vec![0.0; total];
        for i in offset..r {
            next[i] = prev[i] - prev[i - lag];
        }
        stages.push(next);
    }

    if let Some(top) = stages.last_mut() {
        top[r..].copy_from_slice(differenced);
    }

    for (k, &lag) in lags.iter().enumerate().rev() {
        let (lower, upper) = stages.split_at_mut(k + 1);
        let below = &mut lower[k];
        let above = &upper[0];
        for i in r..total {
            below[i] = above[i] + below[i - lag];
        }
    }

    stages.swap_remove(0)
}

/// First `spec.reduction()` values: the seed that reconstructs `series`
/// from its own differences.
pub fn leading_seed(series: &TimeSeries, spec: &DifferencingSpec) -> Vec<f64> {
    let r = spec.reduction().min(series.len());
    series.values()[..r].to_vec()
}

/// Last `spec.reduction()` values: the seed for integrating differenced
/// forecasts made after the end of `series`.
pub fn trailing_seed(series: &TimeSeries, spec: &DifferencingSpec) -> Vec<f64> {
    let r = spec.reduction().min(series.len());
    series.values()[series.len() - r..].to_vec()
}
