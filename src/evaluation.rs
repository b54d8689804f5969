//! Chronological hold-out evaluation and accuracy metrics.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{ForecastError, Result};
use crate::model::SeasonalModel;
use crate::series::{PeriodRange, TimeSeries};
use crate::types::{FitOptions, ModelSpec};

/// Accuracy of `predicted` against `actual`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccuracyMetrics {
    pub mae: f64,
    pub rmse: f64,
    /// Mean absolute percentage error in percent, over non-zero actuals.
    /// `None` when every actual is zero.
    pub mape: Option<f64>,
    /// Periods left out of MAPE because the actual was zero.
    pub mape_excluded: usize,
}

/// MAE, RMSE and MAPE of two aligned slices.
pub fn accuracy(actual: &[f64], predicted: &[f64]) -> Result<AccuracyMetrics> {
    if actual.len() != predicted.len() {
        return Err(ForecastError::Data(format!(
            "actual has {} values, predicted {}",
            actual.len(),
            predicted.len()
        )));
    }
    if actual.is_empty() {
        return Err(ForecastError::InsufficientData { needed: 1, got: 0 });
    }
    let n = actual.len() as f64;

    let mut abs_sum = 0.0;
    let mut sq_sum = 0.0;
    let mut pct_sum = 0.0;
    let mut pct_count = 0usize;
    for (&a, &p) in actual.iter().zip(predicted) {
        let err = a - p;
        abs_sum += err.abs();
        sq_sum += err * err;
        if a != 0.0 {
            pct_sum += (err / a).abs();
            pct_count += 1;
        }
    }

    let mape_excluded = actual.len() - pct_count;
    if mape_excluded > 0 {
        warn!(excluded = mape_excluded, "zero actuals left out of MAPE");
    }

    Ok(AccuracyMetrics {
        mae: abs_sum / n,
        rmse: (sq_sum / n).sqrt(),
        mape: (pct_count > 0).then(|| 100.0 * pct_sum / pct_count as f64),
        mape_excluded,
    })
}

/// The persisted evaluation report: `{mae, rmse, mape, test_range}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationMetrics {
    pub mae: f64,
    pub rmse: f64,
    pub mape: Option<f64>,
    pub test_range: PeriodRange,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub train_range: PeriodRange,
    pub test_range: PeriodRange,
    pub train_len: usize,
    /// Aligned with `test_range`.
    pub point_forecasts: Vec<f64>,
    pub actuals: Vec<f64>,
    pub metrics: AccuracyMetrics,
}

impl EvaluationResult {
    pub fn snapshot(&self) -> EvaluationMetrics {
        EvaluationMetrics {
            mae: self.metrics.mae,
            rmse: self.metrics.rmse,
            mape: self.metrics.mape,
            test_range: self.test_range,
        }
    }
}

/// Fits on the head of a series and scores forecasts of its tail.
#[derive(Debug, Clone)]
pub struct Evaluator {
    spec: ModelSpec,
    options: FitOptions,
}

impl Evaluator {
    pub fn new(spec: ModelSpec, options: FitOptions) -> Self {
        Self { spec, options }
    }

    /// Observations the training part must keep.
    pub fn min_train_len(&self) -> usize {
        self.spec.min_observations(self.options.enforce_stationarity)
    }

    /// Train on `series[..n - test_size]`, forecast `test_size` months and
    /// compare with `series[n - test_size..]`.
    pub fn evaluate(&self, series: &TimeSeries, test_size: usize) -> Result<EvaluationResult> {
        let n = series.len();
        let min_train = self.min_train_len();
        if test_size == 0 || test_size >= n || n - test_size < min_train {
            return Err(ForecastError::InvalidSplit {
                test_size,
                series_len: n,
                min_train,
            });
        }

        let (train, test) = series.split_at(n - test_size)?;
        let mut model = SeasonalModel::new(self.spec, self.options.clone());
        let fitted = model.fit(&train)?;
        // interval level is irrelevant for point accuracy
        let forecast = fitted.forecast(test_size, 0.95)?;
        let point_forecasts = forecast.point_estimates();
        let metrics = accuracy(test.values(), &point_forecasts)?;

        info!(
            spec = %self.spec,
            train = %train.range(),
            test = %test.range(),
            mae = metrics.mae,
            rmse = metrics.rmse,
            "hold-out evaluation"
        );

        Ok(EvaluationResult {
            train_range: train.range(),
            test_range: test.range(),
            train_len: train.len(),
            point_forecasts,
            actuals: test.values().to_vec(),
            metrics,
        })
    }
}
