//! Seasonal ARIMA model lifecycle: specification, fitting and forecasting.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::diagnostics::ResidualDiagnostics;
use crate::error::{ForecastError, Result};
use crate::forecast::{compute_residuals, filter_series, forecast_states};
use crate::optimizer;
use crate::params::SarimaParams;
use crate::series::{Period, PeriodRange, TimeSeries};
use crate::types::{FitOptions, ModelSpec};

/// Seasonal cycles below which a fit is flagged as short.
pub const MIN_RECOMMENDED_CYCLES: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelState {
    Unfit,
    Fitting,
    Fit,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FitWarning {
    /// Fewer than `MIN_RECOMMENDED_CYCLES` seasonal cycles of history.
    ShortHistory { observations: usize, recommended: usize },
}

/// A SARIMA specification waiting to be estimated.
#[derive(Debug, Clone)]
pub struct SeasonalModel {
    spec: ModelSpec,
    options: FitOptions,
    state: ModelState,
}

impl SeasonalModel {
    pub fn new(spec: ModelSpec, options: FitOptions) -> Self {
        Self {
            spec,
            options,
            state: ModelState::Unfit,
        }
    }

    pub fn spec(&self) -> &ModelSpec {
        &self.spec
    }

    pub fn options(&self) -> &FitOptions {
        &self.options
    }

    pub fn state(&self) -> ModelState {
        self.state
    }

    /// Estimate the model on `series` by maximum likelihood.
    ///
    /// Fails with `Convergence` when the optimizer exhausts its budget, and
    /// with `InsufficientData` when the series cannot identify the model.
    pub fn fit(&mut self, series: &TimeSeries) -> Result<FittedModel> {
        self.state = ModelState::Fitting;
        let result = self.estimate(series);
        self.state = match result {
            Ok(_) => ModelState::Fit,
            Err(_) => ModelState::Failed,
        };
        result
    }

    fn estimate(&self, series: &TimeSeries) -> Result<FittedModel> {
        self.spec.validate()?;

        let mut warnings = Vec::new();
        let recommended = MIN_RECOMMENDED_CYCLES * self.spec.s;
        if series.len() < recommended {
            warn!(
                spec = %self.spec,
                observations = series.len(),
                recommended,
                "fitting on fewer than {} seasonal cycles",
                MIN_RECOMMENDED_CYCLES
            );
            warnings.push(FitWarning::ShortHistory {
                observations: series.len(),
                recommended,
            });
        }

        let result = optimizer::fit(series.values(), &self.spec, &self.options)?;
        if !result.converged {
            return Err(ForecastError::Convergence {
                loglike: result.loglike,
                params: result.params,
                iterations: result.n_iter,
                method: result.method,
            });
        }

        info!(
            spec = %self.spec,
            loglike = result.loglike,
            aic = result.aic,
            iterations = result.n_iter,
            method = %result.method,
            "model fitted"
        );

        Ok(FittedModel {
            spec: self.spec,
            options: self.options.clone(),
            params: SarimaParams::from_flat(&result.params, &self.spec)?,
            training: series.clone(),
            loglike: result.loglike,
            scale: result.scale,
            aic: result.aic,
            bic: result.bic,
            n_obs_effective: result.n_obs,
            n_iter: result.n_iter,
            method: result.method,
            fitted_at: Utc::now(),
            warnings,
        })
    }

    /// Forecast `horizon` months past the end of the training data.
    pub fn forecast(fitted: &FittedModel, horizon: usize, confidence_level: f64) -> Result<ForecastResult> {
        fitted.forecast(horizon, confidence_level)
    }
}

/// Estimated model. Immutable; everything needed to forecast is stored here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedModel {
    spec: ModelSpec,
    options: FitOptions,
    params: SarimaParams,
    training: TimeSeries,
    loglike: f64,
    scale: f64,
    aic: f64,
    bic: f64,
    n_obs_effective: usize,
    n_iter: u64,
    method: String,
    fitted_at: DateTime<Utc>,
    warnings: Vec<FitWarning>,
}

impl FittedModel {
    pub fn spec(&self) -> &ModelSpec {
        &self.spec
    }

    pub fn options(&self) -> &FitOptions {
        &self.options
    }

    pub fn params(&self) -> &SarimaParams {
        &self.params
    }

    pub fn training(&self) -> &TimeSeries {
        &self.training
    }

    pub fn training_window(&self) -> PeriodRange {
        self.training.range()
    }

    pub fn loglike(&self) -> f64 {
        self.loglike
    }

    /// Innovation variance sigma2.
    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn aic(&self) -> f64 {
        self.aic
    }

    pub fn bic(&self) -> f64 {
        self.bic
    }

    pub fn n_obs_effective(&self) -> usize {
        self.n_obs_effective
    }

    pub fn n_iter(&self) -> u64 {
        self.n_iter
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn fitted_at(&self) -> DateTime<Utc> {
        self.fitted_at
    }

    pub fn warnings(&self) -> &[FitWarning] {
        &self.warnings
    }

    /// Point forecasts with two-sided normal intervals at `confidence_level`.
    /// Pure: the same model and arguments always give the same rows.
    pub fn forecast(&self, horizon: usize, confidence_level: f64) -> Result<ForecastResult> {
        if horizon == 0 {
            return Err(ForecastError::InvalidHorizon { horizon });
        }
        let (ss, fo) = filter_series(
            self.training.values(),
            &self.spec,
            &self.params,
            self.options.enforce_stationarity,
        )?;
        let f = forecast_states(&ss, &fo, horizon, confidence_level)?;

        let points = self
            .training
            .next_periods(horizon)
            .into_iter()
            .enumerate()
            .map(|(h, period)| ForecastPoint {
                period,
                point_estimate: f.mean[h],
                lower_bound: f.lower[h],
                upper_bound: f.upper[h],
            })
            .collect();

        Ok(ForecastResult {
            horizon,
            confidence_level,
            points,
        })
    }

    /// Residual autocorrelation over `nlags` lags (two seasonal cycles is a
    /// sensible default), diffuse burn-in excluded.
    pub fn residual_diagnostics(&self, nlags: usize) -> Result<ResidualDiagnostics> {
        let (_, fo) = filter_series(
            self.training.values(),
            &self.spec,
            &self.params,
            self.options.enforce_stationarity,
        )?;
        let out = compute_residuals(&fo);
        let burn = out.burn.min(out.residuals.len());
        Ok(ResidualDiagnostics::from_residuals(
            out.residuals[burn..].to_vec(),
            out.standardized_residuals[burn..].to_vec(),
            nlags,
            self.spec.n_coeffs(),
        ))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub period: Period,
    pub point_estimate: f64,
    pub lower_bound: f64,
    pub upper_bound: f64,
}

/// Forecast rows for the `horizon` months after the training window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastResult {
    pub horizon: usize,
    pub confidence_level: f64,
    pub points: Vec<ForecastPoint>,
}

impl ForecastResult {
    pub fn point_estimates(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.point_estimate).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::OptimizerMethod;

    /// Trend + seasonality + a seasonally integrated noise component.
    fn seasonal_series(n: usize) -> TimeSeries {
        let mut state = 7u64;
        let mut x = vec![0.0; n];
        for t in 0..n {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
            let e = 2.0 * ((state >> 33) as f64 / (1u64 << 31) as f64 - 0.5);
            x[t] = e;
            if t >= 1 {
                x[t] += x[t - 1];
            }
            if t >= 12 {
                x[t] += x[t - 12];
            }
            if t >= 13 {
                x[t] -= x[t - 13];
            }
        }
        let values = (0..n)
            .map(|t| 200.0 + 1.5 * t as f64 + 20.0 * (2.0 * std::f64::consts::PI * t as f64 / 12.0).sin() + x[t])
            .collect();
        TimeSeries::new(Period::new(2014, 1).unwrap(), values).unwrap()
    }

    fn airline_spec() -> ModelSpec {
        ModelSpec::new(0, 1, 1, 0, 1, 1, 12).unwrap()
    }

    #[test]
    fn test_state_transitions() {
        let mut model = SeasonalModel::new(airline_spec(), FitOptions::default());
        assert_eq!(model.state(), ModelState::Unfit);
        let fitted = model.fit(&seasonal_series(60)).unwrap();
        assert_eq!(model.state(), ModelState::Fit);
        assert!(fitted.warnings().is_empty());
        assert!(fitted.scale() > 0.0);
    }

    #[test]
    fn test_failed_state_on_short_series() {
        let mut model = SeasonalModel::new(airline_spec(), FitOptions::default());
        let short = TimeSeries::new(Period::new(2014, 1).unwrap(), vec![1.0; 10]).unwrap();
        assert!(matches!(model.fit(&short), Err(ForecastError::InsufficientData { .. })));
        assert_eq!(model.state(), ModelState::Failed);
    }

    #[test]
    fn test_exhausted_budget_is_convergence_error() {
        let opts = FitOptions {
            max_iter: 0,
            ..FitOptions::default()
        };
        let mut model = SeasonalModel::new(airline_spec(), opts);
        match model.fit(&seasonal_series(60)) {
            Err(ForecastError::Convergence { loglike, params, .. }) => {
                assert!(loglike.is_finite());
                assert_eq!(params.len(), 2);
            }
            other => panic!("expected Convergence, got {:?}", other),
        }
        assert_eq!(model.state(), ModelState::Failed);
    }

    #[test]
    fn test_short_history_warning() {
        let mut model = SeasonalModel::new(airline_spec(), FitOptions::default());
        let fitted = model.fit(&seasonal_series(30)).unwrap();
        assert_eq!(
            fitted.warnings(),
            &[FitWarning::ShortHistory {
                observations: 30,
                recommended: 36
            }]
        );
    }

    #[test]
    fn test_forecast_rows_follow_training_window() {
        let mut model = SeasonalModel::new(airline_spec(), FitOptions::default());
        let series = seasonal_series(60);
        let fitted = model.fit(&series).unwrap();
        let fc = SeasonalModel::forecast(&fitted, 12, 0.95).unwrap();

        assert_eq!(fc.horizon, 12);
        assert_eq!(fc.points.len(), 12);
        assert_eq!(fc.points[0].period, series.end().succ());
        assert_eq!(fc.points[11].period, series.end().offset(12));
        for w in fc.points.windows(2) {
            assert_eq!(w[0].period.succ(), w[1].period);
            let width0 = w[0].upper_bound - w[0].lower_bound;
            let width1 = w[1].upper_bound - w[1].lower_bound;
            assert!(width1 >= width0 - 1e-9);
        }
        for p in &fc.points {
            assert!(p.lower_bound <= p.point_estimate && p.point_estimate <= p.upper_bound);
        }
    }

    #[test]
    fn test_forecast_is_idempotent() {
        let mut model = SeasonalModel::new(airline_spec(), FitOptions::default());
        let fitted = model.fit(&seasonal_series(48)).unwrap();
        let a = fitted.forecast(6, 0.9).unwrap();
        let b = fitted.forecast(6, 0.9).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_forecast_rejects_zero_horizon_and_bad_level() {
        let mut model = SeasonalModel::new(airline_spec(), FitOptions::default());
        let fitted = model.fit(&seasonal_series(48)).unwrap();
        assert!(matches!(
            fitted.forecast(0, 0.95),
            Err(ForecastError::InvalidHorizon { horizon: 0 })
        ));
        assert!(matches!(
            fitted.forecast(3, 1.5),
            Err(ForecastError::InvalidConfidenceLevel { .. })
        ));
    }

    #[test]
    fn test_wider_level_gives_wider_interval() {
        let opts = FitOptions {
            method: OptimizerMethod::NelderMead,
            ..FitOptions::default()
        };
        let mut model = SeasonalModel::new(airline_spec(), opts);
        let fitted = model.fit(&seasonal_series(48)).unwrap();
        let narrow = fitted.forecast(3, 0.8).unwrap();
        let wide = fitted.forecast(3, 0.99).unwrap();
        for (n, w) in narrow.points.iter().zip(wide.points.iter()) {
            assert_eq!(n.point_estimate, w.point_estimate);
            assert!(w.upper_bound - w.lower_bound > n.upper_bound - n.lower_bound);
        }
    }

    #[test]
    fn test_residual_diagnostics_exclude_burn() {
        let mut model = SeasonalModel::new(airline_spec(), FitOptions::default());
        let fitted = model.fit(&seasonal_series(60)).unwrap();
        let diag = fitted.residual_diagnostics(24).unwrap();
        assert_eq!(diag.residuals.len(), 60 - 13);
        assert_eq!(diag.acf.len(), 24);
        assert!(diag.ljung_box.is_some());
    }
}
