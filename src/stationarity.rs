//! Augmented Dickey-Fuller unit-root test.
//!
//! Regression with a constant:
//!   dy_t = c + gamma * y_{t-1} + sum_{i=1..k} b_i * dy_{t-i} + e_t
//! The lag order k is chosen by AIC on a common sample, then the regression
//! is refit on the longest sample for that k. The statistic is the t-value of
//! gamma; p-values follow MacKinnon (1994), critical values MacKinnon (2010).

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};
use tracing::{debug, warn};

use crate::differencing::{difference, DifferencingSpec};
use crate::error::{ForecastError, Result};
use crate::series::TimeSeries;

// MacKinnon (1994) response surface, constant-only regression, one variable.
const TAU_MAX: f64 = 2.74;
const TAU_MIN: f64 = -18.83;
const TAU_STAR: f64 = -1.61;
const TAU_SMALLP: [f64; 3] = [2.1659, 1.4412, 0.038269];
const TAU_LARGEP: [f64; 4] = [1.7339, 0.93202, -0.12745, -0.010368];

// MacKinnon (2010) finite-sample critical values: b0 + b1/n + b2/n^2 + b3/n^3.
const CRIT_1: [f64; 4] = [-3.43035, -6.5393, -16.786, -79.433];
const CRIT_5: [f64; 4] = [-2.86154, -2.8903, -4.234, -40.04];
const CRIT_10: [f64; 4] = [-2.56677, -1.5384, -2.809, 0.0];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StationarityConfig {
    /// Reject the unit root when p < significance.
    pub significance: f64,
    /// Upper bound for the lag search; `None` uses 12 * (n/100)^(1/4).
    pub max_lag: Option<usize>,
    pub seasonal_period: usize,
    /// Differencing variants examined by `analyze_variants`, in order.
    pub variants: Vec<DifferencingSpec>,
}

impl Default for StationarityConfig {
    fn default() -> Self {
        let s = 12;
        Self {
            significance: 0.05,
            max_lag: None,
            seasonal_period: s,
            variants: vec![
                DifferencingSpec::identity(s),
                DifferencingSpec { order: 1, seasonal_order: 0, seasonal_period: s },
                DifferencingSpec { order: 0, seasonal_order: 1, seasonal_period: s },
                DifferencingSpec { order: 1, seasonal_order: 1, seasonal_period: s },
            ],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CriticalValues {
    pub one_percent: f64,
    pub five_percent: f64,
    pub ten_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationarityReport {
    pub test_statistic: f64,
    pub p_value: f64,
    pub used_lag: usize,
    /// Observations in the final regression.
    pub n_obs: usize,
    pub critical_values: CriticalValues,
    pub is_stationary: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantReport {
    pub differencing: DifferencingSpec,
    pub report: StationarityReport,
}

#[derive(Debug, Clone, Default)]
pub struct StationarityAnalyzer {
    config: StationarityConfig,
}

impl StationarityAnalyzer {
    pub fn new(config: StationarityConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &StationarityConfig {
        &self.config
    }

    pub fn analyze(&self, series: &TimeSeries) -> Result<StationarityReport> {
        let needed = 2 * self.config.seasonal_period;
        if series.len() < needed {
            return Err(ForecastError::InsufficientData {
                needed,
                got: series.len(),
            });
        }
        adf_test(series.values(), self.config.max_lag, self.config.significance)
    }

    /// Test every configured variant. Variants too short to difference or
    /// test, and variants left constant or collinear by differencing, are
    /// skipped with a warning.
    pub fn analyze_variants(&self, series: &TimeSeries) -> Result<Vec<VariantReport>> {
        let mut out = Vec::with_capacity(self.config.variants.len());
        for &variant in &self.config.variants {
            let transformed = match difference(series, &variant) {
                Ok(t) => t,
                Err(ForecastError::SeriesTooShort { len, required }) => {
                    warn!(%variant, len, required, "skipping differencing variant");
                    continue;
                }
                Err(e) => return Err(e),
            };
            match self.analyze(&transformed) {
                Ok(report) => out.push(VariantReport {
                    differencing: variant,
                    report,
                }),
                Err(ForecastError::InsufficientData { needed, got }) => {
                    warn!(%variant, needed, got, "skipping differencing variant");
                }
                Err(ForecastError::DegenerateSeries(reason)) => {
                    warn!(%variant, %reason, "skipping degenerate differencing variant");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(out)
    }

    /// First configured variant whose unit root is rejected.
    pub fn suggest_differencing(&self, series: &TimeSeries) -> Result<Option<DifferencingSpec>> {
        Ok(self
            .analyze_variants(series)?
            .into_iter()
            .find(|v| v.report.is_stationary)
            .map(|v| v.differencing))
    }
}

/// Relative range below which a series is treated as constant.
const CONSTANT_TOLERANCE: f64 = 1e-9;

/// Default lag ceiling: ceil(12 * (n/100)^(1/4)), at most n/2 - 2.
pub fn default_max_lag(n: usize) -> usize {
    let schwert = (12.0 * (n as f64 / 100.0).powf(0.25)).ceil() as usize;
    schwert.min((n / 2).saturating_sub(2))
}

/// OLS fit: coefficients, their standard errors and the residual sum of squares.
struct OlsFit {
    beta: DVector<f64>,
    std_err: DVector<f64>,
    ssr: f64,
}

/// Smallest pivot ratio of the column-scaled Cholesky factor before the
/// regressors count as collinear.
const MIN_PIVOT_RATIO: f64 = 1e-7;

/// Residual share of the target energy below which the series is deterministic.
const PERFECT_FIT_TOLERANCE: f64 = 1e-20;

fn ols(x: &DMatrix<f64>, y: &DVector<f64>) -> Result<OlsFit> {
    let (nobs, k) = x.shape();
    if nobs <= k {
        return Err(ForecastError::InsufficientData {
            needed: k + 1,
            got: nobs,
        });
    }
    // unit-norm columns so the pivot check ignores the level of the data
    let norms: Vec<f64> = (0..k).map(|j| x.column(j).norm()).collect();
    if norms.iter().any(|&c| !(c > 0.0) || !c.is_finite()) {
        return Err(ForecastError::DegenerateSeries("ADF regressor is identically zero".into()));
    }
    let mut xs = x.clone();
    for (j, &c) in norms.iter().enumerate() {
        xs.column_mut(j).scale_mut(1.0 / c);
    }
    let singular = || ForecastError::DegenerateSeries("ADF regressors are collinear".into());
    let xtx = xs.transpose() * &xs;
    let chol = xtx.cholesky().ok_or_else(singular)?;
    let diag = chol.l().diagonal();
    if diag.min() < MIN_PIVOT_RATIO * diag.max() {
        return Err(singular());
    }
    let beta_s = chol.solve(&(xs.transpose() * y));
    let resid = y - &xs * &beta_s;
    let ssr = resid.dot(&resid);
    if ssr <= PERFECT_FIT_TOLERANCE * y.dot(y) {
        return Err(ForecastError::DegenerateSeries("ADF regression fits exactly".into()));
    }
    let sigma2 = ssr / (nobs - k) as f64;
    let xtx_inv = chol.inverse();
    let beta = DVector::from_iterator(k, (0..k).map(|i| beta_s[i] / norms[i]));
    let std_err = DVector::from_iterator(
        k,
        (0..k).map(|i| (sigma2 * xtx_inv[(i, i)]).max(0.0).sqrt() / norms[i]),
    );
    Ok(OlsFit { beta, std_err, ssr })
}

/// Regressors `[1, y_{t-1}, dy_{t-1}, ..., dy_{t-lags}]` and target `dy_t`
/// over the last `nobs` differences.
fn adf_design(y: &[f64], dy: &[f64], lags: usize, nobs: usize) -> (DMatrix<f64>, DVector<f64>) {
    let first = dy.len() - nobs;
    let x = DMatrix::from_fn(nobs, lags + 2, |r, c| {
        let t = first + r;
        match c {
            0 => 1.0,
            // dy[t] = y[t+1] - y[t], so the level before dy[t] is y[t]
            1 => y[t],
            j => dy[t - (j - 1)],
        }
    });
    let target = DVector::from_iterator(nobs, dy[first..].iter().copied());
    (x, target)
}

fn gaussian_aic(ssr: f64, nobs: usize, k: usize) -> f64 {
    let n = nobs as f64;
    n * ((2.0 * std::f64::consts::PI).ln() + (ssr / n).ln() + 1.0) + 2.0 * k as f64
}

/// ADF test with a constant and AIC lag selection over `0..=max_lag`.
pub fn adf_test(y: &[f64], max_lag: Option<usize>, significance: f64) -> Result<StationarityReport> {
    let n = y.len();
    let max_lag = max_lag.unwrap_or_else(|| default_max_lag(n)).min((n / 2).saturating_sub(2));
    if n < 4 {
        return Err(ForecastError::InsufficientData { needed: 4, got: n });
    }
    let (lo, hi) = y
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    let scale = lo.abs().max(hi.abs()).max(1.0);
    if !(hi - lo > CONSTANT_TOLERANCE * scale) {
        return Err(ForecastError::DegenerateSeries(format!(
            "numerically constant (range {:e})",
            hi - lo
        )));
    }
    let dy: Vec<f64> = y.windows(2).map(|w| w[1] - w[0]).collect();

    let common = dy.len() - max_lag;
    let mut best_lag = 0;
    let mut best_aic = f64::INFINITY;
    for lag in 0..=max_lag {
        let (x, target) = adf_design(y, &dy, lag, common);
        let fit = match ols(&x, &target) {
            Ok(fit) => fit,
            // longer lag sets only add more collinear columns
            Err(ForecastError::DegenerateSeries(reason)) if lag > 0 => {
                debug!(lag, %reason, "stopping lag search");
                break;
            }
            Err(e) => return Err(e),
        };
        let aic = gaussian_aic(fit.ssr, common, lag + 2);
        if aic < best_aic {
            best_aic = aic;
            best_lag = lag;
        }
    }

    let nobs = dy.len() - best_lag;
    let (x, target) = adf_design(y, &dy, best_lag, nobs);
    let fit = ols(&x, &target)?;
    let se = fit.std_err[1];
    let test_statistic = fit.beta[1] / se;
    if !(se > 0.0) || !test_statistic.is_finite() {
        return Err(ForecastError::DegenerateSeries(
            "ADF statistic undefined: perfect fit".into(),
        ));
    }
    let p_value = mackinnon_p_value(test_statistic)?;
    debug!(test_statistic, p_value, used_lag = best_lag, nobs, "ADF test");

    Ok(StationarityReport {
        test_statistic,
        p_value,
        used_lag: best_lag,
        n_obs: nobs,
        critical_values: critical_values(nobs),
        is_stationary: p_value < significance,
    })
}

fn horner(coeffs: &[f64], x: f64) -> f64 {
    coeffs.iter().rev().fold(0.0, |acc, c| acc * x + c)
}

/// Approximate asymptotic p-value of the ADF statistic.
pub fn mackinnon_p_value(stat: f64) -> Result<f64> {
    if stat > TAU_MAX {
        return Ok(1.0);
    }
    if stat < TAU_MIN {
        return Ok(0.0);
    }
    let z = if stat <= TAU_STAR {
        horner(&TAU_SMALLP, stat)
    } else {
        horner(&TAU_LARGEP, stat)
    };
    let normal = Normal::new(0.0, 1.0).map_err(|e| ForecastError::Data(e.to_string()))?;
    Ok(normal.cdf(z))
}

pub fn critical_values(nobs: usize) -> CriticalValues {
    let inv = 1.0 / nobs as f64;
    CriticalValues {
        one_percent: horner(&CRIT_1, inv),
        five_percent: horner(&CRIT_5, inv),
        ten_percent: horner(&CRIT_10, inv),
    }
}
