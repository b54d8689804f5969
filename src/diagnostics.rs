//! Residual autocorrelation checks for fitted models.

use serde::{Deserialize, Serialize};
use statrs::distribution::{ChiSquared, ContinuousCDF};

use crate::error::{ForecastError, Result};

/// Sample autocovariance at lag `k` (divisor n).
pub fn autocovariance(y: &[f64], k: usize) -> f64 {
    let n = y.len();
    if k >= n {
        return 0.0;
    }
    let mean: f64 = y.iter().sum::<f64>() / n as f64;
    let mut sum = 0.0;
    for i in 0..n - k {
        sum += (y[i] - mean) * (y[i + k] - mean);
    }
    sum / n as f64
}

/// Sample autocorrelations for lags 1..=nlags.
pub fn acf(y: &[f64], nlags: usize) -> Vec<f64> {
    let g0 = autocovariance(y, 0);
    if g0 <= 0.0 {
        return vec![0.0; nlags];
    }
    (1..=nlags).map(|k| autocovariance(y, k) / g0).collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LjungBox {
    pub lags: usize,
    pub statistic: f64,
    pub p_value: f64,
    pub dof: usize,
}

/// Ljung-Box portmanteau test: Q = n(n+2) sum_k r_k^2 / (n-k), compared to
/// chi-squared with `lags - fitted_params` degrees of freedom.
pub fn ljung_box(resid: &[f64], lags: usize, fitted_params: usize) -> Result<LjungBox> {
    let n = resid.len();
    if lags == 0 || lags >= n {
        return Err(ForecastError::InsufficientData {
            needed: lags + 1,
            got: n,
        });
    }
    let dof = lags.saturating_sub(fitted_params).max(1);
    let r = acf(resid, lags);
    let nf = n as f64;
    let statistic = nf * (nf + 2.0)
        * r.iter()
            .enumerate()
            .map(|(i, rk)| rk * rk / (nf - (i + 1) as f64))
            .sum::<f64>();
    let chi2 = ChiSquared::new(dof as f64).map_err(|e| ForecastError::Data(e.to_string()))?;
    Ok(LjungBox {
        lags,
        statistic,
        p_value: 1.0 - chi2.cdf(statistic),
        dof,
    })
}

/// Residual summary of a fitted model, burn-in observations excluded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResidualDiagnostics {
    pub residuals: Vec<f64>,
    pub standardized: Vec<f64>,
    /// Autocorrelations of the standardized residuals, lag 1 first.
    pub acf: Vec<f64>,
    pub ljung_box: Option<LjungBox>,
}

impl ResidualDiagnostics {
    pub fn from_residuals(residuals: Vec<f64>, standardized: Vec<f64>, nlags: usize, fitted_params: usize) -> Self {
        let nlags = nlags.min(standardized.len().saturating_sub(1));
        let acf = acf(&standardized, nlags);
        let ljung_box = ljung_box(&standardized, nlags, fitted_params).ok();
        Self {
            residuals,
            standardized,
            acf,
            ljung_box,
        }
    }

    /// No residual autocorrelation left at `significance`.
    pub fn is_white_noise(&self, significance: f64) -> bool {
        self.ljung_box
            .as_ref()
            .map(|lb| lb.p_value >= significance)
            .unwrap_or(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noise(n: usize, seed: u64) -> Vec<f64> {
        let mut state = seed;
        (0..n)
            .map(|_| {
                state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                (state >> 33) as f64 / (1u64 << 31) as f64 - 0.5
            })
            .collect()
    }

    #[test]
    fn test_acf_of_alternating_series() {
        let y: Vec<f64> = (0..50).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();
        let r = acf(&y, 2);
        assert!((r[0] + 0.98).abs() < 1e-9);
        assert!((r[1] - 0.96).abs() < 1e-9);
    }

    #[test]
    fn test_acf_constant_series() {
        assert_eq!(acf(&[2.0; 10], 3), vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_ljung_box_detects_autocorrelation() {
        let e = noise(200, 7);
        let mut ar = vec![0.0; 200];
        for t in 1..200 {
            ar[t] = 0.8 * ar[t - 1] + e[t];
        }
        let lb_ar = ljung_box(&ar, 10, 0).unwrap();
        assert!(lb_ar.p_value < 0.01, "p = {}", lb_ar.p_value);
        assert_eq!(lb_ar.dof, 10);
    }

    #[test]
    fn test_ljung_box_needs_enough_data() {
        assert!(ljung_box(&[1.0, 2.0, 3.0], 5, 0).is_err());
    }

    #[test]
    fn test_residual_diagnostics_caps_lags() {
        let e = noise(10, 3);
        let d = ResidualDiagnostics::from_residuals(e.clone(), e, 24, 2);
        assert_eq!(d.acf.len(), 9);
        assert!(d.ljung_box.is_some());
    }
}
