use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ForecastError, Result};

/// SARIMA(p,d,q)(P,D,Q,s) order specification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelSpec {
    pub p: usize,  // AR order
    pub d: usize,  // differencing order
    pub q: usize,  // MA order
    pub pp: usize, // seasonal AR order (P)
    pub dd: usize, // seasonal differencing order (D)
    pub qq: usize, // seasonal MA order (Q)
    pub s: usize,  // seasonal period
}

impl ModelSpec {
    pub fn new(p: usize, d: usize, q: usize, pp: usize, dd: usize, qq: usize, s: usize) -> Result<Self> {
        let spec = Self { p, d, q, pp, dd, qq, s };
        spec.validate()?;
        Ok(spec)
    }

    /// `(order, seasonal_order)` tuples as written in config files.
    pub fn from_orders(order: [usize; 3], seasonal_order: [usize; 4]) -> Result<Self> {
        let [p, d, q] = order;
        let [pp, dd, qq, s] = seasonal_order;
        Self::new(p, d, q, pp, dd, qq, s)
    }

    pub fn validate(&self) -> Result<()> {
        if self.s < 2 {
            return Err(ForecastError::InvalidSpec(format!(
                "seasonal period must be at least 2, got {}",
                self.s
            )));
        }
        if self.dd > 1 {
            return Err(ForecastError::InvalidSpec(format!(
                "seasonal differencing order D={} is not supported (D must be 0 or 1)",
                self.dd
            )));
        }
        Ok(())
    }

    /// Extended AR order: p + s*P
    pub fn k_ar(&self) -> usize {
        self.p + self.s * self.pp
    }

    /// Extended MA order: q + s*Q
    pub fn k_ma(&self) -> usize {
        self.q + self.s * self.qq
    }

    /// State space ARMA dimension: max(k_ar, k_ma + 1)
    pub fn k_order(&self) -> usize {
        std::cmp::max(self.k_ar(), self.k_ma() + 1)
    }

    /// Differencing state dimension: d + s*D
    pub fn k_states_diff(&self) -> usize {
        self.d + self.s * self.dd
    }

    pub fn k_states(&self) -> usize {
        self.k_order() + self.k_states_diff()
    }

    /// Optimized coefficients (sigma2 is concentrated out).
    pub fn n_coeffs(&self) -> usize {
        self.p + self.q + self.pp + self.qq
    }

    /// Parameters counted by AIC/BIC, sigma2 included.
    pub fn n_estimated_params(&self) -> usize {
        self.n_coeffs() + 1
    }

    /// Observations skipped by the likelihood before it starts counting.
    pub fn loglikelihood_burn(&self, enforce_stationarity: bool) -> usize {
        if enforce_stationarity {
            self.k_states_diff()
        } else {
            self.k_states()
        }
    }

    /// Smallest series the model can be fitted on.
    pub fn min_observations(&self, enforce_stationarity: bool) -> usize {
        self.loglikelihood_burn(enforce_stationarity) + self.n_estimated_params() + 1
    }
}

impl fmt::Display for ModelSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SARIMA({},{},{})({},{},{},{})",
            self.p, self.d, self.q, self.pp, self.dd, self.qq, self.s
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OptimizerMethod {
    /// L-BFGS, falling back to Nelder-Mead when it fails or stalls.
    Lbfgs,
    NelderMead,
}

impl fmt::Display for OptimizerMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptimizerMethod::Lbfgs => write!(f, "lbfgs"),
            OptimizerMethod::NelderMead => write!(f, "nelder-mead"),
        }
    }
}

/// Estimation options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitOptions {
    pub enforce_stationarity: bool,
    pub enforce_invertibility: bool,
    pub method: OptimizerMethod,
    /// Iteration budget shared by L-BFGS and the Nelder-Mead fallback.
    pub max_iter: u64,
    pub start_params: Option<Vec<f64>>,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            enforce_stationarity: true,
            enforce_invertibility: true,
            method: OptimizerMethod::Lbfgs,
            max_iter: 1000,
            start_params: None,
        }
    }
}

/// Raw optimizer output.
#[derive(Debug, Clone)]
pub struct FitResult {
    pub params: Vec<f64>,
    pub loglike: f64,
    pub scale: f64,
    pub n_obs: usize,
    pub n_params: usize,
    pub n_iter: u64,
    pub converged: bool,
    pub method: String,
    pub aic: f64,
    pub bic: f64,
}

impl FitResult {
    /// AIC = -2 ll + 2k, BIC = -2 ll + k ln(n).
    pub fn with_information_criteria(mut self) -> Self {
        let k = self.n_params as f64;
        self.aic = -2.0 * self.loglike + 2.0 * k;
        self.bic = -2.0 * self.loglike + k * (self.n_obs as f64).ln();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sarima_111_111_12_k_states() {
        // k_ar = 13, k_ma = 13, k_order = max(13, 14) = 14, k_diff = 13
        let spec = ModelSpec::new(1, 1, 1, 1, 1, 1, 12).unwrap();
        assert_eq!(spec.k_ar(), 13);
        assert_eq!(spec.k_ma(), 13);
        assert_eq!(spec.k_order(), 14);
        assert_eq!(spec.k_states_diff(), 13);
        assert_eq!(spec.k_states(), 27);
        assert_eq!(spec.n_estimated_params(), 5);
        assert_eq!(spec.min_observations(true), 13 + 5 + 1);
        assert_eq!(spec.min_observations(false), 27 + 5 + 1);
    }

    #[test]
    fn test_arima_110_k_states() {
        let spec = ModelSpec::new(1, 1, 0, 0, 0, 0, 12).unwrap();
        assert_eq!(spec.k_order(), 1);
        assert_eq!(spec.k_states_diff(), 1);
        assert_eq!(spec.k_states(), 2);
    }

    #[test]
    fn test_validate_rejects_bad_specs() {
        assert!(matches!(
            ModelSpec::new(1, 1, 1, 1, 2, 1, 12),
            Err(ForecastError::InvalidSpec(_))
        ));
        assert!(ModelSpec::new(1, 0, 0, 0, 0, 0, 1).is_err());
    }

    #[test]
    fn test_display() {
        let spec = ModelSpec::from_orders([1, 1, 1], [1, 1, 1, 12]).unwrap();
        assert_eq!(spec.to_string(), "SARIMA(1,1,1)(1,1,1,12)");
    }

    #[test]
    fn test_information_criteria() {
        let r = FitResult {
            params: vec![0.5],
            loglike: -100.0,
            scale: 1.0,
            n_obs: 100,
            n_params: 2,
            n_iter: 10,
            converged: true,
            method: "lbfgs".into(),
            aic: 0.0,
            bic: 0.0,
        }
        .with_information_criteria();
        assert!((r.aic - 204.0).abs() < 1e-12);
        assert!((r.bic - (200.0 + 2.0 * 100f64.ln())).abs() < 1e-12);
    }

    #[test]
    fn test_default_options_enforce_constraints() {
        let opts = FitOptions::default();
        assert!(opts.enforce_stationarity);
        assert!(opts.enforce_invertibility);
        assert_eq!(opts.method, OptimizerMethod::Lbfgs);
    }
}
