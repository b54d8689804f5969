use statrs::distribution::{ContinuousCDF, Normal};

use crate::error::{ForecastError, Result};
use crate::initialization::KalmanInit;
use crate::kalman::{kalman_filter, KalmanFilterOutput};
use crate::params::SarimaParams;
use crate::state_space::StateSpace;
use crate::types::ModelSpec;

/// H-step ahead forecast in levels.
#[derive(Debug, Clone)]
pub struct StateForecast {
    /// E[y_{n+h}] for h = 1..steps.
    pub mean: Vec<f64>,
    /// Var[y_{n+h}], scale included.
    pub variance: Vec<f64>,
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
}

/// Innovations and their standardized form.
#[derive(Debug, Clone)]
pub struct ResidualOutput {
    pub residuals: Vec<f64>,
    /// v_t / sqrt(F_t * scale).
    pub standardized_residuals: Vec<f64>,
    /// Leading observations dominated by the diffuse initialization.
    pub burn: usize,
}

/// Two-sided standard normal quantile for `confidence_level`.
pub fn normal_quantile(confidence_level: f64) -> Result<f64> {
    if !(confidence_level > 0.0 && confidence_level < 1.0) {
        return Err(ForecastError::InvalidConfidenceLevel {
            level: confidence_level,
        });
    }
    let normal = Normal::new(0.0, 1.0).map_err(|e| ForecastError::Data(e.to_string()))?;
    Ok(normal.inverse_cdf(0.5 + confidence_level / 2.0))
}

/// Propagate the filtered state past the sample:
///   y_hat_h = Z' a_h,  Var_h = Z' P_h Z * scale
///   a_{h+1} = T a_h,   P_{h+1} = T P_h T' + R R'
pub fn forecast_states(
    ss: &StateSpace,
    filter_output: &KalmanFilterOutput,
    steps: usize,
    confidence_level: f64,
) -> Result<StateForecast> {
    let z_crit = normal_quantile(confidence_level)?;
    let z = &ss.design;
    let scale = filter_output.scale;

    let mut a = filter_output.predicted_state.clone();
    let mut p = filter_output.predicted_cov.clone();

    let mut out = StateForecast {
        mean: Vec::with_capacity(steps),
        variance: Vec::with_capacity(steps),
        lower: Vec::with_capacity(steps),
        upper: Vec::with_capacity(steps),
    };

    for _ in 0..steps {
        let y_hat = z.dot(&a);
        let var = (z.dot(&(&p * z)) * scale).max(0.0);
        let half_width = z_crit * var.sqrt();

        out.mean.push(y_hat);
        out.variance.push(var);
        out.lower.push(y_hat - half_width);
        out.upper.push(y_hat + half_width);

        a = ss.predict_state(&a);
        p = ss.predict_cov(&p);
    }

    Ok(out)
}

pub fn compute_residuals(filter_output: &KalmanFilterOutput) -> ResidualOutput {
    let scale = filter_output.scale;
    let standardized = filter_output
        .innovations
        .iter()
        .zip(filter_output.innovation_vars.iter())
        .map(|(&v, &f)| {
            let var = f * scale;
            if var > 0.0 {
                v / var.sqrt()
            } else {
                0.0
            }
        })
        .collect();

    ResidualOutput {
        residuals: filter_output.innovations.clone(),
        standardized_residuals: standardized,
        burn: filter_output.burn,
    }
}

/// Build the state space for `params` and filter `endog` through it.
pub fn filter_series(
    endog: &[f64],
    spec: &ModelSpec,
    params: &SarimaParams,
    enforce_stationarity: bool,
) -> Result<(StateSpace, KalmanFilterOutput)> {
    let ss = StateSpace::new(spec, params)?;
    let init = KalmanInit::for_model(&ss, enforce_stationarity)?;
    let fo = kalman_filter(endog, &ss, &init)?;
    Ok((ss, fo))
}
