use nalgebra::{DMatrix, DVector};

use crate::error::{ForecastError, Result};
use crate::initialization::KalmanInit;
use crate::state_space::StateSpace;

/// Output of a Kalman filter pass over the observed series.
#[derive(Debug, Clone)]
pub struct KalmanFilterOutput {
    /// Concentrated log-likelihood.
    pub loglike: f64,
    /// Concentrated scale sigma2_hat.
    pub scale: f64,
    /// One-step-ahead forecast errors v_t.
    pub innovations: Vec<f64>,
    /// Innovation variances F_t in units of sigma2.
    pub innovation_vars: Vec<f64>,
    /// a_{n+1|n}: state prediction one step past the sample.
    pub predicted_state: DVector<f64>,
    /// P_{n+1|n} in units of sigma2.
    pub predicted_cov: DMatrix<f64>,
    pub n_obs_effective: usize,
    pub burn: usize,
}

/// Run the Kalman filter with the scale concentrated out.
///
/// Per observation:
///   - v_t = y_t - Z' a_{t|t-1},  F_t = Z' P_{t|t-1} Z
///   - a_{t|t} = a_{t|t-1} + P Z v_t / F_t
///   - P_{t|t} = P_{t|t-1} - (P Z)(P Z)' / F_t
///   - a_{t+1|t} = T a_{t|t},  P_{t+1|t} = T P_{t|t} T' + R R'
///
/// sigma2_hat = (1/n_eff) sum(v_t^2 / F_t) and
/// loglike = -n_eff/2 ln(2 pi) - n_eff/2 ln(sigma2_hat) - n_eff/2 - 1/2 sum(ln F_t),
/// both accumulated over t >= burn.
pub fn kalman_filter(endog: &[f64], ss: &StateSpace, init: &KalmanInit) -> Result<KalmanFilterOutput> {
    let n = endog.len();
    let burn = init.loglikelihood_burn;
    if n <= burn {
        return Err(ForecastError::InsufficientData {
            needed: burn + 1,
            got: n,
        });
    }
    let n_eff = n - burn;

    let mut a = init.initial_state.clone();
    let mut p = init.initial_state_cov.clone();
    let z = &ss.design;

    let mut sum_log_f = 0.0;
    let mut sum_v2_f = 0.0;
    let mut innovations = Vec::with_capacity(n);
    let mut innovation_vars = Vec::with_capacity(n);

    for (t, &y) in endog.iter().enumerate() {
        let v = y - z.dot(&a);
        let pz = &p * z;
        let f = z.dot(&pz);
        innovations.push(v);
        innovation_vars.push(f);

        if f > 0.0 {
            a += &pz * (v / f);
            p -= (&pz * pz.transpose()) / f;
            if t >= burn {
                sum_log_f += f.ln();
                sum_v2_f += v * v / f;
            }
        }

        a = ss.predict_state(&a);
        p = ss.predict_cov(&p);
        // keep P symmetric against round-off
        p = (&p + p.transpose()) * 0.5;
    }

    let nf = n_eff as f64;
    let scale = sum_v2_f / nf;
    let loglike = -0.5 * nf * (2.0 * std::f64::consts::PI).ln()
        - 0.5 * nf * scale.max(1e-300).ln()
        - 0.5 * nf
        - 0.5 * sum_log_f;

    Ok(KalmanFilterOutput {
        loglike,
        scale,
        innovations,
        innovation_vars,
        predicted_state: a,
        predicted_cov: p,
        n_obs_effective: n_eff,
        burn,
    })
}

/// Concentrated log-likelihood and scale only.
pub fn kalman_loglike(endog: &[f64], ss: &StateSpace, init: &KalmanInit) -> Result<(f64, f64)> {
    let out = kalman_filter(endog, ss, init)?;
    Ok((out.loglike, out.scale))
}
