use nalgebra::{DMatrix, DVector};

use crate::error::{ForecastError, Result};
use crate::state_space::StateSpace;

/// Diffuse variance used for states without a stationary distribution.
pub const DIFFUSE_KAPPA: f64 = 1e6;

const LYAPUNOV_MAX_ITER: usize = 64;
const LYAPUNOV_TOL: f64 = 1e-12;

/// Kalman filter initial state and covariance.
#[derive(Debug, Clone)]
pub struct KalmanInit {
    /// Initial state vector a_0 (zeros).
    pub initial_state: DVector<f64>,
    pub initial_state_cov: DMatrix<f64>,
    /// Number of initial observations skipped by the loglikelihood.
    pub loglikelihood_burn: usize,
}

impl KalmanInit {
    /// P_0 = kappa * I on every state; burn = k_states.
    pub fn approximate_diffuse(k_states: usize, kappa: f64) -> Self {
        Self {
            initial_state: DVector::zeros(k_states),
            initial_state_cov: DMatrix::identity(k_states, k_states) * kappa,
            loglikelihood_burn: k_states,
        }
    }

    /// Diffuse differencing states, ARMA block started from its stationary
    /// covariance; burn = k_states_diff.
    pub fn stationary(ss: &StateSpace) -> Result<Self> {
        let k = ss.k_states;
        let sd = ss.k_states_diff;
        let ko = ss.k_order;

        let arma_cov = solve_discrete_lyapunov(&ss.arma_transition(), &ss.arma_state_cov())?;

        let mut cov = DMatrix::<f64>::zeros(k, k);
        for i in 0..sd {
            cov[(i, i)] = DIFFUSE_KAPPA;
        }
        cov.view_mut((sd, sd), (ko, ko)).copy_from(&arma_cov);

        Ok(Self {
            initial_state: DVector::zeros(k),
            initial_state_cov: cov,
            loglikelihood_burn: sd,
        })
    }

    pub fn for_model(ss: &StateSpace, enforce_stationarity: bool) -> Result<Self> {
        if enforce_stationarity {
            Self::stationary(ss)
        } else {
            Ok(Self::approximate_diffuse(ss.k_states, DIFFUSE_KAPPA))
        }
    }
}

/// Solve P = T P T' + Q by the doubling iteration
/// `P <- P + A P A'`, `A <- A A`, which sums 2^k terms after k steps.
pub fn solve_discrete_lyapunov(t: &DMatrix<f64>, q: &DMatrix<f64>) -> Result<DMatrix<f64>> {
    let mut p = q.clone();
    let mut a = t.clone();
    for _ in 0..LYAPUNOV_MAX_ITER {
        let increment = &a * &p * a.transpose();
        let size = increment.abs().max();
        p += increment;
        if !p.iter().all(|v| v.is_finite()) {
            break;
        }
        if size <= LYAPUNOV_TOL * p.abs().max().max(1.0) {
            let sym = (&p + p.transpose()) * 0.5;
            return Ok(sym);
        }
        a = &a * &a;
    }
    Err(ForecastError::StateSpace(
        "ARMA block has no stationary covariance (unit root in AR polynomial)".into(),
    ))
}
