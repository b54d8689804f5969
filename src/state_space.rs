use nalgebra::{DMatrix, DVector};

use crate::error::{ForecastError, Result};
use crate::params::SarimaParams;
use crate::polynomial::{reduced_ar, reduced_ma};
use crate::types::ModelSpec;

/// Harvey-representation state space for SARIMA with the differencing
/// operators kept inside the state vector.
///
/// State equation:  alpha_{t+1} = T * alpha_t + R * eta_t,   eta_t ~ N(0, 1)
/// Observation:     y_t          = Z' * alpha_t
///
/// The innovation variance is concentrated out, so Q = 1 and every variance
/// produced by the filter is in units of sigma2.
///
/// State layout: `[regular diff (d) | seasonal diff (s*D) | ARMA (k_order)]`.
#[derive(Debug, Clone)]
pub struct StateSpace {
    pub k_states: usize,
    pub k_states_diff: usize,
    pub k_order: usize,
    pub transition: DMatrix<f64>, // T: k_states × k_states
    pub design: DVector<f64>,     // Z: k_states
    pub selection: DVector<f64>,  // R: k_states (single disturbance)
    /// R R', added at every prediction step.
    pub state_cov: DMatrix<f64>,
    /// Non-zero entries of T as (row, col, value).
    transition_nz: Vec<(usize, usize, f64)>,
}

impl StateSpace {
    pub fn new(spec: &ModelSpec, params: &SarimaParams) -> Result<Self> {
        if spec.dd > 1 {
            return Err(ForecastError::StateSpace(format!(
                "seasonal differencing D={} is not supported",
                spec.dd
            )));
        }
        if spec.dd > 0 && spec.s < 2 {
            return Err(ForecastError::StateSpace(format!(
                "seasonal differencing requires s >= 2, got s={}",
                spec.s
            )));
        }

        let transition = Self::build_transition(spec, params);
        let design = Self::build_design(spec);
        let selection = Self::build_selection(spec, params);
        let state_cov = &selection * selection.transpose();

        let k_states = spec.k_states();
        let mut transition_nz = Vec::new();
        for j in 0..k_states {
            for i in 0..k_states {
                let v = transition[(i, j)];
                if v != 0.0 {
                    transition_nz.push((i, j, v));
                }
            }
        }

        Ok(Self {
            k_states,
            k_states_diff: spec.k_states_diff(),
            k_order: spec.k_order(),
            transition,
            design,
            selection,
            state_cov,
            transition_nz,
        })
    }

    /// Transition matrix T.
    ///
    /// 1. Regular diff block [0..d, 0..d]: upper triangular ones
    /// 2. Seasonal diff block: s×s cyclic shift
    /// 3. Regular diff states pick up the last seasonal state
    /// 4. Diff states pick up the first ARMA state
    /// 5. ARMA companion [sd..sd+ko, sd..sd+ko]
    fn build_transition(spec: &ModelSpec, params: &SarimaParams) -> DMatrix<f64> {
        let k_states = spec.k_states();
        let (d, dd, s) = (spec.d, spec.dd, spec.s);
        let sd = spec.k_states_diff();
        let ko = spec.k_order();

        let mut t = DMatrix::<f64>::zeros(k_states, k_states);

        for i in 0..d {
            for j in i..d {
                t[(i, j)] = 1.0;
            }
        }

        for layer in 0..dd {
            let base = d + layer * s;
            t[(base, base + s - 1)] = 1.0;
            for i in 0..(s - 1) {
                t[(base + i + 1, base + i)] = 1.0;
            }
        }

        if dd > 0 {
            let last_seasonal = d + s * dd - 1;
            for i in 0..d {
                t[(i, last_seasonal)] = 1.0;
            }
        }

        for i in 0..d {
            t[(i, sd)] = 1.0;
        }
        for layer in 0..dd {
            t[(d + layer * s, sd)] = 1.0;
        }

        let red_ar = reduced_ar(params, spec);
        for i in 0..ko {
            if let Some(&c) = red_ar.get(i + 1) {
                t[(sd + i, sd)] = -c;
            }
        }
        for i in 0..ko.saturating_sub(1) {
            t[(sd + i, sd + i + 1)] = 1.0;
        }

        t
    }

    /// Design vector Z: regular diff states, the last state of each seasonal
    /// layer and the first ARMA state.
    fn build_design(spec: &ModelSpec) -> DVector<f64> {
        let sd = spec.k_states_diff();
        let mut z = DVector::<f64>::zeros(spec.k_states());
        for i in 0..spec.d {
            z[i] = 1.0;
        }
        for layer in 0..spec.dd {
            z[spec.d + (layer + 1) * spec.s - 1] = 1.0;
        }
        z[sd] = 1.0;
        z
    }

    /// Selection vector R: the reduced MA polynomial placed on the ARMA block.
    fn build_selection(spec: &ModelSpec, params: &SarimaParams) -> DVector<f64> {
        let sd = spec.k_states_diff();
        let red_ma = reduced_ma(params, spec);
        let mut r = DVector::<f64>::zeros(spec.k_states());
        r[sd] = 1.0;
        for i in 1..spec.k_order() {
            if let Some(&c) = red_ma.get(i) {
                r[sd + i] = c;
            }
        }
        r
    }

    /// T a
    pub fn predict_state(&self, a: &DVector<f64>) -> DVector<f64> {
        let mut out = DVector::<f64>::zeros(self.k_states);
        for &(i, j, v) in &self.transition_nz {
            out[i] += v * a[j];
        }
        out
    }

    /// T P T' + R R', walking only the non-zero entries of T.
    pub fn predict_cov(&self, p: &DMatrix<f64>) -> DMatrix<f64> {
        let k = self.k_states;
        let mut tp = DMatrix::<f64>::zeros(k, k);
        for &(i, j, v) in &self.transition_nz {
            for c in 0..k {
                tp[(i, c)] += v * p[(j, c)];
            }
        }
        let mut out = self.state_cov.clone();
        for &(i, j, v) in &self.transition_nz {
            for r in 0..k {
                out[(r, i)] += v * tp[(r, j)];
            }
        }
        out
    }

    /// Transition restricted to the ARMA block.
    pub fn arma_transition(&self) -> DMatrix<f64> {
        let sd = self.k_states_diff;
        self.transition
            .view((sd, sd), (self.k_order, self.k_order))
            .into_owned()
    }

    /// R R' restricted to the ARMA block.
    pub fn arma_state_cov(&self) -> DMatrix<f64> {
        let sd = self.k_states_diff;
        self.state_cov
            .view((sd, sd), (self.k_order, self.k_order))
            .into_owned()
    }
}
