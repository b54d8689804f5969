//! Maximum likelihood estimation via L-BFGS with a Nelder-Mead fallback.
//!
//! The optimizer works in the unconstrained space; `params::transform_params`
//! maps each trial point back to coefficients before the Kalman filter runs.

use argmin::core::{CostFunction, Executor, Gradient, IterState, State, TerminationReason};
use argmin::solver::linesearch::MoreThuenteLineSearch;
use argmin::solver::neldermead::NelderMead;
use argmin::solver::quasinewton::LBFGS;
use tracing::debug;

use crate::error::{ForecastError, Result};
use crate::forecast::filter_series;
use crate::params::{transform_params, untransform_params, SarimaParams};
use crate::start_params::compute_start_params;
use crate::types::{FitOptions, FitResult, ModelSpec, OptimizerMethod};

const PENALTY: f64 = f64::MAX / 2.0;

/// Negative concentrated log-likelihood over unconstrained parameters.
#[derive(Clone)]
struct SarimaObjective {
    endog: Vec<f64>,
    spec: ModelSpec,
    enforce_stationarity: bool,
    enforce_invertibility: bool,
}

impl SarimaObjective {
    fn loglike(&self, unconstrained: &[f64]) -> Result<(f64, f64)> {
        let constrained = transform_params(
            unconstrained,
            &self.spec,
            self.enforce_stationarity,
            self.enforce_invertibility,
        )?;
        let params = SarimaParams::from_flat(&constrained, &self.spec)?;
        let (_, out) = filter_series(&self.endog, &self.spec, &params, self.enforce_stationarity)?;
        Ok((out.loglike, out.scale))
    }
}

impl CostFunction for SarimaObjective {
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, param: &Vec<f64>) -> std::result::Result<f64, argmin::core::Error> {
        match self.loglike(param) {
            Ok((ll, _)) if ll.is_finite() => Ok(-ll),
            _ => Ok(PENALTY),
        }
    }
}

impl Gradient for SarimaObjective {
    type Param = Vec<f64>;
    type Gradient = Vec<f64>;

    /// Central differences, step scaled to the parameter magnitude.
    fn gradient(&self, param: &Vec<f64>) -> std::result::Result<Vec<f64>, argmin::core::Error> {
        let mut work = param.clone();
        let mut grad = vec![0.0; param.len()];
        for i in 0..param.len() {
            let orig = work[i];
            let h = 1e-6 * orig.abs().max(1.0);
            work[i] = orig + h;
            let fp = self.cost(&work)?;
            work[i] = orig - h;
            let fm = self.cost(&work)?;
            work[i] = orig;
            let g = (fp - fm) / (2.0 * h);
            grad[i] = if g.is_finite() && fp < PENALTY && fm < PENALTY { g } else { 0.0 };
        }
        Ok(grad)
    }
}

/// (best param, best cost, iterations, converged)
type RunOutcome = (Vec<f64>, f64, u64, bool);

fn run_lbfgs(objective: SarimaObjective, init_params: Vec<f64>, maxiter: u64) -> std::result::Result<RunOutcome, String> {
    let linesearch = MoreThuenteLineSearch::new();
    let solver = LBFGS::new(linesearch, 10)
        .with_tolerance_grad(1e-5)
        .map_err(|e| e.to_string())?
        .with_tolerance_cost(1e-9)
        .map_err(|e| e.to_string())?;

    let result = Executor::new(objective, solver)
        .configure(|state: IterState<Vec<f64>, Vec<f64>, (), (), (), f64>| {
            state.param(init_params).max_iters(maxiter)
        })
        .run()
        .map_err(|e| format!("L-BFGS failed: {}", e))?;

    let state = result.state();
    let best_param = state
        .get_best_param()
        .ok_or("L-BFGS: no best parameter found")?
        .clone();
    let converged = matches!(
        state.get_termination_reason(),
        Some(TerminationReason::SolverConverged) | Some(TerminationReason::TargetCostReached)
    );
    Ok((best_param, state.get_best_cost(), state.get_iter(), converged))
}

fn run_nelder_mead(
    objective: SarimaObjective,
    init_params: Vec<f64>,
    maxiter: u64,
) -> std::result::Result<RunOutcome, String> {
    let n = init_params.len();

    let mut simplex = vec![init_params.clone()];
    for i in 0..n {
        let mut vertex = init_params.clone();
        let delta = if vertex[i].abs() > 1e-8 { vertex[i] * 0.05 } else { 0.00025 };
        vertex[i] += delta;
        simplex.push(vertex);
    }

    let solver = NelderMead::new(simplex)
        .with_sd_tolerance(1e-6)
        .map_err(|e| e.to_string())?;

    let result = Executor::new(objective, solver)
        .configure(|state: IterState<Vec<f64>, (), (), (), (), f64>| state.max_iters(maxiter))
        .run()
        .map_err(|e| format!("Nelder-Mead failed: {}", e))?;

    let state = result.state();
    let best_param = state
        .get_best_param()
        .ok_or("Nelder-Mead: no best parameter found")?
        .clone();
    let converged = matches!(
        state.get_termination_reason(),
        Some(TerminationReason::SolverConverged) | Some(TerminationReason::TargetCostReached)
    );
    Ok((best_param, state.get_best_cost(), state.get_iter(), converged))
}

fn consume_budget(remaining: &mut u64, total_work: &mut u64, n: u64) {
    let used = n.min(*remaining);
    *total_work = total_work.saturating_add(used);
    *remaining = remaining.saturating_sub(used);
}

/// Fit `spec` to `endog` by maximum likelihood.
///
/// Returns the best point found together with a `converged` flag; callers
/// decide what non-convergence means. `options.max_iter` is the total
/// iteration budget shared by L-BFGS and the Nelder-Mead fallback.
pub fn fit(endog: &[f64], spec: &ModelSpec, options: &FitOptions) -> Result<FitResult> {
    let min_obs = spec.min_observations(options.enforce_stationarity);
    if endog.len() < min_obs {
        return Err(ForecastError::InsufficientData {
            needed: min_obs,
            got: endog.len(),
        });
    }

    let constrained_start = match &options.start_params {
        Some(sp) => {
            if sp.len() != spec.n_coeffs() {
                return Err(ForecastError::ParamLengthMismatch {
                    expected: spec.n_coeffs(),
                    got: sp.len(),
                });
            }
            sp.clone()
        }
        None => compute_start_params(endog, spec),
    };
    let unconstrained_start = untransform_params(
        &constrained_start,
        spec,
        options.enforce_stationarity,
        options.enforce_invertibility,
    )?;

    let objective = SarimaObjective {
        endog: endog.to_vec(),
        spec: *spec,
        enforce_stationarity: options.enforce_stationarity,
        enforce_invertibility: options.enforce_invertibility,
    };

    let mut remaining = options.max_iter;
    let mut total_work: u64 = 0;
    let mut best = unconstrained_start.clone();
    let mut converged = false;
    let mut used_method = options.method.to_string();

    if unconstrained_start.is_empty() {
        // nothing to estimate: only the scale, which is concentrated out
        converged = true;
    } else if remaining > 0 {
        if options.method == OptimizerMethod::Lbfgs {
            match run_lbfgs(objective.clone(), unconstrained_start.clone(), remaining) {
                Ok((p, c, n, conv)) => {
                    consume_budget(&mut remaining, &mut total_work, n);
                    debug!(iterations = n, cost = c, converged = conv, "L-BFGS finished");
                    if c < PENALTY {
                        best = p;
                    }
                    converged = conv;
                }
                Err(e) => debug!(error = %e, "L-BFGS failed, falling back to Nelder-Mead"),
            }
        }

        if !converged && remaining > 0 {
            let (p, c, n, conv) = run_nelder_mead(objective.clone(), best.clone(), remaining)
                .map_err(|e| ForecastError::Convergence {
                    loglike: f64::NAN,
                    params: constrained_start.clone(),
                    iterations: total_work,
                    method: format!("nelder-mead ({e})"),
                })?;
            consume_budget(&mut remaining, &mut total_work, n);
            debug!(iterations = n, cost = c, converged = conv, "Nelder-Mead finished");
            if c < PENALTY {
                best = p;
            }
            converged = conv;
            if options.method == OptimizerMethod::Lbfgs {
                used_method = "lbfgs+nelder-mead".to_string();
            }
        }
    }

    let params = transform_params(
        &best,
        spec,
        options.enforce_stationarity,
        options.enforce_invertibility,
    )?;
    let (loglike, scale) = objective.loglike(&best)?;
    let burn = spec.loglikelihood_burn(options.enforce_stationarity);

    Ok(FitResult {
        params,
        loglike,
        scale,
        n_obs: endog.len() - burn,
        n_params: spec.n_estimated_params(),
        n_iter: total_work,
        converged,
        method: used_method,
        aic: 0.0,
        bic: 0.0,
    }
    .with_information_criteria())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ar1_series(phi: f64, n: usize) -> Vec<f64> {
        let mut y = vec![0.0; n];
        let mut rng_state: u64 = 42;
        for t in 1..n {
            rng_state = rng_state.wrapping_mul(6364136223846793005).wrapping_add(1);
            let u = (rng_state >> 33) as f64 / (1u64 << 31) as f64 - 0.5;
            y[t] = phi * y[t - 1] + u;
        }
        y
    }

    fn ar1_spec() -> ModelSpec {
        ModelSpec::new(1, 0, 0, 0, 0, 0, 12).unwrap()
    }

    #[test]
    fn test_objective_finite_and_penalized() {
        let obj = SarimaObjective {
            endog: ar1_series(0.6, 100),
            spec: ar1_spec(),
            enforce_stationarity: true,
            enforce_invertibility: true,
        };
        let c = obj.cost(&vec![0.3]).unwrap();
        assert!(c.is_finite() && c < PENALTY);
        let g = obj.gradient(&vec![0.3]).unwrap();
        assert!(g[0].is_finite());
    }

    #[test]
    fn test_fit_ar1_recovers_coefficient() {
        let y = ar1_series(0.6, 300);
        let result = fit(&y, &ar1_spec(), &FitOptions::default()).unwrap();
        assert!(result.converged, "method {}", result.method);
        assert!((result.params[0] - 0.6).abs() < 0.1, "phi = {}", result.params[0]);
        assert!(result.scale > 0.0);
        assert!(result.loglike.is_finite());
    }

    #[test]
    fn test_fit_nelder_mead() {
        let y = ar1_series(0.6, 300);
        let opts = FitOptions {
            method: OptimizerMethod::NelderMead,
            ..FitOptions::default()
        };
        let result = fit(&y, &ar1_spec(), &opts).unwrap();
        assert!(result.converged);
        assert_eq!(result.method, "nelder-mead");
        assert!((result.params[0] - 0.6).abs() < 0.1);
    }

    #[test]
    fn test_fit_not_worse_than_start() {
        let y = ar1_series(0.6, 300);
        let spec = ar1_spec();
        let opts = FitOptions {
            start_params: Some(vec![0.0]),
            ..FitOptions::default()
        };
        let result = fit(&y, &spec, &opts).unwrap();
        let (_, start) = filter_series(&y, &spec, &SarimaParams::from_flat(&[0.0], &spec).unwrap(), true).unwrap();
        assert!(result.loglike >= start.loglike);
    }

    #[test]
    fn test_zero_maxiter_not_converged() {
        let y = ar1_series(0.6, 100);
        let opts = FitOptions {
            max_iter: 0,
            ..FitOptions::default()
        };
        let result = fit(&y, &ar1_spec(), &opts).unwrap();
        assert!(!result.converged);
        assert_eq!(result.n_iter, 0);
    }

    #[test]
    fn test_start_params_length_checked() {
        let y = ar1_series(0.6, 100);
        let opts = FitOptions {
            start_params: Some(vec![0.1, 0.2]),
            ..FitOptions::default()
        };
        assert!(matches!(
            fit(&y, &ar1_spec(), &opts),
            Err(ForecastError::ParamLengthMismatch { expected: 1, got: 2 })
        ));
    }

    #[test]
    fn test_insufficient_observations() {
        let spec = ModelSpec::new(1, 1, 1, 1, 1, 1, 12).unwrap();
        let y: Vec<f64> = (0..15).map(|i| i as f64).collect();
        assert!(matches!(
            fit(&y, &spec, &FitOptions::default()),
            Err(ForecastError::InsufficientData { needed: 19, got: 15 })
        ));
    }

    #[test]
    fn test_information_criteria_use_effective_obs() {
        let y = ar1_series(0.6, 120);
        let r = fit(&y, &ar1_spec(), &FitOptions::default()).unwrap();
        assert_eq!(r.n_params, 2);
        assert_eq!(r.n_obs, 120);
        assert!((r.aic - (-2.0 * r.loglike + 4.0)).abs() < 1e-9);
    }
}
