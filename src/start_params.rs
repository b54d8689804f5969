//! Starting values for the likelihood optimizer.
//!
//! Works on the differenced series: Burg (or Yule-Walker) for the AR part,
//! the innovations algorithm on AR residuals for the MA part, and the same
//! two steps on seasonal-lag autocovariances for the seasonal blocks. Blocks
//! that come out non-stationary or non-invertible are reset to zero.

use crate::diagnostics::autocovariance;
use crate::differencing::{difference_values, DifferencingSpec};
use crate::params::{is_invertible, is_stationary, SarimaParams};
use crate::types::ModelSpec;

/// AR coefficients via Burg's method. Every stage has a reflection
/// coefficient inside (-1, 1), so the result is stationary.
fn burg_ar(y: &[f64], p: usize) -> Option<Vec<f64>> {
    if p == 0 {
        return Some(vec![]);
    }
    let n = y.len();
    if n <= p {
        return None;
    }

    let mean: f64 = y.iter().sum::<f64>() / n as f64;
    let mut ef: Vec<f64> = y.iter().map(|&v| v - mean).collect();
    let mut eb: Vec<f64> = ef.clone();
    let mut a = vec![0.0; p];

    for k in 0..p {
        let mut num = 0.0;
        let mut den = 0.0;
        for t in (k + 1)..n {
            num += ef[t] * eb[t - 1];
            den += ef[t] * ef[t] + eb[t - 1] * eb[t - 1];
        }
        if den.abs() < 1e-15 {
            return None;
        }
        let kk = 2.0 * num / den;
        if kk.abs() >= 1.0 {
            return None;
        }

        let a_prev: Vec<f64> = a[..k].to_vec();
        a[k] = kk;
        for j in 0..k {
            a[j] = a_prev[j] - kk * a_prev[k - 1 - j];
        }

        // reverse order: eb[t-1] must be read before it is overwritten
        for t in ((k + 1)..n).rev() {
            let ef_t = ef[t];
            ef[t] = ef_t - kk * eb[t - 1];
            eb[t] = eb[t - 1] - kk * ef_t;
        }
    }

    Some(a)
}

/// Yule-Walker solve by Levinson-Durbin on `gammas[0..=p]`.
fn yule_walker_from_acov(gammas: &[f64], p: usize) -> Option<Vec<f64>> {
    if p == 0 {
        return Some(vec![]);
    }
    if gammas.len() <= p || gammas[0].abs() < 1e-15 {
        return None;
    }

    let mut phi = vec![0.0; p];
    let mut var = gammas[0];
    for k in 0..p {
        let mut num = gammas[k + 1];
        for j in 0..k {
            num -= phi[j] * gammas[k - j];
        }
        if var.abs() < 1e-15 {
            return None;
        }
        let lambda = num / var;
        let prev = phi.clone();
        phi[k] = lambda;
        for j in 0..k {
            phi[j] = prev[j] - lambda * prev[k - 1 - j];
        }
        var *= 1.0 - lambda * lambda;
    }
    Some(phi)
}

/// Innovations algorithm (Brockwell & Davis 5.2) on `gamma[0..=m]`,
/// returning theta_{m,1..m}.
fn innovations_ma(gamma: &[f64], m: usize) -> Vec<f64> {
    if m == 0 || gamma.len() <= m || gamma[0].abs() < 1e-15 {
        return vec![0.0; m];
    }

    // theta[i][l-1] holds theta_{i,l}
    let mut theta = vec![vec![0.0; m]; m + 1];
    let mut v = vec![0.0; m + 1];
    v[0] = gamma[0];

    for i in 1..=m {
        for k in 0..i {
            let mut sum = gamma[i - k];
            for j in 0..k {
                sum -= theta[k][k - 1 - j] * theta[i][i - 1 - j] * v[j];
            }
            theta[i][i - 1 - k] = if v[k].abs() > 1e-15 { sum / v[k] } else { 0.0 };
        }
        v[i] = gamma[0];
        for j in 0..i {
            v[i] -= theta[i][i - 1 - j].powi(2) * v[j];
        }
        v[i] = v[i].max(1e-15);
    }

    theta[m].iter().map(|c| c.clamp(-0.99, 0.99)).collect()
}

/// y_t - sum_j coeffs[j] * y_{t - (j+1) stride}
fn ar_filter(y: &[f64], coeffs: &[f64], stride: usize) -> Vec<f64> {
    let start = coeffs.len() * stride;
    if y.len() <= start {
        return vec![];
    }
    (start..y.len())
        .map(|t| {
            let pred: f64 = coeffs
                .iter()
                .enumerate()
                .map(|(j, &c)| c * y[t - (j + 1) * stride])
                .sum();
            y[t] - pred
        })
        .collect()
}

fn seasonal_acov(y: &[f64], order: usize, s: usize) -> Vec<f64> {
    (0..=order).map(|k| autocovariance(y, k * s)).collect()
}

fn stationary_or_zero(coeffs: Vec<f64>) -> Vec<f64> {
    if coeffs.iter().all(|c| c.is_finite()) && is_stationary(&coeffs) {
        coeffs
    } else {
        vec![0.0; coeffs.len()]
    }
}

fn invertible_or_zero(coeffs: Vec<f64>) -> Vec<f64> {
    if coeffs.iter().all(|c| c.is_finite()) && is_invertible(&coeffs) {
        coeffs
    } else {
        vec![0.0; coeffs.len()]
    }
}

/// Flat start vector `[ar | ma | sar | sma]` for `spec`.
pub fn compute_start_params(endog: &[f64], spec: &ModelSpec) -> Vec<f64> {
    let (p, q, pp, qq, s) = (spec.p, spec.q, spec.pp, spec.qq, spec.s);
    let diffed = difference_values(endog, &DifferencingSpec::from(spec));

    if diffed.len() < 3 {
        return vec![0.0; spec.n_coeffs()];
    }

    let ar = burg_ar(&diffed, p)
        .or_else(|| yule_walker_from_acov(&seasonal_acov(&diffed, p, 1), p))
        .unwrap_or_else(|| vec![0.0; p]);
    let ar = stationary_or_zero(ar);

    let resid = ar_filter(&diffed, &ar, 1);
    let ma_gamma: Vec<f64> = (0..=q).map(|k| autocovariance(&resid, k)).collect();
    let ma = invertible_or_zero(innovations_ma(&ma_gamma, q));

    let sar = if pp > 0 && diffed.len() > pp * s {
        yule_walker_from_acov(&seasonal_acov(&diffed, pp, s), pp).unwrap_or_else(|| vec![0.0; pp])
    } else {
        vec![0.0; pp]
    };
    let sar = stationary_or_zero(sar);

    let sma = if qq > 0 {
        let sar_resid = ar_filter(&resid, &sar, s);
        if sar_resid.len() > qq * s {
            innovations_ma(&seasonal_acov(&sar_resid, qq, s), qq)
        } else {
            vec![0.0; qq]
        }
    } else {
        vec![]
    };
    let sma = invertible_or_zero(sma);

    SarimaParams {
        ar_coeffs: ar,
        ma_coeffs: ma,
        sar_coeffs: sar,
        sma_coeffs: sma,
    }
    .to_flat()
}
