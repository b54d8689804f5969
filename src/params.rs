use serde::{Deserialize, Serialize};

use crate::error::{ForecastError, Result};
use crate::types::ModelSpec;

/// Unpacked SARIMA coefficients.
///
/// Flat layout: `[ar(p) | ma(q) | sar(P) | sma(Q)]`. sigma2 is concentrated
/// out of the likelihood and never part of the vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SarimaParams {
    pub ar_coeffs: Vec<f64>,
    pub ma_coeffs: Vec<f64>,
    pub sar_coeffs: Vec<f64>,
    pub sma_coeffs: Vec<f64>,
}

impl SarimaParams {
    pub fn from_flat(flat: &[f64], spec: &ModelSpec) -> Result<Self> {
        let expected = spec.n_coeffs();
        if flat.len() != expected {
            return Err(ForecastError::ParamLengthMismatch {
                expected,
                got: flat.len(),
            });
        }

        let (ar, rest) = flat.split_at(spec.p);
        let (ma, rest) = rest.split_at(spec.q);
        let (sar, sma) = rest.split_at(spec.pp);

        Ok(Self {
            ar_coeffs: ar.to_vec(),
            ma_coeffs: ma.to_vec(),
            sar_coeffs: sar.to_vec(),
            sma_coeffs: sma.to_vec(),
        })
    }

    pub fn to_flat(&self) -> Vec<f64> {
        let mut v = Vec::with_capacity(
            self.ar_coeffs.len() + self.ma_coeffs.len() + self.sar_coeffs.len() + self.sma_coeffs.len(),
        );
        v.extend(&self.ar_coeffs);
        v.extend(&self.ma_coeffs);
        v.extend(&self.sar_coeffs);
        v.extend(&self.sma_coeffs);
        v
    }
}

// ---------------------------------------------------------------------------
// Monahan (1984) / Jones (1980) parameter transformations
// ---------------------------------------------------------------------------

/// Unconstrained reals → stationary AR coefficients.
///
/// Each x[k] maps to a partial autocorrelation `x / sqrt(1 + x^2)`, then
/// Levinson-Durbin turns the PACF into AR coefficients.
pub fn constrain_stationary(unconstrained: &[f64]) -> Vec<f64> {
    let n = unconstrained.len();
    if n == 0 {
        return vec![];
    }

    let pacf: Vec<f64> = unconstrained
        .iter()
        .map(|&x| x / (1.0 + x * x).sqrt())
        .collect();

    let mut y = vec![vec![0.0; n]; n];
    for k in 0..n {
        for i in 0..k {
            y[k][i] = y[k - 1][i] + pacf[k] * y[k - 1][k - i - 1];
        }
        y[k][k] = pacf[k];
    }

    y[n - 1].iter().map(|&v| -v).collect()
}

/// Reverse Levinson-Durbin: AR coefficients → partial autocorrelations.
/// Denominators are floored so non-stationary input still yields numbers.
fn reverse_levinson(constrained: &[f64]) -> Vec<f64> {
    let n = constrained.len();
    let mut y = vec![vec![0.0; n]; n];
    for i in 0..n {
        y[n - 1][i] = -constrained[i];
    }
    for k in (1..n).rev() {
        let rk = y[k][k];
        let denom = (1.0 - rk * rk).max(1e-15);
        for i in 0..k {
            y[k - 1][i] = (y[k][i] - rk * y[k][k - i - 1]) / denom;
        }
    }
    (0..n).map(|k| y[k][k]).collect()
}

/// Stationary AR coefficients → unconstrained reals.
pub fn unconstrain_stationary(constrained: &[f64]) -> Vec<f64> {
    if constrained.is_empty() {
        return vec![];
    }
    reverse_levinson(constrained)
        .into_iter()
        .map(|r| r / (1.0 - r * r).max(1e-15).sqrt())
        .collect()
}

/// True when all roots of `1 - c_1 L - ... - c_n L^n` lie outside the unit
/// circle (every partial autocorrelation strictly inside (-1, 1)).
pub fn is_stationary(coeffs: &[f64]) -> bool {
    reverse_levinson(coeffs)
        .iter()
        .all(|r| r.is_finite() && r.abs() < 1.0)
}

/// Invertibility of `1 + c_1 L + ... + c_n L^n`.
pub fn is_invertible(coeffs: &[f64]) -> bool {
    let negated: Vec<f64> = coeffs.iter().map(|&x| -x).collect();
    is_stationary(&negated)
}

/// Unconstrained reals → invertible MA coefficients.
pub fn constrain_invertible(unconstrained: &[f64]) -> Vec<f64> {
    constrain_stationary(unconstrained)
        .iter()
        .map(|&x| -x)
        .collect()
}

/// Invertible MA coefficients → unconstrained reals.
pub fn unconstrain_invertible(constrained: &[f64]) -> Vec<f64> {
    let negated: Vec<f64> = constrained.iter().map(|&x| -x).collect();
    unconstrain_stationary(&negated)
}

/// Optimizer space → model space, block by block.
pub fn transform_params(
    unconstrained: &[f64],
    spec: &ModelSpec,
    enforce_stationarity: bool,
    enforce_invertibility: bool,
) -> Result<Vec<f64>> {
    map_blocks(unconstrained, spec, |block, is_ar| match (is_ar, enforce_stationarity, enforce_invertibility) {
        (true, true, _) => constrain_stationary(block),
        (false, _, true) => constrain_invertible(block),
        _ => block.to_vec(),
    })
}

/// Model space → optimizer space, block by block.
pub fn untransform_params(
    constrained: &[f64],
    spec: &ModelSpec,
    enforce_stationarity: bool,
    enforce_invertibility: bool,
) -> Result<Vec<f64>> {
    map_blocks(constrained, spec, |block, is_ar| match (is_ar, enforce_stationarity, enforce_invertibility) {
        (true, true, _) => unconstrain_stationary(block),
        (false, _, true) => unconstrain_invertible(block),
        _ => block.to_vec(),
    })
}

fn map_blocks<F>(flat: &[f64], spec: &ModelSpec, f: F) -> Result<Vec<f64>>
where
    F: Fn(&[f64], bool) -> Vec<f64>,
{
    let params = SarimaParams::from_flat(flat, spec)?;
    Ok(SarimaParams {
        ar_coeffs: f(&params.ar_coeffs, true),
        ma_coeffs: f(&params.ma_coeffs, false),
        sar_coeffs: f(&params.sar_coeffs, true),
        sma_coeffs: f(&params.sma_coeffs, false),
    }
    .to_flat())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(p: usize, q: usize, pp: usize, qq: usize) -> ModelSpec {
        ModelSpec::new(p, 0, q, pp, 0, qq, 12).unwrap()
    }

    #[test]
    fn test_from_flat_to_flat_roundtrip() {
        let s = spec(2, 1, 1, 1);
        let flat = vec![0.5, -0.3, 0.2, 0.4, -0.1];
        let params = SarimaParams::from_flat(&flat, &s).unwrap();
        assert_eq!(params.ar_coeffs, vec![0.5, -0.3]);
        assert_eq!(params.ma_coeffs, vec![0.2]);
        assert_eq!(params.sar_coeffs, vec![0.4]);
        assert_eq!(params.sma_coeffs, vec![-0.1]);
        assert_eq!(params.to_flat(), flat);
    }

    #[test]
    fn test_from_flat_length_mismatch() {
        let s = spec(1, 0, 0, 0);
        match SarimaParams::from_flat(&[0.5, 0.3], &s) {
            Err(ForecastError::ParamLengthMismatch { expected, got }) => {
                assert_eq!(expected, 1);
                assert_eq!(got, 2);
            }
            other => panic!("expected ParamLengthMismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_monahan_roundtrip() {
        for original in [vec![0.5], vec![0.5, -0.3], vec![1.0, -0.5, 0.2]] {
            let constrained = constrain_stationary(&original);
            assert!(is_stationary(&constrained));
            let unconstrained = unconstrain_stationary(&constrained);
            for (a, b) in original.iter().zip(unconstrained.iter()) {
                assert!((a - b).abs() < 1e-10, "roundtrip failed: {} vs {}", a, b);
            }
        }
    }

    #[test]
    fn test_constrain_maps_large_values_inside_unit_circle() {
        let c = constrain_stationary(&[50.0]);
        assert!(c[0].abs() < 1.0 && c[0].abs() > 0.99);
        let m = constrain_invertible(&[-50.0]);
        assert!(m[0].abs() < 1.0 && m[0].abs() > 0.99);
        assert!(is_stationary(&c));
        assert!(is_invertible(&m));
    }

    #[test]
    fn test_stationarity_checks() {
        assert!(is_stationary(&[0.9]));
        assert!(!is_stationary(&[1.2]));
        // 1 - 0.5L - 0.6L^2 has a root inside the unit circle
        assert!(!is_stationary(&[0.5, 0.6]));
        assert!(is_invertible(&[-0.8]));
        assert!(!is_invertible(&[-1.0]));
        assert!(is_stationary(&[]));
    }

    #[test]
    fn test_transform_params_respects_flags() {
        let s = spec(1, 1, 1, 1);
        let x = vec![2.0, 2.0, 2.0, 2.0];
        let both = transform_params(&x, &s, true, true).unwrap();
        assert!(both.iter().all(|v| v.abs() < 1.0));
        let none = transform_params(&x, &s, false, false).unwrap();
        assert_eq!(none, x);
        let back = untransform_params(&both, &s, true, true).unwrap();
        for (a, b) in x.iter().zip(back.iter()) {
            assert!((a - b).abs() < 1e-9);
        }
    }
}
