use crate::params::SarimaParams;
use crate::types::ModelSpec;

/// Polynomial multiplication (convolution): c[k] = sum_i a[i]*b[k-i].
pub fn polymul(a: &[f64], b: &[f64]) -> Vec<f64> {
    if a.is_empty() || b.is_empty() {
        return vec![];
    }
    let mut r = vec![0.0; a.len() + b.len() - 1];
    for (i, &ai) in a.iter().enumerate() {
        for (j, &bj) in b.iter().enumerate() {
            r[i + j] += ai * bj;
        }
    }
    r
}

/// Lag polynomial `1 + sign*c_1 L^stride + sign*c_2 L^(2 stride) + ...`.
fn lag_poly(coeffs: &[f64], stride: usize, sign: f64) -> Vec<f64> {
    let mut p = vec![0.0; coeffs.len() * stride + 1];
    p[0] = 1.0;
    for (i, &c) in coeffs.iter().enumerate() {
        p[(i + 1) * stride] = sign * c;
    }
    p
}

/// AR polynomial `1 - phi_1 L^stride - phi_2 L^(2 stride) - ...`.
pub fn ar_poly(coeffs: &[f64], stride: usize) -> Vec<f64> {
    lag_poly(coeffs, stride, -1.0)
}

/// MA polynomial `1 + theta_1 L^stride + theta_2 L^(2 stride) + ...`.
pub fn ma_poly(coeffs: &[f64], stride: usize) -> Vec<f64> {
    lag_poly(coeffs, stride, 1.0)
}

/// Multiplicative AR polynomial phi(L) * Phi(L^s).
pub fn reduced_ar(params: &SarimaParams, spec: &ModelSpec) -> Vec<f64> {
    polymul(
        &ar_poly(&params.ar_coeffs, 1),
        &ar_poly(&params.sar_coeffs, spec.s),
    )
}

/// Multiplicative MA polynomial theta(L) * Theta(L^s).
pub fn reduced_ma(params: &SarimaParams, spec: &ModelSpec) -> Vec<f64> {
    polymul(
        &ma_poly(&params.ma_coeffs, 1),
        &ma_poly(&params.sma_coeffs, spec.s),
    )
}
