#![allow(dead_code)]

use sales_forecast::{ModelSpec, Period, TimeSeries};

/// Deterministic uniform noise in [-0.5, 0.5).
pub fn lcg_noise(n: usize, seed: u64) -> Vec<f64> {
    let mut state = seed;
    (0..n)
        .map(|_| {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
            (state >> 33) as f64 / (1u64 << 31) as f64 - 0.5
        })
        .collect()
}

/// Noise-free part of the synthetic sales series.
pub fn signal(t: usize) -> f64 {
    100.0 + 2.0 * t as f64 + 10.0 * (2.0 * std::f64::consts::PI * t as f64 / 12.0).sin()
}

/// Trend + yearly seasonality + noise integrated by (1-L)(1-L^12), so the
/// doubly differenced series is white noise of width `noise`.
pub fn synthetic_sales(n: usize, noise: f64, seed: u64) -> TimeSeries {
    let e = lcg_noise(n, seed);
    let mut x = vec![0.0; n];
    for t in 0..n {
        x[t] = noise * e[t];
        if t >= 1 {
            x[t] += x[t - 1];
        }
        if t >= 12 {
            x[t] += x[t - 12];
        }
        if t >= 13 {
            x[t] -= x[t - 13];
        }
    }
    let values = (0..n).map(|t| signal(t) + x[t]).collect();
    TimeSeries::new(Period::new(2016, 1).unwrap(), values).unwrap()
}

pub fn full_spec() -> ModelSpec {
    ModelSpec::new(1, 1, 1, 1, 1, 1, 12).unwrap()
}

pub fn airline_spec() -> ModelSpec {
    ModelSpec::new(0, 1, 1, 0, 1, 1, 12).unwrap()
}
