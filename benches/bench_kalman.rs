use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use sales_forecast::initialization::KalmanInit;
use sales_forecast::kalman::kalman_loglike;
use sales_forecast::params::SarimaParams;
use sales_forecast::state_space::StateSpace;
use sales_forecast::ModelSpec;

fn monthly_series(n: usize) -> Vec<f64> {
    let mut state = 11u64;
    (0..n)
        .map(|t| {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
            let u = (state >> 33) as f64 / (1u64 << 31) as f64 - 0.5;
            100.0 + 2.0 * t as f64 + 10.0 * (2.0 * std::f64::consts::PI * t as f64 / 12.0).sin() + u
        })
        .collect()
}

fn bench_kalman_loglike(c: &mut Criterion) {
    let mut group = c.benchmark_group("kalman_loglike");
    let cases = [
        ("arima_111", ModelSpec::new(1, 1, 1, 0, 0, 0, 12).unwrap(), vec![0.4, 0.2]),
        ("sarima_111_111_12", ModelSpec::new(1, 1, 1, 1, 1, 1, 12).unwrap(), vec![0.4, 0.2, 0.3, -0.4]),
    ];
    for n in [60usize, 240] {
        let y = monthly_series(n);
        for (name, spec, flat) in &cases {
            let params = SarimaParams::from_flat(flat, spec).unwrap();
            let ss = StateSpace::new(spec, &params).unwrap();
            let init = KalmanInit::for_model(&ss, true).unwrap();
            group.bench_with_input(BenchmarkId::new(*name, n), &y, |b, y| {
                b.iter(|| kalman_loglike(black_box(y), &ss, &init).unwrap())
            });
        }
    }
    group.finish();
}

criterion_group!(benches, bench_kalman_loglike);
criterion_main!(benches);
