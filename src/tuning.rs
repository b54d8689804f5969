//! Order selection by AIC over a grid of SARIMA specifications.
//!
//! Candidates are independent, so they are fitted on the rayon pool. A
//! candidate that fails to fit or converge is dropped from the ranking.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{ForecastError, Result};
use crate::model::SeasonalModel;
use crate::series::TimeSeries;
use crate::types::{FitOptions, ModelSpec};

/// AIC improvement above which another order is considered clearly better.
pub const AIC_SIGNIFICANT_GAP: f64 = 2.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrderGrid {
    pub p: Vec<usize>,
    pub d: Vec<usize>,
    pub q: Vec<usize>,
    pub seasonal_p: Vec<usize>,
    pub seasonal_d: Vec<usize>,
    pub seasonal_q: Vec<usize>,
    pub period: usize,
}

impl Default for OrderGrid {
    fn default() -> Self {
        Self {
            p: vec![0, 1, 2],
            d: vec![0, 1, 2],
            q: vec![0, 1, 2],
            seasonal_p: vec![0, 1, 2],
            seasonal_d: vec![0, 1],
            seasonal_q: vec![0, 1, 2],
            period: 12,
        }
    }
}

impl OrderGrid {
    /// Every valid specification in the grid.
    pub fn specs(&self) -> Vec<ModelSpec> {
        let mut out = Vec::new();
        for &p in &self.p {
            for &d in &self.d {
                for &q in &self.q {
                    for &pp in &self.seasonal_p {
                        for &dd in &self.seasonal_d {
                            for &qq in &self.seasonal_q {
                                if let Ok(spec) = ModelSpec::new(p, d, q, pp, dd, qq, self.period) {
                                    out.push(spec);
                                }
                            }
                        }
                    }
                }
            }
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub spec: ModelSpec,
    pub loglike: f64,
    pub aic: f64,
    pub bic: f64,
}

/// Fit every grid order on `series`; successful fits sorted by AIC.
pub fn grid_search(series: &TimeSeries, grid: &OrderGrid, options: &FitOptions) -> Result<Vec<Candidate>> {
    let specs = grid.specs();
    let total = specs.len();

    let mut candidates: Vec<Candidate> = specs
        .into_par_iter()
        .filter_map(|spec| {
            let mut model = SeasonalModel::new(spec, options.clone());
            match model.fit(series) {
                Ok(fitted) => Some(Candidate {
                    spec,
                    loglike: fitted.loglike(),
                    aic: fitted.aic(),
                    bic: fitted.bic(),
                }),
                Err(e) => {
                    debug!(%spec, error = %e, "candidate skipped");
                    None
                }
            }
        })
        .collect();

    if candidates.is_empty() {
        return Err(ForecastError::Data(format!(
            "none of the {} candidate orders could be fitted",
            total
        )));
    }
    candidates.sort_by(|a, b| a.aic.total_cmp(&b.aic));

    info!(
        fitted = candidates.len(),
        total,
        best = %candidates[0].spec,
        aic = candidates[0].aic,
        "order grid search"
    );
    Ok(candidates)
}

/// Where a configured order stands against the grid winner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderComparison {
    pub best: Candidate,
    /// 1-based rank of the configured order; `None` when it was not fitted.
    pub rank: Option<usize>,
    /// AIC(configured) - AIC(best).
    pub aic_gap: Option<f64>,
    pub better_order_available: bool,
}

/// Compare `spec` with the best candidate. `candidates` must be sorted by
/// AIC, as `grid_search` returns them.
pub fn compare_to_best(candidates: &[Candidate], spec: &ModelSpec) -> Option<OrderComparison> {
    let best = candidates.first()?.clone();
    let position = candidates.iter().position(|c| c.spec == *spec);
    let aic_gap = position.map(|i| candidates[i].aic - best.aic);
    Some(OrderComparison {
        better_order_available: aic_gap.map_or(true, |gap| gap > AIC_SIGNIFICANT_GAP),
        best,
        rank: position.map(|i| i + 1),
        aic_gap,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::Period;

    fn candidate(spec: ModelSpec, aic: f64) -> Candidate {
        Candidate {
            spec,
            loglike: -aic / 2.0,
            aic,
            bic: aic,
        }
    }

    #[test]
    fn test_default_grid_size() {
        // 3^5 * 2 orders, all valid for m = 12
        assert_eq!(OrderGrid::default().specs().len(), 486);
    }

    #[test]
    fn test_grid_skips_invalid_specs() {
        let grid = OrderGrid {
            p: vec![0],
            d: vec![0],
            q: vec![0],
            seasonal_p: vec![0],
            seasonal_d: vec![0, 1, 2],
            seasonal_q: vec![0],
            period: 12,
        };
        assert_eq!(grid.specs().len(), 2);
    }

    #[test]
    fn test_compare_to_best() {
        let a = ModelSpec::new(0, 1, 1, 0, 1, 1, 12).unwrap();
        let b = ModelSpec::new(1, 1, 1, 1, 1, 1, 12).unwrap();
        let c = ModelSpec::new(1, 1, 0, 0, 1, 0, 12).unwrap();
        let ranked = vec![candidate(a, 100.0), candidate(b, 101.5), candidate(c, 110.0)];

        let cmp_b = compare_to_best(&ranked, &b).unwrap();
        assert_eq!(cmp_b.rank, Some(2));
        assert!((cmp_b.aic_gap.unwrap() - 1.5).abs() < 1e-12);
        assert!(!cmp_b.better_order_available);

        let cmp_c = compare_to_best(&ranked, &c).unwrap();
        assert!(cmp_c.better_order_available);
        assert_eq!(cmp_c.best.spec, a);

        let missing = ModelSpec::new(2, 1, 2, 0, 0, 0, 12).unwrap();
        let cmp_m = compare_to_best(&ranked, &missing).unwrap();
        assert_eq!(cmp_m.rank, None);
        assert!(cmp_m.better_order_available);

        assert!(compare_to_best(&[], &a).is_none());
    }

    #[test]
    fn test_small_grid_search_sorted() {
        let mut state = 3u64;
        let values: Vec<f64> = (0..48)
            .map(|t| {
                state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
                let u = (state >> 33) as f64 / (1u64 << 31) as f64 - 0.5;
                50.0 + 0.5 * t as f64 + u
            })
            .collect();
        let series = TimeSeries::new(Period::new(2018, 1).unwrap(), values).unwrap();
        let grid = OrderGrid {
            p: vec![0, 1],
            d: vec![1],
            q: vec![0, 1],
            seasonal_p: vec![0],
            seasonal_d: vec![0],
            seasonal_q: vec![0],
            period: 12,
        };
        let ranked = grid_search(&series, &grid, &FitOptions::default()).unwrap();
        assert!(!ranked.is_empty() && ranked.len() <= 4);
        for w in ranked.windows(2) {
            assert!(w[0].aic <= w[1].aic);
        }
    }
}
