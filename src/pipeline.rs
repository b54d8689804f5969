//! End-to-end run: stationarity report, hold-out evaluation, final fit,
//! persistence and a forecast served back from the store.

use std::path::Path;

use serde::Serialize;
use tracing::info;

use crate::config::ForecastConfig;
use crate::data::{monthly_totals, read_sales_csv, write_forecast_csv};
use crate::diagnostics::ResidualDiagnostics;
use crate::differencing::DifferencingSpec;
use crate::error::Result;
use crate::evaluation::{EvaluationResult, Evaluator};
use crate::model::{FitWarning, SeasonalModel};
use crate::series::{PeriodRange, TimeSeries};
use crate::service::{ForecastService, ServedForecast};
use crate::stationarity::{StationarityAnalyzer, VariantReport};
use crate::store::{ArtifactRef, ModelStore};
use crate::types::ModelSpec;

#[derive(Debug, Clone, Serialize)]
pub struct FitSummary {
    pub spec: ModelSpec,
    pub training_window: PeriodRange,
    pub params: Vec<f64>,
    pub scale: f64,
    pub loglike: f64,
    pub aic: f64,
    pub bic: f64,
    pub n_iter: u64,
    pub method: String,
    pub warnings: Vec<FitWarning>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub stationarity: Vec<VariantReport>,
    pub suggested_differencing: Option<DifferencingSpec>,
    pub evaluation: EvaluationResult,
    pub fit: FitSummary,
    pub residuals: ResidualDiagnostics,
    pub artifact_id: String,
    pub forecast: ServedForecast,
}

pub struct Pipeline {
    config: ForecastConfig,
    store: ModelStore,
}

impl Pipeline {
    pub fn new(config: ForecastConfig) -> Result<Self> {
        config.validate()?;
        let store = ModelStore::open(&config.store.dir)?;
        Ok(Self { config, store })
    }

    pub fn config(&self) -> &ForecastConfig {
        &self.config
    }

    pub fn store(&self) -> &ModelStore {
        &self.store
    }

    /// Aggregate a transaction CSV to months, then `run`.
    pub fn run_csv(&self, path: impl AsRef<Path>) -> Result<PipelineReport> {
        let records = read_sales_csv(path)?;
        let series = monthly_totals(&records)?;
        self.run(&series)
    }

    pub fn run(&self, series: &TimeSeries) -> Result<PipelineReport> {
        let spec = self.config.model_spec()?;
        let options = self.config.fit_options();
        info!(%spec, window = %series.range(), "pipeline started");

        let analyzer = StationarityAnalyzer::new(self.config.stationarity.clone());
        let stationarity = analyzer.analyze_variants(series)?;
        let suggested_differencing = stationarity
            .iter()
            .find(|v| v.report.is_stationary)
            .map(|v| v.differencing);
        for v in &stationarity {
            info!(
                variant = %v.differencing,
                statistic = v.report.test_statistic,
                p_value = v.report.p_value,
                stationary = v.report.is_stationary,
                "stationarity"
            );
        }

        let evaluation = Evaluator::new(spec, options.clone()).evaluate(series, self.config.evaluation.test_size)?;

        let mut model = SeasonalModel::new(spec, options);
        let fitted = model.fit(series)?;
        let residuals = fitted.residual_diagnostics(2 * spec.s)?;
        info!(
            white_noise = residuals.is_white_noise(self.config.stationarity.significance),
            "residual check"
        );
        let artifact_id = self.store.save(&fitted, Some(&evaluation.snapshot()))?;

        let service = ForecastService::new(self.store.clone(), self.config.forecast.clone());
        let forecast = service.forecast_from(ArtifactRef::Id(artifact_id.clone()))?;
        if let Some(path) = &self.config.store.forecast_table {
            write_forecast_csv(path, &forecast.forecast)?;
        }

        info!(artifact_id = %artifact_id, rmse = evaluation.metrics.rmse, "pipeline finished");
        Ok(PipelineReport {
            stationarity,
            suggested_differencing,
            evaluation,
            fit: FitSummary {
                spec,
                training_window: fitted.training_window(),
                params: fitted.params().to_flat(),
                scale: fitted.scale(),
                loglike: fitted.loglike(),
                aic: fitted.aic(),
                bic: fitted.bic(),
                n_iter: fitted.n_iter(),
                method: fitted.method().to_string(),
                warnings: fitted.warnings().to_vec(),
            },
            residuals,
            artifact_id,
            forecast,
        })
    }
}
