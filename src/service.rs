//! Forecasts from persisted models. Never fits.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{ForecastError, Result};
use crate::model::ForecastResult;
use crate::series::PeriodRange;
use crate::store::{ArtifactRef, ModelStore};
use crate::types::ModelSpec;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastSettings {
    pub horizon: usize,
    pub confidence_level: f64,
}

impl Default for ForecastSettings {
    fn default() -> Self {
        Self {
            horizon: 12,
            confidence_level: 0.95,
        }
    }
}

/// A forecast together with the artifact it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServedForecast {
    pub artifact_id: String,
    pub spec: ModelSpec,
    pub training_window: PeriodRange,
    pub forecast: ForecastResult,
}

#[derive(Debug, Clone)]
pub struct ForecastService {
    store: ModelStore,
    settings: ForecastSettings,
}

impl ForecastService {
    pub fn new(store: ModelStore, settings: ForecastSettings) -> Self {
        Self { store, settings }
    }

    pub fn store(&self) -> &ModelStore {
        &self.store
    }

    pub fn settings(&self) -> &ForecastSettings {
        &self.settings
    }

    /// Forecast from the latest saved model with the configured settings.
    pub fn forecast(&self) -> Result<ServedForecast> {
        self.forecast_from(ArtifactRef::Latest)
    }

    pub fn forecast_from(&self, reference: impl Into<ArtifactRef>) -> Result<ServedForecast> {
        self.forecast_with(reference, self.settings.horizon, self.settings.confidence_level)
    }

    pub fn forecast_with(
        &self,
        reference: impl Into<ArtifactRef>,
        horizon: usize,
        confidence_level: f64,
    ) -> Result<ServedForecast> {
        let reference = reference.into();
        let artifact = self.store.load_artifact(reference.clone()).map_err(|e| match e {
            ForecastError::ArtifactNotFound { .. } => ForecastError::ModelNotFound {
                reference: reference.to_string(),
            },
            other => other,
        })?;

        let forecast = artifact.model.forecast(horizon, confidence_level)?;
        info!(
            artifact_id = %artifact.metadata.artifact_id,
            horizon,
            confidence_level,
            "forecast served"
        );
        Ok(ServedForecast {
            artifact_id: artifact.metadata.artifact_id,
            spec: artifact.metadata.spec,
            training_window: artifact.metadata.training_window,
            forecast,
        })
    }
}
