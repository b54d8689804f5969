//! Pipeline configuration, read from TOML.
//!
//! Every field has a default, so an empty file is a valid configuration:
//! SARIMA(1,1,1)(1,1,1,12), 12-month hold-out, 12-month forecast at 95%.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ForecastError, Result};
use crate::service::ForecastSettings;
use crate::stationarity::StationarityConfig;
use crate::types::{FitOptions, ModelSpec, OptimizerMethod};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSection {
    /// (p, d, q)
    pub order: [usize; 3],
    /// (P, D, Q, m)
    pub seasonal_order: [usize; 4],
    pub enforce_stationarity: bool,
    pub enforce_invertibility: bool,
    pub method: OptimizerMethod,
    pub max_iter: u64,
}

impl Default for ModelSection {
    fn default() -> Self {
        let fit = FitOptions::default();
        Self {
            order: [1, 1, 1],
            seasonal_order: [1, 1, 1, 12],
            enforce_stationarity: fit.enforce_stationarity,
            enforce_invertibility: fit.enforce_invertibility,
            method: fit.method,
            max_iter: fit.max_iter,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationSection {
    /// Months held out at the end of the series.
    pub test_size: usize,
}

impl Default for EvaluationSection {
    fn default() -> Self {
        Self { test_size: 12 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSection {
    pub dir: PathBuf,
    /// Where the pipeline writes the forecast table, if anywhere.
    pub forecast_table: Option<PathBuf>,
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("models"),
            forecast_table: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// `EnvFilter` directive; `RUST_LOG` takes precedence.
    pub filter: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    pub model: ModelSection,
    pub stationarity: StationarityConfig,
    pub evaluation: EvaluationSection,
    pub forecast: ForecastSettings,
    pub store: StoreSection,
    pub logging: LoggingSection,
}

impl ForecastConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Self = toml::from_str(s).map_err(|e| ForecastError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| ForecastError::persistence(path, e))?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| ForecastError::Config(e.to_string()))
    }

    /// Install the global log subscriber with the `[logging]` filter.
    pub fn init_tracing(&self) -> Result<()> {
        crate::telemetry::init_tracing(&self.logging.filter)
    }

    pub fn model_spec(&self) -> Result<ModelSpec> {
        ModelSpec::from_orders(self.model.order, self.model.seasonal_order)
    }

    pub fn fit_options(&self) -> FitOptions {
        FitOptions {
            enforce_stationarity: self.model.enforce_stationarity,
            enforce_invertibility: self.model.enforce_invertibility,
            method: self.model.method,
            max_iter: self.model.max_iter,
            start_params: None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.model_spec()
            .map_err(|e| ForecastError::Config(format!("[model] {}", e)))?;
        let sig = self.stationarity.significance;
        if !(sig > 0.0 && sig < 1.0) {
            return Err(ForecastError::Config(format!(
                "[stationarity] significance {} outside (0, 1)",
                sig
            )));
        }
        if self.stationarity.seasonal_period == 0
            || self.stationarity.variants.iter().any(|v| v.seasonal_period == 0)
        {
            return Err(ForecastError::Config(
                "[stationarity] seasonal periods must be positive".into(),
            ));
        }
        if self.evaluation.test_size == 0 {
            return Err(ForecastError::Config("[evaluation] test_size must be at least 1".into()));
        }
        if self.forecast.horizon == 0 {
            return Err(ForecastError::Config("[forecast] horizon must be at least 1".into()));
        }
        let cl = self.forecast.confidence_level;
        if !(cl > 0.0 && cl < 1.0) {
            return Err(ForecastError::Config(format!(
                "[forecast] confidence_level {} outside (0, 1)",
                cl
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_gives_defaults() {
        let config = ForecastConfig::from_toml_str("").unwrap();
        assert_eq!(config, ForecastConfig::default());
        assert_eq!(config.model_spec().unwrap().to_string(), "SARIMA(1,1,1)(1,1,1,12)");
        assert_eq!(config.forecast.horizon, 12);
        assert_eq!(config.evaluation.test_size, 12);
        assert_eq!(config.fit_options(), FitOptions::default());
    }

    #[test]
    fn test_partial_sections() {
        let text = r#"
            [model]
            order = [0, 1, 1]
            seasonal_order = [0, 1, 1, 12]
            method = "nelder-mead"

            [forecast]
            confidence_level = 0.8

            [store]
            dir = "/tmp/models"
        "#;
        let config = ForecastConfig::from_toml_str(text).unwrap();
        assert_eq!(config.model_spec().unwrap().to_string(), "SARIMA(0,1,1)(0,1,1,12)");
        assert_eq!(config.fit_options().method, OptimizerMethod::NelderMead);
        assert_eq!(config.forecast.horizon, 12);
        assert_eq!(config.forecast.confidence_level, 0.8);
        assert_eq!(config.store.dir, PathBuf::from("/tmp/models"));
        assert_eq!(config.logging.filter, "info");
    }

    #[test]
    fn test_invalid_values_rejected() {
        for text in [
            "[model]\nseasonal_order = [1, 2, 1, 12]",
            "[forecast]\nhorizon = 0",
            "[forecast]\nconfidence_level = 1.0",
            "[evaluation]\ntest_size = 0",
            "[stationarity]\nsignificance = 0.0",
            "[model]\norder = [1, 1]",
        ] {
            assert!(
                matches!(ForecastConfig::from_toml_str(text), Err(ForecastError::Config(_))),
                "accepted: {}",
                text
            );
        }
    }

    #[test]
    fn test_logging_filter_installs_subscriber_once() {
        let config = ForecastConfig::from_toml_str("[logging]\nfilter = \"sales_forecast=debug\"").unwrap();
        assert_eq!(config.logging.filter, "sales_forecast=debug");
        // another test may already own the global subscriber
        let _ = config.init_tracing();
        assert!(matches!(config.init_tracing(), Err(ForecastError::Config(_))));
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = ForecastConfig::default();
        let text = config.to_toml_string().unwrap();
        assert_eq!(ForecastConfig::from_toml_str(&text).unwrap(), config);
    }
}
