//! Seasonal ARIMA forecasting for monthly sales series.
//!
//! The flow is: stationarity check, hold-out evaluation, fit, save to a
//! `ModelStore`, forecast through `ForecastService`. `Pipeline` runs all of
//! it from a `ForecastConfig`.

pub mod error;
pub mod series;
pub mod types;
pub mod params;
pub mod polynomial;
pub mod state_space;
pub mod initialization;
pub mod kalman;
pub mod start_params;
pub mod optimizer;
pub mod forecast;
pub mod diagnostics;
pub mod differencing;
pub mod stationarity;
pub mod model;
pub mod evaluation;
pub mod store;
pub mod service;
pub mod tuning;
pub mod data;
pub mod config;
pub mod telemetry;
pub mod pipeline;

pub use config::ForecastConfig;
pub use differencing::{difference, integrate, DifferencingSpec};
pub use error::{ForecastError, Result};
pub use evaluation::{accuracy, AccuracyMetrics, EvaluationMetrics, EvaluationResult, Evaluator};
pub use model::{FitWarning, FittedModel, ForecastPoint, ForecastResult, ModelState, SeasonalModel};
pub use pipeline::{Pipeline, PipelineReport};
pub use series::{Period, PeriodRange, TimeSeries};
pub use service::{ForecastService, ForecastSettings, ServedForecast};
pub use stationarity::{StationarityAnalyzer, StationarityConfig, StationarityReport};
pub use store::{ArtifactRef, ModelArtifact, ModelMetadata, ModelStore};
pub use types::{FitOptions, ModelSpec, OptimizerMethod};
