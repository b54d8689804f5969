use std::path::PathBuf;

use thiserror::Error;

use crate::series::Period;

#[derive(Error, Debug)]
pub enum ForecastError {
    #[error("insufficient data: need at least {needed} observations, got {got}")]
    InsufficientData { needed: usize, got: usize },

    #[error("degenerate series: {0}")]
    DegenerateSeries(String),

    #[error("series too short for differencing: length {len} must exceed {required}")]
    SeriesTooShort { len: usize, required: usize },

    #[error(
        "optimizer did not converge after {iterations} iterations ({method}); \
         last loglike {loglike}, params {params:?}"
    )]
    Convergence {
        loglike: f64,
        params: Vec<f64>,
        iterations: u64,
        method: String,
    },

    #[error("invalid forecast horizon {horizon}: must be at least 1")]
    InvalidHorizon { horizon: usize },

    #[error("invalid confidence level {level}: must lie strictly between 0 and 1")]
    InvalidConfidenceLevel { level: f64 },

    #[error(
        "invalid split: test size {test_size} on a series of {series_len} \
         leaves fewer than {min_train} training observations"
    )]
    InvalidSplit {
        test_size: usize,
        series_len: usize,
        min_train: usize,
    },

    #[error("no fitted model available for '{reference}'")]
    ModelNotFound { reference: String },

    #[error("artifact '{reference}' not found in {}", dir.display())]
    ArtifactNotFound { reference: String, dir: PathBuf },

    #[error("artifact '{artifact_id}' is corrupt: {reason}")]
    CorruptArtifact { artifact_id: String, reason: String },

    #[error("persistence failed at {}: {message}", path.display())]
    Persistence { path: PathBuf, message: String },

    #[error("invalid model specification: {0}")]
    InvalidSpec(String),

    #[error("seed length mismatch: expected {expected} values, got {got}")]
    SeedLengthMismatch { expected: usize, got: usize },

    #[error("parameter length mismatch: expected {expected}, got {got}")]
    ParamLengthMismatch { expected: usize, got: usize },

    #[error("state space construction failed: {0}")]
    StateSpace(String),

    #[error("period gap: expected {expected}, found {found}")]
    PeriodGap { expected: Period, found: Period },

    #[error("data error: {0}")]
    Data(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl ForecastError {
    pub(crate) fn persistence(path: impl Into<PathBuf>, err: impl std::fmt::Display) -> Self {
        ForecastError::Persistence {
            path: path.into(),
            message: err.to_string(),
        }
    }

    pub(crate) fn corrupt(artifact_id: &str, reason: impl Into<String>) -> Self {
        ForecastError::CorruptArtifact {
            artifact_id: artifact_id.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ForecastError>;
