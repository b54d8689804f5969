//! Log subscriber setup for binaries and tests that embed the library.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::{ForecastError, Result};

/// Install a global fmt subscriber. `RUST_LOG` overrides `default_filter`.
///
/// Fails if a global subscriber is already set or the filter is malformed.
pub fn init_tracing(default_filter: &str) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(f) => f,
        Err(_) => EnvFilter::try_new(default_filter).map_err(|e| ForecastError::Config(e.to_string()))?,
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .with(filter)
        .try_init()
        .map_err(|e| ForecastError::Config(e.to_string()))
}
