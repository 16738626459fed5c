//! Structured logging setup.

use crate::domain::error::StonksError;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Environment variable that overrides the configured level.
pub const LOG_LEVEL_ENV: &str = "LOG_LEVEL";

pub const DEFAULT_LEVEL: &str = "info";

/// Builds the filter: `LOG_LEVEL` wins over `level`.
pub fn build_filter(level: Option<&str>) -> Result<EnvFilter, StonksError> {
    if let Ok(filter) = EnvFilter::try_from_env(LOG_LEVEL_ENV) {
        return Ok(filter);
    }
    EnvFilter::try_new(level.unwrap_or(DEFAULT_LEVEL)).map_err(|e| StonksError::Logging {
        reason: e.to_string(),
    })
}

/// Initialize logging to stderr. Stdout is left to command output.
pub fn init_logging(level: Option<&str>) -> Result<(), StonksError> {
    let filter = build_filter(level)?;

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .try_init()
        .map_err(|e| StonksError::Logging {
            reason: e.to_string(),
        })
}
