//! Domain error types.

use chrono::NaiveDate;

/// Top-level error type for stonks.
///
/// Conditions local to one symbol on one day (missing bars, misaligned
/// indicators) are not errors; see [`crate::domain::journal::SkipReason`].
#[derive(Debug, thiserror::Error)]
pub enum StonksError {
    #[error("database error: {reason}")]
    Database { reason: String },

    #[error("database query error: {reason}")]
    DatabaseQuery { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("no symbols to simulate")]
    NoSymbols,

    #[error("no data for reference symbol {symbol} on or before {on_or_before}")]
    NoReferenceData {
        symbol: String,
        on_or_before: NaiveDate,
    },

    #[error("failed to initialise logging: {reason}")]
    Logging { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<csv::Error> for StonksError {
    fn from(err: csv::Error) -> Self {
        StonksError::Database {
            reason: format!("CSV error: {err}"),
        }
    }
}

impl From<&StonksError> for std::process::ExitCode {
    fn from(err: &StonksError) -> Self {
        let code: u8 = match err {
            StonksError::Io(_) | StonksError::Logging { .. } => 1,
            StonksError::ConfigParse { .. }
            | StonksError::ConfigMissing { .. }
            | StonksError::ConfigInvalid { .. } => 2,
            StonksError::Database { .. } | StonksError::DatabaseQuery { .. } => 3,
            StonksError::NoSymbols | StonksError::NoReferenceData { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
