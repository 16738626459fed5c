//! Configuration validation.
//!
//! Every key has a default, so validation only rejects values that are
//! present and wrong. Runs before any data is touched.

use crate::domain::error::StonksError;
use crate::domain::ledger::LedgerConfig;
use crate::domain::signal::StrategyKind;
use crate::ports::config_port::ConfigPort;
use chrono::NaiveDate;

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const DEFAULT_POOL_SIZE: i64 = 4;

pub fn validate_config(config: &dyn ConfigPort) -> Result<(), StonksError> {
    validate_data_config(config)?;
    validate_ledger_config(config)?;
    validate_simulation_config(config)?;
    Ok(())
}

/// The checks that hold whatever flags accompany the file. Source, path,
/// dates and strategy are checked once flags are merged over the file.
pub fn validate_fixed_config(config: &dyn ConfigPort) -> Result<(), StonksError> {
    validate_sqlite_config(config)?;
    validate_ledger_config(config)
}

fn invalid(section: &str, key: &str, reason: &str) -> StonksError {
    StonksError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

pub fn validate_data_config(config: &dyn ConfigPort) -> Result<(), StonksError> {
    if let Some(source) = config.get_string("data", "source") {
        match source.trim().to_lowercase().as_str() {
            "csv" | "sqlite" => {}
            _ => return Err(invalid("data", "source", "source must be csv or sqlite")),
        }
    }
    validate_sqlite_config(config)
}

pub fn validate_sqlite_config(config: &dyn ConfigPort) -> Result<(), StonksError> {
    if config.get_int("sqlite", "pool_size", DEFAULT_POOL_SIZE) < 1 {
        return Err(invalid("sqlite", "pool_size", "pool_size must be at least 1"));
    }
    Ok(())
}

pub fn validate_ledger_config(config: &dyn ConfigPort) -> Result<(), StonksError> {
    let defaults = LedgerConfig::default();
    let cash = config.get_double("ledger", "initial_cash", defaults.initial_cash);
    if cash <= 0.0 {
        return Err(invalid("ledger", "initial_cash", "initial_cash must be positive"));
    }

    let min_buy = config.get_double("ledger", "min_buy", defaults.min_buy);
    if min_buy < 0.0 {
        return Err(invalid("ledger", "min_buy", "min_buy must be non-negative"));
    }

    let max_buy = config.get_double("ledger", "max_buy", defaults.max_buy);
    if max_buy <= 0.0 {
        return Err(invalid("ledger", "max_buy", "max_buy must be positive"));
    }
    if max_buy < min_buy {
        return Err(invalid("ledger", "max_buy", "max_buy must not be below min_buy"));
    }

    let fee = config.get_double("ledger", "transaction_fee", defaults.transaction_fee);
    if fee < 0.0 {
        return Err(invalid(
            "ledger",
            "transaction_fee",
            "transaction_fee must be non-negative",
        ));
    }

    let tax = config.get_double("ledger", "tax_rate", defaults.tax_rate);
    if !(0.0..1.0).contains(&tax) {
        return Err(invalid("ledger", "tax_rate", "tax_rate must be between 0 and 1"));
    }
    Ok(())
}

pub fn validate_simulation_config(config: &dyn ConfigPort) -> Result<(), StonksError> {
    let start = optional_date(config, "start_date")?;
    let end = optional_date(config, "end_date")?;
    if let (Some(start), Some(end)) = (start, end) {
        if start > end {
            return Err(invalid(
                "simulation",
                "start_date",
                "start_date must not be after end_date",
            ));
        }
    }

    if let Some(name) = config.get_string("simulation", "strategy") {
        name.trim()
            .parse::<StrategyKind>()
            .map_err(|reason| invalid("simulation", "strategy", &reason))?;
    }
    Ok(())
}

fn optional_date(config: &dyn ConfigPort, key: &str) -> Result<Option<NaiveDate>, StonksError> {
    config
        .get_string("simulation", key)
        .map(|s| parse_date(&s, "simulation", key))
        .transpose()
}

pub fn parse_date(value: &str, section: &str, key: &str) -> Result<NaiveDate, StonksError> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).map_err(|_| {
        invalid(
            section,
            key,
            &format!("invalid {} format, expected YYYY-MM-DD", key),
        )
    })
}
