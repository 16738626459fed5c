//! CSV file market data adapter.
//!
//! Reads `<SYMBOL>_daily.csv` and `<SYMBOL>_indicators.csv` from one
//! directory. Each symbol is loaded on first use and kept in memory.

use crate::domain::bar::DailyBar;
use crate::domain::error::StonksError;
use crate::domain::series::SymbolSeries;
use crate::domain::snapshot::{IndicatorPair, IndicatorSnapshot};
use crate::ports::market_data_port::{MarketDataPort, LOOKBACK_DAYS};
use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tracing::debug;

const DAILY_SUFFIX: &str = "_daily.csv";
const INDICATOR_SUFFIX: &str = "_indicators.csv";

#[derive(Debug, Deserialize)]
struct DailyRow {
    date: NaiveDate,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    adjusted_close: f64,
    volume: i64,
    #[serde(default)]
    dividend_amount: f64,
    #[serde(default = "unit_split")]
    split_coefficient: f64,
}

fn unit_split() -> f64 {
    1.0
}

impl DailyRow {
    fn into_bar(self, symbol: &str) -> DailyBar {
        DailyBar {
            symbol: symbol.to_string(),
            date: self.date,
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
            adjusted_close: self.adjusted_close,
            volume: self.volume,
            dividend_amount: self.dividend_amount,
            split_coefficient: self.split_coefficient,
        }
    }
}

/// Empty cells and missing columns read as absent values.
#[derive(Debug, Deserialize)]
struct IndicatorRow {
    date: NaiveDate,
    #[serde(default)]
    sma15: Option<f64>,
    #[serde(default)]
    sma20: Option<f64>,
    #[serde(default)]
    sma50: Option<f64>,
    #[serde(default)]
    sma100: Option<f64>,
    #[serde(default)]
    sma200: Option<f64>,
    #[serde(default)]
    ema12: Option<f64>,
    #[serde(default)]
    ema20: Option<f64>,
    #[serde(default)]
    ema26: Option<f64>,
    #[serde(default)]
    ema50: Option<f64>,
    #[serde(default)]
    ema100: Option<f64>,
    #[serde(default)]
    ema200: Option<f64>,
    #[serde(default)]
    macd: Option<f64>,
    #[serde(default)]
    macd_hist: Option<f64>,
    #[serde(default)]
    macd_signal: Option<f64>,
    #[serde(default)]
    rsi: Option<f64>,
    #[serde(default)]
    bband_lower: Option<f64>,
    #[serde(default)]
    bband_upper: Option<f64>,
    #[serde(default)]
    bband_middle: Option<f64>,
}

impl IndicatorRow {
    fn into_snapshot(self, symbol: &str) -> IndicatorSnapshot {
        IndicatorSnapshot {
            symbol: symbol.to_string(),
            date: self.date,
            sma15: self.sma15,
            sma20: self.sma20,
            sma50: self.sma50,
            sma100: self.sma100,
            sma200: self.sma200,
            ema12: self.ema12,
            ema20: self.ema20,
            ema26: self.ema26,
            ema50: self.ema50,
            ema100: self.ema100,
            ema200: self.ema200,
            macd: self.macd,
            macd_hist: self.macd_hist,
            macd_signal: self.macd_signal,
            rsi: self.rsi,
            bband_lower: self.bband_lower,
            bband_upper: self.bband_upper,
            bband_middle: self.bband_middle,
        }
    }
}

pub struct CsvAdapter {
    base_path: PathBuf,
    cache: RwLock<HashMap<String, Arc<SymbolSeries>>>,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self {
            base_path,
            cache: RwLock::new(HashMap::new()),
        }
    }

    fn daily_path(&self, symbol: &str) -> PathBuf {
        self.base_path.join(format!("{}{}", symbol, DAILY_SUFFIX))
    }

    fn indicator_path(&self, symbol: &str) -> PathBuf {
        self.base_path.join(format!("{}{}", symbol, INDICATOR_SUFFIX))
    }

    /// Parses every row of `path`. A missing file reads as no rows.
    fn read_rows<T>(path: &Path) -> Result<Vec<T>, StonksError>
    where
        T: for<'de> Deserialize<'de>,
    {
        if !path.exists() {
            return Ok(Vec::new());
        }
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(path)
            .map_err(|e| StonksError::Database {
                reason: format!("failed to read {}: {}", path.display(), e),
            })?;
        rdr.deserialize()
            .map(|row| {
                row.map_err(|e| StonksError::Database {
                    reason: format!("CSV parse error in {}: {}", path.display(), e),
                })
            })
            .collect()
    }

    fn load(&self, symbol: &str) -> Result<SymbolSeries, StonksError> {
        let bars = Self::read_rows::<DailyRow>(&self.daily_path(symbol))?
            .into_iter()
            .map(|row| row.into_bar(symbol))
            .collect();
        let indicators = Self::read_rows::<IndicatorRow>(&self.indicator_path(symbol))?
            .into_iter()
            .map(|row| row.into_snapshot(symbol))
            .collect();
        let series = SymbolSeries::new(bars, indicators);
        debug!(
            %symbol,
            bars = series.bar_count(),
            indicators = series.indicators().len(),
            "loaded CSV series"
        );
        Ok(series)
    }

    /// Returns the cached series for `symbol`, loading it on first use.
    pub fn series(&self, symbol: &str) -> Result<Arc<SymbolSeries>, StonksError> {
        if let Some(series) = self.read_cache()?.get(symbol) {
            return Ok(Arc::clone(series));
        }
        let loaded = Arc::new(self.load(symbol)?);
        let mut cache = self.cache.write().map_err(|_| StonksError::Database {
            reason: "series cache poisoned".into(),
        })?;
        Ok(Arc::clone(
            cache.entry(symbol.to_string()).or_insert(loaded),
        ))
    }

    fn read_cache(
        &self,
    ) -> Result<std::sync::RwLockReadGuard<'_, HashMap<String, Arc<SymbolSeries>>>, StonksError>
    {
        self.cache.read().map_err(|_| StonksError::Database {
            reason: "series cache poisoned".into(),
        })
    }
}

impl MarketDataPort for CsvAdapter {
    fn daily_bar(&self, symbol: &str, date: NaiveDate) -> Result<Option<DailyBar>, StonksError> {
        Ok(self.series(symbol)?.bar_in_window(date, LOOKBACK_DAYS).cloned())
    }

    fn indicator_pair(
        &self,
        symbol: &str,
        date: NaiveDate,
    ) -> Result<Option<IndicatorPair>, StonksError> {
        Ok(self
            .series(symbol)?
            .indicator_pair_in_window(date, LOOKBACK_DAYS))
    }

    fn latest_bar(
        &self,
        symbol: &str,
        on_or_before: NaiveDate,
    ) -> Result<Option<DailyBar>, StonksError> {
        Ok(self.series(symbol)?.latest_bar(on_or_before).cloned())
    }

    fn list_symbols(&self) -> Result<Vec<String>, StonksError> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| StonksError::Database {
            reason: format!(
                "failed to read directory {}: {}",
                self.base_path.display(),
                e
            ),
        })?;

        let mut symbols = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| StonksError::Database {
                reason: format!("directory entry error: {}", e),
            })?;

            let name = entry.file_name();
            let name_str = name.to_string_lossy();
            if let Some(symbol) = name_str.strip_suffix(DAILY_SUFFIX) {
                if !symbol.is_empty() {
                    symbols.push(symbol.to_string());
                }
            }
        }

        symbols.sort();
        Ok(symbols)
    }

    fn data_range(
        &self,
        symbol: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, StonksError> {
        let series = self.series(symbol)?;
        Ok(series
            .first_date()
            .zip(series.last_date())
            .map(|(first, last)| (first, last, series.bar_count())))
    }
}
