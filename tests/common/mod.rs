#![allow(dead_code)]

use chrono::NaiveDate;
pub use stonks::domain::bar::DailyBar;
use stonks::domain::error::StonksError;
use stonks::domain::ledger::LedgerConfig;
use stonks::domain::series::SymbolSeries;
pub use stonks::domain::snapshot::{IndicatorPair, IndicatorSnapshot};
use stonks::ports::market_data_port::{MarketDataPort, LOOKBACK_DAYS};
use std::collections::{BTreeMap, HashMap};

/// In-memory market data with optional per-symbol failures.
pub struct MockMarketData {
    pub series: BTreeMap<String, SymbolSeries>,
    pub errors: HashMap<String, String>,
}

impl MockMarketData {
    pub fn new() -> Self {
        Self {
            series: BTreeMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_series(mut self, symbol: &str, series: SymbolSeries) -> Self {
        self.series.insert(symbol.to_string(), series);
        self
    }

    /// Every lookup for `symbol` fails except `latest_bar`, so the symbol
    /// can still bound the calendar.
    pub fn with_error(mut self, symbol: &str, reason: &str) -> Self {
        self.errors.insert(symbol.to_string(), reason.to_string());
        self
    }

    fn check(&self, symbol: &str) -> Result<(), StonksError> {
        match self.errors.get(symbol) {
            Some(reason) => Err(StonksError::DatabaseQuery {
                reason: reason.clone(),
            }),
            None => Ok(()),
        }
    }
}

impl MarketDataPort for MockMarketData {
    fn daily_bar(&self, symbol: &str, date: NaiveDate) -> Result<Option<DailyBar>, StonksError> {
        self.check(symbol)?;
        Ok(self
            .series
            .get(symbol)
            .and_then(|s| s.bar_in_window(date, LOOKBACK_DAYS).cloned()))
    }

    fn indicator_pair(
        &self,
        symbol: &str,
        date: NaiveDate,
    ) -> Result<Option<IndicatorPair>, StonksError> {
        self.check(symbol)?;
        Ok(self
            .series
            .get(symbol)
            .and_then(|s| s.indicator_pair_in_window(date, LOOKBACK_DAYS)))
    }

    fn latest_bar(
        &self,
        symbol: &str,
        on_or_before: NaiveDate,
    ) -> Result<Option<DailyBar>, StonksError> {
        Ok(self
            .series
            .get(symbol)
            .and_then(|s| s.latest_bar(on_or_before).cloned()))
    }

    fn list_symbols(&self) -> Result<Vec<String>, StonksError> {
        Ok(self.series.keys().cloned().collect())
    }

    fn data_range(
        &self,
        symbol: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, StonksError> {
        self.check(symbol)?;
        Ok(self.series.get(symbol).and_then(|s| {
            s.first_date()
                .zip(s.last_date())
                .map(|(a, b)| (a, b, s.bar_count()))
        }))
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// A day in January 2024 (the 8th is a Monday).
pub fn jan(d: u32) -> NaiveDate {
    date(2024, 1, d)
}

/// Series from `(day in January 2024, adjusted close, MACD histogram)` rows.
/// The MACD line is set on every snapshot.
pub fn macd_series(symbol: &str, rows: &[(u32, f64, f64)]) -> SymbolSeries {
    let bars = rows
        .iter()
        .map(|&(d, price, _)| DailyBar::flat(symbol, jan(d), price))
        .collect();
    let snapshots = rows
        .iter()
        .map(|&(d, _, hist)| IndicatorSnapshot {
            macd: Some(1.0),
            macd_hist: Some(hist),
            ..IndicatorSnapshot::new(symbol, jan(d))
        })
        .collect();
    SymbolSeries::new(bars, snapshots)
}

pub fn small_ledger() -> LedgerConfig {
    LedgerConfig {
        initial_cash: 10_000.0,
        min_buy: 1_000.0,
        max_buy: 7_000.0,
        transaction_fee: 7.0,
        tax_rate: 0.25,
    }
}

/// The two-symbol, five-day scenario whose outcome is worked out by hand
/// in the simulation tests.
pub fn two_symbol_week() -> MockMarketData {
    MockMarketData::new()
        .with_series(
            "AAA",
            macd_series(
                "AAA",
                &[
                    (5, 100.0, -1.0),
                    (8, 100.0, -0.5),
                    (9, 100.0, 0.5),
                    (10, 110.0, 1.0),
                    (11, 120.0, 2.0),
                    (12, 130.0, 3.0),
                ],
            ),
        )
        .with_series(
            "BBB",
            macd_series(
                "BBB",
                &[
                    (5, 50.0, -1.0),
                    (8, 50.0, 1.0),
                    (9, 50.0, 1.0),
                    (10, 50.0, 1.0),
                    (11, 60.0, -1.0),
                    (12, 55.0, -1.0),
                ],
            ),
        )
}
