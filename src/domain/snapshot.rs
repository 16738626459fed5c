//! Precomputed technical-indicator snapshots.
//!
//! Indicators are computed upstream by the data provider; a snapshot holds
//! every value known for one symbol on one date. Any field may be absent
//! when the symbol lacks the history for that indicator.

use chrono::NaiveDate;

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorSnapshot {
    pub symbol: String,
    pub date: NaiveDate,
    pub sma15: Option<f64>,
    pub sma20: Option<f64>,
    pub sma50: Option<f64>,
    pub sma100: Option<f64>,
    pub sma200: Option<f64>,
    pub ema12: Option<f64>,
    pub ema20: Option<f64>,
    pub ema26: Option<f64>,
    pub ema50: Option<f64>,
    pub ema100: Option<f64>,
    pub ema200: Option<f64>,
    pub macd: Option<f64>,
    pub macd_hist: Option<f64>,
    pub macd_signal: Option<f64>,
    pub rsi: Option<f64>,
    pub bband_lower: Option<f64>,
    pub bband_upper: Option<f64>,
    pub bband_middle: Option<f64>,
}

impl IndicatorSnapshot {
    /// Snapshot with no indicator values.
    pub fn new(symbol: &str, date: NaiveDate) -> Self {
        IndicatorSnapshot {
            symbol: symbol.to_string(),
            date,
            sma15: None,
            sma20: None,
            sma50: None,
            sma100: None,
            sma200: None,
            ema12: None,
            ema20: None,
            ema26: None,
            ema50: None,
            ema100: None,
            ema200: None,
            macd: None,
            macd_hist: None,
            macd_signal: None,
            rsi: None,
            bband_lower: None,
            bband_upper: None,
            bband_middle: None,
        }
    }
}

/// Indicator values at two adjacent evaluation dates.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorPair {
    pub previous: IndicatorSnapshot,
    pub current: IndicatorSnapshot,
}

/// The pair handed back by the store does not describe `(before date, date)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Misalignment {
    pub previous: NaiveDate,
    pub current: NaiveDate,
}

impl IndicatorPair {
    pub fn new(previous: IndicatorSnapshot, current: IndicatorSnapshot) -> Self {
        IndicatorPair { previous, current }
    }

    /// `current` must be dated exactly `date` and `previous` strictly before it.
    pub fn check_alignment(&self, date: NaiveDate) -> Result<(), Misalignment> {
        if self.current.date == date && self.previous.date < date {
            Ok(())
        } else {
            Err(Misalignment {
                previous: self.previous.date,
                current: self.current.date,
            })
        }
    }
}
