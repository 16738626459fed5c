//! Daily adjusted price bar.

use chrono::NaiveDate;

/// One trading day for one symbol as delivered by the data store.
///
/// The simulation only trades on `adjusted_close`; the other fields are
/// carried so adapters can round-trip the full record.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyBar {
    pub symbol: String,
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub adjusted_close: f64,
    pub volume: i64,
    pub dividend_amount: f64,
    pub split_coefficient: f64,
}

impl DailyBar {
    /// Bar with every price field set to `adjusted_close`, no volume and
    /// no corporate actions.
    pub fn flat(symbol: &str, date: NaiveDate, adjusted_close: f64) -> Self {
        DailyBar {
            symbol: symbol.to_string(),
            date,
            open: adjusted_close,
            high: adjusted_close,
            low: adjusted_close,
            close: adjusted_close,
            adjusted_close,
            volume: 0,
            dividend_amount: 0.0,
            split_coefficient: 1.0,
        }
    }

    /// True when the instrument actually traded on `date`.
    pub fn traded_on(&self, date: NaiveDate) -> bool {
        self.date == date
    }
}
