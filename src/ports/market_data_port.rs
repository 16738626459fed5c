//! Market data access port.
//!
//! Read-through lookups against whatever store holds the daily bars and
//! precomputed indicators. Implementations must be shareable across the
//! threads that evaluate symbols of one trading day.

use crate::domain::bar::DailyBar;
use crate::domain::error::StonksError;
use crate::domain::snapshot::IndicatorPair;
use chrono::NaiveDate;

/// Calendar days searched backwards from the requested date.
pub const LOOKBACK_DAYS: i64 = 4;

pub trait MarketDataPort: Sync {
    /// Most recent bar in `[date - LOOKBACK_DAYS, date]`.
    ///
    /// The bar may be dated before `date` when the symbol did not trade on
    /// it; callers decide what that means.
    fn daily_bar(&self, symbol: &str, date: NaiveDate) -> Result<Option<DailyBar>, StonksError>;

    /// Last two indicator snapshots in `[date - LOOKBACK_DAYS, date]`.
    fn indicator_pair(
        &self,
        symbol: &str,
        date: NaiveDate,
    ) -> Result<Option<IndicatorPair>, StonksError>;

    /// Last bar on or before `date`, however far back.
    fn latest_bar(
        &self,
        symbol: &str,
        on_or_before: NaiveDate,
    ) -> Result<Option<DailyBar>, StonksError>;

    fn list_symbols(&self) -> Result<Vec<String>, StonksError>;

    /// First date, last date and bar count for `symbol`.
    fn data_range(
        &self,
        symbol: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, StonksError>;
}
