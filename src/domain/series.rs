//! Date-ordered bars and indicator snapshots of one symbol.
//!
//! Backing store for adapters that load a whole history into memory.

use crate::domain::bar::DailyBar;
use crate::domain::snapshot::{IndicatorPair, IndicatorSnapshot};
use chrono::{Duration, NaiveDate};

#[derive(Debug, Clone, Default)]
pub struct SymbolSeries {
    bars: Vec<DailyBar>,
    indicators: Vec<IndicatorSnapshot>,
}

/// Index one past the last element dated on or before `date`.
fn upper_bound<T>(items: &[T], date: NaiveDate, date_of: impl Fn(&T) -> NaiveDate) -> usize {
    items.partition_point(|item| date_of(item) <= date)
}

impl SymbolSeries {
    /// Sorts both inputs by date; a later duplicate date replaces an earlier one.
    pub fn new(mut bars: Vec<DailyBar>, mut indicators: Vec<IndicatorSnapshot>) -> Self {
        bars.sort_by_key(|b| b.date);
        bars.reverse();
        bars.dedup_by_key(|b| b.date);
        bars.reverse();

        indicators.sort_by_key(|s| s.date);
        indicators.reverse();
        indicators.dedup_by_key(|s| s.date);
        indicators.reverse();

        Self { bars, indicators }
    }

    pub fn bars(&self) -> &[DailyBar] {
        &self.bars
    }

    pub fn indicators(&self) -> &[IndicatorSnapshot] {
        &self.indicators
    }

    pub fn bar_count(&self) -> usize {
        self.bars.len()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.bars.first().map(|b| b.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.bars.last().map(|b| b.date)
    }

    pub fn latest_bar(&self, on_or_before: NaiveDate) -> Option<&DailyBar> {
        let end = upper_bound(&self.bars, on_or_before, |b| b.date);
        end.checked_sub(1).map(|i| &self.bars[i])
    }

    pub fn bar_in_window(&self, date: NaiveDate, lookback_days: i64) -> Option<&DailyBar> {
        let from = date - Duration::days(lookback_days);
        self.latest_bar(date).filter(|b| b.date >= from)
    }

    pub fn indicator_pair_in_window(
        &self,
        date: NaiveDate,
        lookback_days: i64,
    ) -> Option<IndicatorPair> {
        let from = date - Duration::days(lookback_days);
        let end = upper_bound(&self.indicators, date, |s| s.date);
        if end < 2 {
            return None;
        }
        let previous = &self.indicators[end - 2];
        let current = &self.indicators[end - 1];
        if previous.date < from {
            return None;
        }
        Some(IndicatorPair::new(previous.clone(), current.clone()))
    }
}
