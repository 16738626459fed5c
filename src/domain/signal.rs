//! Buy/sell decision rules and informational indicator crossings.
//!
//! A rule looks at the indicator snapshots of two adjacent evaluation dates
//! and answers yes or no. Strategies pair a buy rule with a sell rule and
//! are injected into the simulation loop, so swapping one does not touch
//! the loop itself.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::domain::snapshot::{IndicatorPair, IndicatorSnapshot};

pub const RSI_OVERSOLD: f64 = 30.0;
pub const RSI_OVERBOUGHT: f64 = 70.0;

/// A pure decision over `(before, current)`.
pub type Rule = fn(&IndicatorSnapshot, &IndicatorSnapshot) -> bool;

/// Buy/sell decision pair evaluated once per symbol per trading day.
pub trait Strategy: Sync {
    fn name(&self) -> &str;
    fn should_buy(&self, pair: &IndicatorPair) -> bool;
    fn should_sell(&self, pair: &IndicatorPair) -> bool;
}

/// Strategy built from two plain rule functions.
#[derive(Debug, Clone, Copy)]
pub struct RuleStrategy {
    pub name: &'static str,
    pub buy: Rule,
    pub sell: Rule,
}

impl Strategy for RuleStrategy {
    fn name(&self) -> &str {
        self.name
    }

    fn should_buy(&self, pair: &IndicatorPair) -> bool {
        (self.buy)(&pair.previous, &pair.current)
    }

    fn should_sell(&self, pair: &IndicatorPair) -> bool {
        (self.sell)(&pair.previous, &pair.current)
    }
}

fn both_have_macd(before: &IndicatorSnapshot, current: &IndicatorSnapshot) -> bool {
    before.macd.is_some() && current.macd.is_some()
}

/// MACD histogram turns from negative to positive.
pub fn macd_histogram_buy(before: &IndicatorSnapshot, current: &IndicatorSnapshot) -> bool {
    both_have_macd(before, current)
        && matches!(
            (before.macd_hist, current.macd_hist),
            (Some(b), Some(c)) if b < 0.0 && c > 0.0
        )
}

/// MACD histogram turns from positive to negative.
pub fn macd_histogram_sell(before: &IndicatorSnapshot, current: &IndicatorSnapshot) -> bool {
    both_have_macd(before, current)
        && matches!(
            (before.macd_hist, current.macd_hist),
            (Some(b), Some(c)) if b > 0.0 && c < 0.0
        )
}

/// MACD line crosses zero upwards.
pub fn macd_line_buy(before: &IndicatorSnapshot, current: &IndicatorSnapshot) -> bool {
    matches!((before.macd, current.macd), (Some(b), Some(c)) if b < 0.0 && c > 0.0)
}

/// MACD line crosses zero downwards.
pub fn macd_line_sell(before: &IndicatorSnapshot, current: &IndicatorSnapshot) -> bool {
    matches!((before.macd, current.macd), (Some(b), Some(c)) if b > 0.0 && c < 0.0)
}

/// SMA50 crosses above SMA200.
pub fn golden_cross(before: &IndicatorSnapshot, current: &IndicatorSnapshot) -> bool {
    match (before.sma50, before.sma200, current.sma50, current.sma200) {
        (Some(b50), Some(b200), Some(c50), Some(c200)) => b50 < b200 && c50 > c200,
        _ => false,
    }
}

/// SMA50 crosses below SMA200.
pub fn death_cross(before: &IndicatorSnapshot, current: &IndicatorSnapshot) -> bool {
    match (before.sma50, before.sma200, current.sma50, current.sma200) {
        (Some(b50), Some(b200), Some(c50), Some(c200)) => b50 > b200 && c50 < c200,
        _ => false,
    }
}

/// RSI climbs out of the oversold zone.
pub fn rsi_leaving_oversold(before: &IndicatorSnapshot, current: &IndicatorSnapshot) -> bool {
    matches!(
        (before.rsi, current.rsi),
        (Some(b), Some(c)) if b < RSI_OVERSOLD && c >= RSI_OVERSOLD
    )
}

/// RSI drops out of the overbought zone.
pub fn rsi_leaving_overbought(before: &IndicatorSnapshot, current: &IndicatorSnapshot) -> bool {
    matches!(
        (before.rsi, current.rsi),
        (Some(b), Some(c)) if b > RSI_OVERBOUGHT && c <= RSI_OVERBOUGHT
    )
}

pub const MACD_HISTOGRAM: RuleStrategy = RuleStrategy {
    name: "MACD",
    buy: macd_histogram_buy,
    sell: macd_histogram_sell,
};

pub const MACD_LINE: RuleStrategy = RuleStrategy {
    name: "MACD-line",
    buy: macd_line_buy,
    sell: macd_line_sell,
};

pub const SMA_CROSS: RuleStrategy = RuleStrategy {
    name: "SMA-cross",
    buy: golden_cross,
    sell: death_cross,
};

pub const RSI_THRESHOLD: RuleStrategy = RuleStrategy {
    name: "RSI",
    buy: rsi_leaving_oversold,
    sell: rsi_leaving_overbought,
};

/// Built-in strategies selectable from config or the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum StrategyKind {
    #[default]
    MacdHistogram,
    MacdLine,
    SmaCross,
    RsiThreshold,
}

impl StrategyKind {
    pub fn strategy(self) -> RuleStrategy {
        match self {
            StrategyKind::MacdHistogram => MACD_HISTOGRAM,
            StrategyKind::MacdLine => MACD_LINE,
            StrategyKind::SmaCross => SMA_CROSS,
            StrategyKind::RsiThreshold => RSI_THRESHOLD,
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StrategyKind::MacdHistogram => "macd-histogram",
            StrategyKind::MacdLine => "macd-line",
            StrategyKind::SmaCross => "sma-cross",
            StrategyKind::RsiThreshold => "rsi-threshold",
        };
        f.write_str(s)
    }
}

impl FromStr for StrategyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "macd-histogram" | "macd" => Ok(StrategyKind::MacdHistogram),
            "macd-line" => Ok(StrategyKind::MacdLine),
            "sma-cross" => Ok(StrategyKind::SmaCross),
            "rsi-threshold" | "rsi" => Ok(StrategyKind::RsiThreshold),
            other => Err(format!("unknown strategy '{other}'")),
        }
    }
}

/// An indicator event reported for observability only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Crossing {
    RsiLeavingOversold,
    RsiLeavingOverbought,
    GoldenCross,
    DeathCross,
    ClosedBelowSma50,
}

impl fmt::Display for Crossing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Crossing::RsiLeavingOversold => "RSI bullish, leaving oversold",
            Crossing::RsiLeavingOverbought => "RSI bearish, leaving overbought",
            Crossing::GoldenCross => "golden cross, bullish",
            Crossing::DeathCross => "death cross, bearish",
            Crossing::ClosedBelowSma50 => "closed below SMA50, bearish",
        };
        f.write_str(s)
    }
}

/// Detects informational crossings.
///
/// Keeps one flag per symbol so that only the first close of a run of
/// consecutive closes below SMA50 is reported.
#[derive(Debug, Default)]
pub struct CrossingTracker {
    below_sma50: HashMap<String, bool>,
}

impl CrossingTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// `holding` gates the overbought exit, which only matters for an open
    /// position.
    pub fn observe(
        &mut self,
        pair: &IndicatorPair,
        adjusted_close: f64,
        holding: bool,
    ) -> Vec<Crossing> {
        let mut crossings = Vec::new();
        let (before, current) = (&pair.previous, &pair.current);

        if rsi_leaving_oversold(before, current) {
            crossings.push(Crossing::RsiLeavingOversold);
        } else if holding && rsi_leaving_overbought(before, current) {
            crossings.push(Crossing::RsiLeavingOverbought);
        }

        if golden_cross(before, current) {
            crossings.push(Crossing::GoldenCross);
        } else if death_cross(before, current) {
            crossings.push(Crossing::DeathCross);
        }

        let below = current.sma50.is_some_and(|sma| adjusted_close < sma);
        let was_below = self
            .below_sma50
            .insert(current.symbol.clone(), below)
            .unwrap_or(false);
        if below && !was_below {
            crossings.push(Crossing::ClosedBelowSma50);
        }

        crossings
    }
}
