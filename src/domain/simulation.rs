//! Day-by-day simulation loop.
//!
//! Each trading day runs in two phases. Symbols are first evaluated in
//! parallel: data lookups and rule evaluation only read from the market
//! data port. The resulting decisions are then applied to the ledger one
//! symbol at a time, in symbol order, so every buy sees the cash left by
//! the previous one.

use chrono::NaiveDate;
use rayon::prelude::*;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use tracing::{debug, error, info, warn};

use crate::domain::bar::DailyBar;
use crate::domain::calendar::trading_days;
use crate::domain::error::StonksError;
use crate::domain::journal::{EntryKind, Journal, SkipReason};
use crate::domain::ledger::{BuyOutcome, Ledger, LedgerConfig, SellOutcome, SellRefusal};
use crate::domain::position::PositionState;
use crate::domain::signal::{CrossingTracker, Strategy};
use crate::domain::snapshot::IndicatorPair;
use crate::ports::market_data_port::MarketDataPort;

#[derive(Debug, Clone)]
pub struct SimulationConfig {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// The first symbol is the reference that bounds the calendar walk.
    pub symbols: Vec<String>,
    pub ledger: LedgerConfig,
}

#[derive(Debug, Clone)]
pub struct SimulationResult {
    pub ledger: Ledger,
    pub journal: Journal,
    /// Last date the walk evaluated.
    pub terminal_date: NaiveDate,
    pub trading_days: usize,
}

/// Outcome of the read-only phase for one symbol on one day.
#[derive(Debug, Clone)]
pub enum Evaluation {
    Ready {
        bar: DailyBar,
        pair: IndicatorPair,
        buy: bool,
        sell: bool,
    },
    Skipped(SkipReason),
    Failed(String),
}

/// Date of the reference symbol's last bar on or before `end_date`.
///
/// Without it the walk has no upper bound, so a missing bar is fatal.
pub fn terminal_date(
    port: &dyn MarketDataPort,
    reference: &str,
    end_date: NaiveDate,
) -> Result<NaiveDate, StonksError> {
    port.latest_bar(reference, end_date)?
        .map(|bar| bar.date)
        .ok_or_else(|| StonksError::NoReferenceData {
            symbol: reference.to_string(),
            on_or_before: end_date,
        })
}

/// Fetches data for `symbol` on `date` and runs the strategy over it.
pub fn evaluate_symbol(
    port: &dyn MarketDataPort,
    strategy: &dyn Strategy,
    symbol: &str,
    date: NaiveDate,
) -> Evaluation {
    let bar = match port.daily_bar(symbol, date) {
        Ok(Some(bar)) => bar,
        Ok(None) => return Evaluation::Skipped(SkipReason::NoBar),
        Err(e) => return Evaluation::Failed(e.to_string()),
    };
    if !bar.traded_on(date) {
        return Evaluation::Skipped(SkipReason::NotTraded { bar_date: bar.date });
    }

    let pair = match port.indicator_pair(symbol, date) {
        Ok(Some(pair)) => pair,
        Ok(None) => return Evaluation::Skipped(SkipReason::NoIndicators),
        Err(e) => return Evaluation::Failed(e.to_string()),
    };
    if let Err(m) = pair.check_alignment(date) {
        return Evaluation::Skipped(SkipReason::Misaligned {
            previous: m.previous,
            current: m.current,
        });
    }

    let buy = strategy.should_buy(&pair);
    let sell = strategy.should_sell(&pair);
    Evaluation::Ready {
        bar,
        pair,
        buy,
        sell,
    }
}

/// [`evaluate_symbol`] with a panic in the port or the strategy reported as
/// a failure of this symbol alone.
pub fn evaluate_symbol_guarded(
    port: &dyn MarketDataPort,
    strategy: &dyn Strategy,
    symbol: &str,
    date: NaiveDate,
) -> Evaluation {
    panic::catch_unwind(AssertUnwindSafe(|| {
        evaluate_symbol(port, strategy, symbol, date)
    }))
    .unwrap_or_else(|payload| Evaluation::Failed(panic_message(payload.as_ref())))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    let detail = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string payload".to_string());
    format!("panicked: {detail}")
}

struct DayContext<'a> {
    ledger: &'a mut Ledger,
    journal: &'a mut Journal,
    tracker: &'a mut CrossingTracker,
    strategy_name: &'a str,
}

impl DayContext<'_> {
    fn apply(&mut self, date: NaiveDate, symbol: &str, evaluation: Evaluation) {
        match evaluation {
            Evaluation::Skipped(reason) => {
                debug!(%symbol, %date, %reason, "skipping symbol");
                self.journal.record(date, symbol, EntryKind::Skipped(reason));
            }
            Evaluation::Failed(reason) => {
                error!(%symbol, %date, %reason, "evaluation failed");
                self.journal.record(date, symbol, EntryKind::Failed { reason });
            }
            Evaluation::Ready {
                bar,
                pair,
                buy,
                sell,
            } => self.decide(date, symbol, &bar, &pair, buy, sell),
        }
    }

    fn decide(
        &mut self,
        date: NaiveDate,
        symbol: &str,
        bar: &DailyBar,
        pair: &IndicatorPair,
        buy: bool,
        sell: bool,
    ) {
        let price = bar.adjusted_close;
        let holding = self.ledger.state(symbol) == PositionState::Holding;

        for crossing in self.tracker.observe(pair, price, holding) {
            info!(%symbol, %date, %crossing, "indicator crossing");
            self.journal
                .record(date, symbol, EntryKind::Crossing(crossing));
        }

        match (buy, sell) {
            (true, false) => {
                info!(strategy = self.strategy_name, %symbol, %date, "buy signal");
                let kind = match self.ledger.buy(symbol, date, price) {
                    BuyOutcome::Bought {
                        shares, cash_after, ..
                    } => EntryKind::Bought {
                        shares,
                        price,
                        cash_after,
                    },
                    BuyOutcome::Refused(reason) => EntryKind::BuyRefused {
                        price,
                        reason,
                        cash: self.ledger.cash(),
                    },
                };
                self.journal.record(date, symbol, kind);
            }
            (false, true) => {
                info!(strategy = self.strategy_name, %symbol, %date, "sell signal");
                let kind = match self.ledger.sell(symbol, date, price) {
                    SellOutcome::Sold {
                        shares,
                        profit,
                        tax,
                        cash_after,
                        ..
                    } => EntryKind::Sold {
                        shares,
                        price,
                        profit,
                        tax,
                        cash_after,
                    },
                    SellOutcome::Refused(SellRefusal::NotHolding) => return,
                    SellOutcome::Refused(reason) => EntryKind::SellRefused {
                        price,
                        reason,
                        cash: self.ledger.cash(),
                    },
                };
                self.journal.record(date, symbol, kind);
            }
            (true, true) => {
                warn!(%symbol, %date, "ambiguous signals, not trading");
                self.journal.record(date, symbol, EntryKind::Ambiguous);
            }
            (false, false) => {}
        }
    }
}

/// Walks every trading day from `start_date` to the terminal date.
///
/// Only a missing terminal date aborts the run; anything that goes wrong
/// for one symbol on one day is journaled and the walk continues.
pub fn run_simulation(
    port: &dyn MarketDataPort,
    strategy: &dyn Strategy,
    config: &SimulationConfig,
) -> Result<SimulationResult, StonksError> {
    let reference = config.symbols.first().ok_or(StonksError::NoSymbols)?;
    let terminal = terminal_date(port, reference, config.end_date)?;
    info!(%reference, last_trading_day = %terminal, "calendar bounded");

    let mut ledger = Ledger::new(config.ledger.clone(), &config.symbols);
    let mut journal = Journal::new();
    let mut tracker = CrossingTracker::new();
    let mut days = 0;

    for date in trading_days(config.start_date, terminal) {
        let evaluations: Vec<Evaluation> = config
            .symbols
            .par_iter()
            .map(|symbol| evaluate_symbol_guarded(port, strategy, symbol, date))
            .collect();

        let mut day = DayContext {
            ledger: &mut ledger,
            journal: &mut journal,
            tracker: &mut tracker,
            strategy_name: strategy.name(),
        };
        for (symbol, evaluation) in config.symbols.iter().zip(evaluations) {
            day.apply(date, symbol, evaluation);
        }
        days += 1;
    }

    info!(
        trading_days = days,
        trades = journal.trades().count(),
        cash = ledger.cash(),
        "simulation finished"
    );

    Ok(SimulationResult {
        ledger,
        journal,
        terminal_date: terminal,
        trading_days: days,
    })
}
