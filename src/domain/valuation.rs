//! Final valuation of the ledger after the calendar walk.
//!
//! Open positions are marked at the last adjusted close on or before the
//! terminal date. Marking only reads the ledger, so valuing the same
//! ledger twice yields the same report.

use chrono::NaiveDate;
use std::collections::BTreeMap;
use tracing::{info, warn};

use crate::domain::ledger::Ledger;
use crate::ports::market_data_port::MarketDataPort;

#[derive(Debug, Clone, PartialEq)]
pub struct ProfitRow {
    pub symbol: String,
    pub amount_held: u64,
    pub average_cost: f64,
    pub realized_profit: f64,
    pub unrealized_profit: f64,
    /// Price the open position was marked at; `None` when nothing is held
    /// or no bar was found.
    pub mark_price: Option<f64>,
}

impl ProfitRow {
    pub fn total_profit(&self) -> f64 {
        self.realized_profit + self.unrealized_profit
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub terminal_date: NaiveDate,
    pub initial_cash: f64,
    pub cash: f64,
    pub depot_value: f64,
    pub total_value: f64,
    pub total_fees: f64,
    pub total_taxes: f64,
    /// Symbols with non-zero profit, ascending by total profit.
    pub rows: Vec<ProfitRow>,
}

impl Report {
    /// Fractional gain over the initial cash.
    pub fn total_return(&self) -> f64 {
        if self.initial_cash == 0.0 {
            return 0.0;
        }
        (self.total_value - self.initial_cash) / self.initial_cash
    }

    pub fn total_profit(&self) -> f64 {
        self.rows.iter().map(ProfitRow::total_profit).sum()
    }
}

/// Looks up the mark price for every held symbol.
///
/// A missing bar or a failing lookup falls back to the average cost so the
/// position still counts at what was paid for it.
fn mark_prices(
    ledger: &Ledger,
    port: &dyn MarketDataPort,
    terminal_date: NaiveDate,
) -> BTreeMap<String, (f64, bool)> {
    ledger
        .positions()
        .filter(|(_, p)| p.is_holding())
        .map(|(symbol, position)| {
            let found = match port.latest_bar(symbol, terminal_date) {
                Ok(Some(bar)) => Some(bar.adjusted_close),
                Ok(None) => {
                    warn!(%symbol, %terminal_date, "no closing price, valuing at cost");
                    None
                }
                Err(e) => {
                    warn!(%symbol, %terminal_date, error = %e, "price lookup failed, valuing at cost");
                    None
                }
            };
            let entry = match found {
                Some(price) => (price, true),
                None => (position.average_cost, false),
            };
            (symbol.to_string(), entry)
        })
        .collect()
}

pub fn value_portfolio(
    ledger: &Ledger,
    port: &dyn MarketDataPort,
    terminal_date: NaiveDate,
) -> Report {
    let marks = mark_prices(ledger, port, terminal_date);

    let mut rows: Vec<ProfitRow> = ledger
        .positions()
        .map(|(symbol, position)| {
            let mark = marks.get(symbol).copied();
            let unrealized = mark
                .map(|(price, _)| ledger.mark_to_market(symbol, price))
                .unwrap_or(0.0);
            ProfitRow {
                symbol: symbol.to_string(),
                amount_held: position.amount_held,
                average_cost: position.average_cost,
                realized_profit: position.realized_profit,
                unrealized_profit: unrealized,
                mark_price: mark.filter(|(_, found)| *found).map(|(price, _)| price),
            }
        })
        .filter(|row| row.total_profit() != 0.0)
        .collect();
    rows.sort_by(|a, b| {
        a.total_profit()
            .total_cmp(&b.total_profit())
            .then_with(|| a.symbol.cmp(&b.symbol))
    });

    let total_value = ledger.total_value(|symbol| marks.get(symbol).map(|(price, _)| *price));
    let report = Report {
        terminal_date,
        initial_cash: ledger.config().initial_cash,
        cash: ledger.cash(),
        depot_value: total_value - ledger.cash(),
        total_value,
        total_fees: ledger.cumulative_fees(),
        total_taxes: ledger.cumulative_taxes(),
        rows,
    };

    for row in &report.rows {
        info!(
            symbol = %row.symbol,
            held = row.amount_held,
            realized = row.realized_profit,
            unrealized = row.unrealized_profit,
            profit = row.total_profit(),
            "profit"
        );
    }
    info!(
        %terminal_date,
        cash = report.cash,
        depot = report.depot_value,
        total = report.total_value,
        fees = report.total_fees,
        taxes = report.total_taxes,
        "portfolio valued"
    );
    report
}
