//! Shared cash account and per-symbol positions.
//!
//! One ledger exists per simulation run. Every symbol draws on the same
//! cash, so the ledger is only ever mutated through `&mut self` from a
//! single place in the simulation loop.

use chrono::NaiveDate;
use std::collections::BTreeMap;
use tracing::info;

use super::position::{Position, PositionState};

/// Cash and cost parameters of the simulated account.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerConfig {
    pub initial_cash: f64,
    /// No buy is attempted while cash is below this amount.
    pub min_buy: f64,
    /// Upper bound on the notional of a single buy.
    pub max_buy: f64,
    /// Flat fee charged on every executed buy or sell.
    pub transaction_fee: f64,
    /// Share of a realized gain withheld on sale.
    pub tax_rate: f64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        LedgerConfig {
            initial_cash: 1_000_000.0,
            min_buy: 1_000.0,
            max_buy: 7_000.0,
            transaction_fee: 7.0,
            tax_rate: 0.25,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BuyOutcome {
    Bought {
        shares: u64,
        price: f64,
        cost: f64,
        fee: f64,
        amount_held: u64,
        average_cost: f64,
        cash_after: f64,
    },
    Refused(BuyRefusal),
}

#[derive(Debug, Clone, PartialEq)]
pub enum BuyRefusal {
    InvalidPrice,
    /// Cash has fallen below the minimum buy threshold.
    BelowMinimum { cash: f64, min_buy: f64 },
    /// Not even one share plus the fee is affordable.
    InsufficientFunds { cash: f64, needed: f64 },
    /// One share costs more than the maximum buy notional.
    ZeroShares,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SellOutcome {
    Sold {
        shares: u64,
        price: f64,
        profit: f64,
        tax: f64,
        fee: f64,
        cash_after: f64,
    },
    Refused(SellRefusal),
}

#[derive(Debug, Clone, PartialEq)]
pub enum SellRefusal {
    InvalidPrice,
    NotHolding,
    /// The strategy never sells at or below its average cost.
    BelowAverageCost { price: f64, average_cost: f64 },
    /// Fee and tax would exceed proceeds plus available cash.
    ProceedsBelowCosts { proceeds: f64, cash: f64 },
}

impl BuyOutcome {
    pub fn executed(&self) -> bool {
        matches!(self, BuyOutcome::Bought { .. })
    }
}

impl SellOutcome {
    pub fn executed(&self) -> bool {
        matches!(self, SellOutcome::Sold { .. })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Ledger {
    config: LedgerConfig,
    cash: f64,
    positions: BTreeMap<String, Position>,
    cumulative_fees: f64,
    cumulative_taxes: f64,
}

fn valid_price(price: f64) -> bool {
    price.is_finite() && price > 0.0
}

impl Ledger {
    /// Opens the account with a flat position for every tracked symbol.
    pub fn new<S: AsRef<str>>(config: LedgerConfig, symbols: &[S]) -> Self {
        let positions = symbols
            .iter()
            .map(|s| (s.as_ref().to_string(), Position::default()))
            .collect();
        Ledger {
            cash: config.initial_cash,
            config,
            positions,
            cumulative_fees: 0.0,
            cumulative_taxes: 0.0,
        }
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn cash(&self) -> f64 {
        self.cash
    }

    pub fn cumulative_fees(&self) -> f64 {
        self.cumulative_fees
    }

    pub fn cumulative_taxes(&self) -> f64 {
        self.cumulative_taxes
    }

    pub fn position(&self, symbol: &str) -> Option<&Position> {
        self.positions.get(symbol)
    }

    pub fn positions(&self) -> impl Iterator<Item = (&str, &Position)> {
        self.positions.iter().map(|(s, p)| (s.as_str(), p))
    }

    pub fn state(&self, symbol: &str) -> PositionState {
        self.position(symbol)
            .map(PositionState::from)
            .unwrap_or(PositionState::Flat)
    }

    /// Buys as many whole shares as `min(max_buy, cash - fee)` affords.
    pub fn buy(&mut self, symbol: &str, date: NaiveDate, price: f64) -> BuyOutcome {
        if !valid_price(price) {
            return BuyOutcome::Refused(BuyRefusal::InvalidPrice);
        }

        let fee = self.config.transaction_fee;
        if self.cash < self.config.min_buy {
            info!(%symbol, %date, price, cash = self.cash, "can't buy, not enough cash");
            return BuyOutcome::Refused(BuyRefusal::BelowMinimum {
                cash: self.cash,
                min_buy: self.config.min_buy,
            });
        }
        if self.cash < price + fee {
            info!(%symbol, %date, price, cash = self.cash, "can't buy, not enough cash");
            return BuyOutcome::Refused(BuyRefusal::InsufficientFunds {
                cash: self.cash,
                needed: price + fee,
            });
        }

        let budget = self.config.max_buy.min(self.cash - fee);
        let mut shares = (budget / price).floor() as u64;
        // float division can round up to the next whole share
        if shares > 0 && shares as f64 * price + fee > self.cash {
            shares -= 1;
        }
        if shares == 0 {
            info!(%symbol, %date, price, max_buy = self.config.max_buy, "can't buy, price above max buy");
            return BuyOutcome::Refused(BuyRefusal::ZeroShares);
        }

        let cost = shares as f64 * price;
        self.cash -= cost + fee;
        self.cumulative_fees += fee;

        let position = self.positions.entry(symbol.to_string()).or_default();
        position.add_lot(shares, price);

        info!(
            %symbol,
            %date,
            shares,
            price,
            amount_held = position.amount_held,
            average_cost = position.average_cost,
            cash = self.cash,
            "bought"
        );

        BuyOutcome::Bought {
            shares,
            price,
            cost,
            fee,
            amount_held: position.amount_held,
            average_cost: position.average_cost,
            cash_after: self.cash,
        }
    }

    /// Liquidates the whole position, but only above its average cost.
    pub fn sell(&mut self, symbol: &str, date: NaiveDate, price: f64) -> SellOutcome {
        if !valid_price(price) {
            return SellOutcome::Refused(SellRefusal::InvalidPrice);
        }

        let Some(position) = self.positions.get_mut(symbol).filter(|p| p.is_holding()) else {
            return SellOutcome::Refused(SellRefusal::NotHolding);
        };

        if price <= position.average_cost {
            info!(%symbol, %date, price, average_cost = position.average_cost, "not selling at lower price");
            return SellOutcome::Refused(SellRefusal::BelowAverageCost {
                price,
                average_cost: position.average_cost,
            });
        }

        let shares = position.amount_held;
        let fee = self.config.transaction_fee;
        let profit = shares as f64 * (price - position.average_cost);
        let tax = profit * self.config.tax_rate;
        let proceeds = shares as f64 * price - fee - tax;

        if self.cash + proceeds < 0.0 {
            info!(%symbol, %date, price, proceeds, cash = self.cash, "not selling, fee and tax exceed proceeds");
            return SellOutcome::Refused(SellRefusal::ProceedsBelowCosts {
                proceeds,
                cash: self.cash,
            });
        }

        position.liquidate(profit);
        self.cash += proceeds;
        self.cumulative_fees += fee;
        self.cumulative_taxes += tax;

        info!(%symbol, %date, shares, price, profit, tax, cash = self.cash, "sold");

        SellOutcome::Sold {
            shares,
            price,
            profit,
            tax,
            fee,
            cash_after: self.cash,
        }
    }

    /// Unrealized profit of the open position at `price`. Reads only.
    pub fn mark_to_market(&self, symbol: &str, price: f64) -> f64 {
        self.position(symbol)
            .map(|p| p.unrealized_profit(price))
            .unwrap_or(0.0)
    }

    /// Cash plus every open position valued by `price_of`.
    ///
    /// Positions without a price contribute nothing.
    pub fn total_value<F>(&self, price_of: F) -> f64
    where
        F: Fn(&str) -> Option<f64>,
    {
        let depot: f64 = self
            .positions
            .iter()
            .filter(|(_, p)| p.is_holding())
            .filter_map(|(symbol, p)| price_of(symbol).map(|price| p.market_value(price)))
            .sum();
        self.cash + depot
    }
}
