//! Record of everything the simulation decided, day by day.

use chrono::NaiveDate;
use std::fmt;

use crate::domain::ledger::{BuyRefusal, SellRefusal};
use crate::domain::signal::Crossing;

/// Why a symbol was not evaluated on a trading day.
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    NoBar,
    /// The store returned an earlier bar; the symbol did not trade that day.
    NotTraded { bar_date: NaiveDate },
    NoIndicators,
    /// The indicator pair does not describe `(before date, date)`.
    Misaligned {
        previous: NaiveDate,
        current: NaiveDate,
    },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NoBar => write!(f, "no bar"),
            SkipReason::NotTraded { bar_date } => {
                write!(f, "not traded, last bar {}", bar_date)
            }
            SkipReason::NoIndicators => write!(f, "no indicator pair"),
            SkipReason::Misaligned { previous, current } => {
                write!(f, "misaligned indicators {} / {}", previous, current)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EntryKind {
    Bought {
        shares: u64,
        price: f64,
        cash_after: f64,
    },
    Sold {
        shares: u64,
        price: f64,
        profit: f64,
        tax: f64,
        cash_after: f64,
    },
    BuyRefused {
        price: f64,
        reason: BuyRefusal,
        cash: f64,
    },
    SellRefused {
        price: f64,
        reason: SellRefusal,
        cash: f64,
    },
    /// Buy and sell fired together; nothing was traded.
    Ambiguous,
    Skipped(SkipReason),
    /// A data lookup failed for this symbol and day.
    Failed { reason: String },
    Crossing(Crossing),
}

#[derive(Debug, Clone, PartialEq)]
pub struct JournalEntry {
    pub date: NaiveDate,
    pub symbol: String,
    pub kind: EntryKind,
}

#[derive(Debug, Clone, Default)]
pub struct Journal {
    entries: Vec<JournalEntry>,
}

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, date: NaiveDate, symbol: &str, kind: EntryKind) {
        self.entries.push(JournalEntry {
            date,
            symbol: symbol.to_string(),
            kind,
        });
    }

    pub fn entries(&self) -> &[JournalEntry] {
        &self.entries
    }

    pub fn for_symbol<'a>(&'a self, symbol: &'a str) -> impl Iterator<Item = &'a JournalEntry> {
        self.entries.iter().filter(move |e| e.symbol == symbol)
    }

    pub fn trades(&self) -> impl Iterator<Item = &JournalEntry> {
        self.entries
            .iter()
            .filter(|e| matches!(e.kind, EntryKind::Bought { .. } | EntryKind::Sold { .. }))
    }

    pub fn count_where(&self, predicate: impl Fn(&EntryKind) -> bool) -> usize {
        self.entries.iter().filter(|e| predicate(&e.kind)).count()
    }
}
