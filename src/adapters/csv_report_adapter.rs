//! CSV report adapter implementing ReportPort.
//!
//! Writes the profit table to the output path and, when a journal is
//! given, the trade journal to a sibling `<stem>_journal.csv`.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::domain::error::StonksError;
use crate::domain::journal::{EntryKind, Journal, JournalEntry};
use crate::domain::valuation::{ProfitRow, Report};
use crate::ports::report_port::ReportPort;

#[derive(Debug, Serialize)]
struct ProfitRecord<'a> {
    symbol: &'a str,
    amount_held: u64,
    average_cost: f64,
    mark_price: Option<f64>,
    realized_profit: f64,
    unrealized_profit: f64,
    total_profit: f64,
}

impl<'a> From<&'a ProfitRow> for ProfitRecord<'a> {
    fn from(row: &'a ProfitRow) -> Self {
        ProfitRecord {
            symbol: &row.symbol,
            amount_held: row.amount_held,
            average_cost: row.average_cost,
            mark_price: row.mark_price,
            realized_profit: row.realized_profit,
            unrealized_profit: row.unrealized_profit,
            total_profit: row.total_profit(),
        }
    }
}

#[derive(Debug, Serialize)]
struct JournalRecord<'a> {
    date: String,
    symbol: &'a str,
    event: &'static str,
    shares: Option<u64>,
    price: Option<f64>,
    cash: Option<f64>,
    detail: String,
}

impl<'a> From<&'a JournalEntry> for JournalRecord<'a> {
    fn from(entry: &'a JournalEntry) -> Self {
        let (event, shares, price, cash, detail) = match &entry.kind {
            EntryKind::Bought {
                shares,
                price,
                cash_after,
            } => ("bought", Some(*shares), Some(*price), Some(*cash_after), String::new()),
            EntryKind::Sold {
                shares,
                price,
                profit,
                tax,
                cash_after,
            } => (
                "sold",
                Some(*shares),
                Some(*price),
                Some(*cash_after),
                format!("profit {:.2}, tax {:.2}", profit, tax),
            ),
            EntryKind::BuyRefused {
                price,
                reason,
                cash,
            } => ("buy refused", None, Some(*price), Some(*cash), format!("{:?}", reason)),
            EntryKind::SellRefused {
                price,
                reason,
                cash,
            } => ("sell refused", None, Some(*price), Some(*cash), format!("{:?}", reason)),
            EntryKind::Ambiguous => ("ambiguous", None, None, None, String::new()),
            EntryKind::Skipped(reason) => ("skipped", None, None, None, reason.to_string()),
            EntryKind::Failed { reason } => ("failed", None, None, None, reason.clone()),
            EntryKind::Crossing(c) => ("crossing", None, None, None, c.to_string()),
        };
        JournalRecord {
            date: entry.date.to_string(),
            symbol: &entry.symbol,
            event,
            shares,
            price,
            cash,
            detail,
        }
    }
}

pub struct CsvReportAdapter;

impl CsvReportAdapter {
    pub fn new() -> Self {
        Self
    }

    /// `<dir>/<stem>_journal.csv` next to the profit table.
    pub fn journal_path(output_path: &Path) -> PathBuf {
        let stem = output_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "report".to_string());
        output_path.with_file_name(format!("{}_journal.csv", stem))
    }

    fn write_journal(journal: &Journal, path: &Path) -> Result<(), StonksError> {
        let mut wtr = csv::Writer::from_path(path)?;
        for entry in journal.entries() {
            wtr.serialize(JournalRecord::from(entry))?;
        }
        wtr.flush()?;
        Ok(())
    }
}

impl Default for CsvReportAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportPort for CsvReportAdapter {
    fn write(&self, report: &Report, output_path: &Path) -> Result<(), StonksError> {
        let mut wtr = csv::Writer::from_path(output_path)?;
        for row in &report.rows {
            wtr.serialize(ProfitRecord::from(row))?;
        }
        wtr.flush()?;
        Ok(())
    }

    fn write_with_journal(
        &self,
        report: &Report,
        journal: &Journal,
        output_path: &Path,
    ) -> Result<(), StonksError> {
        self.write(report, output_path)?;
        Self::write_journal(journal, &Self::journal_path(output_path))
    }
}
