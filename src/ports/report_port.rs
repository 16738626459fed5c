//! Report output port.

use crate::domain::error::StonksError;
use crate::domain::journal::Journal;
use crate::domain::valuation::Report;
use std::path::Path;

/// Port for persisting the outcome of a simulation.
pub trait ReportPort {
    fn write(&self, report: &Report, output_path: &Path) -> Result<(), StonksError>;

    /// Default implementation: the journal is dropped and only the report
    /// is written.
    fn write_with_journal(
        &self,
        report: &Report,
        _journal: &Journal,
        output_path: &Path,
    ) -> Result<(), StonksError> {
        self.write(report, output_path)
    }
}
