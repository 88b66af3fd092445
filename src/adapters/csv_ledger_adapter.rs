//! Append-only CSV signal ledger.

use crate::domain::error::ScannerError;
use crate::domain::matches::LedgerRow;
use crate::ports::ledger_port::LedgerPort;
use std::fs::OpenOptions;
use std::path::PathBuf;

pub struct CsvLedgerAdapter {
    path: PathBuf,
}

impl CsvLedgerAdapter {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn sink_error(&self, e: impl std::fmt::Display) -> ScannerError {
        ScannerError::Sink {
            sink: format!("csv ledger {}", self.path.display()),
            reason: e.to_string(),
        }
    }
}

impl LedgerPort for CsvLedgerAdapter {
    fn name(&self) -> &str {
        "csv"
    }

    fn append(&self, row: &LedgerRow) -> Result<(), ScannerError> {
        let is_new = std::fs::metadata(&self.path)
            .map(|m| m.len() == 0)
            .unwrap_or(true);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| self.sink_error(e))?;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(is_new)
            .from_writer(file);
        writer.serialize(row).map_err(|e| self.sink_error(e))?;
        writer.flush().map_err(|e| self.sink_error(e))?;
        Ok(())
    }
}
