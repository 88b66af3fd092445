//! Append-only match ledger port trait.

use crate::domain::error::ScannerError;
use crate::domain::matches::LedgerRow;

pub trait LedgerPort {
    fn name(&self) -> &str;

    fn append(&self, row: &LedgerRow) -> Result<(), ScannerError>;
}
