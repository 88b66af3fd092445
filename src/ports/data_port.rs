//! Market data access port trait.

use crate::domain::error::ScannerError;
use crate::domain::ohlcv::OhlcvBar;
use crate::domain::universe::Ticker;
use chrono::NaiveDate;

/// A market data provider. Implementations are shared across scan workers.
pub trait MarketDataPort: Send + Sync {
    /// Bars for `code` with `start <= date <= end`, sorted by date.
    ///
    /// An unknown ticker is `ScannerError::NoData`; an empty range is `Ok(vec![])`.
    fn fetch_ohlcv(
        &self,
        code: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<OhlcvBar>, ScannerError>;

    /// Display name for `code`, if the provider knows one.
    fn ticker_name(&self, code: &str) -> Result<Option<String>, ScannerError>;

    /// Tickers listed on `market` as of `as_of`.
    fn list_tickers(&self, market: &str, as_of: NaiveDate) -> Result<Vec<Ticker>, ScannerError>;
}
