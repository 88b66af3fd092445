//! Ticker universe for one market on one date.
//!
//! The provider supplies the listing; this module normalises it (trimmed
//! codes, duplicates dropped, sorted) so the scan order and report order are
//! deterministic regardless of the provider.

use crate::domain::error::ScannerError;
use crate::ports::data_port::MarketDataPort;
use chrono::NaiveDate;
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticker {
    pub code: String,
    /// Known display name, if the listing carried one.
    pub name: Option<String>,
}

impl Ticker {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: None,
        }
    }

    pub fn named(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: Some(name.into()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Universe {
    pub market: String,
    pub tickers: Vec<Ticker>,
}

impl Universe {
    pub fn new(market: impl Into<String>, tickers: Vec<Ticker>) -> Self {
        Self {
            market: market.into(),
            tickers: normalize(tickers),
        }
    }

    pub fn count(&self) -> usize {
        self.tickers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tickers.is_empty()
    }
}

fn normalize(tickers: Vec<Ticker>) -> Vec<Ticker> {
    let mut seen = HashSet::new();
    let mut out: Vec<Ticker> = tickers
        .into_iter()
        .filter_map(|t| {
            let code = t.code.trim().to_string();
            if code.is_empty() || !seen.insert(code.clone()) {
                return None;
            }
            let name = t
                .name
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty());
            Some(Ticker { code, name })
        })
        .collect();
    out.sort_by(|a, b| a.code.cmp(&b.code));
    out
}

/// Fetch the listing for `market` as of `as_of`. An empty listing is a valid
/// universe; only a provider failure is an error.
pub fn load_universe(
    port: &dyn MarketDataPort,
    market: &str,
    as_of: NaiveDate,
) -> Result<Universe, ScannerError> {
    let tickers = port.list_tickers(market, as_of)?;
    let universe = Universe::new(market, tickers);
    tracing::info!(market, as_of = %as_of, tickers = universe.count(), "universe loaded");
    Ok(universe)
}
