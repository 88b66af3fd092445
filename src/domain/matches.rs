//! Scan results: one `Match` per (ticker, screen) pair that fired.

use crate::domain::ohlcv::OhlcvBar;
use chrono::NaiveDate;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Match {
    pub code: String,
    /// Display name, or the code when the provider has none.
    pub name: String,
    pub date: NaiveDate,
    pub screen: String,
    /// Close of the evaluated bar.
    pub close: f64,
    /// Close-to-close change from the prior bar, in percent.
    pub change_pct: Option<f64>,
    /// Volume as a percentage of the prior bar's volume.
    pub volume_ratio_pct: Option<f64>,
}

impl Match {
    /// Day-over-day figures for `bar` given the bar before it. Either is
    /// `None` when the prior value is zero.
    pub fn day_over_day(bar: &OhlcvBar, prior: &OhlcvBar) -> (Option<f64>, Option<f64>) {
        let change = (prior.close > 0.0).then(|| (bar.close - prior.close) / prior.close * 100.0);
        let ratio =
            (prior.volume > 0).then(|| bar.volume as f64 / prior.volume as f64 * 100.0);
        (change, ratio)
    }
}

/// A row in the append-only signal ledger.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LedgerRow {
    pub date: NaiveDate,
    pub code: String,
    pub screen: String,
    pub close: f64,
}

impl From<&Match> for LedgerRow {
    fn from(m: &Match) -> Self {
        Self {
            date: m.date,
            code: m.code.clone(),
            screen: m.screen.clone(),
            close: m.close,
        }
    }
}

/// Stable report order: by ticker code, then screen name.
pub fn sort_matches(matches: &mut [Match]) {
    matches.sort_by(|a, b| a.code.cmp(&b.code).then_with(|| a.screen.cmp(&b.screen)));
}
