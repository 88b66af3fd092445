//! OHLCV bar representation and per-ticker series checks.

use chrono::NaiveDate;

#[derive(Debug, Clone, PartialEq)]
pub struct OhlcvBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

impl OhlcvBar {
    /// max(high - low, |high - prev_close|, |low - prev_close|)
    pub fn true_range(&self, prev_close: f64) -> f64 {
        let hl = self.high - self.low;
        let hc = (self.high - prev_close).abs();
        let lc = (self.low - prev_close).abs();
        hl.max(hc).max(lc)
    }

    /// Bullish candle: close above open.
    pub fn is_up(&self) -> bool {
        self.close > self.open
    }
}

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y%m%d", "%Y.%m.%d"];

/// Parse a bar date written as `2024-06-03`, `20240603` or `2024.06.03`.
pub fn parse_bar_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SeriesError {
    #[error("bar {index} ({date}) is not after the previous bar ({previous})")]
    OutOfOrder {
        index: usize,
        date: NaiveDate,
        previous: NaiveDate,
    },

    #[error("bar {index} ({date}) has a non-positive or non-finite price")]
    BadPrice { index: usize, date: NaiveDate },
}

/// Checks that dates strictly increase and every price is a positive finite number.
/// Gaps between dates are fine.
pub fn validate_series(bars: &[OhlcvBar]) -> Result<(), SeriesError> {
    for (index, bar) in bars.iter().enumerate() {
        let prices = [bar.open, bar.high, bar.low, bar.close];
        if prices.iter().any(|p| !p.is_finite() || *p <= 0.0) {
            return Err(SeriesError::BadPrice {
                index,
                date: bar.date,
            });
        }
        if index > 0 && bar.date <= bars[index - 1].date {
            return Err(SeriesError::OutOfOrder {
                index,
                date: bar.date,
                previous: bars[index - 1].date,
            });
        }
    }
    Ok(())
}
