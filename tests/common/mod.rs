#![allow(dead_code)]

use chrono::NaiveDate;
use sigscan::domain::error::ScannerError;
use sigscan::domain::matches::LedgerRow;
pub use sigscan::domain::ohlcv::OhlcvBar;
use sigscan::domain::universe::Ticker;
use sigscan::ports::data_port::MarketDataPort;
use sigscan::ports::ledger_port::LedgerPort;
use sigscan::ports::notification_port::NotificationPort;
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

pub const SPIKE_DSL: &str = "AND(BREAKOUT(20, CURRENT), VOLUME_SPIKE(20, 2.0))";

pub struct MockDataPort {
    pub data: HashMap<String, Vec<OhlcvBar>>,
    pub errors: HashMap<String, String>,
    pub names: HashMap<String, String>,
    pub listings: HashMap<String, Vec<Ticker>>,
    pub failing_markets: Vec<String>,
    pub name_lookups: AtomicUsize,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
            names: HashMap::new(),
            listings: HashMap::new(),
            failing_markets: Vec::new(),
            name_lookups: AtomicUsize::new(0),
        }
    }

    pub fn with_bars(mut self, code: &str, bars: Vec<OhlcvBar>) -> Self {
        self.data.insert(code.to_string(), bars);
        self
    }

    pub fn with_error(mut self, code: &str, reason: &str) -> Self {
        self.errors.insert(code.to_string(), reason.to_string());
        self
    }

    pub fn with_name(mut self, code: &str, name: &str) -> Self {
        self.names.insert(code.to_string(), name.to_string());
        self
    }

    pub fn with_listing(mut self, market: &str, codes: &[&str]) -> Self {
        self.listings.insert(
            market.to_string(),
            codes.iter().map(|c| Ticker::new(*c)).collect(),
        );
        self
    }

    pub fn with_failing_market(mut self, market: &str) -> Self {
        self.failing_markets.push(market.to_string());
        self
    }

    pub fn name_lookups(&self) -> usize {
        self.name_lookups.load(Ordering::SeqCst)
    }
}

impl MarketDataPort for MockDataPort {
    fn fetch_ohlcv(
        &self,
        code: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<OhlcvBar>, ScannerError> {
        if let Some(reason) = self.errors.get(code) {
            return Err(ScannerError::Provider {
                code: code.to_string(),
                reason: reason.clone(),
            });
        }
        match self.data.get(code) {
            Some(bars) => Ok(bars
                .iter()
                .filter(|b| b.date >= start && b.date <= end)
                .cloned()
                .collect()),
            None => Err(ScannerError::NoData {
                code: code.to_string(),
            }),
        }
    }

    fn ticker_name(&self, code: &str) -> Result<Option<String>, ScannerError> {
        self.name_lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self.names.get(code).cloned())
    }

    fn list_tickers(&self, market: &str, _as_of: NaiveDate) -> Result<Vec<Ticker>, ScannerError> {
        if self.failing_markets.iter().any(|m| m == market) {
            return Err(ScannerError::Provider {
                code: market.to_string(),
                reason: "listing service down".into(),
            });
        }
        Ok(self.listings.get(market).cloned().unwrap_or_default())
    }
}

pub struct RecordingNotifier {
    pub max_chars: usize,
    pub sent: RefCell<Vec<String>>,
}

impl RecordingNotifier {
    pub fn new(max_chars: usize) -> Self {
        Self {
            max_chars,
            sent: RefCell::new(Vec::new()),
        }
    }
}

impl NotificationPort for RecordingNotifier {
    fn name(&self) -> &str {
        "recording"
    }

    fn max_chars(&self) -> usize {
        self.max_chars
    }

    fn send(&self, text: &str) -> Result<(), ScannerError> {
        self.sent.borrow_mut().push(text.to_string());
        Ok(())
    }
}

pub struct RecordingLedger {
    pub rows: RefCell<Vec<LedgerRow>>,
    pub fail: bool,
}

impl RecordingLedger {
    pub fn new() -> Self {
        Self {
            rows: RefCell::new(Vec::new()),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            rows: RefCell::new(Vec::new()),
            fail: true,
        }
    }
}

impl LedgerPort for RecordingLedger {
    fn name(&self) -> &str {
        "recording"
    }

    fn append(&self, row: &LedgerRow) -> Result<(), ScannerError> {
        if self.fail {
            return Err(ScannerError::Sink {
                sink: "recording".into(),
                reason: "sheet locked".into(),
            });
        }
        self.rows.borrow_mut().push(row.clone());
        Ok(())
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Daily bars from `start` with the given closes and volumes; high equals close.
pub fn bars_from(start: NaiveDate, closes: &[f64], volumes: &[u64]) -> Vec<OhlcvBar> {
    closes
        .iter()
        .zip(volumes)
        .enumerate()
        .map(|(i, (&close, &volume))| OhlcvBar {
            date: start + chrono::Duration::days(i as i64),
            open: close,
            high: close,
            low: close - 1.0,
            close,
            volume,
        })
        .collect()
}

/// 90 bars from 2024-01-01: flat at 100 for 70 bars, then rising evenly from
/// 101 to 130 over the last 20, volume flat at 10,000 with 25,000 on the
/// final bar.
pub fn breakout_series() -> Vec<OhlcvBar> {
    let mut closes = vec![100.0; 70];
    closes.extend((0..20).map(|i| 101.0 + 29.0 * i as f64 / 19.0));
    let mut volumes = vec![10_000u64; 90];
    volumes[89] = 25_000;
    bars_from(date(2024, 1, 1), &closes, &volumes)
}

/// Same length as `breakout_series` but with nothing happening.
pub fn flat_series() -> Vec<OhlcvBar> {
    bars_from(date(2024, 1, 1), &[100.0; 90], &[10_000u64; 90])
}

pub fn last_date() -> NaiveDate {
    date(2024, 3, 30)
}
