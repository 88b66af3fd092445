//! Universe scanner.
//!
//! Fetches each ticker's bars, computes the indicators the active screens
//! need, evaluates every screen on the last bar and collects matches. A
//! failure for one ticker becomes a `SkippedTicker`; it never ends the scan.

use crate::domain::error::ScannerError;
use crate::domain::indicator::IndicatorType;
use crate::domain::indicator_helpers::compute_indicators;
use crate::domain::matches::{Match, sort_matches};
use crate::domain::ohlcv::validate_series;
use crate::domain::rule::extract_indicators;
use crate::domain::rule_eval::evaluate;
use crate::domain::screen::Screen;
use crate::domain::universe::{Ticker, Universe};
use crate::ports::data_port::MarketDataPort;
use chrono::NaiveDate;
use rayon::prelude::*;
use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;

pub const DEFAULT_LOOKBACK_DAYS: u32 = 200;
pub const DEFAULT_PACE: Duration = Duration::from_millis(500);

#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Bars are fetched for `[as_of - lookback_days, as_of]`.
    pub as_of: NaiveDate,
    pub lookback_days: u32,
    /// Delay before each provider call, per worker.
    pub pace: Duration,
    pub workers: usize,
}

impl ScanOptions {
    pub fn new(as_of: NaiveDate) -> Self {
        Self {
            as_of,
            lookback_days: DEFAULT_LOOKBACK_DAYS,
            pace: DEFAULT_PACE,
            workers: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    NoData,
    InsufficientBars { bars: usize, minimum: usize },
    InvalidSeries(String),
    Provider(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NoData => write!(f, "no data"),
            SkipReason::InsufficientBars { bars, minimum } => {
                write!(f, "only {} bars, minimum {} required", bars, minimum)
            }
            SkipReason::InvalidSeries(reason) => write!(f, "invalid series: {}", reason),
            SkipReason::Provider(reason) => write!(f, "provider error: {}", reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedTicker {
    pub code: String,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, Default)]
pub struct ScanOutcome {
    /// Sorted by code, then screen name.
    pub matches: Vec<Match>,
    pub skipped: Vec<SkippedTicker>,
    pub scanned: usize,
}

/// Everything a worker needs that is the same for every ticker.
struct ScanPlan<'a> {
    market: &'a str,
    screens: &'a [Screen],
    indicators: Vec<IndicatorType>,
    min_bars: usize,
    options: &'a ScanOptions,
}

pub fn scan(
    port: &dyn MarketDataPort,
    universe: &Universe,
    screens: &[Screen],
    options: &ScanOptions,
) -> ScanOutcome {
    let span = tracing::info_span!("scan", market = %universe.market);
    let _enter = span.enter();

    if screens.is_empty() || universe.is_empty() {
        tracing::info!(
            tickers = universe.count(),
            screens = screens.len(),
            "nothing to scan"
        );
        return ScanOutcome::default();
    }

    let plan = ScanPlan {
        market: &universe.market,
        screens,
        indicators: screens
            .iter()
            .flat_map(|s| extract_indicators(&s.rule))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect(),
        min_bars: screens
            .iter()
            .map(Screen::min_history)
            .min()
            .unwrap_or(1)
            .max(2),
        options,
    };

    let results = if options.workers > 1 {
        match rayon::ThreadPoolBuilder::new()
            .num_threads(options.workers)
            .build()
        {
            Ok(pool) => pool.install(|| {
                universe
                    .tickers
                    .par_iter()
                    .map(|ticker| (ticker.code.clone(), scan_ticker(port, ticker, &plan)))
                    .collect::<Vec<_>>()
            }),
            Err(e) => {
                tracing::warn!(error = %e, "worker pool unavailable, scanning sequentially");
                scan_sequential(port, universe, &plan)
            }
        }
    } else {
        scan_sequential(port, universe, &plan)
    };

    let mut outcome = ScanOutcome {
        scanned: results.len(),
        ..ScanOutcome::default()
    };
    for (code, result) in results {
        match result {
            Ok(mut matches) => outcome.matches.append(&mut matches),
            Err(reason) => outcome.skipped.push(SkippedTicker { code, reason }),
        }
    }
    sort_matches(&mut outcome.matches);

    tracing::info!(
        scanned = outcome.scanned,
        matches = outcome.matches.len(),
        skipped = outcome.skipped.len(),
        "scan complete"
    );
    outcome
}

fn scan_sequential(
    port: &dyn MarketDataPort,
    universe: &Universe,
    plan: &ScanPlan<'_>,
) -> Vec<(String, Result<Vec<Match>, SkipReason>)> {
    universe
        .tickers
        .iter()
        .map(|ticker| (ticker.code.clone(), scan_ticker(port, ticker, plan)))
        .collect()
}

fn scan_ticker(
    port: &dyn MarketDataPort,
    ticker: &Ticker,
    plan: &ScanPlan<'_>,
) -> Result<Vec<Match>, SkipReason> {
    let code = ticker.code.as_str();
    let options = plan.options;

    if !options.pace.is_zero() {
        std::thread::sleep(options.pace);
    }

    let start = options.as_of - chrono::Duration::days(i64::from(options.lookback_days));
    let bars = match port.fetch_ohlcv(code, start, options.as_of) {
        Ok(bars) => bars,
        Err(ScannerError::NoData { .. }) => {
            tracing::debug!(market = plan.market, code, "skipping: no data");
            return Err(SkipReason::NoData);
        }
        Err(ScannerError::InvalidSeries { reason, .. }) => {
            tracing::warn!(
                market = plan.market,
                code,
                reason = %reason,
                "skipping: unreadable bars"
            );
            return Err(SkipReason::InvalidSeries(reason));
        }
        Err(e) => {
            tracing::warn!(market = plan.market, code, error = %e, "skipping: provider failure");
            return Err(SkipReason::Provider(e.to_string()));
        }
    };

    if bars.is_empty() {
        tracing::debug!(market = plan.market, code, "skipping: no bars in range");
        return Err(SkipReason::NoData);
    }
    if let Err(e) = validate_series(&bars) {
        tracing::warn!(market = plan.market, code, error = %e, "skipping: invalid series");
        return Err(SkipReason::InvalidSeries(e.to_string()));
    }
    if bars.len() < plan.min_bars {
        tracing::debug!(
            market = plan.market,
            code,
            bars = bars.len(),
            minimum = plan.min_bars,
            "skipping: insufficient history"
        );
        return Err(SkipReason::InsufficientBars {
            bars: bars.len(),
            minimum: plan.min_bars,
        });
    }

    let indicators = compute_indicators(&bars, &plan.indicators);
    let last = bars.len() - 1;
    let fired: Vec<&Screen> = plan
        .screens
        .iter()
        .filter(|screen| evaluate(&screen.rule, &bars, &indicators, last))
        .collect();
    if fired.is_empty() {
        return Ok(Vec::new());
    }

    let name = display_name(port, ticker);
    let bar = &bars[last];
    let (change_pct, volume_ratio_pct) = Match::day_over_day(bar, &bars[last - 1]);
    Ok(fired
        .into_iter()
        .map(|screen| {
            tracing::info!(
                market = plan.market,
                code,
                name = %name,
                screen = %screen.name,
                close = bar.close,
                "signal"
            );
            Match {
                code: code.to_string(),
                name: name.clone(),
                date: bar.date,
                screen: screen.name.clone(),
                close: bar.close,
                change_pct,
                volume_ratio_pct,
            }
        })
        .collect())
}

/// The listing's name, else the provider's, else the code itself.
fn display_name(port: &dyn MarketDataPort, ticker: &Ticker) -> String {
    if let Some(name) = &ticker.name {
        return name.clone();
    }
    match port.ticker_name(&ticker.code) {
        Ok(Some(name)) if !name.trim().is_empty() => name.trim().to_string(),
        Ok(_) => ticker.code.clone(),
        Err(e) => {
            tracing::debug!(code = %ticker.code, error = %e, "name lookup failed");
            ticker.code.clone()
        }
    }
}
