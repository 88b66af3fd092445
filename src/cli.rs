//! CLI definition and dispatch.

use chrono::NaiveDate;
use clap::{ArgAction, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::console_notifier::ConsoleNotifier;
use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::csv_ledger_adapter::CsvLedgerAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::http_data_adapter::HttpDataAdapter;
use crate::adapters::telegram_adapter::TelegramAdapter;
use crate::domain::config_validation::{
    DEFAULT_MAX_CHARS, LedgerConfig, LedgerKind, MarketPlan, ProviderConfig, ProviderKind,
    ScanConfig, validate_scan_config,
};
use crate::domain::error::ScannerError;
use crate::domain::market::MarketProfile;
use crate::domain::matches::Match;
use crate::domain::report::{self, RenderOptions, ReportSection};
use crate::domain::rule::extract_indicators;
use crate::domain::scanner::{ScanOptions, scan};
use crate::domain::screen::{catalog, resolve_screens};
use crate::domain::universe::load_universe;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::MarketDataPort;
use crate::ports::ledger_port::LedgerPort;
use crate::ports::notification_port::NotificationPort;

#[derive(Parser, Debug)]
#[command(name = "sigscan", version, about = "Daily stock-signal scanner")]
pub struct Cli {
    /// Raise log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Scan the configured markets and deliver the report
    Scan {
        #[arg(short, long)]
        config: PathBuf,
        /// Evaluation date (defaults to today)
        #[arg(long)]
        as_of: Option<NaiveDate>,
        /// Scan only this market
        #[arg(long)]
        market: Option<String>,
        /// Print the report instead of sending it; skip the ledger
        #[arg(long)]
        dry_run: bool,
        /// Print matches as JSON on stdout
        #[arg(long)]
        json: bool,
        /// Leave quote links out of the report
        #[arg(long)]
        no_links: bool,
    },
    /// Check a configuration file and every screen it uses
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// List built-in and configured screens with their rules
    Screens {
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(long, default_value = "KOSPI")]
        market: String,
    },
    /// List the tickers the provider returns for a market
    Tickers {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        market: String,
        #[arg(long)]
        as_of: Option<NaiveDate>,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Scan {
            config,
            as_of,
            market,
            dry_run,
            json,
            no_links,
        } => run_scan(
            &config,
            ScanRequest {
                as_of: as_of.unwrap_or_else(today),
                market,
                dry_run,
                json,
                include_links: !no_links,
            },
        ),
        Command::Validate { config } => run_validate(&config),
        Command::Screens { config, market } => run_screens(config.as_deref(), &market),
        Command::Tickers {
            config,
            market,
            as_of,
        } => run_tickers(&config, &market, as_of.unwrap_or_else(today)),
    }
}

fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

fn fail(e: &ScannerError) -> ExitCode {
    eprintln!("error: {e}");
    e.into()
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| fail(&e))
}

/// Options for one `scan` invocation.
#[derive(Debug, Clone)]
pub struct ScanRequest {
    pub as_of: NaiveDate,
    pub market: Option<String>,
    pub dry_run: bool,
    pub json: bool,
    pub include_links: bool,
}

/// Where the report and ledger rows go. Either may be absent.
#[derive(Default)]
pub struct Sinks<'a> {
    pub notifier: Option<&'a dyn NotificationPort>,
    pub ledger: Option<&'a dyn LedgerPort>,
}

#[derive(Debug, Default)]
pub struct PipelineSummary {
    pub sections: Vec<ReportSection>,
    pub skipped: usize,
    /// Markets whose listing could not be loaded.
    pub failed_markets: Vec<String>,
    pub messages: Vec<String>,
    pub delivered: usize,
    pub recorded: usize,
}

impl PipelineSummary {
    pub fn matches(&self) -> impl Iterator<Item = &Match> {
        self.sections.iter().flat_map(|s| s.matches.iter())
    }
}

pub fn scan_options(scan_config: &ScanConfig, as_of: NaiveDate) -> ScanOptions {
    ScanOptions {
        as_of,
        lookback_days: scan_config.lookback_days,
        pace: scan_config.pace,
        workers: scan_config.workers,
    }
}

/// Plans for the requested market, or every configured market.
pub fn select_markets(
    config: &dyn ConfigPort,
    scan_config: &ScanConfig,
    market: Option<&str>,
) -> Result<Vec<MarketPlan>, ScannerError> {
    let Some(id) = market else {
        return Ok(scan_config.markets.clone());
    };
    let profile = MarketProfile::from_config(config, id)?;
    if let Some(plan) = scan_config
        .markets
        .iter()
        .find(|m| m.profile.id == profile.id)
    {
        return Ok(vec![plan.clone()]);
    }
    let screens = resolve_screens(config, &scan_config.screen_names, &profile)?;
    Ok(vec![MarketPlan { profile, screens }])
}

pub fn open_provider(provider: &ProviderConfig) -> Result<Box<dyn MarketDataPort>, ScannerError> {
    let path = || {
        provider
            .path
            .clone()
            .ok_or_else(|| ScannerError::ConfigMissing {
                section: "provider".into(),
                key: "path".into(),
            })
    };
    match provider.kind {
        ProviderKind::Csv => Ok(Box::new(CsvAdapter::new(PathBuf::from(path()?)))),
        ProviderKind::Sqlite => {
            open_sqlite(&path()?, "provider").map(|a| a as Box<dyn MarketDataPort>)
        }
        ProviderKind::Http => {
            let base_url = provider
                .base_url
                .as_deref()
                .ok_or_else(|| ScannerError::ConfigMissing {
                    section: "provider".into(),
                    key: "base_url".into(),
                })?;
            Ok(Box::new(HttpDataAdapter::new(base_url, provider.timeout)?))
        }
    }
}

#[cfg(feature = "sqlite")]
fn open_sqlite(
    path: &str,
    _section: &str,
) -> Result<Box<crate::adapters::sqlite_adapter::SqliteAdapter>, ScannerError> {
    crate::adapters::sqlite_adapter::SqliteAdapter::open(path).map(Box::new)
}

#[cfg(not(feature = "sqlite"))]
fn open_sqlite(_path: &str, section: &str) -> Result<Box<NoSqlite>, ScannerError> {
    Err(ScannerError::ConfigInvalid {
        section: section.into(),
        key: "kind".into(),
        reason: "built without sqlite support".into(),
    })
}

#[cfg(not(feature = "sqlite"))]
enum NoSqlite {}

#[cfg(not(feature = "sqlite"))]
impl MarketDataPort for NoSqlite {
    fn fetch_ohlcv(
        &self,
        _code: &str,
        _start: NaiveDate,
        _end: NaiveDate,
    ) -> Result<Vec<crate::domain::ohlcv::OhlcvBar>, ScannerError> {
        match *self {}
    }

    fn ticker_name(&self, _code: &str) -> Result<Option<String>, ScannerError> {
        match *self {}
    }

    fn list_tickers(
        &self,
        _market: &str,
        _as_of: NaiveDate,
    ) -> Result<Vec<crate::domain::universe::Ticker>, ScannerError> {
        match *self {}
    }
}

#[cfg(not(feature = "sqlite"))]
impl LedgerPort for NoSqlite {
    fn name(&self) -> &str {
        match *self {}
    }

    fn append(&self, _row: &crate::domain::matches::LedgerRow) -> Result<(), ScannerError> {
        match *self {}
    }
}

pub fn open_ledger(ledger: &LedgerConfig) -> Result<Option<Box<dyn LedgerPort>>, ScannerError> {
    let Some(path) = ledger.path.clone() else {
        return Ok(None);
    };
    match ledger.kind {
        LedgerKind::None => Ok(None),
        LedgerKind::Csv => Ok(Some(Box::new(CsvLedgerAdapter::new(PathBuf::from(path))))),
        LedgerKind::Sqlite => {
            open_sqlite(&path, "ledger").map(|a| Some(a as Box<dyn LedgerPort>))
        }
    }
}

/// Scan every market, deliver the report and record the ledger rows.
///
/// A market whose listing fails is logged and left out; the other markets
/// are still scanned and reported. Nothing is delivered when no market could
/// be scanned at all.
pub fn run_pipeline(
    port: &dyn MarketDataPort,
    plans: &[MarketPlan],
    options: &ScanOptions,
    sinks: Sinks<'_>,
    render_options: &RenderOptions,
) -> PipelineSummary {
    let mut summary = PipelineSummary::default();

    for plan in plans {
        let universe = match load_universe(port, &plan.profile.id, options.as_of) {
            Ok(u) => u,
            Err(e) => {
                tracing::error!(market = %plan.profile.id, error = %e, "universe unavailable");
                summary.failed_markets.push(plan.profile.id.clone());
                continue;
            }
        };
        let outcome = scan(port, &universe, &plan.screens, options);
        for skipped in &outcome.skipped {
            tracing::debug!(
                market = %plan.profile.id,
                code = %skipped.code,
                reason = %skipped.reason,
                "skipped"
            );
        }
        summary.skipped += outcome.skipped.len();
        summary.sections.push(ReportSection {
            profile: plan.profile.clone(),
            screens: plan.screens.iter().map(|s| s.name.clone()).collect(),
            matches: outcome.matches,
        });
    }

    if summary.sections.is_empty() {
        tracing::warn!("no market was scanned, nothing to report");
        return summary;
    }

    if let Some(notifier) = sinks.notifier {
        let blocks = report::render(options.as_of, &summary.sections, render_options);
        summary.messages = report::chunk(&blocks, notifier.max_chars());
        summary.delivered = report::deliver(notifier, &summary.messages);
    }

    if let Some(ledger) = sinks.ledger {
        let matches: Vec<Match> = summary.matches().cloned().collect();
        summary.recorded = report::record(ledger, &matches);
    }

    summary
}

fn run_scan(config_path: &Path, request: ScanRequest) -> ExitCode {
    tracing::info!(config = %config_path.display(), as_of = %request.as_of, "starting scan");
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };
    let scan_config = match validate_scan_config(&config) {
        Ok(s) => s,
        Err(e) => return fail(&e),
    };
    let plans = match select_markets(&config, &scan_config, request.market.as_deref()) {
        Ok(p) => p,
        Err(e) => return fail(&e),
    };
    let port = match open_provider(&scan_config.provider) {
        Ok(p) => p,
        Err(e) => return fail(&e),
    };

    let telegram = if request.dry_run || !scan_config.telegram.enabled {
        None
    } else {
        match TelegramAdapter::from_env(
            scan_config.telegram.max_chars,
            scan_config.telegram.retries,
        ) {
            Ok(Some(t)) => Some(t),
            Ok(None) => {
                tracing::warn!(
                    "telegram enabled but TELEGRAM_TOKEN / TELEGRAM_CHAT_ID not set, printing instead"
                );
                None
            }
            Err(e) => {
                tracing::error!(error = %e, "telegram unavailable, printing instead");
                None
            }
        }
    };
    let console = ConsoleNotifier::stdout(DEFAULT_MAX_CHARS);
    let notifier: Option<&dyn NotificationPort> = match &telegram {
        Some(t) => Some(t as &dyn NotificationPort),
        None if request.json => None,
        None => Some(&console as &dyn NotificationPort),
    };

    let ledger = if request.dry_run {
        None
    } else {
        open_ledger(&scan_config.ledger).unwrap_or_else(|e| {
            tracing::error!(error = %e, "ledger unavailable, rows will not be recorded");
            None
        })
    };

    let options = scan_options(&scan_config, request.as_of);
    let summary = run_pipeline(
        port.as_ref(),
        &plans,
        &options,
        Sinks {
            notifier,
            ledger: ledger.as_deref(),
        },
        &RenderOptions {
            include_links: request.include_links,
        },
    );

    if request.json {
        let matches: Vec<&Match> = summary.matches().collect();
        match serde_json::to_string_pretty(&matches) {
            Ok(text) => println!("{text}"),
            Err(e) => {
                eprintln!("error: {e}");
                return ExitCode::from(1);
            }
        }
    }

    tracing::info!(
        matches = summary.matches().count(),
        skipped = summary.skipped,
        messages = summary.messages.len(),
        delivered = summary.delivered,
        recorded = summary.recorded,
        "scan finished"
    );

    if !summary.failed_markets.is_empty() {
        eprintln!(
            "error: could not list tickers for {}",
            summary.failed_markets.join(", ")
        );
        return ExitCode::from(3);
    }
    ExitCode::SUCCESS
}

fn run_validate(config_path: &Path) -> ExitCode {
    eprintln!("Validating config: {}", config_path.display());
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };
    let scan_config = match validate_scan_config(&config) {
        Ok(s) => s,
        Err(e) => return fail(&e),
    };

    for plan in &scan_config.markets {
        let profile = &plan.profile;
        eprintln!(
            "\n[{}] volume x{}, min close {}",
            profile.id,
            profile.volume_multiplier,
            profile.format_price(profile.min_close)
        );
        for screen in &plan.screens {
            eprintln!("  {}: {}", screen.name, screen.rule);
            eprintln!("    needs {} bars", screen.min_history());
        }

        let mut indicators: Vec<String> = plan
            .screens
            .iter()
            .flat_map(|s| extract_indicators(&s.rule))
            .map(|i| i.to_string())
            .collect();
        indicators.sort();
        indicators.dedup();
        eprintln!("  indicators: {}", indicators.join(", "));
    }

    eprintln!(
        "\nprovider: {:?}, lookback {} days, {} worker(s), pace {} ms",
        scan_config.provider.kind,
        scan_config.lookback_days,
        scan_config.workers,
        scan_config.pace.as_millis()
    );
    eprintln!("\nConfiguration is valid");
    ExitCode::SUCCESS
}

fn run_screens(config_path: Option<&Path>, market: &str) -> ExitCode {
    let config = match config_path.map(load_config).transpose() {
        Ok(c) => c,
        Err(code) => return code,
    };
    let profile = match &config {
        Some(c) => match MarketProfile::from_config(c, market) {
            Ok(p) => p,
            Err(e) => return fail(&e),
        },
        None => MarketProfile::builtin(market),
    };

    let mut failed = false;
    for (name, entry) in catalog(config.as_ref().map(|c| c as &dyn ConfigPort), &profile) {
        match entry {
            Ok(dsl) => println!("{name}: {dsl}"),
            Err(reason) => {
                failed = true;
                println!("{name}: error: {reason}");
            }
        }
    }
    if failed {
        ExitCode::from(4)
    } else {
        ExitCode::SUCCESS
    }
}

fn run_tickers(config_path: &Path, market: &str, as_of: NaiveDate) -> ExitCode {
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };
    let scan_config = match validate_scan_config(&config) {
        Ok(s) => s,
        Err(e) => return fail(&e),
    };
    let port = match open_provider(&scan_config.provider) {
        Ok(p) => p,
        Err(e) => return fail(&e),
    };
    let profile = MarketProfile::builtin(market);
    let universe = match load_universe(port.as_ref(), &profile.id, as_of) {
        Ok(u) => u,
        Err(e) => return fail(&e),
    };

    for ticker in &universe.tickers {
        match &ticker.name {
            Some(name) => println!("{}\t{}", ticker.code, name),
            None => println!("{}", ticker.code),
        }
    }
    eprintln!("{} tickers on {} as of {}", universe.count(), profile.id, as_of);
    ExitCode::SUCCESS
}
