//! Configuration validation.
//!
//! Reads and checks every setting a scan needs before any ticker is fetched,
//! including parsing every active screen for every market. A run that gets
//! past `validate_scan_config` cannot fail on configuration mid-scan.

use crate::domain::error::ScannerError;
use crate::domain::market::MarketProfile;
use crate::domain::scanner::{DEFAULT_LOOKBACK_DAYS, DEFAULT_PACE};
use crate::domain::screen::{Screen, resolve_screens};
use crate::ports::config_port::ConfigPort;
use std::time::Duration;

pub const DEFAULT_MAX_CHARS: usize = 3500;
pub const TELEGRAM_HARD_LIMIT: usize = 4096;
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
const MAX_WORKERS: i64 = 32;
const MAX_LOOKBACK_DAYS: i64 = 3650;
const HOLIDAY_MARGIN_DAYS: i64 = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderKind {
    Csv,
    Sqlite,
    Http,
}

#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    pub path: Option<String>,
    pub base_url: Option<String>,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub enabled: bool,
    pub max_chars: usize,
    pub retries: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerKind {
    None,
    Csv,
    Sqlite,
}

#[derive(Debug, Clone)]
pub struct LedgerConfig {
    pub kind: LedgerKind,
    pub path: Option<String>,
}

/// One market with the screens resolved for its profile.
#[derive(Debug, Clone)]
pub struct MarketPlan {
    pub profile: MarketProfile,
    pub screens: Vec<Screen>,
}

#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub markets: Vec<MarketPlan>,
    pub screen_names: Vec<String>,
    pub lookback_days: u32,
    pub pace: Duration,
    pub workers: usize,
    pub provider: ProviderConfig,
    pub telegram: TelegramConfig,
    pub ledger: LedgerConfig,
}

pub fn validate_scan_config(config: &dyn ConfigPort) -> Result<ScanConfig, ScannerError> {
    let market_ids = required_list(config, "scan", "markets")?;
    let screen_names = required_list(config, "scan", "screens")?;

    let mut markets = Vec::with_capacity(market_ids.len());
    for id in &market_ids {
        let profile = MarketProfile::from_config(config, id)?;
        if markets
            .iter()
            .any(|m: &MarketPlan| m.profile.id == profile.id)
        {
            continue;
        }
        let screens = resolve_screens(config, &screen_names, &profile)?;
        markets.push(MarketPlan { profile, screens });
    }

    let lookback_days = validate_lookback(config, &markets)?;
    let pace = validate_pace(config)?;
    let workers = validate_workers(config)?;

    Ok(ScanConfig {
        markets,
        screen_names,
        lookback_days,
        pace,
        workers,
        provider: validate_provider(config)?,
        telegram: validate_telegram(config)?,
        ledger: validate_ledger(config)?,
    })
}

fn invalid(section: &str, key: &str, reason: impl Into<String>) -> ScannerError {
    ScannerError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}

fn required_list(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Vec<String>, ScannerError> {
    let values = config.get_list(section, key);
    if values.is_empty() {
        return Err(ScannerError::ConfigMissing {
            section: section.to_string(),
            key: key.to_string(),
        });
    }
    Ok(values)
}

fn required_string(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<String, ScannerError> {
    match config.get_string(section, key) {
        Some(s) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        _ => Err(ScannerError::ConfigMissing {
            section: section.to_string(),
            key: key.to_string(),
        }),
    }
}

/// Calendar days that hold at least `bars` trading days: five sessions per
/// week plus a margin for market holidays.
pub fn calendar_days_for(bars: usize) -> i64 {
    let bars = bars as i64;
    (bars * 7 + 4) / 5 + HOLIDAY_MARGIN_DAYS
}

fn validate_lookback(config: &dyn ConfigPort, markets: &[MarketPlan]) -> Result<u32, ScannerError> {
    let value = config.get_int("scan", "lookback_days", i64::from(DEFAULT_LOOKBACK_DAYS));
    if !(1..=MAX_LOOKBACK_DAYS).contains(&value) {
        return Err(invalid(
            "scan",
            "lookback_days",
            format!("lookback_days must be between 1 and {}", MAX_LOOKBACK_DAYS),
        ));
    }
    let needed = markets
        .iter()
        .flat_map(|m| m.screens.iter().map(Screen::min_history))
        .max()
        .unwrap_or(0);
    let required = calendar_days_for(needed);
    if value < required {
        return Err(invalid(
            "scan",
            "lookback_days",
            format!(
                "lookback_days {} cannot hold the {} trading days a screen needs, use at least {}",
                value, needed, required
            ),
        ));
    }
    Ok(value as u32)
}

fn validate_pace(config: &dyn ConfigPort) -> Result<Duration, ScannerError> {
    let value = config.get_int("scan", "pace_ms", DEFAULT_PACE.as_millis() as i64);
    if value < 0 {
        return Err(invalid("scan", "pace_ms", "pace_ms must be non-negative"));
    }
    Ok(Duration::from_millis(value as u64))
}

fn validate_workers(config: &dyn ConfigPort) -> Result<usize, ScannerError> {
    let value = config.get_int("scan", "workers", 1);
    if !(1..=MAX_WORKERS).contains(&value) {
        return Err(invalid(
            "scan",
            "workers",
            format!("workers must be between 1 and {}", MAX_WORKERS),
        ));
    }
    Ok(value as usize)
}

fn validate_provider(config: &dyn ConfigPort) -> Result<ProviderConfig, ScannerError> {
    let kind = match required_string(config, "provider", "kind")?.to_lowercase().as_str() {
        "csv" => ProviderKind::Csv,
        "sqlite" => ProviderKind::Sqlite,
        "http" => ProviderKind::Http,
        other => {
            return Err(invalid(
                "provider",
                "kind",
                format!("unknown provider '{}', expected csv, sqlite or http", other),
            ));
        }
    };
    if kind == ProviderKind::Sqlite && !cfg!(feature = "sqlite") {
        return Err(invalid("provider", "kind", "built without sqlite support"));
    }

    let (path, base_url) = match kind {
        ProviderKind::Csv | ProviderKind::Sqlite => {
            (Some(required_string(config, "provider", "path")?), None)
        }
        ProviderKind::Http => {
            let url = required_string(config, "provider", "base_url")?;
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(invalid("provider", "base_url", "base_url must be an http(s) URL"));
            }
            (None, Some(url.trim_end_matches('/').to_string()))
        }
    };

    let timeout = config.get_int("provider", "timeout_secs", DEFAULT_TIMEOUT_SECS as i64);
    if timeout < 1 {
        return Err(invalid("provider", "timeout_secs", "timeout_secs must be at least 1"));
    }

    Ok(ProviderConfig {
        kind,
        path,
        base_url,
        timeout: Duration::from_secs(timeout as u64),
    })
}

fn validate_telegram(config: &dyn ConfigPort) -> Result<TelegramConfig, ScannerError> {
    let enabled = config.get_bool("telegram", "enabled", false);

    let max_chars = config.get_int("telegram", "max_chars", DEFAULT_MAX_CHARS as i64);
    if max_chars < 100 || max_chars > TELEGRAM_HARD_LIMIT as i64 {
        return Err(invalid(
            "telegram",
            "max_chars",
            format!("max_chars must be between 100 and {}", TELEGRAM_HARD_LIMIT),
        ));
    }

    let retries = config.get_int("telegram", "retries", 0);
    if !(0..=1).contains(&retries) {
        return Err(invalid("telegram", "retries", "retries must be 0 or 1"));
    }

    Ok(TelegramConfig {
        enabled,
        max_chars: max_chars as usize,
        retries: retries as u8,
    })
}

fn validate_ledger(config: &dyn ConfigPort) -> Result<LedgerConfig, ScannerError> {
    let kind = match config
        .get_string("ledger", "kind")
        .map(|k| k.trim().to_lowercase())
        .as_deref()
    {
        None | Some("") | Some("none") => LedgerKind::None,
        Some("csv") => LedgerKind::Csv,
        Some("sqlite") => LedgerKind::Sqlite,
        Some(other) => {
            return Err(invalid(
                "ledger",
                "kind",
                format!("unknown ledger '{}', expected none, csv or sqlite", other),
            ));
        }
    };
    if kind == LedgerKind::Sqlite && !cfg!(feature = "sqlite") {
        return Err(invalid("ledger", "kind", "built without sqlite support"));
    }

    let path = match kind {
        LedgerKind::None => None,
        LedgerKind::Csv | LedgerKind::Sqlite => Some(required_string(config, "ledger", "path")?),
    };
    Ok(LedgerConfig { kind, path })
}
