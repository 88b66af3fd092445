//! Named screens: a display name bound to a composite rule.
//!
//! Built-in presets are parameterised by the market profile (volume
//! multiplier, price floor). Custom screens come from the `[rules]` config
//! section as DSL text and shadow a preset of the same name.

use crate::domain::error::ScannerError;
use crate::domain::market::MarketProfile;
use crate::domain::rule::{Rule, validate_rule};
use crate::domain::rule_parser;
use crate::ports::config_port::ConfigPort;

pub const RULES_SECTION: &str = "rules";

#[derive(Debug, Clone, PartialEq)]
pub struct Screen {
    pub name: String,
    pub rule: Rule,
}

impl Screen {
    /// Parse and validate `dsl` as a screen called `name`.
    pub fn parse(name: &str, dsl: &str) -> Result<Self, ScannerError> {
        let rule = rule_parser::parse(dsl).map_err(|e| {
            tracing::error!(screen = name, "{}", e.display_with_context(dsl));
            e
        })?;
        validate_rule(&rule).map_err(|e| match e {
            ScannerError::RuleInvalid { reason } => ScannerError::RuleInvalid {
                reason: format!("screen '{}': {}", name, reason),
            },
            other => other,
        })?;
        Ok(Self {
            name: name.to_string(),
            rule,
        })
    }

    pub fn min_history(&self) -> usize {
        self.rule.min_history()
    }
}

pub const PRESET_NAMES: [&str; 7] = [
    "Breakout+MACD",
    "MACD-GC",
    "GoldenCross+Volume",
    "MACD+MA+Volume",
    "Breakout40+Volume",
    "Trend+Volume",
    "Flag pattern",
];

/// DSL text of a built-in screen for `profile`, or `None` for an unknown name.
pub fn preset_dsl(name: &str, profile: &MarketProfile) -> Option<String> {
    let m = profile.volume_multiplier;
    let dsl = match name {
        "Breakout+MACD" => "AND(BREAKOUT(20, CURRENT), MACD_CROSS(12, 26, 9))".to_string(),
        "MACD-GC" => "MACD_CROSS(12, 26, 9)".to_string(),
        "GoldenCross+Volume" => format!(
            "AND(MIN_CLOSE({}), MIN_VOLUME(50000), VOLUME_RISE(2), SMA_CROSS(5, 20))",
            profile.min_close
        ),
        "MACD+MA+Volume" => format!(
            "AND(ANY_OF(MACD_CROSS(12, 26, 9, ABOVE_ZERO), 5), \
             OR(ANY_OF(SMA_CROSS(5, 20), 5), ANY_OF(SMA_CROSS(20, 60), 5)), \
             VOLUME_SPIKE(20, {}))",
            m
        ),
        "Breakout40+Volume" => format!("AND(BREAKOUT(40), VOLUME_SPIKE(20, {}))", m),
        "Trend+Volume" => format!(
            "AND(SMA_STACK(10, 20, 60), TREND_COUNT(40, 20), VOLUME_SPIKE(20, {}))",
            m
        ),
        "Flag pattern" => {
            "AND(BOX_BREAKOUT(12, 1.15, VOLUME_RISE), ATR_BAND(14, 0.015, 0.06))".to_string()
        }
        _ => return None,
    };
    Some(dsl)
}

pub fn preset(name: &str, profile: &MarketProfile) -> Result<Option<Screen>, ScannerError> {
    preset_dsl(name, profile)
        .map(|dsl| Screen::parse(name, &dsl))
        .transpose()
}

/// Resolve the configured screen names for one market. Custom `[rules]`
/// entries win over presets; an unknown name is a configuration error.
pub fn resolve_screens(
    config: &dyn ConfigPort,
    names: &[String],
    profile: &MarketProfile,
) -> Result<Vec<Screen>, ScannerError> {
    let mut screens: Vec<Screen> = Vec::with_capacity(names.len());
    for name in names {
        if screens.iter().any(|s| &s.name == name) {
            continue;
        }
        let screen = match config.get_string(RULES_SECTION, name) {
            Some(dsl) => Screen::parse(name, &dsl)?,
            None => preset(name, profile)?.ok_or_else(|| ScannerError::ConfigInvalid {
                section: "scan".to_string(),
                key: "screens".to_string(),
                reason: format!("unknown screen '{}'", name),
            })?,
        };
        screens.push(screen);
    }
    Ok(screens)
}

/// Every screen known for `profile`: presets first, then custom rules, each
/// paired with its DSL text. Custom entries that fail to parse are reported
/// with their error text instead of DSL.
pub fn catalog(
    config: Option<&dyn ConfigPort>,
    profile: &MarketProfile,
) -> Vec<(String, Result<String, String>)> {
    let mut out: Vec<(String, Result<String, String>)> = PRESET_NAMES
        .iter()
        .filter_map(|name| preset_dsl(name, profile).map(|dsl| (name.to_string(), Ok(dsl))))
        .collect();
    if let Some(config) = config {
        for key in config.keys(RULES_SECTION) {
            let dsl = config.get_string(RULES_SECTION, &key).unwrap_or_default();
            let entry = Screen::parse(&key, &dsl)
                .map(|screen| screen.rule.to_string())
                .map_err(|e| e.to_string());
            out.retain(|(name, _)| name != &key);
            out.push((key, entry));
        }
    }
    out
}
