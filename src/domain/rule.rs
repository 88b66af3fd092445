//! Rule AST data structures.
//!
//! A `Rule` is a data description of a screening predicate: leaf variants
//! name a pattern and carry its numeric parameters, composite variants combine
//! other rules. The evaluator in `rule_eval` gives them meaning; `Display`
//! renders the same DSL text that `rule_parser` accepts.

use crate::domain::error::ScannerError;
use crate::domain::indicator::IndicatorType;
use std::collections::BTreeSet;
use std::fmt;

/// Whether a condition must have just started on the evaluated bar, or merely hold there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Occurrence {
    /// True today and false on the previous bar.
    #[default]
    First,
    /// True today, regardless of the previous bar.
    Current,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Rule {
    /// Close above the highest high of the prior `window` bars.
    Breakout {
        window: usize,
        occurrence: Occurrence,
    },
    /// MACD line above its signal line, optionally also above zero.
    MacdCross {
        fast: usize,
        slow: usize,
        signal: usize,
        above_zero: bool,
        occurrence: Occurrence,
    },
    /// SMA(fast) above SMA(slow).
    SmaCross {
        fast: usize,
        slow: usize,
        occurrence: Occurrence,
    },
    /// SMAs strictly ordered, shortest window on top.
    SmaStack(Vec<usize>),
    /// Volume at least `multiplier` times the mean volume of the prior `window` bars.
    VolumeSpike { window: usize, multiplier: f64 },
    /// Volume at least `multiplier` times the previous bar's volume.
    VolumeRise { multiplier: f64 },
    MinVolume(u64),
    MinClose(f64),
    /// ATR(window) / close inside `[lower, upper]`.
    VolatilityBand {
        window: usize,
        lower: f64,
        upper: f64,
    },
    /// Close above the prior `lookback` bars' high but below that high times `cap`.
    BoxBreakout {
        lookback: usize,
        cap: f64,
        volume_rise: bool,
    },
    /// At least `threshold` up-bars (close > open) among the last `window` bars.
    TrendCount { window: usize, threshold: usize },
    And(Vec<Rule>),
    Or(Vec<Rule>),
    Not(Box<Rule>),
    Consecutive {
        rule: Box<Rule>,
        count: usize,
    },
    AnyOf {
        rule: Box<Rule>,
        count: usize,
    },
}

impl Rule {
    /// Bars of history needed before this rule can be true on the last of them.
    pub fn min_history(&self) -> usize {
        match self {
            Rule::Breakout { window, .. } => window + 3,
            Rule::MacdCross { slow, signal, .. } => slow + signal,
            Rule::SmaCross { slow, .. } => slow + 1,
            Rule::SmaStack(windows) => windows.iter().copied().max().unwrap_or(1),
            Rule::VolumeSpike { window, .. } => window + 1,
            Rule::VolumeRise { .. } => 2,
            Rule::MinVolume(_) | Rule::MinClose(_) => 1,
            Rule::VolatilityBand { window, .. } => window + 1,
            Rule::BoxBreakout { lookback, .. } => lookback + 1,
            Rule::TrendCount { window, .. } => *window,
            Rule::And(rules) | Rule::Or(rules) => {
                rules.iter().map(Rule::min_history).max().unwrap_or(1)
            }
            Rule::Not(rule) => rule.min_history(),
            Rule::Consecutive { rule, count } => rule.min_history() + count.saturating_sub(1),
            Rule::AnyOf { rule, .. } => rule.min_history(),
        }
    }
}

/// Collect every indicator a rule needs, without duplicates.
pub fn extract_indicators(rule: &Rule) -> Vec<IndicatorType> {
    let mut set = BTreeSet::new();
    collect_indicators(rule, &mut set);
    set.into_iter().collect()
}

fn collect_indicators(rule: &Rule, out: &mut BTreeSet<IndicatorType>) {
    match rule {
        Rule::Breakout { window, .. } => {
            out.insert(IndicatorType::PriorHigh(*window));
        }
        Rule::MacdCross {
            fast, slow, signal, ..
        } => {
            out.insert(IndicatorType::Macd {
                fast: *fast,
                slow: *slow,
                signal: *signal,
            });
        }
        Rule::SmaCross { fast, slow, .. } => {
            out.insert(IndicatorType::Sma(*fast));
            out.insert(IndicatorType::Sma(*slow));
        }
        Rule::SmaStack(windows) => {
            out.extend(windows.iter().map(|w| IndicatorType::Sma(*w)));
        }
        Rule::VolumeSpike { window, .. } => {
            out.insert(IndicatorType::PriorMeanVolume(*window));
        }
        Rule::VolatilityBand { window, .. } => {
            out.insert(IndicatorType::Atr(*window));
        }
        Rule::BoxBreakout { lookback, .. } => {
            out.insert(IndicatorType::PriorHigh(*lookback));
        }
        Rule::VolumeRise { .. }
        | Rule::MinVolume(_)
        | Rule::MinClose(_)
        | Rule::TrendCount { .. } => {}
        Rule::And(rules) | Rule::Or(rules) => {
            for r in rules {
                collect_indicators(r, out);
            }
        }
        Rule::Not(rule) | Rule::Consecutive { rule, .. } | Rule::AnyOf { rule, .. } => {
            collect_indicators(rule, out)
        }
    }
}

fn invalid(reason: String) -> Result<(), ScannerError> {
    Err(ScannerError::RuleInvalid { reason })
}

fn positive_window(name: &str, window: usize) -> Result<(), ScannerError> {
    if window == 0 {
        return invalid(format!("{}: window must be at least 1", name));
    }
    Ok(())
}

fn positive_multiplier(name: &str, value: f64) -> Result<(), ScannerError> {
    if !(value.is_finite() && value > 0.0) {
        return invalid(format!("{}: multiplier must be positive, got {}", name, value));
    }
    Ok(())
}

/// Rejects parameter combinations that can never be evaluated meaningfully.
pub fn validate_rule(rule: &Rule) -> Result<(), ScannerError> {
    match rule {
        Rule::Breakout { window, .. } => positive_window("BREAKOUT", *window),
        Rule::MacdCross {
            fast, slow, signal, ..
        } => {
            positive_window("MACD_CROSS", *fast)?;
            positive_window("MACD_CROSS", *signal)?;
            if fast >= slow {
                return invalid(format!(
                    "MACD_CROSS: fast span {} must be shorter than slow span {}",
                    fast, slow
                ));
            }
            Ok(())
        }
        Rule::SmaCross { fast, slow, .. } => {
            positive_window("SMA_CROSS", *fast)?;
            if fast >= slow {
                return invalid(format!(
                    "SMA_CROSS: fast window {} must be shorter than slow window {}",
                    fast, slow
                ));
            }
            Ok(())
        }
        Rule::SmaStack(windows) => {
            if windows.len() < 2 {
                return invalid("SMA_STACK: needs at least 2 windows".to_string());
            }
            for w in windows {
                positive_window("SMA_STACK", *w)?;
            }
            if windows.windows(2).any(|pair| pair[0] >= pair[1]) {
                return invalid("SMA_STACK: windows must be strictly increasing".to_string());
            }
            Ok(())
        }
        Rule::VolumeSpike { window, multiplier } => {
            positive_window("VOLUME_SPIKE", *window)?;
            positive_multiplier("VOLUME_SPIKE", *multiplier)
        }
        Rule::VolumeRise { multiplier } => positive_multiplier("VOLUME_RISE", *multiplier),
        Rule::MinVolume(_) => Ok(()),
        Rule::MinClose(price) => {
            if !(price.is_finite() && *price >= 0.0) {
                return invalid(format!("MIN_CLOSE: price must be non-negative, got {}", price));
            }
            Ok(())
        }
        Rule::VolatilityBand {
            window,
            lower,
            upper,
        } => {
            positive_window("ATR_BAND", *window)?;
            if !(lower.is_finite() && upper.is_finite()) || *lower < 0.0 || lower > upper {
                return invalid(format!(
                    "ATR_BAND: bounds must satisfy 0 <= lower <= upper, got [{}, {}]",
                    lower, upper
                ));
            }
            Ok(())
        }
        Rule::BoxBreakout { lookback, cap, .. } => {
            positive_window("BOX_BREAKOUT", *lookback)?;
            if !(cap.is_finite() && *cap > 1.0) {
                return invalid(format!("BOX_BREAKOUT: cap must be greater than 1, got {}", cap));
            }
            Ok(())
        }
        Rule::TrendCount { window, threshold } => {
            positive_window("TREND_COUNT", *window)?;
            if threshold > window {
                return invalid(format!(
                    "TREND_COUNT: threshold {} exceeds window {}",
                    threshold, window
                ));
            }
            Ok(())
        }
        Rule::And(rules) | Rule::Or(rules) => {
            if rules.is_empty() {
                return invalid("AND/OR: needs at least one child".to_string());
            }
            rules.iter().try_for_each(validate_rule)
        }
        Rule::Not(rule) => validate_rule(rule),
        Rule::Consecutive { rule, count } | Rule::AnyOf { rule, count } => {
            if *count == 0 {
                return invalid("CONSECUTIVE/ANY_OF: count must be at least 1".to_string());
            }
            validate_rule(rule)
        }
    }
}

fn occurrence_suffix(occurrence: Occurrence, default: Occurrence) -> &'static str {
    match (occurrence, default) {
        (o, d) if o == d => "",
        (Occurrence::First, _) => ", FIRST",
        (Occurrence::Current, _) => ", CURRENT",
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, name: &str, rules: &[Rule]) -> fmt::Result {
    write!(f, "{}(", name)?;
    for (i, r) in rules.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", r)?;
    }
    write!(f, ")")
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rule::Breakout { window, occurrence } => write!(
                f,
                "BREAKOUT({}{})",
                window,
                occurrence_suffix(*occurrence, Occurrence::First)
            ),
            Rule::MacdCross {
                fast,
                slow,
                signal,
                above_zero,
                occurrence,
            } => write!(
                f,
                "MACD_CROSS({}, {}, {}{}{})",
                fast,
                slow,
                signal,
                if *above_zero { ", ABOVE_ZERO" } else { "" },
                occurrence_suffix(*occurrence, Occurrence::First)
            ),
            Rule::SmaCross {
                fast,
                slow,
                occurrence,
            } => write!(
                f,
                "SMA_CROSS({}, {}{})",
                fast,
                slow,
                occurrence_suffix(*occurrence, Occurrence::First)
            ),
            Rule::SmaStack(windows) => {
                let parts: Vec<String> = windows.iter().map(|w| w.to_string()).collect();
                write!(f, "SMA_STACK({})", parts.join(", "))
            }
            Rule::VolumeSpike { window, multiplier } => {
                write!(f, "VOLUME_SPIKE({}, {})", window, multiplier)
            }
            Rule::VolumeRise { multiplier } => write!(f, "VOLUME_RISE({})", multiplier),
            Rule::MinVolume(v) => write!(f, "MIN_VOLUME({})", v),
            Rule::MinClose(p) => write!(f, "MIN_CLOSE({})", p),
            Rule::VolatilityBand {
                window,
                lower,
                upper,
            } => write!(f, "ATR_BAND({}, {}, {})", window, lower, upper),
            Rule::BoxBreakout {
                lookback,
                cap,
                volume_rise,
            } => write!(
                f,
                "BOX_BREAKOUT({}, {}{})",
                lookback,
                cap,
                if *volume_rise { ", VOLUME_RISE" } else { "" }
            ),
            Rule::TrendCount { window, threshold } => {
                write!(f, "TREND_COUNT({}, {})", window, threshold)
            }
            Rule::And(rules) => write_list(f, "AND", rules),
            Rule::Or(rules) => write_list(f, "OR", rules),
            Rule::Not(rule) => write!(f, "NOT({})", rule),
            Rule::Consecutive { rule, count } => write!(f, "CONSECUTIVE({}, {})", rule, count),
            Rule::AnyOf { rule, count } => write!(f, "ANY_OF({}, {})", rule, count),
        }
    }
}
