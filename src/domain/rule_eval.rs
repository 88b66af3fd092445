//! Rule evaluation engine.
//!
//! Evaluates rules against OHLCV data and pre-computed indicator values.
//!
//! # Evaluation Semantics
//!
//! - Every node first checks its own minimum history; too little history is
//!   `false`, never a panic or an error. This also holds under `NOT`.
//! - Indicator points that are not valid make the leaf `false`.
//! - `Occurrence::First`: the condition holds at `index` and was evaluable and
//!   false at `index - 1`.
//! - `AND`: Short-circuits on first `false`
//! - `OR`: Short-circuits on first `true`
//! - `CONSECUTIVE(rule, N)`: Child must be true for N consecutive bars ending at current
//! - `ANY_OF(rule, N)`: Child must be true at least once in the last N bars

use crate::domain::indicator::{IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::ohlcv::OhlcvBar;
use crate::domain::rule::{Occurrence, Rule};
use std::collections::HashMap;

pub type IndicatorMap = HashMap<IndicatorType, IndicatorSeries>;

pub fn evaluate(
    rule: &Rule,
    ohlcv: &[OhlcvBar],
    indicators: &IndicatorMap,
    bar_index: usize,
) -> bool {
    if bar_index >= ohlcv.len() || bar_index + 1 < rule.min_history() {
        return false;
    }

    match rule {
        Rule::Breakout { window, occurrence } => {
            with_occurrence(*occurrence, bar_index, |i| {
                let prior_high = simple(indicators, &IndicatorType::PriorHigh(*window), i)?;
                Some(ohlcv[i].close > prior_high)
            })
        }
        Rule::MacdCross {
            fast,
            slow,
            signal,
            above_zero,
            occurrence,
        } => {
            let key = IndicatorType::Macd {
                fast: *fast,
                slow: *slow,
                signal: *signal,
            };
            let crossed = with_occurrence(*occurrence, bar_index, |i| {
                let (line, signal) = macd(indicators, &key, i)?;
                Some(line > signal)
            });
            crossed
                && (!*above_zero
                    || macd(indicators, &key, bar_index).is_some_and(|(line, _)| line > 0.0))
        }
        Rule::SmaCross {
            fast,
            slow,
            occurrence,
        } => with_occurrence(*occurrence, bar_index, |i| {
            let f = simple(indicators, &IndicatorType::Sma(*fast), i)?;
            let s = simple(indicators, &IndicatorType::Sma(*slow), i)?;
            Some(f > s)
        }),
        Rule::SmaStack(windows) => {
            let values: Option<Vec<f64>> = windows
                .iter()
                .map(|w| simple(indicators, &IndicatorType::Sma(*w), bar_index))
                .collect();
            match values {
                Some(v) if !v.is_empty() => v.windows(2).all(|pair| pair[0] > pair[1]),
                _ => false,
            }
        }
        Rule::VolumeSpike { window, multiplier } => {
            match simple(indicators, &IndicatorType::PriorMeanVolume(*window), bar_index) {
                Some(baseline) if baseline > 0.0 => {
                    ohlcv[bar_index].volume as f64 >= multiplier * baseline
                }
                _ => false,
            }
        }
        Rule::VolumeRise { multiplier } => {
            let previous = ohlcv[bar_index - 1].volume;
            previous > 0 && ohlcv[bar_index].volume as f64 >= multiplier * previous as f64
        }
        Rule::MinVolume(minimum) => ohlcv[bar_index].volume >= *minimum,
        Rule::MinClose(minimum) => ohlcv[bar_index].close >= *minimum,
        Rule::VolatilityBand {
            window,
            lower,
            upper,
        } => {
            let close = ohlcv[bar_index].close;
            match simple(indicators, &IndicatorType::Atr(*window), bar_index) {
                Some(atr) if close > 0.0 => {
                    let ratio = atr / close;
                    ratio >= *lower && ratio <= *upper
                }
                _ => false,
            }
        }
        Rule::BoxBreakout {
            lookback,
            cap,
            volume_rise,
        } => {
            let bar = &ohlcv[bar_index];
            let Some(box_high) = simple(indicators, &IndicatorType::PriorHigh(*lookback), bar_index)
            else {
                return false;
            };
            bar.close > box_high
                && bar.close < box_high * cap
                && (!*volume_rise || bar.volume > ohlcv[bar_index - 1].volume)
        }
        Rule::TrendCount { window, threshold } => {
            let start = bar_index + 1 - window;
            let up_bars = ohlcv[start..=bar_index].iter().filter(|b| b.is_up()).count();
            up_bars >= *threshold
        }
        Rule::And(rules) => {
            for r in rules {
                if !evaluate(r, ohlcv, indicators, bar_index) {
                    return false;
                }
            }
            true
        }
        Rule::Or(rules) => {
            for r in rules {
                if evaluate(r, ohlcv, indicators, bar_index) {
                    return true;
                }
            }
            false
        }
        Rule::Not(rule) => !evaluate(rule, ohlcv, indicators, bar_index),
        Rule::Consecutive { rule, count } => {
            if *count == 0 || bar_index + 1 < *count {
                return false;
            }
            for i in (bar_index + 1 - *count)..=bar_index {
                if !evaluate(rule, ohlcv, indicators, i) {
                    return false;
                }
            }
            true
        }
        Rule::AnyOf { rule, count } => {
            if *count == 0 {
                return false;
            }
            let start = bar_index.saturating_sub(*count - 1);
            for i in start..=bar_index {
                if evaluate(rule, ohlcv, indicators, i) {
                    return true;
                }
            }
            false
        }
    }
}

/// Evaluates the most recent bar. An empty series never matches.
pub fn evaluate_last(rule: &Rule, ohlcv: &[OhlcvBar], indicators: &IndicatorMap) -> bool {
    match ohlcv.len() {
        0 => false,
        n => evaluate(rule, ohlcv, indicators, n - 1),
    }
}

/// `condition` returns `None` when its inputs are not available at that bar.
fn with_occurrence<F>(occurrence: Occurrence, index: usize, condition: F) -> bool
where
    F: Fn(usize) -> Option<bool>,
{
    match occurrence {
        Occurrence::Current => condition(index) == Some(true),
        Occurrence::First => {
            index >= 1 && condition(index) == Some(true) && condition(index - 1) == Some(false)
        }
    }
}

fn simple(indicators: &IndicatorMap, key: &IndicatorType, index: usize) -> Option<f64> {
    indicators.get(key)?.simple_at(index).filter(|v| v.is_finite())
}

fn macd(indicators: &IndicatorMap, key: &IndicatorType, index: usize) -> Option<(f64, f64)> {
    let point = indicators.get(key)?.values.get(index)?;
    match point.value {
        IndicatorValue::Macd { line, signal, .. } if point.valid => Some((line, signal)),
        _ => None,
    }
}
