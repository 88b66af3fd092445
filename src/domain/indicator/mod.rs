//! Technical indicator types and implementations.
//!
//! This module provides types for representing indicator values and series:
//! - `IndicatorPoint`: A single point in an indicator time series
//! - `IndicatorValue`: Enum for different indicator output shapes
//! - `IndicatorType`: Enum for indicator identity + parameters (serves as HashMap key)
//! - `IndicatorSeries`: A time series of indicator values, aligned 1:1 with its bars
//!
//! A point with `valid == false` means "not yet available": the indicator does
//! not have enough history at that bar. Callers check `valid` before use.

pub mod ema;
pub mod macd;
pub mod rolling;
pub mod sma;

pub use ema::calculate_ema;
pub use macd::calculate_macd;
pub use rolling::{calculate_prior_high, calculate_prior_low, calculate_prior_mean_volume};
pub use sma::calculate_sma;

use chrono::NaiveDate;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorPoint {
    pub date: NaiveDate,
    pub valid: bool,
    pub value: IndicatorValue,
}

#[derive(Debug, Clone, PartialEq)]
pub enum IndicatorValue {
    Simple(f64),
    Macd {
        line: f64,
        signal: f64,
        histogram: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IndicatorType {
    Sma(usize),
    Ema(usize),
    Macd {
        fast: usize,
        slow: usize,
        signal: usize,
    },
    /// Highest high of the `n` bars before the current one.
    PriorHigh(usize),
    /// Lowest low of the `n` bars before the current one.
    PriorLow(usize),
    /// Mean volume of the `n` bars before the current one.
    PriorMeanVolume(usize),
    Atr(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorSeries {
    pub indicator_type: IndicatorType,
    pub values: Vec<IndicatorPoint>,
}

impl IndicatorSeries {
    pub(crate) fn empty(indicator_type: IndicatorType) -> Self {
        Self {
            indicator_type,
            values: Vec::new(),
        }
    }

    /// The simple value at `index`, if the point exists and is valid.
    pub fn simple_at(&self, index: usize) -> Option<f64> {
        match self.values.get(index) {
            Some(IndicatorPoint {
                valid: true,
                value: IndicatorValue::Simple(v),
                ..
            }) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for IndicatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorType::Sma(period) => write!(f, "SMA({})", period),
            IndicatorType::Ema(period) => write!(f, "EMA({})", period),
            IndicatorType::Macd { fast, slow, signal } => {
                write!(f, "MACD({},{},{})", fast, slow, signal)
            }
            IndicatorType::PriorHigh(period) => write!(f, "PRIOR_HIGH({})", period),
            IndicatorType::PriorLow(period) => write!(f, "PRIOR_LOW({})", period),
            IndicatorType::PriorMeanVolume(period) => write!(f, "PRIOR_MEAN_VOLUME({})", period),
            IndicatorType::Atr(period) => write!(f, "ATR({})", period),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indicator_type_display_sma() {
        assert_eq!(IndicatorType::Sma(20).to_string(), "SMA(20)");
    }

    #[test]
    fn indicator_type_display_macd() {
        let macd = IndicatorType::Macd {
            fast: 12,
            slow: 26,
            signal: 9,
        };
        assert_eq!(macd.to_string(), "MACD(12,26,9)");
    }

    #[test]
    fn indicator_type_display_prior_windows() {
        assert_eq!(IndicatorType::PriorHigh(20).to_string(), "PRIOR_HIGH(20)");
        assert_eq!(
            IndicatorType::PriorMeanVolume(20).to_string(),
            "PRIOR_MEAN_VOLUME(20)"
        );
    }

    #[test]
    fn indicator_type_hash_eq() {
        use std::collections::HashMap;

        let mut map = HashMap::new();
        let sma20 = IndicatorType::Sma(20);
        let high20 = IndicatorType::PriorHigh(20);

        map.insert(sma20.clone(), "sma20_series".to_string());
        map.insert(high20.clone(), "high20_series".to_string());

        assert_eq!(map.get(&sma20), Some(&"sma20_series".to_string()));
        assert_eq!(map.get(&high20), Some(&"high20_series".to_string()));
        assert_eq!(map.get(&IndicatorType::PriorLow(20)), None);
    }

    #[test]
    fn simple_at_skips_invalid_points() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let series = IndicatorSeries {
            indicator_type: IndicatorType::Sma(2),
            values: vec![
                IndicatorPoint {
                    date,
                    valid: false,
                    value: IndicatorValue::Simple(0.0),
                },
                IndicatorPoint {
                    date,
                    valid: true,
                    value: IndicatorValue::Simple(4.5),
                },
            ],
        };
        assert_eq!(series.simple_at(0), None);
        assert_eq!(series.simple_at(1), Some(4.5));
        assert_eq!(series.simple_at(2), None);
    }
}
