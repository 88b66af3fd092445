//! Shared helper functions for indicator calculations.

use crate::domain::indicator::{
    calculate_ema, calculate_macd, calculate_prior_high, calculate_prior_low,
    calculate_prior_mean_volume, calculate_sma, IndicatorPoint, IndicatorSeries, IndicatorType,
    IndicatorValue,
};
use crate::domain::ohlcv::OhlcvBar;
use std::collections::HashMap;

/// Average True Range as a simple mean of the last `period` true ranges.
///
/// True range needs the previous close, so it starts at bar 1 and the first
/// valid ATR is at bar `period` (`period + 1` bars of history).
pub fn calc_atr(bars: &[OhlcvBar], period: usize) -> IndicatorSeries {
    if period == 0 || bars.is_empty() {
        return IndicatorSeries::empty(IndicatorType::Atr(period));
    }

    let mut results: Vec<IndicatorPoint> = Vec::with_capacity(bars.len());
    let mut window_sum = 0.0;
    let tr = |i: usize| bars[i].true_range(bars[i - 1].close);

    for (i, bar) in bars.iter().enumerate() {
        if i >= 1 {
            window_sum += tr(i);
        }
        if i > period {
            window_sum -= tr(i - period);
        }
        let valid = i >= period;
        results.push(IndicatorPoint {
            date: bar.date,
            valid,
            value: IndicatorValue::Simple(if valid {
                window_sum / period as f64
            } else {
                0.0
            }),
        });
    }

    IndicatorSeries {
        indicator_type: IndicatorType::Atr(period),
        values: results,
    }
}

pub fn calculate(bars: &[OhlcvBar], indicator_type: &IndicatorType) -> IndicatorSeries {
    match *indicator_type {
        IndicatorType::Sma(period) => calculate_sma(bars, period),
        IndicatorType::Ema(period) => calculate_ema(bars, period),
        IndicatorType::Macd { fast, slow, signal } => calculate_macd(bars, fast, slow, signal),
        IndicatorType::PriorHigh(period) => calculate_prior_high(bars, period),
        IndicatorType::PriorLow(period) => calculate_prior_low(bars, period),
        IndicatorType::PriorMeanVolume(period) => calculate_prior_mean_volume(bars, period),
        IndicatorType::Atr(period) => calc_atr(bars, period),
    }
}

/// Computes each requested indicator once. A series shorter than two bars
/// yields no indicators at all.
pub fn compute_indicators(
    bars: &[OhlcvBar],
    types: &[IndicatorType],
) -> HashMap<IndicatorType, IndicatorSeries> {
    let mut out = HashMap::new();
    if bars.len() < 2 {
        return out;
    }
    for t in types {
        if !out.contains_key(t) {
            out.insert(t.clone(), calculate(bars, t));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    fn make_bar(day: u32, high: f64, low: f64, close: f64) -> OhlcvBar {
        OhlcvBar {
            date: NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            open: close,
            high,
            low,
            close,
            volume: 1000,
        }
    }

    fn steady() -> Vec<OhlcvBar> {
        vec![
            make_bar(1, 110.0, 100.0, 105.0),
            make_bar(2, 115.0, 105.0, 110.0),
            make_bar(3, 120.0, 110.0, 115.0),
            make_bar(4, 125.0, 115.0, 120.0),
        ]
    }

    #[test]
    fn atr_needs_period_plus_one_bars() {
        let series = calc_atr(&steady(), 3);
        assert_eq!(series.values.len(), 4);
        assert!(!series.values[0].valid);
        assert!(!series.values[1].valid);
        assert!(!series.values[2].valid);
        assert!(series.values[3].valid);
    }

    #[test]
    fn atr_is_mean_of_true_ranges() {
        let series = calc_atr(&steady(), 2);
        // TR(1) = max(10, |115-105|, |105-105|) = 10, TR(2) = 10
        assert_relative_eq!(series.simple_at(2).unwrap(), 10.0);
    }

    #[test]
    fn atr_uses_gap_from_previous_close() {
        let bars = vec![
            make_bar(1, 110.0, 100.0, 105.0),
            make_bar(2, 130.0, 120.0, 125.0),
            make_bar(3, 120.0, 110.0, 115.0),
        ];
        let series = calc_atr(&bars, 2);
        // TR(1) = |130-105| = 25, TR(2) = |110-125| = 15
        assert_relative_eq!(series.simple_at(2).unwrap(), 20.0);
    }

    #[test]
    fn atr_window_slides() {
        let bars = vec![
            make_bar(1, 110.0, 100.0, 105.0),
            make_bar(2, 130.0, 120.0, 125.0),
            make_bar(3, 120.0, 110.0, 115.0),
            make_bar(4, 116.0, 114.0, 115.0),
        ];
        let series = calc_atr(&bars, 2);
        // TR(2) = 15, TR(3) = max(2, 1, 1) = 2
        assert_relative_eq!(series.simple_at(3).unwrap(), 8.5);
    }

    #[test]
    fn compute_indicators_short_series_is_empty() {
        let bars = vec![make_bar(1, 110.0, 100.0, 105.0)];
        let map = compute_indicators(&bars, &[IndicatorType::Sma(1)]);
        assert!(map.is_empty());
    }

    #[test]
    fn compute_indicators_dedups() {
        let map = compute_indicators(
            &steady(),
            &[
                IndicatorType::Sma(2),
                IndicatorType::Sma(2),
                IndicatorType::Atr(2),
            ],
        );
        assert_eq!(map.len(), 2);
        assert!(map.contains_key(&IndicatorType::Sma(2)));
        assert!(map.contains_key(&IndicatorType::Atr(2)));
    }
}
