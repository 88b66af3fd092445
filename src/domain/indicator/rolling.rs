//! Trailing-window extremes and mean volume, shifted by one bar.
//!
//! The value at bar `i` summarises bars `i-n ..= i-1`, never bar `i` itself,
//! so a breakout or volume baseline can't see the bar being judged.
//! Warmup: the first `n` bars are invalid.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::ohlcv::OhlcvBar;

pub fn calculate_prior_high(bars: &[OhlcvBar], period: usize) -> IndicatorSeries {
    prior_window(bars, IndicatorType::PriorHigh(period), period, |window| {
        window.iter().map(|b| b.high).fold(f64::MIN, f64::max)
    })
}

pub fn calculate_prior_low(bars: &[OhlcvBar], period: usize) -> IndicatorSeries {
    prior_window(bars, IndicatorType::PriorLow(period), period, |window| {
        window.iter().map(|b| b.low).fold(f64::MAX, f64::min)
    })
}

pub fn calculate_prior_mean_volume(bars: &[OhlcvBar], period: usize) -> IndicatorSeries {
    prior_window(bars, IndicatorType::PriorMeanVolume(period), period, |window| {
        window.iter().map(|b| b.volume as f64).sum::<f64>() / window.len() as f64
    })
}

fn prior_window<F>(
    bars: &[OhlcvBar],
    indicator_type: IndicatorType,
    period: usize,
    reduce: F,
) -> IndicatorSeries
where
    F: Fn(&[OhlcvBar]) -> f64,
{
    if period == 0 || bars.is_empty() {
        return IndicatorSeries::empty(indicator_type);
    }

    let values = bars
        .iter()
        .enumerate()
        .map(|(i, bar)| {
            if i < period {
                IndicatorPoint {
                    date: bar.date,
                    valid: false,
                    value: IndicatorValue::Simple(0.0),
                }
            } else {
                IndicatorPoint {
                    date: bar.date,
                    valid: true,
                    value: IndicatorValue::Simple(reduce(&bars[i - period..i])),
                }
            }
        })
        .collect();

    IndicatorSeries {
        indicator_type,
        values,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    fn bar(day: u32, high: f64, low: f64, volume: u64) -> OhlcvBar {
        OhlcvBar {
            date: NaiveDate::from_ymd_opt(2024, 5, day).unwrap(),
            open: low,
            high,
            low,
            close: (high + low) / 2.0,
            volume,
        }
    }

    fn sample() -> Vec<OhlcvBar> {
        vec![
            bar(1, 10.0, 8.0, 100),
            bar(2, 12.0, 9.0, 200),
            bar(3, 11.0, 7.0, 300),
            bar(4, 50.0, 1.0, 10_000),
        ]
    }

    #[test]
    fn prior_high_excludes_current_bar() {
        let series = calculate_prior_high(&sample(), 2);
        assert!(!series.values[0].valid);
        assert!(!series.values[1].valid);
        assert_relative_eq!(series.simple_at(2).unwrap(), 12.0);
        // bar 3's own high of 50 is not in its window
        assert_relative_eq!(series.simple_at(3).unwrap(), 12.0);
    }

    #[test]
    fn prior_low_excludes_current_bar() {
        let series = calculate_prior_low(&sample(), 3);
        assert_relative_eq!(series.simple_at(3).unwrap(), 7.0);
    }

    #[test]
    fn prior_mean_volume_shifted() {
        let series = calculate_prior_mean_volume(&sample(), 3);
        assert!(!series.values[2].valid);
        assert_relative_eq!(series.simple_at(3).unwrap(), 200.0);
    }

    #[test]
    fn window_equal_to_length_has_no_valid_points() {
        let series = calculate_prior_high(&sample(), 4);
        assert_eq!(series.values.len(), 4);
        assert!(series.values.iter().all(|p| !p.valid));
    }

    #[test]
    fn zero_period_is_empty() {
        assert!(calculate_prior_mean_volume(&sample(), 0).values.is_empty());
    }
}
