//! MACD (Moving Average Convergence Divergence) indicator.
//!
//! MACD Line = EMA(fast) - EMA(slow)
//! Signal Line = EMA(signal) of MACD Line
//! Histogram = MACD Line - Signal Line
//!
//! Default parameters: fast=12, slow=26, signal=9
//! Warmup: line from max(fast, slow) - 1, signal and histogram from
//! max(fast, slow) - 1 + signal - 1.

use crate::domain::error::AnalysisError;
use crate::domain::indicator::ema::ema_values;
use crate::domain::indicator::{IndicatorSeries, IndicatorType};
use crate::domain::series::Series;

pub const DEFAULT_FAST: usize = 12;
pub const DEFAULT_SLOW: usize = 26;
pub const DEFAULT_SIGNAL: usize = 9;

#[derive(Debug, Clone, PartialEq)]
pub struct Macd {
    pub line: IndicatorSeries,
    pub signal: IndicatorSeries,
    pub histogram: IndicatorSeries,
}

pub fn calculate_macd(
    series: &Series,
    fast: usize,
    slow: usize,
    signal_period: usize,
) -> Result<Macd, AnalysisError> {
    series.ensure_not_empty()?;

    let dates = series.dates();
    let closes: Vec<Option<f64>> = series.closes().into_iter().map(Some).collect();

    let ema_fast = ema_values(&closes, fast);
    let ema_slow = ema_values(&closes, slow);

    let line: Vec<Option<f64>> = ema_fast
        .iter()
        .zip(&ema_slow)
        .map(|(f, s)| Some((*f)? - (*s)?))
        .collect();
    let signal = ema_values(&line, signal_period);
    let histogram: Vec<Option<f64>> = line
        .iter()
        .zip(&signal)
        .map(|(l, s)| Some((*l)? - (*s)?))
        .collect();

    Ok(Macd {
        line: IndicatorSeries::from_values(
            IndicatorType::MacdLine {
                fast,
                slow,
                signal: signal_period,
            },
            &dates,
            line,
        ),
        signal: IndicatorSeries::from_values(
            IndicatorType::MacdSignal {
                fast,
                slow,
                signal: signal_period,
            },
            &dates,
            signal,
        ),
        histogram: IndicatorSeries::from_values(
            IndicatorType::MacdHistogram {
                fast,
                slow,
                signal: signal_period,
            },
            &dates,
            histogram,
        ),
    })
}

pub fn calculate_macd_default(series: &Series) -> Result<Macd, AnalysisError> {
    calculate_macd(series, DEFAULT_FAST, DEFAULT_SLOW, DEFAULT_SIGNAL)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ohlcv::Bar;
    use chrono::NaiveDate;

    fn make_series(prices: &[f64]) -> Series {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let bars = prices
            .iter()
            .enumerate()
            .map(|(i, &close)| {
                Bar::new(
                    start + chrono::Duration::days(i as i64),
                    close,
                    close,
                    close,
                    close,
                )
            })
            .collect();
        Series::load(bars).unwrap()
    }

    fn ramp(n: usize) -> Vec<f64> {
        (0..n).map(|i| 100.0 + i as f64).collect()
    }

    #[test]
    fn macd_warmup_defaults() {
        let macd = calculate_macd_default(&make_series(&ramp(40))).unwrap();

        assert_eq!(macd.line.value_at(24), None);
        assert!(macd.line.value_at(25).is_some());
        assert_eq!(macd.signal.value_at(32), None);
        assert!(macd.signal.value_at(33).is_some());
        assert_eq!(macd.histogram.value_at(32), None);
        assert!(macd.histogram.value_at(33).is_some());
    }

    #[test]
    fn macd_line_is_ema_difference() {
        let prices = [10.0, 20.0, 30.0, 40.0, 50.0];
        let macd = calculate_macd(&make_series(&prices), 2, 3, 2).unwrap();

        // first-close seeded EMAs
        let k2 = 2.0 / 3.0;
        let k3 = 0.5;
        let mut f = 10.0;
        let mut s = 10.0;
        let mut expected_line = vec![0.0];
        for &p in &prices[1..] {
            f = p * k2 + f * (1.0 - k2);
            s = p * k3 + s * (1.0 - k3);
            expected_line.push(f - s);
        }

        assert_eq!(macd.line.value_at(1), None);
        for i in 2..5 {
            assert!((macd.line.value_at(i).unwrap() - expected_line[i]).abs() < 1e-10);
        }

        // signal seeded with line[2], reported from index 3
        let sig3 = expected_line[3] * k2 + expected_line[2] * (1.0 - k2);
        assert_eq!(macd.signal.value_at(2), None);
        assert!((macd.signal.value_at(3).unwrap() - sig3).abs() < 1e-10);
        assert!(
            (macd.histogram.value_at(3).unwrap() - (expected_line[3] - sig3)).abs() < 1e-10
        );
    }

    #[test]
    fn macd_flat_prices_zero_histogram() {
        let macd = calculate_macd_default(&make_series(&[50.0; 40])).unwrap();
        for i in 33..40 {
            assert!(macd.histogram.value_at(i).unwrap().abs() < 1e-12);
        }
    }

    #[test]
    fn macd_short_series_all_undefined() {
        let macd = calculate_macd_default(&make_series(&ramp(20))).unwrap();
        assert_eq!(macd.line.len(), 20);
        assert_eq!(macd.line.defined_count(), 0);
        assert_eq!(macd.signal.defined_count(), 0);
        assert_eq!(macd.histogram.defined_count(), 0);
    }

    #[test]
    fn macd_uptrend_positive_line() {
        let macd = calculate_macd_default(&make_series(&ramp(40))).unwrap();
        assert!(macd.line.value_at(39).unwrap() > 0.0);
    }

    #[test]
    fn macd_indicator_types() {
        let macd = calculate_macd_default(&make_series(&[1.0])).unwrap();
        assert_eq!(
            macd.histogram.indicator_type,
            IndicatorType::MacdHistogram {
                fast: 12,
                slow: 26,
                signal: 9
            }
        );
    }
}
