//! Stochastic Oscillator (KD).
//!
//! %K_raw[i] = 100 × (C[i] - LL) / (HH - LL) over the trailing `window` bars,
//! where LL is the lowest low and HH the highest high. A flat window
//! (HH == LL) yields 0 instead of dividing by zero.
//!
//! SlowK = SMA(%K_raw, smooth), SlowD = SMA(SlowK, smooth).
//!
//! Default parameters: window=14, smooth=3
//! Warmup: raw (window-1), SlowK (window+smooth-2), SlowD (window+2·smooth-3).

use crate::domain::error::AnalysisError;
use crate::domain::indicator::sma::rolling_mean;
use crate::domain::indicator::{IndicatorSeries, IndicatorType};
use crate::domain::series::Series;

pub const DEFAULT_WINDOW: usize = 14;
pub const DEFAULT_SMOOTH: usize = 3;

#[derive(Debug, Clone, PartialEq)]
pub struct Stochastic {
    pub raw_k: IndicatorSeries,
    pub slow_k: IndicatorSeries,
    pub slow_d: IndicatorSeries,
}

pub fn calculate_stochastic(
    series: &Series,
    window: usize,
    smooth: usize,
) -> Result<Stochastic, AnalysisError> {
    series.ensure_not_empty()?;

    let dates = series.dates();
    let raw = raw_k_values(series, window);
    let slow_k = rolling_mean(&raw, smooth);
    let slow_d = rolling_mean(&slow_k, smooth);

    Ok(Stochastic {
        raw_k: IndicatorSeries::from_values(IndicatorType::StochasticRawK(window), &dates, raw),
        slow_k: IndicatorSeries::from_values(IndicatorType::SlowK { window, smooth }, &dates, slow_k),
        slow_d: IndicatorSeries::from_values(IndicatorType::SlowD { window, smooth }, &dates, slow_d),
    })
}

fn raw_k_values(series: &Series, window: usize) -> Vec<Option<f64>> {
    let bars = series.bars();
    if window == 0 {
        return vec![None; bars.len()];
    }

    (0..bars.len())
        .map(|i| {
            if i + 1 < window {
                return None;
            }
            let span = &bars[i + 1 - window..=i];
            let lowest = span.iter().map(|b| b.low).fold(f64::INFINITY, f64::min);
            let highest = span.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max);
            let range = highest - lowest;
            if range == 0.0 {
                Some(0.0)
            } else {
                Some(100.0 * (bars[i].close - lowest) / range)
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ohlcv::Bar;
    use chrono::NaiveDate;

    fn make_series(rows: &[(f64, f64, f64)]) -> Series {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let bars = rows
            .iter()
            .enumerate()
            .map(|(i, &(high, low, close))| {
                Bar::new(start + chrono::Duration::days(i as i64), close, high, low, close)
            })
            .collect();
        Series::load(bars).unwrap()
    }

    #[test]
    fn raw_k_basic_calculation() {
        // window 3 at index 2: LL = 8, HH = 14, close 11 -> 50
        let series = make_series(&[(12.0, 8.0, 10.0), (14.0, 9.0, 13.0), (13.0, 10.0, 11.0)]);
        let stoch = calculate_stochastic(&series, 3, 1).unwrap();

        assert_eq!(stoch.raw_k.value_at(1), None);
        assert!((stoch.raw_k.value_at(2).unwrap() - 50.0).abs() < 1e-12);
    }

    #[test]
    fn raw_k_flat_window_is_zero() {
        let series = make_series(&[(100.0, 100.0, 100.0); 5]);
        let stoch = calculate_stochastic(&series, 3, 3).unwrap();

        for i in 2..5 {
            assert_eq!(stoch.raw_k.value_at(i), Some(0.0));
        }
        assert_eq!(stoch.slow_k.value_at(4), Some(0.0));
    }

    #[test]
    fn close_at_high_is_100() {
        let series = make_series(&[(10.0, 5.0, 6.0), (12.0, 6.0, 12.0)]);
        let stoch = calculate_stochastic(&series, 2, 1).unwrap();
        assert!((stoch.raw_k.value_at(1).unwrap() - 100.0).abs() < 1e-12);
    }

    #[test]
    fn warmup_compounds() {
        let rows: Vec<(f64, f64, f64)> = (0..30)
            .map(|i| {
                let c = 100.0 + (i as f64 * 0.7).sin() * 5.0;
                (c + 1.0, c - 1.0, c)
            })
            .collect();
        let series = make_series(&rows);
        let stoch = calculate_stochastic(&series, DEFAULT_WINDOW, DEFAULT_SMOOTH).unwrap();

        assert_eq!(stoch.raw_k.value_at(12), None);
        assert!(stoch.raw_k.value_at(13).is_some());
        assert_eq!(stoch.slow_k.value_at(14), None);
        assert!(stoch.slow_k.value_at(15).is_some());
        assert_eq!(stoch.slow_d.value_at(16), None);
        assert!(stoch.slow_d.value_at(17).is_some());
    }

    #[test]
    fn slow_lines_are_smoothed_means() {
        let rows: Vec<(f64, f64, f64)> = (0..8)
            .map(|i| {
                let c = 10.0 + ((i * 7) % 5) as f64;
                (c + 2.0, c - 2.0, c)
            })
            .collect();
        let series = make_series(&rows);
        let stoch = calculate_stochastic(&series, 3, 2).unwrap();

        let r5 = stoch.raw_k.value_at(5).unwrap();
        let r6 = stoch.raw_k.value_at(6).unwrap();
        let r7 = stoch.raw_k.value_at(7).unwrap();
        let k6 = (r5 + r6) / 2.0;
        let k7 = (r6 + r7) / 2.0;
        assert!((stoch.slow_k.value_at(6).unwrap() - k6).abs() < 1e-12);
        assert!((stoch.slow_k.value_at(7).unwrap() - k7).abs() < 1e-12);
        assert!((stoch.slow_d.value_at(7).unwrap() - (k6 + k7) / 2.0).abs() < 1e-12);
    }

    #[test]
    fn single_bar_all_undefined() {
        let series = make_series(&[(10.0, 9.0, 9.5)]);
        let stoch = calculate_stochastic(&series, DEFAULT_WINDOW, DEFAULT_SMOOTH).unwrap();
        assert_eq!(stoch.raw_k.len(), 1);
        assert_eq!(stoch.slow_k.defined_count(), 0);
        assert_eq!(stoch.slow_d.defined_count(), 0);
    }

    #[test]
    fn indicator_types() {
        let series = make_series(&[(10.0, 9.0, 9.5)]);
        let stoch = calculate_stochastic(&series, 14, 3).unwrap();
        assert_eq!(stoch.raw_k.indicator_type, IndicatorType::StochasticRawK(14));
        assert_eq!(
            stoch.slow_d.indicator_type,
            IndicatorType::SlowD {
                window: 14,
                smooth: 3
            }
        );
    }
}
