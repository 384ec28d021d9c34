//! Simple Moving Average.
//!
//! SMA(n)[i] = mean(C[i-n+1..=i]). Warmup: first (n-1) bars are undefined.

use crate::domain::error::AnalysisError;
use crate::domain::indicator::{IndicatorSeries, IndicatorType};
use crate::domain::series::Series;

pub fn calculate_sma(series: &Series, period: usize) -> Result<IndicatorSeries, AnalysisError> {
    series.ensure_not_empty()?;

    let closes: Vec<Option<f64>> = series.closes().into_iter().map(Some).collect();
    Ok(IndicatorSeries::from_values(
        IndicatorType::Sma(period),
        &series.dates(),
        rolling_mean(&closes, period),
    ))
}

/// Trailing mean over `period` values. A window that is short or contains an
/// undefined value produces `None`.
pub(crate) fn rolling_mean(values: &[Option<f64>], period: usize) -> Vec<Option<f64>> {
    if period == 0 {
        return vec![None; values.len()];
    }

    (0..values.len())
        .map(|i| {
            if i + 1 < period {
                return None;
            }
            let window = &values[i + 1 - period..=i];
            let sum = window.iter().try_fold(0.0, |acc, v| v.map(|v| acc + v))?;
            Some(sum / period as f64)
        })
        .collect()
}
