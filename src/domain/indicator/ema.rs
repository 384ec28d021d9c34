//! Exponential Moving Average.
//!
//! k = 2/(n+1), seed with the first value, then EMA[i] = C[i]*k + EMA[i-1]*(1-k).
//! The recursion starts at bar 0, but the first (n-1) bars are reported as
//! undefined (minimum-periods rule).

use crate::domain::error::AnalysisError;
use crate::domain::indicator::{IndicatorSeries, IndicatorType};
use crate::domain::series::Series;

pub fn calculate_ema(series: &Series, period: usize) -> Result<IndicatorSeries, AnalysisError> {
    series.ensure_not_empty()?;

    let closes: Vec<Option<f64>> = series.closes().into_iter().map(Some).collect();
    Ok(IndicatorSeries::from_values(
        IndicatorType::Ema(period),
        &series.dates(),
        ema_values(&closes, period),
    ))
}

/// EMA over a series that may carry an undefined prefix. The recursion is
/// seeded at the first defined value and reported once `period` defined
/// observations have been folded in.
pub(crate) fn ema_values(values: &[Option<f64>], period: usize) -> Vec<Option<f64>> {
    if period == 0 {
        return vec![None; values.len()];
    }

    let k = 2.0 / (period as f64 + 1.0);
    let mut ema: Option<f64> = None;
    let mut seen = 0usize;

    values
        .iter()
        .map(|value| {
            let x = (*value)?;
            let next = match ema {
                None => x,
                Some(prev) => x * k + prev * (1.0 - k),
            };
            ema = Some(next);
            seen += 1;
            if seen >= period { Some(next) } else { None }
        })
        .collect()
}
