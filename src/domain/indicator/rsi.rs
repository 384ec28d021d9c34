//! RSI (Relative Strength Index) indicator implementation.
//!
//! Uses Wilder's exponential smoothing (alpha = 1/n) for average gain/loss:
//! - Seed: the first price change
//! - Subsequent: avg = prev_avg + (current - prev_avg) / n
//!
//! Formula: RSI = 100 - (100 / (1 + avg_gain / avg_loss))
//! If avg_loss == 0: RSI = 100
//!
//! Warmup: first n bars are undefined (need n price changes).

use crate::domain::error::AnalysisError;
use crate::domain::indicator::{IndicatorSeries, IndicatorType};
use crate::domain::series::Series;

pub const DEFAULT_PERIOD: usize = 14;

pub fn calculate_rsi(series: &Series, period: usize) -> Result<IndicatorSeries, AnalysisError> {
    series.ensure_not_empty()?;

    let dates = series.dates();
    let bars = series.bars();
    if period == 0 || bars.len() <= period {
        return Ok(IndicatorSeries::undefined(IndicatorType::Rsi(period), &dates));
    }

    let alpha = 1.0 / period as f64;
    let mut values = Vec::with_capacity(bars.len());
    values.push(None);

    let mut avg_gain = 0.0;
    let mut avg_loss = 0.0;

    for (i, pair) in bars.windows(2).enumerate() {
        let change = pair[1].change_from(pair[0].close);
        let gain = change.max(0.0);
        let loss = (-change).max(0.0);

        if i == 0 {
            avg_gain = gain;
            avg_loss = loss;
        } else {
            avg_gain += (gain - avg_gain) * alpha;
            avg_loss += (loss - avg_loss) * alpha;
        }

        // i + 1 price changes have been folded in at bar i + 1
        if i + 1 < period {
            values.push(None);
        } else {
            values.push(Some(rsi_from_averages(avg_gain, avg_loss)));
        }
    }

    Ok(IndicatorSeries::from_values(
        IndicatorType::Rsi(period),
        &dates,
        values,
    ))
}

fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        100.0
    } else {
        100.0 - (100.0 / (1.0 + avg_gain / avg_loss))
    }
}
