//! Bollinger Bands indicator.
//!
//! Bollinger Bands consist of:
//! - Middle: Simple Moving Average (SMA) over n periods
//! - Upper: Middle + (multiplier × StdDev)
//! - Lower: Middle - (multiplier × StdDev)
//!
//! Where StdDev is population standard deviation (divides by N, not N-1).
//!
//! Default parameters: period=20, multiplier=2.0
//! Warmup: first (period-1) bars are undefined.

use crate::domain::error::AnalysisError;
use crate::domain::indicator::sma::rolling_mean;
use crate::domain::indicator::stddev::rolling_population_stddev;
use crate::domain::indicator::{IndicatorSeries, IndicatorType};
use crate::domain::series::Series;

pub const DEFAULT_PERIOD: usize = 20;
pub const DEFAULT_STDDEV_MULT_X100: u32 = 200;

#[derive(Debug, Clone, PartialEq)]
pub struct BollingerBands {
    pub upper: IndicatorSeries,
    pub middle: IndicatorSeries,
    pub lower: IndicatorSeries,
}

/// `stddev_mult_x100` carries the band multiplier in hundredths so the
/// parameters stay hashable (200 = 2.0).
pub fn calculate_bollinger(
    series: &Series,
    period: usize,
    stddev_mult_x100: u32,
) -> Result<BollingerBands, AnalysisError> {
    series.ensure_not_empty()?;

    let dates = series.dates();
    let closes = series.closes();
    let mult = stddev_mult_x100 as f64 / 100.0;

    let as_options: Vec<Option<f64>> = closes.iter().copied().map(Some).collect();
    let middle = rolling_mean(&as_options, period);
    let stddev = rolling_population_stddev(&closes, period);

    let (upper, lower): (Vec<Option<f64>>, Vec<Option<f64>>) = middle
        .iter()
        .zip(&stddev)
        .map(|(m, sd)| match (m, sd) {
            (Some(m), Some(sd)) => (Some(m + mult * sd), Some(m - mult * sd)),
            _ => (None, None),
        })
        .unzip();

    Ok(BollingerBands {
        upper: IndicatorSeries::from_values(
            IndicatorType::BollingerUpper {
                period,
                stddev_mult_x100,
            },
            &dates,
            upper,
        ),
        middle: IndicatorSeries::from_values(IndicatorType::BollingerMiddle(period), &dates, middle),
        lower: IndicatorSeries::from_values(
            IndicatorType::BollingerLower {
                period,
                stddev_mult_x100,
            },
            &dates,
            lower,
        ),
    })
}
