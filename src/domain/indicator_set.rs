//! The fixed indicator bundle handed to signal evaluation and presentation.

use crate::domain::error::AnalysisError;
use crate::domain::indicator::{
    bollinger, calculate_bollinger, calculate_macd, calculate_rsi, calculate_sma,
    calculate_stochastic, macd, rsi, stochastic, IndicatorSeries,
};
use crate::domain::series::Series;
use std::fmt;

/// Moving-average periods behind the MA5/MA20/MA60 columns.
pub const MA_PERIODS: [usize; 3] = [5, 20, 60];

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorParams {
    pub stoch_window: usize,
    pub stoch_smooth: usize,
    pub rsi_window: usize,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub bb_window: usize,
    pub bb_stddev_mult_x100: u32,
}

impl Default for IndicatorParams {
    fn default() -> Self {
        Self {
            stoch_window: stochastic::DEFAULT_WINDOW,
            stoch_smooth: stochastic::DEFAULT_SMOOTH,
            rsi_window: rsi::DEFAULT_PERIOD,
            macd_fast: macd::DEFAULT_FAST,
            macd_slow: macd::DEFAULT_SLOW,
            macd_signal: macd::DEFAULT_SIGNAL,
            bb_window: bollinger::DEFAULT_PERIOD,
            bb_stddev_mult_x100: bollinger::DEFAULT_STDDEV_MULT_X100,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IndicatorKey {
    Ma5,
    Ma20,
    Ma60,
    SlowK,
    SlowD,
    Rsi,
    Macd,
    MacdSignal,
    MacdHist,
    BbUpper,
    BbMiddle,
    BbLower,
}

impl IndicatorKey {
    pub const ALL: [IndicatorKey; 12] = [
        IndicatorKey::Ma5,
        IndicatorKey::Ma20,
        IndicatorKey::Ma60,
        IndicatorKey::SlowK,
        IndicatorKey::SlowD,
        IndicatorKey::Rsi,
        IndicatorKey::Macd,
        IndicatorKey::MacdSignal,
        IndicatorKey::MacdHist,
        IndicatorKey::BbUpper,
        IndicatorKey::BbMiddle,
        IndicatorKey::BbLower,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            IndicatorKey::Ma5 => "MA5",
            IndicatorKey::Ma20 => "MA20",
            IndicatorKey::Ma60 => "MA60",
            IndicatorKey::SlowK => "SlowK",
            IndicatorKey::SlowD => "SlowD",
            IndicatorKey::Rsi => "RSI",
            IndicatorKey::Macd => "MACD",
            IndicatorKey::MacdSignal => "MACDSignal",
            IndicatorKey::MacdHist => "MACDHist",
            IndicatorKey::BbUpper => "BBUpper",
            IndicatorKey::BbMiddle => "BBMiddle",
            IndicatorKey::BbLower => "BBLower",
        }
    }
}

impl fmt::Display for IndicatorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorSet {
    ma5: IndicatorSeries,
    ma20: IndicatorSeries,
    ma60: IndicatorSeries,
    slow_k: IndicatorSeries,
    slow_d: IndicatorSeries,
    rsi: IndicatorSeries,
    macd: IndicatorSeries,
    macd_signal: IndicatorSeries,
    macd_hist: IndicatorSeries,
    bb_upper: IndicatorSeries,
    bb_middle: IndicatorSeries,
    bb_lower: IndicatorSeries,
}

impl IndicatorSet {
    pub fn get(&self, key: IndicatorKey) -> &IndicatorSeries {
        match key {
            IndicatorKey::Ma5 => &self.ma5,
            IndicatorKey::Ma20 => &self.ma20,
            IndicatorKey::Ma60 => &self.ma60,
            IndicatorKey::SlowK => &self.slow_k,
            IndicatorKey::SlowD => &self.slow_d,
            IndicatorKey::Rsi => &self.rsi,
            IndicatorKey::Macd => &self.macd,
            IndicatorKey::MacdSignal => &self.macd_signal,
            IndicatorKey::MacdHist => &self.macd_hist,
            IndicatorKey::BbUpper => &self.bb_upper,
            IndicatorKey::BbMiddle => &self.bb_middle,
            IndicatorKey::BbLower => &self.bb_lower,
        }
    }

    /// Series in presentation column order.
    pub fn iter(&self) -> impl Iterator<Item = (IndicatorKey, &IndicatorSeries)> {
        IndicatorKey::ALL.into_iter().map(move |key| (key, self.get(key)))
    }

    pub fn len(&self) -> usize {
        self.ma5.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ma5.is_empty()
    }
}

pub fn compute_indicators(
    series: &Series,
    params: &IndicatorParams,
) -> Result<IndicatorSet, AnalysisError> {
    let [short, mid, long] = MA_PERIODS;
    let stoch = calculate_stochastic(series, params.stoch_window, params.stoch_smooth)?;
    let macd = calculate_macd(
        series,
        params.macd_fast,
        params.macd_slow,
        params.macd_signal,
    )?;
    let bands = calculate_bollinger(series, params.bb_window, params.bb_stddev_mult_x100)?;

    Ok(IndicatorSet {
        ma5: calculate_sma(series, short)?,
        ma20: calculate_sma(series, mid)?,
        ma60: calculate_sma(series, long)?,
        slow_k: stoch.slow_k,
        slow_d: stoch.slow_d,
        rsi: calculate_rsi(series, params.rsi_window)?,
        macd: macd.line,
        macd_signal: macd.signal,
        macd_hist: macd.histogram,
        bb_upper: bands.upper,
        bb_middle: bands.middle,
        bb_lower: bands.lower,
    })
}
