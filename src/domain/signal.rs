//! Signal evaluation over indicator series.
//!
//! # Evaluation Semantics
//!
//! - Every predicate yields a [`SignalMask`] aligned with its inputs
//! - A position is `false` whenever an input is undefined there
//! - Crossing predicates look one bar back: they are `false` at index 0 and
//!   wherever an input is undefined at the prior bar
//! - [`composite_and`] intersects masks; with no masks it is all `true`

use crate::domain::error::AnalysisError;
use crate::domain::indicator::IndicatorSeries;
use crate::domain::indicator_set::{IndicatorKey, IndicatorSet};
use crate::domain::series::Series;
use chrono::NaiveDate;
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_STOCH_LOW_THRESHOLD: f64 = 20.0;
pub const DEFAULT_RSI_THRESHOLD: f64 = 30.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignalPoint {
    pub date: NaiveDate,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalMask {
    pub values: Vec<SignalPoint>,
}

impl SignalMask {
    fn from_flags(dates: &[NaiveDate], flags: impl IntoIterator<Item = bool>) -> Self {
        let values = dates
            .iter()
            .zip(flags)
            .map(|(&date, active)| SignalPoint { date, active })
            .collect();
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn is_active(&self, index: usize) -> bool {
        self.values.get(index).is_some_and(|p| p.active)
    }

    pub fn active_count(&self) -> usize {
        self.values.iter().filter(|p| p.active).count()
    }

    pub fn active_dates(&self) -> Vec<NaiveDate> {
        self.values
            .iter()
            .filter(|p| p.active)
            .map(|p| p.date)
            .collect()
    }

    /// Element-wise AND of two masks over the same dates.
    pub fn and(&self, other: &SignalMask) -> Result<SignalMask, AnalysisError> {
        if self.len() != other.len() {
            return Err(AnalysisError::MisalignedSeries {
                reason: format!("mask of {} points vs {} points", self.len(), other.len()),
            });
        }
        let values = self
            .values
            .iter()
            .zip(&other.values)
            .map(|(a, b)| {
                if a.date != b.date {
                    return Err(AnalysisError::MisalignedSeries {
                        reason: format!("mask dates {} and {} differ", a.date, b.date),
                    });
                }
                Ok(SignalPoint {
                    date: a.date,
                    active: a.active && b.active,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(SignalMask { values })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SignalKind {
    StochasticGoldenCross,
    VolumeIncrease,
    MacdBullishCross,
    RsiOversold,
    BullishMaAlignment,
}

impl SignalKind {
    pub const ALL: [SignalKind; 5] = [
        SignalKind::StochasticGoldenCross,
        SignalKind::VolumeIncrease,
        SignalKind::MacdBullishCross,
        SignalKind::RsiOversold,
        SignalKind::BullishMaAlignment,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            SignalKind::StochasticGoldenCross => "StochasticGoldenCross",
            SignalKind::VolumeIncrease => "VolumeIncrease",
            SignalKind::MacdBullishCross => "MACDBullishCross",
            SignalKind::RsiOversold => "RSIOversold",
            SignalKind::BullishMaAlignment => "BullishMAAlignment",
        }
    }

    /// Key under the `[signals]` config section.
    pub fn config_key(&self) -> &'static str {
        match self {
            SignalKind::StochasticGoldenCross => "stochastic_golden_cross",
            SignalKind::VolumeIncrease => "volume_increase",
            SignalKind::MacdBullishCross => "macd_bullish_cross",
            SignalKind::RsiOversold => "rsi_oversold",
            SignalKind::BullishMaAlignment => "bullish_ma_alignment",
        }
    }
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown signal: {0}")]
pub struct UnknownSignal(pub String);

impl FromStr for SignalKind {
    type Err = UnknownSignal;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        SignalKind::ALL
            .into_iter()
            .find(|k| {
                k.config_key().eq_ignore_ascii_case(wanted) || k.name().eq_ignore_ascii_case(wanted)
            })
            .ok_or_else(|| UnknownSignal(wanted.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SignalParams {
    pub stoch_low_threshold: f64,
    pub rsi_threshold: f64,
    /// Predicates folded into the generic composite.
    pub enabled: Vec<SignalKind>,
}

impl Default for SignalParams {
    fn default() -> Self {
        Self {
            stoch_low_threshold: DEFAULT_STOCH_LOW_THRESHOLD,
            rsi_threshold: DEFAULT_RSI_THRESHOLD,
            enabled: Vec::new(),
        }
    }
}

/// Dates shared by every input; fails on empty or misaligned inputs.
fn aligned_dates(inputs: &[&IndicatorSeries]) -> Result<Vec<NaiveDate>, AnalysisError> {
    let first = inputs.first().ok_or(AnalysisError::EmptySeries)?;
    if first.is_empty() {
        return Err(AnalysisError::EmptySeries);
    }
    let dates = first.dates();
    for other in &inputs[1..] {
        if other.len() != dates.len() {
            return Err(AnalysisError::MisalignedSeries {
                reason: format!(
                    "{} has {} points, {} has {}",
                    first.indicator_type,
                    dates.len(),
                    other.indicator_type,
                    other.len()
                ),
            });
        }
        if other.values.iter().zip(&dates).any(|(p, d)| p.date != *d) {
            return Err(AnalysisError::MisalignedSeries {
                reason: format!(
                    "{} and {} cover different dates",
                    first.indicator_type, other.indicator_type
                ),
            });
        }
    }
    Ok(dates)
}

pub fn stochastic_golden_cross(
    slow_k: &IndicatorSeries,
    slow_d: &IndicatorSeries,
    low_threshold: f64,
) -> Result<SignalMask, AnalysisError> {
    let dates = aligned_dates(&[slow_k, slow_d])?;
    let flags = (0..dates.len()).map(|i| {
        if i == 0 {
            return false;
        }
        match (
            slow_k.value_at(i - 1),
            slow_d.value_at(i - 1),
            slow_k.value_at(i),
            slow_d.value_at(i),
        ) {
            (Some(k_prev), Some(d_prev), Some(k), Some(d)) => {
                k_prev < d_prev && k > d && k < low_threshold && d < low_threshold
            }
            _ => false,
        }
    });
    Ok(SignalMask::from_flags(&dates, flags))
}

pub fn volume_increase(series: &Series) -> Result<SignalMask, AnalysisError> {
    series.ensure_not_empty()?;
    let volumes = series.volumes();
    let flags = (0..volumes.len()).map(|i| {
        if i == 0 {
            return false;
        }
        match (volumes[i - 1], volumes[i]) {
            (Some(prev), Some(curr)) => curr > prev,
            _ => false,
        }
    });
    Ok(SignalMask::from_flags(&series.dates(), flags))
}

pub fn macd_bullish_cross(histogram: &IndicatorSeries) -> Result<SignalMask, AnalysisError> {
    let dates = aligned_dates(&[histogram])?;
    let flags = (0..dates.len()).map(|i| {
        if i == 0 {
            return false;
        }
        match (histogram.value_at(i - 1), histogram.value_at(i)) {
            (Some(prev), Some(curr)) => prev < 0.0 && curr > 0.0,
            _ => false,
        }
    });
    Ok(SignalMask::from_flags(&dates, flags))
}

pub fn rsi_oversold(rsi: &IndicatorSeries, threshold: f64) -> Result<SignalMask, AnalysisError> {
    let dates = aligned_dates(&[rsi])?;
    let flags = rsi.values.iter().map(|p| p.value.is_some_and(|v| v < threshold));
    Ok(SignalMask::from_flags(&dates, flags))
}

pub fn bullish_ma_alignment(
    ma_short: &IndicatorSeries,
    ma_mid: &IndicatorSeries,
    ma_long: &IndicatorSeries,
) -> Result<SignalMask, AnalysisError> {
    let dates = aligned_dates(&[ma_short, ma_mid, ma_long])?;
    let flags = (0..dates.len()).map(|i| {
        match (ma_short.value_at(i), ma_mid.value_at(i), ma_long.value_at(i)) {
            (Some(s), Some(m), Some(l)) => s > m && m > l,
            _ => false,
        }
    });
    Ok(SignalMask::from_flags(&dates, flags))
}

/// AND over any subset of masks on `series`' date index.
pub fn composite_and(series: &Series, masks: &[&SignalMask]) -> Result<SignalMask, AnalysisError> {
    series.ensure_not_empty()?;
    let dates = series.dates();
    masks
        .iter()
        .try_fold(SignalMask::from_flags(&dates, std::iter::repeat(true)), |acc, mask| {
            acc.and(mask)
        })
}

/// Stochastic golden cross with RSI oversold, reported as its own category.
pub fn composite_signal(
    slow_k: &IndicatorSeries,
    slow_d: &IndicatorSeries,
    rsi: &IndicatorSeries,
    low_threshold: f64,
    rsi_threshold: f64,
) -> Result<SignalMask, AnalysisError> {
    let cross = stochastic_golden_cross(slow_k, slow_d, low_threshold)?;
    let oversold = rsi_oversold(rsi, rsi_threshold)?;
    cross.and(&oversold)
}

#[derive(Debug, Clone, PartialEq)]
pub struct SignalSet {
    pub enabled: Vec<SignalKind>,
    predicates: Vec<(SignalKind, SignalMask)>,
    pub composite: SignalMask,
    pub composite_signal: SignalMask,
}

impl SignalSet {
    pub const COMPOSITE: &'static str = "Composite";
    pub const COMPOSITE_SIGNAL: &'static str = "CompositeSignal";

    pub fn get(&self, kind: SignalKind) -> Option<&SignalMask> {
        self.predicates
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, mask)| mask)
    }

    pub fn any_enabled(&self) -> bool {
        !self.enabled.is_empty()
    }

    /// Every mask by presentation name: the base predicates, then
    /// `Composite` and `CompositeSignal`.
    pub fn named(&self) -> Vec<(&'static str, &SignalMask)> {
        let mut out: Vec<(&'static str, &SignalMask)> = self
            .predicates
            .iter()
            .map(|(kind, mask)| (kind.name(), mask))
            .collect();
        out.push((Self::COMPOSITE, &self.composite));
        out.push((Self::COMPOSITE_SIGNAL, &self.composite_signal));
        out
    }
}

pub fn evaluate_signals(
    series: &Series,
    indicators: &IndicatorSet,
    params: &SignalParams,
) -> Result<SignalSet, AnalysisError> {
    let slow_k = indicators.get(IndicatorKey::SlowK);
    let slow_d = indicators.get(IndicatorKey::SlowD);
    let rsi = indicators.get(IndicatorKey::Rsi);

    let predicates = vec![
        (
            SignalKind::StochasticGoldenCross,
            stochastic_golden_cross(slow_k, slow_d, params.stoch_low_threshold)?,
        ),
        (SignalKind::VolumeIncrease, volume_increase(series)?),
        (
            SignalKind::MacdBullishCross,
            macd_bullish_cross(indicators.get(IndicatorKey::MacdHist))?,
        ),
        (
            SignalKind::RsiOversold,
            rsi_oversold(rsi, params.rsi_threshold)?,
        ),
        (
            SignalKind::BullishMaAlignment,
            bullish_ma_alignment(
                indicators.get(IndicatorKey::Ma5),
                indicators.get(IndicatorKey::Ma20),
                indicators.get(IndicatorKey::Ma60),
            )?,
        ),
    ];

    let mut enabled = params.enabled.clone();
    enabled.sort();
    enabled.dedup();

    let selected: Vec<&SignalMask> = predicates
        .iter()
        .filter(|(kind, _)| enabled.contains(kind))
        .map(|(_, mask)| mask)
        .collect();
    let composite = composite_and(series, &selected)?;
    let composite_signal = composite_signal(
        slow_k,
        slow_d,
        rsi,
        params.stoch_low_threshold,
        params.rsi_threshold,
    )?;

    Ok(SignalSet {
        enabled,
        predicates,
        composite,
        composite_signal,
    })
}
