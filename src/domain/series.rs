//! Date-indexed bar container read by every indicator.
//!
//! A [`Series`] is only built through [`Series::load`], which enforces
//! strictly ascending, unique dates. Slicing may produce an empty series;
//! indicator functions reject that with [`AnalysisError::EmptySeries`].

use crate::domain::error::AnalysisError;
use crate::domain::ohlcv::Bar;
use chrono::NaiveDate;

#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    bars: Vec<Bar>,
}

impl Series {
    pub fn load(bars: Vec<Bar>) -> Result<Self, AnalysisError> {
        if bars.is_empty() {
            return Err(AnalysisError::MalformedSeries {
                reason: "at least one bar is required".into(),
            });
        }

        for pair in bars.windows(2) {
            if pair[1].date == pair[0].date {
                return Err(AnalysisError::MalformedSeries {
                    reason: format!("duplicate date {}", pair[1].date),
                });
            }
            if pair[1].date < pair[0].date {
                return Err(AnalysisError::MalformedSeries {
                    reason: format!("{} follows {} out of order", pair[1].date, pair[0].date),
                });
            }
        }

        Ok(Self { bars })
    }

    /// Bars with `start <= date <= end`. No overlap gives an empty series.
    pub fn slice(&self, start: NaiveDate, end: NaiveDate) -> Series {
        if start > end {
            return Series { bars: Vec::new() };
        }
        let from = self.bars.partition_point(|b| b.date < start);
        let to = self.bars.partition_point(|b| b.date <= end);
        Series {
            bars: self.bars[from..to].to_vec(),
        }
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.bars.iter().map(|b| b.date).collect()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    pub fn highs(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.high).collect()
    }

    pub fn lows(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.low).collect()
    }

    pub fn volumes(&self) -> Vec<Option<u64>> {
        self.bars.iter().map(|b| b.volume).collect()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.bars.first().map(|b| b.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.bars.last().map(|b| b.date)
    }

    pub(crate) fn ensure_not_empty(&self) -> Result<(), AnalysisError> {
        if self.bars.is_empty() {
            Err(AnalysisError::EmptySeries)
        } else {
            Ok(())
        }
    }
}
