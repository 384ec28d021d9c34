//! Daily OHLCV bar representation.

use chrono::NaiveDate;

/// One trading day. `low <= open,close <= high` is not enforced; upstream
/// values are carried through untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct Bar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: Option<u64>,
}

impl Bar {
    pub fn new(date: NaiveDate, open: f64, high: f64, low: f64, close: f64) -> Self {
        Self {
            date,
            open,
            high,
            low,
            close,
            volume: None,
        }
    }

    pub fn with_volume(mut self, volume: u64) -> Self {
        self.volume = Some(volume);
        self
    }

    /// close - previous close
    pub fn change_from(&self, prev_close: f64) -> f64 {
        self.close - prev_close
    }
}
