#![allow(dead_code)]

use chrono::NaiveDate;
use std::collections::HashMap;
pub use twscan::domain::ohlcv::Bar;
use twscan::domain::error::TwscanError;
use twscan::ports::data_port::DataPort;

pub struct MockDataPort {
    pub data: HashMap<String, Vec<Bar>>,
    pub names: HashMap<String, String>,
    pub errors: HashMap<String, String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            names: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_bars(mut self, ticker: &str, bars: Vec<Bar>) -> Self {
        self.data.insert(ticker.to_string(), bars);
        self
    }

    pub fn with_name(mut self, ticker: &str, name: &str) -> Self {
        self.names.insert(ticker.to_string(), name.to_string());
        self
    }

    pub fn with_error(mut self, ticker: &str, reason: &str) -> Self {
        self.errors.insert(ticker.to_string(), reason.to_string());
        self
    }
}

impl DataPort for MockDataPort {
    fn fetch_bars(
        &self,
        ticker: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<Bar>, TwscanError> {
        if let Some(reason) = self.errors.get(ticker) {
            return Err(TwscanError::Fetch {
                reason: reason.clone(),
            });
        }
        Ok(self
            .data
            .get(ticker)
            .map(|bars| {
                bars.iter()
                    .filter(|b| b.date >= start_date && b.date <= end_date)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn security_name(&self, ticker: &str) -> Result<Option<String>, TwscanError> {
        Ok(self.names.get(ticker).cloned())
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Bar with a one-point range around `close`.
pub fn make_bar(date_str: &str, close: f64, volume: u64) -> Bar {
    let date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d").unwrap();
    Bar::new(date, close, close + 1.0, close - 1.0, close).with_volume(volume)
}

/// Consecutive calendar days from `start_date`, one close per entry.
pub fn bars_from_closes(start_date: &str, closes: &[f64]) -> Vec<Bar> {
    let start = NaiveDate::parse_from_str(start_date, "%Y-%m-%d").unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &c)| {
            Bar::new(start + chrono::Duration::days(i as i64), c, c, c, c).with_volume(1_000)
        })
        .collect()
}

/// `count` bars drifting up by half a point a day with alternating volume.
pub fn generate_bars(start_date: &str, count: usize, start_price: f64) -> Vec<Bar> {
    let start = NaiveDate::parse_from_str(start_date, "%Y-%m-%d").unwrap();
    (0..count)
        .map(|i| {
            let close = start_price + i as f64 * 0.5;
            let volume = if i % 2 == 0 { 1_000 } else { 1_500 };
            Bar::new(
                start + chrono::Duration::days(i as i64),
                close - 0.25,
                close + 1.0,
                close - 1.0,
                close,
            )
            .with_volume(volume)
        })
        .collect()
}
