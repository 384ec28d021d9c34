//! Per-ticker analysis and the multi-ticker run.
//!
//! Fetches bars through a [`DataPort`], loads them into a [`Series`], then
//! runs the indicator engine and signal evaluator. Tickers without enough
//! data are skipped rather than failing the whole run.

use crate::domain::error::{AnalysisError, TwscanError};
use crate::domain::indicator_set::{compute_indicators, IndicatorParams, IndicatorSet};
use crate::domain::series::Series;
use crate::domain::signal::{evaluate_signals, SignalParams, SignalSet};
use crate::ports::data_port::DataPort;
use chrono::NaiveDate;
use std::collections::HashSet;
use tracing::{debug, info, warn};

pub const MIN_ANALYSIS_BARS: usize = 5;
/// Tickers analysed concurrently by [`run_universe`].
pub const DEFAULT_WORKERS: usize = 8;

#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisSettings {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub min_bars: usize,
    pub workers: usize,
    pub indicators: IndicatorParams,
    pub signals: SignalParams,
}

impl AnalysisSettings {
    pub fn new(start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self {
            start_date,
            end_date,
            min_bars: MIN_ANALYSIS_BARS,
            workers: DEFAULT_WORKERS,
            indicators: IndicatorParams::default(),
            signals: SignalParams::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Analysis {
    pub ticker: String,
    pub name: Option<String>,
    pub series: Series,
    pub indicators: IndicatorSet,
    pub signals: SignalSet,
}

impl Analysis {
    pub fn display_name(&self) -> String {
        match &self.name {
            Some(name) => format!("{} {}", self.ticker, name),
            None => self.ticker.clone(),
        }
    }
}

/// Runs the engine over an already loaded series.
pub fn analyze(
    ticker: &str,
    name: Option<String>,
    series: Series,
    settings: &AnalysisSettings,
) -> Result<Analysis, TwscanError> {
    let wrap = |source: AnalysisError| TwscanError::Analysis {
        ticker: ticker.to_string(),
        start: settings.start_date,
        end: settings.end_date,
        source,
    };

    let indicators = compute_indicators(&series, &settings.indicators).map_err(wrap)?;
    let signals = evaluate_signals(&series, &indicators, &settings.signals).map_err(wrap)?;

    Ok(Analysis {
        ticker: ticker.to_string(),
        name,
        series,
        indicators,
        signals,
    })
}

/// Fetches `ticker` and analyses it, enforcing `settings.min_bars`.
pub fn analyze_ticker(
    data_port: &dyn DataPort,
    ticker: &str,
    settings: &AnalysisSettings,
) -> Result<Analysis, TwscanError> {
    let bars = data_port.fetch_bars(ticker, settings.start_date, settings.end_date)?;
    if bars.is_empty() {
        return Err(TwscanError::NoData {
            ticker: ticker.to_string(),
        });
    }

    let series = Series::load(bars)
        .map_err(|source| TwscanError::Analysis {
            ticker: ticker.to_string(),
            start: settings.start_date,
            end: settings.end_date,
            source,
        })?
        .slice(settings.start_date, settings.end_date);
    if series.is_empty() {
        return Err(TwscanError::NoData {
            ticker: ticker.to_string(),
        });
    }
    if series.len() < settings.min_bars {
        return Err(TwscanError::InsufficientData {
            ticker: ticker.to_string(),
            bars: series.len(),
            minimum: settings.min_bars,
        });
    }
    debug!(ticker, bars = series.len(), "series loaded");

    let name = match data_port.security_name(ticker) {
        Ok(name) => name,
        Err(e) => {
            warn!(ticker, error = %e, "security name unavailable");
            None
        }
    };

    analyze(ticker, name, series, settings)
}

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum TickerListError {
    #[error("empty token in ticker list")]
    EmptyToken,

    #[error("duplicate ticker: {0}")]
    DuplicateTicker(String),
}

pub fn parse_tickers(input: &str) -> Result<Vec<String>, TickerListError> {
    let mut tickers = Vec::new();
    let mut seen = HashSet::new();

    for token in input.split(',') {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(TickerListError::EmptyToken);
        }
        let ticker = trimmed.to_uppercase();
        if !seen.insert(ticker.clone()) {
            return Err(TickerListError::DuplicateTicker(ticker));
        }
        tickers.push(ticker);
    }

    Ok(tickers)
}

#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    NoData,
    InsufficientBars { bars: usize },
    FetchFailed { reason: String },
    Malformed { reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedTicker {
    pub ticker: String,
    pub reason: SkipReason,
}

#[derive(Debug)]
pub struct UniverseRun {
    pub analyses: Vec<Analysis>,
    pub skipped: Vec<SkippedTicker>,
}

/// Analyses tickers on at most `settings.workers` scoped threads; output
/// keeps input order.
///
/// Tickers with no data, too few bars, a failed fetch or a malformed series
/// are skipped with a warning. Fails with `InsufficientData` when nothing
/// could be analysed.
pub fn run_universe(
    data_port: &(dyn DataPort + Sync),
    tickers: &[String],
    settings: &AnalysisSettings,
) -> Result<UniverseRun, TwscanError> {
    let workers = settings.workers.max(1);
    let mut outcomes: Vec<Result<Analysis, TwscanError>> = Vec::with_capacity(tickers.len());
    for chunk in tickers.chunks(workers) {
        std::thread::scope(|scope| {
            let handles: Vec<_> = chunk
                .iter()
                .map(|ticker| scope.spawn(move || analyze_ticker(data_port, ticker, settings)))
                .collect();
            outcomes.extend(handles.into_iter().zip(chunk).map(|(handle, ticker)| {
                handle.join().unwrap_or_else(|_| {
                    Err(TwscanError::Fetch {
                        reason: format!("worker for {} panicked", ticker),
                    })
                })
            }));
        });
    }

    let mut analyses = Vec::new();
    let mut skipped = Vec::new();

    for (ticker, outcome) in tickers.iter().zip(outcomes) {
        let reason = match outcome {
            Ok(analysis) => {
                info!(ticker = %ticker, bars = analysis.series.len(), "analysed");
                analyses.push(analysis);
                continue;
            }
            Err(TwscanError::NoData { .. }) => {
                warn!(ticker = %ticker, "skipping: no data found");
                SkipReason::NoData
            }
            Err(TwscanError::InsufficientData { bars, minimum, .. }) => {
                warn!(ticker = %ticker, bars, minimum, "skipping: not enough bars");
                SkipReason::InsufficientBars { bars }
            }
            Err(
                e @ (TwscanError::Fetch { .. }
                | TwscanError::DataParse { .. }
                | TwscanError::Database { .. }
                | TwscanError::DatabaseQuery { .. }
                | TwscanError::Io(_)),
            ) => {
                warn!(ticker = %ticker, error = %e, "skipping: fetch failed");
                SkipReason::FetchFailed {
                    reason: e.to_string(),
                }
            }
            Err(TwscanError::Analysis { source, .. }) => {
                warn!(ticker = %ticker, error = %source, "skipping: malformed series");
                SkipReason::Malformed {
                    reason: source.to_string(),
                }
            }
            Err(e) => return Err(e),
        };
        skipped.push(SkippedTicker {
            ticker: ticker.clone(),
            reason,
        });
    }

    if analyses.is_empty() {
        return Err(TwscanError::InsufficientData {
            ticker: "all".to_string(),
            bars: 0,
            minimum: settings.min_bars,
        });
    }

    if !skipped.is_empty() {
        info!(
            analysed = analyses.len(),
            total = tickers.len(),
            "some tickers were skipped"
        );
    }

    Ok(UniverseRun { analyses, skipped })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ohlcv::Bar;
    use crate::domain::signal::SignalKind;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedPort {
        bars: HashMap<String, Vec<Bar>>,
    }

    impl DataPort for FixedPort {
        fn fetch_bars(
            &self,
            ticker: &str,
            start: NaiveDate,
            end: NaiveDate,
        ) -> Result<Vec<Bar>, TwscanError> {
            if ticker == "FAIL" {
                return Err(TwscanError::Fetch {
                    reason: "connection refused".into(),
                });
            }
            Ok(self
                .bars
                .get(ticker)
                .map(|bars| {
                    bars.iter()
                        .filter(|b| b.date >= start && b.date <= end)
                        .cloned()
                        .collect()
                })
                .unwrap_or_default())
        }

        fn security_name(&self, ticker: &str) -> Result<Option<String>, TwscanError> {
            Ok((ticker == "2330").then(|| "台積電".to_string()))
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn bars(n: usize) -> Vec<Bar> {
        (0..n)
            .map(|i| {
                let c = 500.0 + i as f64;
                Bar::new(date(2024, 1, 1) + chrono::Duration::days(i as i64), c, c + 2.0, c - 2.0, c)
                    .with_volume(10_000 + i as u64)
            })
            .collect()
    }

    fn settings() -> AnalysisSettings {
        AnalysisSettings::new(date(2024, 1, 1), date(2024, 12, 31))
    }

    fn port() -> FixedPort {
        let mut map = HashMap::new();
        map.insert("2330".to_string(), bars(40));
        map.insert("2317".to_string(), bars(3));
        map.insert("2454".to_string(), bars(30));
        FixedPort { bars: map }
    }

    #[test]
    fn parse_tickers_basic() {
        assert_eq!(
            parse_tickers(" 2330, 2317 ,0050").unwrap(),
            vec!["2330", "2317", "0050"]
        );
    }

    #[test]
    fn parse_tickers_rejects_bad_lists() {
        assert_eq!(parse_tickers("2330,,2317"), Err(TickerListError::EmptyToken));
        assert_eq!(
            parse_tickers("2330,2330"),
            Err(TickerListError::DuplicateTicker("2330".into()))
        );
    }

    #[test]
    fn analyze_ticker_attaches_name() {
        let analysis = analyze_ticker(&port(), "2330", &settings()).unwrap();
        assert_eq!(analysis.series.len(), 40);
        assert_eq!(analysis.display_name(), "2330 台積電");
        assert_eq!(analysis.indicators.len(), 40);
    }

    #[test]
    fn analyze_ticker_minimum_bars() {
        let err = analyze_ticker(&port(), "2317", &settings()).unwrap_err();
        assert!(matches!(
            err,
            TwscanError::InsufficientData {
                bars: 3,
                minimum: 5,
                ..
            }
        ));
        let err = analyze_ticker(&port(), "9999", &settings()).unwrap_err();
        assert!(matches!(err, TwscanError::NoData { .. }));
    }

    #[test]
    fn analyze_wraps_engine_errors_with_context() {
        let s = settings();
        let empty = Series::load(bars(1)).unwrap().slice(date(2030, 1, 1), date(2030, 2, 1));
        let err = analyze("2330", None, empty, &s).unwrap_err();
        match err {
            TwscanError::Analysis {
                ticker,
                start,
                source,
                ..
            } => {
                assert_eq!(ticker, "2330");
                assert_eq!(start, s.start_date);
                assert_eq!(source, AnalysisError::EmptySeries);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn run_universe_skips_and_keeps_order() {
        let tickers: Vec<String> = ["2454", "2317", "FAIL", "2330", "9999"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let run = run_universe(&port(), &tickers, &settings()).unwrap();

        let analysed: Vec<&str> = run.analyses.iter().map(|a| a.ticker.as_str()).collect();
        assert_eq!(analysed, vec!["2454", "2330"]);
        assert_eq!(run.skipped.len(), 3);
        assert_eq!(run.skipped[0].reason, SkipReason::InsufficientBars { bars: 3 });
        assert!(matches!(run.skipped[1].reason, SkipReason::FetchFailed { .. }));
        assert_eq!(run.skipped[2].reason, SkipReason::NoData);
    }

    #[test]
    fn malformed_series_skips_only_that_ticker() {
        let mut dup = bars(30);
        dup.insert(11, dup[10].clone());
        let mut map = HashMap::new();
        map.insert("2330".to_string(), bars(30));
        map.insert("2317".to_string(), dup);
        let port = FixedPort { bars: map };

        let tickers = vec!["2330".to_string(), "2317".to_string()];
        let run = run_universe(&port, &tickers, &settings()).unwrap();
        assert_eq!(run.analyses.len(), 1);
        assert_eq!(run.analyses[0].ticker, "2330");
        assert_eq!(run.skipped[0].ticker, "2317");
        assert!(matches!(
            &run.skipped[0].reason,
            SkipReason::Malformed { reason } if reason.contains("2024-01-11")
        ));
    }

    struct UnfilteredPort(Vec<Bar>);

    impl DataPort for UnfilteredPort {
        fn fetch_bars(&self, _: &str, _: NaiveDate, _: NaiveDate) -> Result<Vec<Bar>, TwscanError> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn minimum_bars_counted_inside_range() {
        let port = UnfilteredPort(bars(10));
        let mut s = settings();
        s.start_date = date(2024, 1, 8);
        let err = analyze_ticker(&port, "2330", &s).unwrap_err();
        assert!(matches!(
            err,
            TwscanError::InsufficientData {
                bars: 3,
                minimum: 5,
                ..
            }
        ));

        s.start_date = date(2025, 1, 1);
        s.end_date = date(2025, 6, 30);
        let err = analyze_ticker(&port, "2330", &s).unwrap_err();
        assert!(matches!(err, TwscanError::NoData { .. }));
    }

    struct CountingPort {
        active: AtomicUsize,
        peak: AtomicUsize,
    }

    impl DataPort for CountingPort {
        fn fetch_bars(&self, _: &str, _: NaiveDate, _: NaiveDate) -> Result<Vec<Bar>, TwscanError> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(std::time::Duration::from_millis(20));
            self.active.fetch_sub(1, Ordering::SeqCst);
            Ok(bars(10))
        }
    }

    #[test]
    fn run_universe_caps_concurrent_workers() {
        let port = CountingPort {
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        };
        let tickers: Vec<String> = (0..7).map(|i| format!("{}", 1101 + i)).collect();
        let mut s = settings();
        s.workers = 2;

        let run = run_universe(&port, &tickers, &s).unwrap();
        assert_eq!(run.analyses.len(), 7);
        assert!(port.peak.load(Ordering::SeqCst) <= 2);
        let order: Vec<&str> = run.analyses.iter().map(|a| a.ticker.as_str()).collect();
        assert_eq!(order, tickers.iter().map(String::as_str).collect::<Vec<_>>());
    }

    #[test]
    fn run_universe_all_skipped_fails() {
        let tickers = vec!["2317".to_string(), "9999".to_string()];
        let err = run_universe(&port(), &tickers, &settings()).unwrap_err();
        assert!(matches!(err, TwscanError::InsufficientData { .. }));
    }

    #[test]
    fn enabled_signals_reach_composite() {
        let mut s = settings();
        s.signals.enabled = vec![SignalKind::VolumeIncrease];
        let analysis = analyze_ticker(&port(), "2330", &s).unwrap();
        // volume rises every bar after the first
        assert_eq!(analysis.signals.composite.active_count(), 39);
        assert!(analysis.signals.any_enabled());
    }
}
