//! CLI definition and dispatch.

use chrono::{Months, NaiveDate};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info, warn};

use crate::adapters::console_report::{render_skipped, render_summary};
use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::csv_report_adapter::CsvReportAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::reference_cache::{FileReferenceStore, IndustryCache};
use crate::adapters::twse_adapter::TwseAdapter;
use crate::adapters::twse_isin_adapter::TwseIsinSource;
use crate::domain::analysis::{
    parse_tickers, run_universe, AnalysisSettings, DEFAULT_WORKERS, MIN_ANALYSIS_BARS,
};
use crate::domain::config_validation::{parse_config_date, validate_all};
use crate::domain::error::TwscanError;
use crate::domain::indicator::{bollinger, macd, rsi, stochastic};
use crate::domain::indicator_set::IndicatorParams;
use crate::domain::industry::ticker_from_label;
use crate::domain::signal::{
    SignalKind, SignalParams, DEFAULT_RSI_THRESHOLD, DEFAULT_STOCH_LOW_THRESHOLD,
};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::reference_port::ReferenceStore;
use crate::ports::report_port::ReportPort;

pub const DEFAULT_REFERENCE_FILE: &str = "twse_stock_list.csv";

#[derive(Parser, Debug)]
#[command(name = "twscan", about = "Technical indicator and signal scanner for TWSE equities")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Compute indicators and signals for one or more tickers
    Analyze {
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Comma-separated tickers, e.g. 2330,2317
        #[arg(long)]
        tickers: Option<String>,
        /// Analyse every security in this industry
        #[arg(long)]
        industry: Option<String>,
        /// YYYY-MM-DD, defaults to one year before the end date
        #[arg(long)]
        start: Option<String>,
        /// YYYY-MM-DD, defaults to today
        #[arg(long)]
        end: Option<String>,
        /// Conditions folded into the composite; replaces [signals] flags
        #[arg(long = "signal", value_delimiter = ',')]
        signals: Vec<String>,
        /// twse, csv or sqlite
        #[arg(long)]
        source: Option<String>,
        /// Directory for per-ticker CSV reports
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// List industries, or the securities in one industry
    Industries {
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(long)]
        industry: Option<String>,
        /// Re-download the listing even when a cached copy exists
        #[arg(long)]
        refresh: bool,
    },
    /// Download daily bars from TWSE into the SQLite store
    Fetch {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        tickers: Option<String>,
        #[arg(long)]
        start: Option<String>,
        #[arg(long)]
        end: Option<String>,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    let result = match cli.command {
        Command::Analyze {
            config,
            tickers,
            industry,
            start,
            end,
            signals,
            source,
            output,
        } => run_analyze(AnalyzeArgs {
            config,
            tickers,
            industry,
            start,
            end,
            signals,
            source,
            output,
        }),
        Command::Industries {
            config,
            industry,
            refresh,
        } => run_industries(config.as_deref(), industry.as_deref(), refresh),
        Command::Fetch {
            config,
            tickers,
            start,
            end,
        } => run_fetch(&config, tickers.as_deref(), start.as_deref(), end.as_deref()),
        Command::Validate { config } => run_validate(&config),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            (&e).into()
        }
    }
}

pub fn load_config(path: Option<&Path>) -> Result<FileConfigAdapter, TwscanError> {
    match path {
        Some(path) => {
            info!(path = %path.display(), "loading config");
            FileConfigAdapter::from_file(path)
        }
        None => FileConfigAdapter::from_string("").map_err(|reason| TwscanError::ConfigParse {
            file: "<defaults>".to_string(),
            reason,
        }),
    }
}

fn config_usize(config: &dyn ConfigPort, section: &str, key: &str, default: usize) -> usize {
    config.get_int(section, key, default as i64).max(0) as usize
}

pub fn build_indicator_params(config: &dyn ConfigPort) -> IndicatorParams {
    let bb_k = config.get_double("indicators", "bb_k", 2.0);
    IndicatorParams {
        stoch_window: config_usize(config, "indicators", "stoch_window", stochastic::DEFAULT_WINDOW),
        stoch_smooth: config_usize(config, "indicators", "stoch_smooth", stochastic::DEFAULT_SMOOTH),
        rsi_window: config_usize(config, "indicators", "rsi_window", rsi::DEFAULT_PERIOD),
        macd_fast: config_usize(config, "indicators", "macd_fast", macd::DEFAULT_FAST),
        macd_slow: config_usize(config, "indicators", "macd_slow", macd::DEFAULT_SLOW),
        macd_signal: config_usize(config, "indicators", "macd_signal", macd::DEFAULT_SIGNAL),
        bb_window: config_usize(config, "indicators", "bb_window", bollinger::DEFAULT_PERIOD),
        bb_stddev_mult_x100: (bb_k * 100.0).round().max(0.0) as u32,
    }
}

/// Enabled conditions come from `[signals]` booleans unless `overrides`
/// names them explicitly.
pub fn build_signal_params(
    config: &dyn ConfigPort,
    overrides: &[String],
) -> Result<SignalParams, TwscanError> {
    let enabled = if overrides.is_empty() {
        SignalKind::ALL
            .into_iter()
            .filter(|kind| config.get_bool("signals", kind.config_key(), false))
            .collect()
    } else {
        overrides
            .iter()
            .map(|name| {
                name.parse::<SignalKind>()
                    .map_err(|e| TwscanError::ConfigInvalid {
                        section: "signals".to_string(),
                        key: name.clone(),
                        reason: e.to_string(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?
    };

    Ok(SignalParams {
        stoch_low_threshold: config.get_double(
            "signals",
            "stoch_low_threshold",
            DEFAULT_STOCH_LOW_THRESHOLD,
        ),
        rsi_threshold: config.get_double("signals", "rsi_threshold", DEFAULT_RSI_THRESHOLD),
        enabled,
    })
}

fn parse_date_arg(value: &str, key: &str) -> Result<NaiveDate, TwscanError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| TwscanError::ConfigInvalid {
        section: "analysis".to_string(),
        key: key.to_string(),
        reason: format!("invalid {} format, expected YYYY-MM-DD", key),
    })
}

/// Flags win over config; the end defaults to `today` and the start to one
/// year before the end.
pub fn resolve_dates(
    config: &dyn ConfigPort,
    start_override: Option<&str>,
    end_override: Option<&str>,
    today: NaiveDate,
) -> Result<(NaiveDate, NaiveDate), TwscanError> {
    let end = match end_override {
        Some(s) => parse_date_arg(s, "end_date")?,
        None => parse_config_date(config, "analysis", "end_date")?.unwrap_or(today),
    };
    let start = match start_override {
        Some(s) => parse_date_arg(s, "start_date")?,
        None => match parse_config_date(config, "analysis", "start_date")? {
            Some(d) => d,
            None => end
                .checked_sub_months(Months::new(12))
                .unwrap_or(end - chrono::Duration::days(365)),
        },
    };
    if start > end {
        return Err(TwscanError::ConfigInvalid {
            section: "analysis".to_string(),
            key: "start_date".to_string(),
            reason: format!("start {} is after end {}", start, end),
        });
    }
    Ok((start, end))
}

pub fn build_settings(
    config: &dyn ConfigPort,
    start_override: Option<&str>,
    end_override: Option<&str>,
    signal_overrides: &[String],
    today: NaiveDate,
) -> Result<AnalysisSettings, TwscanError> {
    let (start_date, end_date) = resolve_dates(config, start_override, end_override, today)?;
    Ok(AnalysisSettings {
        start_date,
        end_date,
        min_bars: config_usize(config, "analysis", "min_bars", MIN_ANALYSIS_BARS).max(1),
        workers: config_usize(config, "analysis", "workers", DEFAULT_WORKERS).max(1),
        indicators: build_indicator_params(config),
        signals: build_signal_params(config, signal_overrides)?,
    })
}

/// Tickers from the flag, else from `[analysis] tickers`; empty when neither
/// is set.
pub fn resolve_tickers(
    ticker_override: Option<&str>,
    config: &dyn ConfigPort,
) -> Result<Vec<String>, TwscanError> {
    let raw = match ticker_override {
        Some(s) => s.to_string(),
        None => match config.get_string("analysis", "tickers") {
            Some(s) if !s.trim().is_empty() => s,
            _ => return Ok(Vec::new()),
        },
    };
    // accept "2330 台積電" style labels as well as bare tickers
    let normalized: Vec<&str> = raw.split(',').map(ticker_from_label).collect();
    parse_tickers(&normalized.join(",")).map_err(|e| TwscanError::ConfigInvalid {
        section: "analysis".to_string(),
        key: "tickers".to_string(),
        reason: e.to_string(),
    })
}

fn data_source(config: &dyn ConfigPort, source_override: Option<&str>) -> String {
    source_override
        .map(str::to_string)
        .or_else(|| config.get_string("data", "source"))
        .unwrap_or_else(|| "twse".to_string())
        .trim()
        .to_lowercase()
}

fn csv_adapter(config: &dyn ConfigPort) -> Result<CsvAdapter, TwscanError> {
    let dir = config
        .get_string("data", "csv_dir")
        .ok_or_else(|| TwscanError::ConfigMissing {
            section: "data".to_string(),
            key: "csv_dir".to_string(),
        })?;
    Ok(CsvAdapter::new(PathBuf::from(dir)))
}

pub fn build_data_port(
    config: &dyn ConfigPort,
    source: &str,
) -> Result<Box<dyn DataPort + Send + Sync>, TwscanError> {
    match source {
        "twse" => Ok(Box::new(TwseAdapter::from_config(config)?)),
        "csv" => Ok(Box::new(csv_adapter(config)?)),
        #[cfg(feature = "sqlite")]
        "sqlite" => Ok(Box::new(
            crate::adapters::sqlite_adapter::SqliteAdapter::from_config(config)?,
        )),
        other => Err(TwscanError::ConfigInvalid {
            section: "data".to_string(),
            key: "source".to_string(),
            reason: format!("unsupported data source {:?}", other),
        }),
    }
}

fn reference_store(
    config: &dyn ConfigPort,
) -> Result<Box<dyn ReferenceStore + Send + Sync>, TwscanError> {
    let store = config
        .get_string("reference", "store")
        .unwrap_or_else(|| "file".to_string());
    match store.trim() {
        #[cfg(feature = "sqlite")]
        "sqlite" => Ok(Box::new(
            crate::adapters::sqlite_adapter::SqliteAdapter::from_config(config)?,
        )),
        "file" => {
            let path = config
                .get_string("reference", "cache_file")
                .unwrap_or_else(|| DEFAULT_REFERENCE_FILE.to_string());
            Ok(Box::new(FileReferenceStore::new(PathBuf::from(path))))
        }
        other => Err(TwscanError::ConfigInvalid {
            section: "reference".to_string(),
            key: "store".to_string(),
            reason: format!("unsupported reference store {:?}", other),
        }),
    }
}

pub fn build_industry_cache(config: &dyn ConfigPort) -> Result<IndustryCache, TwscanError> {
    Ok(IndustryCache::new(
        reference_store(config)?,
        Box::new(TwseIsinSource::from_config(config)?),
    ))
}

struct AnalyzeArgs {
    config: Option<PathBuf>,
    tickers: Option<String>,
    industry: Option<String>,
    start: Option<String>,
    end: Option<String>,
    signals: Vec<String>,
    source: Option<String>,
    output: Option<PathBuf>,
}

fn run_analyze(args: AnalyzeArgs) -> Result<(), TwscanError> {
    let config = load_config(args.config.as_deref())?;
    validate_all(&config)?;

    let today = chrono::Local::now().date_naive();
    let settings = build_settings(
        &config,
        args.start.as_deref(),
        args.end.as_deref(),
        &args.signals,
        today,
    )?;
    let source = data_source(&config, args.source.as_deref());
    let industries = build_industry_cache(&config)?;

    let mut tickers = match (args.tickers.as_deref(), args.industry.as_deref()) {
        (None, Some(industry)) => {
            let groups = industries.groups()?;
            let members = groups.get(industry).ok_or_else(|| TwscanError::ConfigInvalid {
                section: "analysis".to_string(),
                key: "industry".to_string(),
                reason: format!("unknown industry {:?}", industry),
            })?;
            members.iter().map(|e| e.ticker.clone()).collect()
        }
        (flag, _) => resolve_tickers(flag, &config)?,
    };
    if tickers.is_empty() && source == "csv" {
        tickers = csv_adapter(&config)?.list_tickers()?;
    }
    if tickers.is_empty() {
        return Err(TwscanError::ConfigMissing {
            section: "analysis".to_string(),
            key: "tickers".to_string(),
        });
    }

    info!(
        tickers = tickers.len(),
        start = %settings.start_date,
        end = %settings.end_date,
        source = %source,
        "starting analysis"
    );

    let data_port = build_data_port(&config, &source)?;
    let mut run = run_universe(data_port.as_ref(), &tickers, &settings)?;

    // names from the local reference table only; never triggers a download
    match industries.stored_entries() {
        Ok(Some(entries)) => {
            for analysis in run.analyses.iter_mut().filter(|a| a.name.is_none()) {
                analysis.name = entries
                    .iter()
                    .find(|e| e.ticker == analysis.ticker)
                    .map(|e| e.name.clone());
            }
        }
        Ok(None) => {}
        Err(e) => warn!(error = %e, "reference table unavailable"),
    }

    for analysis in &run.analyses {
        println!("{}", render_summary(analysis));
    }
    if !run.skipped.is_empty() {
        print!("{}", render_skipped(&run.skipped));
    }

    let output_dir = args
        .output
        .or_else(|| config.get_string("report", "output_dir").map(PathBuf::from));
    if let Some(dir) = output_dir {
        let paths = CsvReportAdapter::default().write_all(&run.analyses, &dir.to_string_lossy())?;
        for path in paths {
            println!("report: {}", path);
        }
    }

    Ok(())
}

fn run_industries(
    config_path: Option<&Path>,
    industry: Option<&str>,
    refresh: bool,
) -> Result<(), TwscanError> {
    let config = load_config(config_path)?;
    let mut cache = build_industry_cache(&config)?;
    if refresh {
        cache.refresh()?;
    }
    let groups = cache.groups()?;

    match industry {
        Some(name) => {
            let members = groups.get(name).ok_or_else(|| TwscanError::ConfigInvalid {
                section: "reference".to_string(),
                key: "industry".to_string(),
                reason: format!("unknown industry {:?}", name),
            })?;
            for entry in members {
                println!("{}", entry.display_label());
            }
        }
        None => {
            for (name, members) in &groups {
                println!("{} ({})", name, members.len());
            }
        }
    }
    Ok(())
}

fn run_fetch(
    config_path: &Path,
    tickers: Option<&str>,
    start: Option<&str>,
    end: Option<&str>,
) -> Result<(), TwscanError> {
    let config = load_config(Some(config_path))?;
    validate_all(&config)?;

    #[cfg(feature = "sqlite")]
    {
        use crate::adapters::sqlite_adapter::SqliteAdapter;

        let today = chrono::Local::now().date_naive();
        let (start_date, end_date) = resolve_dates(&config, start, end, today)?;
        let tickers = resolve_tickers(tickers, &config)?;
        if tickers.is_empty() {
            return Err(TwscanError::ConfigMissing {
                section: "analysis".to_string(),
                key: "tickers".to_string(),
            });
        }

        let store = SqliteAdapter::from_config(&config)?;
        let twse = TwseAdapter::from_config(&config)?;

        for ticker in &tickers {
            // resume after the last stored day unless a start was given
            let from = match (start, store.data_range(ticker)?) {
                (None, Some((_, last, _))) if last >= start_date => last + chrono::Duration::days(1),
                _ => start_date,
            };
            if from > end_date {
                println!("{}: up to date", ticker);
                continue;
            }
            let bars = twse.fetch_bars(ticker, from, end_date)?;
            let stored = store.insert_bars(ticker, &bars)?;
            println!("{}: stored {} bars ({} to {})", ticker, stored, from, end_date);
        }
        Ok(())
    }

    #[cfg(not(feature = "sqlite"))]
    {
        let _ = (tickers, start, end);
        Err(TwscanError::ConfigInvalid {
            section: "data".to_string(),
            key: "source".to_string(),
            reason: "the sqlite feature is required for fetch".to_string(),
        })
    }
}

fn run_validate(config_path: &Path) -> Result<(), TwscanError> {
    let config = load_config(Some(config_path))?;
    validate_all(&config)?;

    let today = chrono::Local::now().date_naive();
    let settings = build_settings(&config, None, None, &[], today)?;
    let tickers = resolve_tickers(None, &config)?;

    println!("source:     {}", data_source(&config, None));
    println!(
        "tickers:    {}",
        if tickers.is_empty() {
            "(none)".to_string()
        } else {
            tickers.join(", ")
        }
    );
    println!("range:      {} to {}", settings.start_date, settings.end_date);
    println!("min bars:   {}", settings.min_bars);
    let enabled: Vec<&str> = settings.signals.enabled.iter().map(|k| k.name()).collect();
    println!(
        "signals:    {}",
        if enabled.is_empty() {
            "(none)".to_string()
        } else {
            enabled.join(", ")
        }
    );
    println!("Configuration is valid.");
    Ok(())
}
