//! Configuration validation.
//!
//! Validates every config field before an analysis run. Keys that have a
//! default may be absent; keys that are present must be well formed.

use crate::domain::analysis::parse_tickers;
use crate::domain::error::TwscanError;
use crate::ports::config_port::ConfigPort;
use chrono::NaiveDate;

pub const DATA_SOURCES: [&str; 3] = ["twse", "csv", "sqlite"];

pub fn validate_data_config(config: &dyn ConfigPort) -> Result<(), TwscanError> {
    let source = config
        .get_string("data", "source")
        .unwrap_or_else(|| "twse".to_string());
    let source = source.trim().to_lowercase();
    if !DATA_SOURCES.contains(&source.as_str()) {
        return Err(invalid(
            "data",
            "source",
            format!("source must be one of {}", DATA_SOURCES.join(", ")),
        ));
    }
    if source == "csv" {
        match config.get_string("data", "csv_dir") {
            Some(s) if !s.trim().is_empty() => {}
            _ => return Err(missing("data", "csv_dir")),
        }
    }
    let timeout = config.get_int("twse", "timeout_secs", 30);
    if timeout < 1 {
        return Err(invalid(
            "twse",
            "timeout_secs",
            "timeout_secs must be at least 1".to_string(),
        ));
    }
    Ok(())
}

pub fn validate_analysis_config(config: &dyn ConfigPort) -> Result<(), TwscanError> {
    validate_dates(config)?;
    validate_tickers(config)?;
    for key in ["min_bars", "workers"] {
        if config.get_int("analysis", key, 1) < 1 {
            return Err(invalid(
                "analysis",
                key,
                format!("{} must be at least 1", key),
            ));
        }
    }
    Ok(())
}

pub fn validate_indicator_config(config: &dyn ConfigPort) -> Result<(), TwscanError> {
    for (key, default) in [
        ("stoch_window", 14),
        ("stoch_smooth", 3),
        ("rsi_window", 14),
        ("macd_fast", 12),
        ("macd_slow", 26),
        ("macd_signal", 9),
        ("bb_window", 20),
    ] {
        if config.get_int("indicators", key, default) < 1 {
            return Err(invalid(
                "indicators",
                key,
                format!("{} must be at least 1", key),
            ));
        }
    }

    let fast = config.get_int("indicators", "macd_fast", 12);
    let slow = config.get_int("indicators", "macd_slow", 26);
    if fast >= slow {
        return Err(invalid(
            "indicators",
            "macd_fast",
            "macd_fast must be shorter than macd_slow".to_string(),
        ));
    }

    let k = config.get_double("indicators", "bb_k", 2.0);
    if k <= 0.0 {
        return Err(invalid(
            "indicators",
            "bb_k",
            "bb_k must be positive".to_string(),
        ));
    }
    Ok(())
}

pub fn validate_signal_config(config: &dyn ConfigPort) -> Result<(), TwscanError> {
    for (key, default) in [("stoch_low_threshold", 20.0), ("rsi_threshold", 30.0)] {
        let value = config.get_double("signals", key, default);
        if !(0.0..=100.0).contains(&value) {
            return Err(invalid(
                "signals",
                key,
                format!("{} must be between 0 and 100", key),
            ));
        }
    }
    Ok(())
}

pub fn validate_all(config: &dyn ConfigPort) -> Result<(), TwscanError> {
    validate_data_config(config)?;
    validate_analysis_config(config)?;
    validate_indicator_config(config)?;
    validate_signal_config(config)?;
    Ok(())
}

/// Parses an optional `YYYY-MM-DD` value from `[section] key`.
pub fn parse_config_date(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<NaiveDate>, TwscanError> {
    match config.get_string(section, key) {
        None => Ok(None),
        Some(s) if s.trim().is_empty() => Ok(None),
        Some(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .map(Some)
            .map_err(|_| {
                invalid(
                    section,
                    key,
                    format!("invalid {} format, expected YYYY-MM-DD", key),
                )
            }),
    }
}

fn validate_dates(config: &dyn ConfigPort) -> Result<(), TwscanError> {
    let start_date = parse_config_date(config, "analysis", "start_date")?;
    let end_date = parse_config_date(config, "analysis", "end_date")?;

    if let (Some(start), Some(end)) = (start_date, end_date) {
        if start > end {
            return Err(invalid(
                "analysis",
                "start_date",
                "start_date must not be after end_date".to_string(),
            ));
        }
    }
    Ok(())
}

fn validate_tickers(config: &dyn ConfigPort) -> Result<(), TwscanError> {
    match config.get_string("analysis", "tickers") {
        Some(s) if !s.trim().is_empty() => parse_tickers(&s)
            .map(|_| ())
            .map_err(|e| invalid("analysis", "tickers", e.to_string())),
        _ => Ok(()),
    }
}

fn invalid(section: &str, key: &str, reason: String) -> TwscanError {
    TwscanError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason,
    }
}

fn missing(section: &str, key: &str) -> TwscanError {
    TwscanError::ConfigMissing {
        section: section.to_string(),
        key: key.to_string(),
    }
}
