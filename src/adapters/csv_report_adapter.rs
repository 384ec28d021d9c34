//! Tabular CSV report: one row per bar with every indicator and signal.

use crate::domain::analysis::Analysis;
use crate::domain::error::TwscanError;
use crate::ports::report_port::ReportPort;
use std::fs;
use std::path::Path;
use tracing::info;

const BAR_COLUMNS: [&str; 6] = ["date", "open", "high", "low", "close", "volume"];

pub struct CsvReportAdapter {
    precision: usize,
}

impl Default for CsvReportAdapter {
    fn default() -> Self {
        Self { precision: 4 }
    }
}

impl CsvReportAdapter {
    pub fn new(precision: usize) -> Self {
        Self { precision }
    }

    /// Header row: bar columns, indicator keys, then signal names.
    pub fn header(analysis: &Analysis) -> Vec<String> {
        BAR_COLUMNS
            .iter()
            .map(|c| c.to_string())
            .chain(analysis.indicators.iter().map(|(key, _)| key.name().to_string()))
            .chain(analysis.signals.named().into_iter().map(|(name, _)| name.to_string()))
            .collect()
    }

    pub fn rows(&self, analysis: &Analysis) -> Vec<Vec<String>> {
        let signals = analysis.signals.named();
        let fmt = |v: f64| format!("{:.*}", self.precision, v);

        analysis
            .series
            .bars()
            .iter()
            .enumerate()
            .map(|(i, bar)| {
                let mut row = vec![
                    bar.date.format("%Y-%m-%d").to_string(),
                    fmt(bar.open),
                    fmt(bar.high),
                    fmt(bar.low),
                    fmt(bar.close),
                    bar.volume.map(|v| v.to_string()).unwrap_or_default(),
                ];
                row.extend(
                    analysis
                        .indicators
                        .iter()
                        .map(|(_, series)| series.value_at(i).map(fmt).unwrap_or_default()),
                );
                row.extend(
                    signals
                        .iter()
                        .map(|(_, mask)| (if mask.is_active(i) { "1" } else { "0" }).to_string()),
                );
                row
            })
            .collect()
    }
}

impl ReportPort for CsvReportAdapter {
    fn write(&self, analysis: &Analysis, output_path: &str) -> Result<(), TwscanError> {
        let path = Path::new(output_path);
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let csv_error = |e: csv::Error| TwscanError::Io(std::io::Error::other(e));
        let mut wtr = csv::Writer::from_path(path).map_err(csv_error)?;
        wtr.write_record(Self::header(analysis)).map_err(csv_error)?;
        for row in self.rows(analysis) {
            wtr.write_record(&row).map_err(csv_error)?;
        }
        wtr.flush()?;

        info!(ticker = %analysis.ticker, path = output_path, "report written");
        Ok(())
    }
}
