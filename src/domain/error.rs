//! Domain error types.
//!
//! [`AnalysisError`] is raised by the indicator and signal engine;
//! [`TwscanError`] wraps it together with every collaborator failure.

use chrono::NaiveDate;

/// Precondition violations of the pure indicator/signal engine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AnalysisError {
    #[error("series contains no bars")]
    EmptySeries,

    #[error("malformed series: {reason}")]
    MalformedSeries { reason: String },

    #[error("misaligned series: {reason}")]
    MisalignedSeries { reason: String },
}

/// Top-level error type for twscan.
#[derive(Debug, thiserror::Error)]
pub enum TwscanError {
    #[error("database error: {reason}")]
    Database { reason: String },

    #[error("database query error: {reason}")]
    DatabaseQuery { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("fetch error: {reason}")]
    Fetch { reason: String },

    #[error("data parse error: {reason}")]
    DataParse { reason: String },

    #[error("reference cache error: {reason}")]
    ReferenceCache { reason: String },

    #[error("no data for {ticker}")]
    NoData { ticker: String },

    #[error("insufficient data for {ticker}: have {bars} bars, need {minimum}")]
    InsufficientData {
        ticker: String,
        bars: usize,
        minimum: usize,
    },

    #[error("analysis of {ticker} ({start} to {end}) failed: {source}")]
    Analysis {
        ticker: String,
        start: NaiveDate,
        end: NaiveDate,
        #[source]
        source: AnalysisError,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl TwscanError {
    /// Process exit status for this error kind.
    pub fn exit_status(&self) -> u8 {
        match self {
            TwscanError::Io(_) => 1,
            TwscanError::ConfigParse { .. }
            | TwscanError::ConfigMissing { .. }
            | TwscanError::ConfigInvalid { .. } => 2,
            TwscanError::Database { .. } | TwscanError::DatabaseQuery { .. } => 3,
            TwscanError::Fetch { .. }
            | TwscanError::DataParse { .. }
            | TwscanError::ReferenceCache { .. } => 4,
            TwscanError::NoData { .. } | TwscanError::InsufficientData { .. } => 5,
            TwscanError::Analysis { .. } => 6,
        }
    }
}

impl From<&TwscanError> for std::process::ExitCode {
    fn from(err: &TwscanError) -> Self {
        std::process::ExitCode::from(err.exit_status())
    }
}
