//! Daily bar acquisition port trait.

use crate::domain::error::TwscanError;
use crate::domain::ohlcv::Bar;
use chrono::NaiveDate;

pub trait DataPort {
    /// Bars for `ticker` within the inclusive range, ascending by date.
    /// An empty Vec means the source has no data for the range.
    fn fetch_bars(
        &self,
        ticker: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<Bar>, TwscanError>;

    /// Display name of the security, when the source knows it.
    fn security_name(&self, _ticker: &str) -> Result<Option<String>, TwscanError> {
        Ok(None)
    }
}
