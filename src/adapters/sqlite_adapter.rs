//! SQLite store for daily bars and the industry reference table.

use crate::domain::error::TwscanError;
use crate::domain::industry::IndustryEntry;
use crate::domain::ohlcv::Bar;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::reference_port::ReferenceStore;
use chrono::NaiveDate;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;
use tracing::debug;

const DATE_FORMAT: &str = "%Y-%m-%d";

pub struct SqliteAdapter {
    pool: Pool<SqliteConnectionManager>,
}

fn pool_error(e: r2d2::Error) -> TwscanError {
    TwscanError::Database {
        reason: e.to_string(),
    }
}

fn query_error(e: rusqlite::Error) -> TwscanError {
    TwscanError::DatabaseQuery {
        reason: e.to_string(),
    }
}

fn parse_stored_date(value: String) -> rusqlite::Result<NaiveDate> {
    NaiveDate::parse_from_str(&value, DATE_FORMAT).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(
            value.len(),
            rusqlite::types::Type::Text,
            Box::new(e),
        )
    })
}

impl SqliteAdapter {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, TwscanError> {
        let db_path =
            config
                .get_string("sqlite", "path")
                .ok_or_else(|| TwscanError::ConfigMissing {
                    section: "sqlite".into(),
                    key: "path".into(),
                })?;

        let pool_size = config.get_int("sqlite", "pool_size", 4).max(1) as u32;

        let manager = SqliteConnectionManager::file(&db_path);
        let pool = Pool::builder()
            .max_size(pool_size)
            .build(manager)
            .map_err(pool_error)?;

        let adapter = Self { pool };
        adapter.initialize_schema()?;
        Ok(adapter)
    }

    pub fn in_memory() -> Result<Self, TwscanError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(pool_error)?;

        let adapter = Self { pool };
        adapter.initialize_schema()?;
        Ok(adapter)
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, TwscanError> {
        self.pool.get().map_err(pool_error)
    }

    pub fn initialize_schema(&self) -> Result<(), TwscanError> {
        self.conn()?
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS bars (
                    ticker TEXT NOT NULL,
                    date TEXT NOT NULL,
                    open REAL NOT NULL,
                    high REAL NOT NULL,
                    low REAL NOT NULL,
                    close REAL NOT NULL,
                    volume INTEGER,
                    PRIMARY KEY (ticker, date)
                );
                CREATE INDEX IF NOT EXISTS idx_bars_date ON bars(date);
                CREATE TABLE IF NOT EXISTS industries (
                    ticker TEXT PRIMARY KEY,
                    name TEXT NOT NULL,
                    industry TEXT NOT NULL
                );",
            )
            .map_err(query_error)
    }

    /// Upserts `bars` for `ticker` in one transaction.
    pub fn insert_bars(&self, ticker: &str, bars: &[Bar]) -> Result<usize, TwscanError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_error)?;

        for bar in bars {
            tx.execute(
                "INSERT OR REPLACE INTO bars (ticker, date, open, high, low, close, volume)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    ticker,
                    bar.date.format(DATE_FORMAT).to_string(),
                    bar.open,
                    bar.high,
                    bar.low,
                    bar.close,
                    bar.volume.map(|v| v as i64)
                ],
            )
            .map_err(query_error)?;
        }

        tx.commit().map_err(query_error)?;
        debug!(ticker, count = bars.len(), "stored bars");
        Ok(bars.len())
    }

    /// First date, last date and bar count stored for `ticker`.
    pub fn data_range(
        &self,
        ticker: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, TwscanError> {
        let conn = self.conn()?;
        let result: (Option<String>, Option<String>, i64) = conn
            .query_row(
                "SELECT MIN(date), MAX(date), COUNT(*) FROM bars WHERE ticker = ?1",
                params![ticker],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .map_err(query_error)?;

        match result {
            (Some(min), Some(max), count) if count > 0 => Ok(Some((
                parse_stored_date(min).map_err(query_error)?,
                parse_stored_date(max).map_err(query_error)?,
                count as usize,
            ))),
            _ => Ok(None),
        }
    }
}

impl DataPort for SqliteAdapter {
    fn fetch_bars(
        &self,
        ticker: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<Bar>, TwscanError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT date, open, high, low, close, volume
                 FROM bars
                 WHERE ticker = ?1 AND date >= ?2 AND date <= ?3
                 ORDER BY date ASC",
            )
            .map_err(query_error)?;

        let rows = stmt
            .query_map(
                params![
                    ticker,
                    start_date.format(DATE_FORMAT).to_string(),
                    end_date.format(DATE_FORMAT).to_string()
                ],
                |row| {
                    let volume: Option<i64> = row.get(5)?;
                    Ok(Bar {
                        date: parse_stored_date(row.get(0)?)?,
                        open: row.get(1)?,
                        high: row.get(2)?,
                        low: row.get(3)?,
                        close: row.get(4)?,
                        volume: volume.and_then(|v| u64::try_from(v).ok()),
                    })
                },
            )
            .map_err(query_error)?;

        rows.collect::<Result<Vec<_>, _>>().map_err(query_error)
    }

    fn security_name(&self, ticker: &str) -> Result<Option<String>, TwscanError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT name FROM industries WHERE ticker = ?1")
            .map_err(query_error)?;
        let mut rows = stmt
            .query_map(params![ticker], |row| row.get::<_, String>(0))
            .map_err(query_error)?;
        rows.next().transpose().map_err(query_error)
    }
}

impl ReferenceStore for SqliteAdapter {
    fn load_entries(&self) -> Result<Option<Vec<IndustryEntry>>, TwscanError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT ticker, name, industry FROM industries ORDER BY ticker")
            .map_err(query_error)?;
        let entries = stmt
            .query_map([], |row| {
                Ok(IndustryEntry {
                    ticker: row.get(0)?,
                    name: row.get(1)?,
                    industry: row.get(2)?,
                })
            })
            .map_err(query_error)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(query_error)?;

        Ok((!entries.is_empty()).then_some(entries))
    }

    fn save_entries(&self, entries: &[IndustryEntry]) -> Result<(), TwscanError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_error)?;
        tx.execute("DELETE FROM industries", []).map_err(query_error)?;
        for entry in entries {
            tx.execute(
                "INSERT OR REPLACE INTO industries (ticker, name, industry) VALUES (?1, ?2, ?3)",
                params![entry.ticker, entry.name, entry.industry],
            )
            .map_err(query_error)?;
        }
        tx.commit().map_err(query_error)
    }
}
