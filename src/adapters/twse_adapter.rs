//! Taiwan Stock Exchange daily quote adapter.
//!
//! The exchange publishes one `MI_INDEX` report per trading day covering
//! every listed security, so a ticker's history is assembled one calendar
//! day at a time. Day reports are cached per date and shared between
//! tickers, which keeps a multi-ticker run at one request per day.

use crate::domain::error::TwscanError;
use crate::domain::ohlcv::Bar;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use chrono::{Datelike, NaiveDate, Weekday};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;
use tracing::{debug, instrument, warn};

pub const DEFAULT_BASE_URL: &str = "https://www.twse.com.tw/exchangeReport/MI_INDEX";
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

const TICKER_FIELD: &str = "證券代號";
const NAME_FIELD: &str = "證券名稱";
const OPEN_FIELD: &str = "開盤價";
const HIGH_FIELD: &str = "最高價";
const LOW_FIELD: &str = "最低價";
const CLOSE_FIELD: &str = "收盤價";
const VOLUME_FIELD: &str = "成交股數";
const NO_TRADE: &str = "--";

#[derive(Debug, Clone, Deserialize)]
pub struct MiIndexResponse {
    #[serde(default)]
    pub stat: Option<String>,
    #[serde(default)]
    pub tables: Vec<MiIndexTable>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MiIndexTable {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub fields: Vec<String>,
    #[serde(default)]
    pub data: Vec<Vec<serde_json::Value>>,
}

impl MiIndexResponse {
    /// The per-security quote table, identified by its ticker column.
    pub fn quote_table(&self) -> Option<&MiIndexTable> {
        self.tables
            .iter()
            .find(|t| t.fields.iter().any(|f| f == TICKER_FIELD))
    }
}

/// Raw quote cells for one security on one day.
#[derive(Debug, Clone, PartialEq)]
struct QuoteRow {
    name: Option<String>,
    open: Option<String>,
    high: Option<String>,
    low: Option<String>,
    close: Option<String>,
    volume: Option<String>,
}

/// One day's quote table keyed by ticker.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DailyTable {
    rows: HashMap<String, QuoteRow>,
}

fn cell_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.trim().to_string(),
        other => other.to_string(),
    }
}

impl DailyTable {
    /// Builds the table from a day report; a report without a quote table
    /// is an empty day.
    pub fn from_response(response: &MiIndexResponse) -> Self {
        let Some(table) = response.quote_table() else {
            debug!(stat = ?response.stat, "no quote table in report");
            return Self::default();
        };

        let column = |name: &str| table.fields.iter().position(|f| f == name);
        let Some(ticker_col) = column(TICKER_FIELD) else {
            return Self::default();
        };
        let (name_col, open_col, high_col, low_col, close_col, volume_col) = (
            column(NAME_FIELD),
            column(OPEN_FIELD),
            column(HIGH_FIELD),
            column(LOW_FIELD),
            column(CLOSE_FIELD),
            column(VOLUME_FIELD),
        );

        let mut rows = HashMap::with_capacity(table.data.len());
        for row in &table.data {
            let get = |col: Option<usize>| col.and_then(|c| row.get(c)).map(cell_text);
            let Some(ticker) = get(Some(ticker_col)) else {
                continue;
            };
            rows.insert(
                ticker,
                QuoteRow {
                    name: get(name_col),
                    open: get(open_col),
                    high: get(high_col),
                    low: get(low_col),
                    close: get(close_col),
                    volume: get(volume_col),
                },
            );
        }
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn name_of(&self, ticker: &str) -> Option<&str> {
        self.rows.get(ticker).and_then(|r| r.name.as_deref())
    }

    /// The ticker's bar for `date`; `Ok(None)` when the ticker is absent.
    pub fn bar_for(&self, ticker: &str, date: NaiveDate) -> Result<Option<Bar>, TwscanError> {
        let Some(row) = self.rows.get(ticker) else {
            return Ok(None);
        };
        let price = |label: &str, raw: &Option<String>| -> Result<f64, TwscanError> {
            let raw = raw.as_deref().ok_or_else(|| TwscanError::DataParse {
                reason: format!("{} {}: missing {}", ticker, date, label),
            })?;
            parse_price(raw).ok_or_else(|| TwscanError::DataParse {
                reason: format!("{} {}: unparsable {} {:?}", ticker, date, label, raw),
            })
        };

        let mut bar = Bar::new(
            date,
            price(OPEN_FIELD, &row.open)?,
            price(HIGH_FIELD, &row.high)?,
            price(LOW_FIELD, &row.low)?,
            price(CLOSE_FIELD, &row.close)?,
        );
        if let Some(raw) = row.volume.as_deref() {
            let volume = parse_volume(raw).ok_or_else(|| TwscanError::DataParse {
                reason: format!("{} {}: unparsable {} {:?}", ticker, date, VOLUME_FIELD, raw),
            })?;
            bar = bar.with_volume(volume);
        }
        Ok(Some(bar))
    }
}

fn normalize_number(raw: &str) -> String {
    raw.trim().replace(',', "").replace(NO_TRADE, "0")
}

/// Price cell: thousands separators removed, the no-trade sentinel as zero.
pub fn parse_price(raw: &str) -> Option<f64> {
    normalize_number(raw).parse().ok()
}

pub fn parse_volume(raw: &str) -> Option<u64> {
    let cleaned = normalize_number(raw);
    cleaned
        .parse::<u64>()
        .ok()
        .or_else(|| cleaned.parse::<f64>().ok().filter(|v| *v >= 0.0).map(|v| v as u64))
}

/// Weekdays from `start` to `end` inclusive.
pub fn trading_days(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    start
        .iter_days()
        .take_while(|d| *d <= end)
        .filter(|d| !matches!(d.weekday(), Weekday::Sat | Weekday::Sun))
        .collect()
}

/// Source of raw day reports. `Ok(None)` is a day without a report.
pub trait MiIndexFetcher {
    fn fetch_day(&self, date: NaiveDate) -> Result<Option<MiIndexResponse>, TwscanError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct TwseSettings {
    pub base_url: String,
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for TwseSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl TwseSettings {
    pub fn from_config(config: &dyn ConfigPort) -> Self {
        let defaults = Self::default();
        Self {
            base_url: config
                .get_string("twse", "base_url")
                .unwrap_or(defaults.base_url),
            timeout_secs: config
                .get_int("twse", "timeout_secs", DEFAULT_TIMEOUT_SECS as i64)
                .max(1) as u64,
            user_agent: config
                .get_string("twse", "user_agent")
                .unwrap_or(defaults.user_agent),
        }
    }
}

pub struct HttpMiIndexFetcher {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl HttpMiIndexFetcher {
    pub fn new(settings: &TwseSettings) -> Result<Self, TwscanError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .user_agent(settings.user_agent.clone())
            .build()
            .map_err(|e| TwscanError::Fetch {
                reason: format!("failed to build HTTP client: {}", e),
            })?;
        Ok(Self {
            client,
            base_url: settings.base_url.clone(),
        })
    }
}

impl MiIndexFetcher for HttpMiIndexFetcher {
    #[instrument(skip(self))]
    fn fetch_day(&self, date: NaiveDate) -> Result<Option<MiIndexResponse>, TwscanError> {
        let date_param = date.format("%Y%m%d").to_string();
        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("response", "json"),
                ("date", date_param.as_str()),
                ("type", "ALLBUT0999"),
            ])
            .send()
            .map_err(|e| TwscanError::Fetch {
                reason: format!("MI_INDEX {}: {}", date_param, e),
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!(%status, "day report unavailable");
            return Ok(None);
        }

        let body: MiIndexResponse = response.json().map_err(|e| TwscanError::DataParse {
            reason: format!("MI_INDEX {}: {}", date_param, e),
        })?;
        Ok(Some(body))
    }
}

type DayCell = Arc<OnceLock<Result<Option<Arc<DailyTable>>, String>>>;

/// Day tables memoised per date. Concurrent lookups of the same date wait
/// for a single fetch.
#[derive(Default)]
pub struct DailyTableCache {
    days: Mutex<HashMap<NaiveDate, DayCell>>,
}

impl DailyTableCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_fetch(
        &self,
        date: NaiveDate,
        fetcher: &dyn MiIndexFetcher,
    ) -> Result<Option<Arc<DailyTable>>, TwscanError> {
        let cell = {
            let mut days = self.days.lock().map_err(|_| TwscanError::Fetch {
                reason: "day table cache poisoned".to_string(),
            })?;
            Arc::clone(days.entry(date).or_default())
        };

        cell.get_or_init(|| {
            fetcher
                .fetch_day(date)
                .map(|resp| resp.map(|r| Arc::new(DailyTable::from_response(&r))))
                .map_err(|e| e.to_string())
        })
        .clone()
        .map_err(|reason| TwscanError::Fetch { reason })
    }

    pub fn cached_days(&self) -> usize {
        self.days.lock().map(|d| d.len()).unwrap_or(0)
    }
}

pub struct TwseAdapter {
    fetcher: Box<dyn MiIndexFetcher + Send + Sync>,
    cache: DailyTableCache,
    names: Mutex<HashMap<String, String>>,
}

impl TwseAdapter {
    pub fn new(fetcher: Box<dyn MiIndexFetcher + Send + Sync>) -> Self {
        Self {
            fetcher,
            cache: DailyTableCache::new(),
            names: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, TwscanError> {
        let settings = TwseSettings::from_config(config);
        Ok(Self::new(Box::new(HttpMiIndexFetcher::new(&settings)?)))
    }

    pub fn cache(&self) -> &DailyTableCache {
        &self.cache
    }

    fn remember_name(&self, ticker: &str, name: &str) {
        if let Ok(mut names) = self.names.lock() {
            names
                .entry(ticker.to_string())
                .or_insert_with(|| name.to_string());
        }
    }
}

impl DataPort for TwseAdapter {
    fn fetch_bars(
        &self,
        ticker: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<Bar>, TwscanError> {
        let mut bars = Vec::new();

        for date in trading_days(start_date, end_date) {
            let Some(table) = self.cache.get_or_fetch(date, self.fetcher.as_ref())? else {
                continue;
            };
            if let Some(name) = table.name_of(ticker) {
                self.remember_name(ticker, name);
            }
            match table.bar_for(ticker, date) {
                Ok(Some(bar)) => bars.push(bar),
                Ok(None) => {}
                Err(e) => warn!(ticker, %date, error = %e, "skipping unparsable row"),
            }
        }

        debug!(ticker, count = bars.len(), "assembled daily bars");
        Ok(bars)
    }

    fn security_name(&self, ticker: &str) -> Result<Option<String>, TwscanError> {
        let names = self.names.lock().map_err(|_| TwscanError::Fetch {
            reason: "security name cache poisoned".to_string(),
        })?;
        Ok(names.get(ticker).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const DAY_REPORT: &str = r#"{
        "stat": "OK",
        "date": "20240603",
        "tables": [
            {
                "title": "113年06月03日 價格指數(臺灣證券交易所)",
                "fields": ["指數", "收盤指數", "漲跌(+/-)", "漲跌點數", "漲跌百分比(%)", "特殊處理註記"],
                "data": [["寶島股價指數", "24,351.22", "<p style= color:red>+</p>", "261.20", "1.08", ""]]
            },
            {
                "title": "113年06月03日 每日收盤行情(全部(不含權證、牛熊證))",
                "fields": ["證券代號", "證券名稱", "成交股數", "成交筆數", "成交金額", "開盤價", "最高價", "最低價", "收盤價", "漲跌(+/-)", "漲跌價差"],
                "data": [
                    ["2330", "台積電", "31,226,345", "45,108", "25,632,158,963", "815.00", "826.00", "813.00", "826.00", "<p style= color:red>+</p>", "21.00"],
                    ["9958", "世紀鋼", "0", "0", "0", "--", "--", "--", "--", "<p> </p>", "0.00"],
                    ["1101", "台泥", "bad", "1", "1", "abc", "33.00", "32.00", "32.50", "", "0.00"]
                ]
            }
        ]
    }"#;

    const HOLIDAY_REPORT: &str = r#"{"stat": "很抱歉，沒有符合條件的資料!"}"#;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn report() -> MiIndexResponse {
        serde_json::from_str(DAY_REPORT).unwrap()
    }

    struct FixtureFetcher {
        calls: AtomicUsize,
    }

    impl MiIndexFetcher for FixtureFetcher {
        fn fetch_day(&self, date: NaiveDate) -> Result<Option<MiIndexResponse>, TwscanError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match date.day() {
                // a non-success status
                5 => Ok(None),
                6 => Ok(Some(serde_json::from_str(HOLIDAY_REPORT).unwrap())),
                _ => Ok(Some(report())),
            }
        }
    }

    #[test]
    fn quote_table_selected_by_ticker_field() {
        let resp = report();
        let table = resp.quote_table().unwrap();
        assert_eq!(table.fields[0], "證券代號");
        assert_eq!(table.data.len(), 3);
    }

    #[test]
    fn bar_parses_thousands_separators() {
        let table = DailyTable::from_response(&report());
        let bar = table.bar_for("2330", date(2024, 6, 3)).unwrap().unwrap();
        assert_eq!(bar.open, 815.0);
        assert_eq!(bar.high, 826.0);
        assert_eq!(bar.low, 813.0);
        assert_eq!(bar.close, 826.0);
        assert_eq!(bar.volume, Some(31_226_345));
        assert_eq!(table.name_of("2330"), Some("台積電"));
    }

    #[test]
    fn no_trade_sentinel_is_zero() {
        let table = DailyTable::from_response(&report());
        let bar = table.bar_for("9958", date(2024, 6, 3)).unwrap().unwrap();
        assert_eq!(bar.close, 0.0);
        assert_eq!(bar.volume, Some(0));
    }

    #[test]
    fn unparsable_row_is_error_absent_ticker_is_none() {
        let table = DailyTable::from_response(&report());
        assert!(matches!(
            table.bar_for("1101", date(2024, 6, 3)),
            Err(TwscanError::DataParse { .. })
        ));
        assert_eq!(table.bar_for("0000", date(2024, 6, 3)).unwrap(), None);
    }

    #[test]
    fn missing_volume_column_gives_none() {
        let json = r#"{"tables": [{"fields": ["證券代號", "開盤價", "最高價", "最低價", "收盤價"],
            "data": [["2330", "1", "2", "0.5", "1.5"]]}]}"#;
        let resp: MiIndexResponse = serde_json::from_str(json).unwrap();
        let bar = DailyTable::from_response(&resp)
            .bar_for("2330", date(2024, 6, 3))
            .unwrap()
            .unwrap();
        assert_eq!(bar.volume, None);
        assert_eq!(bar.close, 1.5);
    }

    #[test]
    fn holiday_report_is_empty_day() {
        let resp: MiIndexResponse = serde_json::from_str(HOLIDAY_REPORT).unwrap();
        assert!(resp.quote_table().is_none());
        assert!(DailyTable::from_response(&resp).is_empty());
    }

    #[test]
    fn number_cells() {
        assert_eq!(parse_price("1,234.50"), Some(1234.5));
        assert_eq!(parse_price("--"), Some(0.0));
        assert_eq!(parse_price("x"), None);
        assert_eq!(parse_volume("12,000"), Some(12_000));
        assert_eq!(parse_volume("--"), Some(0));
        assert_eq!(parse_volume("-5"), None);
    }

    #[test]
    fn trading_days_skip_weekends() {
        // 2024-06-01 is a Saturday
        let days = trading_days(date(2024, 6, 1), date(2024, 6, 10));
        assert_eq!(days.first(), Some(&date(2024, 6, 3)));
        assert_eq!(days.len(), 6);
        assert!(trading_days(date(2024, 6, 10), date(2024, 6, 1)).is_empty());
    }

    #[test]
    fn fetch_bars_assembles_range() {
        let adapter = TwseAdapter::new(Box::new(FixtureFetcher {
            calls: AtomicUsize::new(0),
        }));
        // Mon 3rd .. Fri 7th; the 5th has no report and the 6th is a holiday
        let bars = adapter
            .fetch_bars("2330", date(2024, 6, 3), date(2024, 6, 7))
            .unwrap();
        let dates: Vec<NaiveDate> = bars.iter().map(|b| b.date).collect();
        assert_eq!(dates, vec![date(2024, 6, 3), date(2024, 6, 4), date(2024, 6, 7)]);
        assert_eq!(
            adapter.security_name("2330").unwrap(),
            Some("台積電".to_string())
        );
    }

    #[test]
    fn day_reports_shared_between_tickers() {
        let adapter = TwseAdapter::new(Box::new(FixtureFetcher {
            calls: AtomicUsize::new(0),
        }));
        adapter
            .fetch_bars("2330", date(2024, 6, 3), date(2024, 6, 7))
            .unwrap();
        adapter
            .fetch_bars("9958", date(2024, 6, 3), date(2024, 6, 7))
            .unwrap();
        assert_eq!(adapter.cache().cached_days(), 5);
    }

    #[test]
    fn unparsable_rows_are_skipped() {
        let adapter = TwseAdapter::new(Box::new(FixtureFetcher {
            calls: AtomicUsize::new(0),
        }));
        let bars = adapter
            .fetch_bars("1101", date(2024, 6, 3), date(2024, 6, 4))
            .unwrap();
        assert!(bars.is_empty());
    }

    #[test]
    fn cache_fetches_each_day_once() {
        let fetcher = FixtureFetcher {
            calls: AtomicUsize::new(0),
        };
        let cache = DailyTableCache::new();
        for _ in 0..3 {
            cache.get_or_fetch(date(2024, 6, 3), &fetcher).unwrap();
        }
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
        assert!(cache.get_or_fetch(date(2024, 6, 5), &fetcher).unwrap().is_none());
    }

    #[test]
    fn settings_from_config_defaults() {
        use crate::adapters::file_config_adapter::FileConfigAdapter;
        let config = FileConfigAdapter::from_string("[twse]\ntimeout_secs = 5\n").unwrap();
        let settings = TwseSettings::from_config(&config);
        assert_eq!(settings.timeout_secs, 5);
        assert_eq!(settings.base_url, DEFAULT_BASE_URL);
        assert_eq!(settings.user_agent, DEFAULT_USER_AGENT);
    }
}
