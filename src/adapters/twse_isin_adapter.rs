//! TWSE ISIN listing page as an industry source.
//!
//! The listing is a Big5 HTML table whose first cell joins a four-digit
//! ticker and the security name with whitespace (often U+3000), and whose
//! fifth cell holds the industry.

use crate::domain::error::TwscanError;
use crate::domain::industry::IndustryEntry;
use crate::ports::config_port::ConfigPort;
use crate::ports::reference_port::IndustrySource;
use std::time::Duration;
use tracing::{info, instrument};

pub const DEFAULT_ISIN_URL: &str = "https://isin.twse.com.tw/isin/C_public.jsp?strMode=2";
const PAGE_CHARSET: &str = "big5";
const INDUSTRY_CELL: usize = 4;

pub struct TwseIsinSource {
    client: reqwest::blocking::Client,
    url: String,
}

impl TwseIsinSource {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, TwscanError> {
        let url = config
            .get_string("twse", "isin_url")
            .unwrap_or_else(|| DEFAULT_ISIN_URL.to_string());
        let timeout = config.get_int("twse", "timeout_secs", 30).max(1) as u64;
        let user_agent = config
            .get_string("twse", "user_agent")
            .unwrap_or_else(|| "Mozilla/5.0".to_string());

        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(timeout))
            .user_agent(user_agent)
            .build()
            .map_err(|e| TwscanError::Fetch {
                reason: format!("failed to build HTTP client: {}", e),
            })?;
        Ok(Self { client, url })
    }
}

impl IndustrySource for TwseIsinSource {
    #[instrument(skip(self), fields(url = %self.url))]
    fn fetch_entries(&self) -> Result<Vec<IndustryEntry>, TwscanError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .map_err(|e| TwscanError::Fetch {
                reason: format!("ISIN listing: {}", e),
            })?;
        if !response.status().is_success() {
            return Err(TwscanError::Fetch {
                reason: format!("ISIN listing returned {}", response.status()),
            });
        }
        let html = response
            .text_with_charset(PAGE_CHARSET)
            .map_err(|e| TwscanError::DataParse {
                reason: format!("ISIN listing body: {}", e),
            })?;

        let entries = parse_listing(&html);
        info!(count = entries.len(), "fetched industry listing");
        Ok(entries)
    }
}

/// Extracts `(ticker, name, industry)` rows from the listing HTML.
///
/// Rows whose first cell does not start with a four-digit ticker, or that
/// carry no industry, are skipped.
pub fn parse_listing(html: &str) -> Vec<IndustryEntry> {
    table_rows(html)
        .into_iter()
        .filter_map(|cells| {
            let (ticker, name) = split_code_and_name(cells.first()?)?;
            let industry = cells.get(INDUSTRY_CELL)?.trim();
            if industry.is_empty() {
                return None;
            }
            Some(IndustryEntry::new(ticker, name, industry))
        })
        .collect()
}

/// `"2330　台積電"` into `("2330", "台積電")`.
pub fn split_code_and_name(cell: &str) -> Option<(&str, &str)> {
    let cell = cell.trim();
    let code = cell.get(..4)?;
    if !code.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let rest = &cell[4..];
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let name = rest.trim();
    (!name.is_empty()).then_some((code, name))
}

/// Text of every `<td>` cell, grouped by `<tr>`.
fn table_rows(html: &str) -> Vec<Vec<String>> {
    // ASCII lowercasing keeps byte offsets aligned with `html`
    let lower = html.to_ascii_lowercase();
    let mut rows = Vec::new();

    let mut pos = 0;
    while let Some(start) = lower[pos..].find("<tr").map(|i| i + pos) {
        let end = lower[start + 3..]
            .find("<tr")
            .map(|i| i + start + 3)
            .unwrap_or(lower.len());
        rows.push(row_cells(&html[start..end], &lower[start..end]));
        pos = end;
    }
    rows
}

fn row_cells(row: &str, lower: &str) -> Vec<String> {
    let mut cells = Vec::new();
    let mut pos = 0;
    while let Some(open) = lower[pos..].find("<td").map(|i| i + pos) {
        let Some(content_start) = lower[open..].find('>').map(|i| i + open + 1) else {
            break;
        };
        let content_end = lower[content_start..]
            .find("</td")
            .or_else(|| lower[content_start..].find("<td"))
            .map(|i| i + content_start)
            .unwrap_or(lower.len());
        cells.push(cell_text(&row[content_start..content_end]));
        pos = content_end;
    }
    cells
}

fn cell_text(fragment: &str) -> String {
    let mut text = String::with_capacity(fragment.len());
    let mut in_tag = false;
    for c in fragment.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => text.push(c),
            _ => {}
        }
    }
    decode_entities(&text).trim().to_string()
}

/// Numeric references plus the handful of named entities the listing uses.
/// Anything unrecognised is kept verbatim.
fn decode_entities(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        let decoded = rest.find(';').and_then(|semi| {
            let name = &rest[1..semi];
            let c = match name {
                "nbsp" => Some(' '),
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                _ => name
                    .strip_prefix("#x")
                    .or_else(|| name.strip_prefix("#X"))
                    .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                    .or_else(|| name.strip_prefix('#').and_then(|dec| dec.parse().ok()))
                    .and_then(char::from_u32),
            };
            c.map(|c| (c, semi + 1))
        });
        match decoded {
            Some((c, len)) => {
                out.push(c);
                rest = &rest[len..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}
