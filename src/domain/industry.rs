//! Industry reference table entries and grouping.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndustryEntry {
    pub ticker: String,
    pub name: String,
    pub industry: String,
}

impl IndustryEntry {
    pub fn new(ticker: &str, name: &str, industry: &str) -> Self {
        Self {
            ticker: ticker.to_string(),
            name: name.to_string(),
            industry: industry.to_string(),
        }
    }

    /// Selection label, e.g. `2330 台積電`.
    pub fn display_label(&self) -> String {
        format!("{} {}", self.ticker, self.name)
    }
}

/// Ticker part of a label produced by [`IndustryEntry::display_label`].
pub fn ticker_from_label(label: &str) -> &str {
    let label = label.trim();
    label.split_whitespace().next().unwrap_or(label)
}

/// Industry name to its entries, both sorted for stable listings.
pub fn group_by_industry(entries: &[IndustryEntry]) -> BTreeMap<String, Vec<IndustryEntry>> {
    let mut groups: BTreeMap<String, Vec<IndustryEntry>> = BTreeMap::new();
    for entry in entries {
        groups
            .entry(entry.industry.clone())
            .or_default()
            .push(entry.clone());
    }
    for members in groups.values_mut() {
        members.sort_by(|a, b| a.ticker.cmp(&b.ticker));
    }
    groups
}

pub fn find_entry<'a>(entries: &'a [IndustryEntry], ticker: &str) -> Option<&'a IndustryEntry> {
    entries.iter().find(|e| e.ticker == ticker)
}
