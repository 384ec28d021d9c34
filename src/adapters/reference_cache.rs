//! Industry reference table cache and its stores.
//!
//! [`IndustryCache`] reads the table from its store when one was saved,
//! otherwise fetches it from the upstream source once and writes it back.
//! The loaded table is memoised for the life of the cache.

use crate::domain::error::TwscanError;
use crate::domain::industry::{find_entry, group_by_industry, IndustryEntry};
use crate::ports::reference_port::{IndustrySource, ReferenceStore};
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};
use tracing::{debug, info};

const UTF8_BOM: char = '\u{feff}';
const HEADER: [&str; 3] = ["ticker", "name", "industry"];

/// CSV file store with the header `ticker,name,industry`.
pub struct FileReferenceStore {
    path: PathBuf,
}

impl FileReferenceStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn cache_error(&self, e: impl std::fmt::Display) -> TwscanError {
        TwscanError::ReferenceCache {
            reason: format!("{}: {}", self.path.display(), e),
        }
    }
}

impl ReferenceStore for FileReferenceStore {
    fn load_entries(&self) -> Result<Option<Vec<IndustryEntry>>, TwscanError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&self.path)?;
        let content = content.strip_prefix(UTF8_BOM).unwrap_or(&content);

        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(content.as_bytes());
        let entries = rdr
            .deserialize::<IndustryEntry>()
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| self.cache_error(e))?;

        debug!(path = %self.path.display(), count = entries.len(), "read reference file");
        Ok((!entries.is_empty()).then_some(entries))
    }

    fn save_entries(&self, entries: &[IndustryEntry]) -> Result<(), TwscanError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let mut wtr = csv::Writer::from_path(&self.path).map_err(|e| self.cache_error(e))?;
        wtr.write_record(HEADER).map_err(|e| self.cache_error(e))?;
        for entry in entries {
            wtr.write_record([&entry.ticker, &entry.name, &entry.industry])
                .map_err(|e| self.cache_error(e))?;
        }
        wtr.flush()?;
        Ok(())
    }
}

/// In-process store, mainly for tests and one-off runs.
#[derive(Default)]
pub struct MemoryReferenceStore {
    entries: Mutex<Option<Vec<IndustryEntry>>>,
}

impl MemoryReferenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries(entries: Vec<IndustryEntry>) -> Self {
        Self {
            entries: Mutex::new(Some(entries)),
        }
    }
}

impl ReferenceStore for MemoryReferenceStore {
    fn load_entries(&self) -> Result<Option<Vec<IndustryEntry>>, TwscanError> {
        let entries = self.entries.lock().map_err(|_| TwscanError::ReferenceCache {
            reason: "memory store poisoned".to_string(),
        })?;
        Ok(entries.clone())
    }

    fn save_entries(&self, entries: &[IndustryEntry]) -> Result<(), TwscanError> {
        let mut stored = self.entries.lock().map_err(|_| TwscanError::ReferenceCache {
            reason: "memory store poisoned".to_string(),
        })?;
        *stored = Some(entries.to_vec());
        Ok(())
    }
}

pub struct IndustryCache {
    store: Box<dyn ReferenceStore + Send + Sync>,
    source: Box<dyn IndustrySource + Send + Sync>,
    entries: OnceLock<Vec<IndustryEntry>>,
}

impl IndustryCache {
    pub fn new(
        store: Box<dyn ReferenceStore + Send + Sync>,
        source: Box<dyn IndustrySource + Send + Sync>,
    ) -> Self {
        Self {
            store,
            source,
            entries: OnceLock::new(),
        }
    }

    /// The reference table, loaded or fetched on first use.
    pub fn entries(&self) -> Result<&[IndustryEntry], TwscanError> {
        if let Some(entries) = self.entries.get() {
            return Ok(entries);
        }
        let loaded = self.load_or_fetch()?;
        Ok(self.entries.get_or_init(|| loaded))
    }

    /// Fetches from the source regardless of what is stored.
    pub fn refresh(&mut self) -> Result<&[IndustryEntry], TwscanError> {
        let fetched = self.fetch_and_store()?;
        self.entries = OnceLock::new();
        Ok(self.entries.get_or_init(|| fetched))
    }

    pub fn groups(&self) -> Result<BTreeMap<String, Vec<IndustryEntry>>, TwscanError> {
        Ok(group_by_industry(self.entries()?))
    }

    pub fn name_of(&self, ticker: &str) -> Result<Option<String>, TwscanError> {
        Ok(find_entry(self.entries()?, ticker).map(|e| e.name.clone()))
    }

    /// The stored table only; never reaches the source.
    pub fn stored_entries(&self) -> Result<Option<Vec<IndustryEntry>>, TwscanError> {
        match self.entries.get() {
            Some(entries) => Ok(Some(entries.clone())),
            None => self.store.load_entries(),
        }
    }

    fn load_or_fetch(&self) -> Result<Vec<IndustryEntry>, TwscanError> {
        if let Some(entries) = self.store.load_entries()? {
            debug!(count = entries.len(), "reference table loaded from store");
            return Ok(entries);
        }
        self.fetch_and_store()
    }

    fn fetch_and_store(&self) -> Result<Vec<IndustryEntry>, TwscanError> {
        let entries = self.source.fetch_entries()?;
        if entries.is_empty() {
            return Err(TwscanError::ReferenceCache {
                reason: "industry listing contained no entries".to_string(),
            });
        }
        self.store.save_entries(&entries)?;
        info!(count = entries.len(), "reference table fetched and stored");
        Ok(entries)
    }
}
