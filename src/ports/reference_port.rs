//! Industry reference table ports.

use crate::domain::error::TwscanError;
use crate::domain::industry::IndustryEntry;

/// Persistent storage for the reference table.
pub trait ReferenceStore {
    /// `Ok(None)` when nothing has been stored yet.
    fn load_entries(&self) -> Result<Option<Vec<IndustryEntry>>, TwscanError>;

    fn save_entries(&self, entries: &[IndustryEntry]) -> Result<(), TwscanError>;
}

/// Upstream listing the reference table is built from.
pub trait IndustrySource {
    fn fetch_entries(&self) -> Result<Vec<IndustryEntry>, TwscanError>;
}
