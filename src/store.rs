use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::entry::Entry;
use crate::error::{LibraryError, Result};

/// Fields consulted by [`EntryStore::search`]
pub const SEARCH_FIELDS: &[&str] = &["title", "author", "year", "journal", "keywords"];

/// In-memory library keyed by citation key
///
/// Entries keep their insertion order for display; lookups go through a key
/// index that is rebuilt whenever positions shift.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<Entry>", into = "Vec<Entry>")]
pub struct EntryStore {
    entries: Vec<Entry>,
    index: HashMap<String, usize>,
}

impl EntryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store, rejecting empty or repeated citation keys
    pub fn from_entries(entries: Vec<Entry>) -> Result<Self> {
        let mut store = EntryStore::new();
        for entry in entries {
            store.insert(entry)?;
        }
        Ok(store)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&Entry> {
        self.index.get(key).map(|&i| &self.entries[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entry> {
        self.entries.iter()
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.citation_key.as_str())
    }

    /// Append a new entry
    pub fn insert(&mut self, entry: Entry) -> Result<()> {
        if entry.citation_key.trim().is_empty() {
            return Err(LibraryError::InvalidEntry(
                "citation key must not be empty".to_string(),
            ));
        }
        if self.contains_key(&entry.citation_key) {
            return Err(LibraryError::DuplicateKey(entry.citation_key));
        }
        self.index
            .insert(entry.citation_key.clone(), self.entries.len());
        self.entries.push(entry);
        Ok(())
    }

    /// Replace the entry stored under `key`, keeping its position
    ///
    /// The replacement may carry a different citation key as long as that key
    /// is not used by another entry.
    pub fn replace(&mut self, key: &str, entry: Entry) -> Result<Entry> {
        let position = *self
            .index
            .get(key)
            .ok_or_else(|| LibraryError::EntryNotFound(key.to_string()))?;

        if entry.citation_key != key {
            if entry.citation_key.trim().is_empty() {
                return Err(LibraryError::InvalidEntry(
                    "citation key must not be empty".to_string(),
                ));
            }
            if self.contains_key(&entry.citation_key) {
                return Err(LibraryError::DuplicateKey(entry.citation_key));
            }
            self.index.remove(key);
            self.index.insert(entry.citation_key.clone(), position);
        }

        Ok(std::mem::replace(&mut self.entries[position], entry))
    }

    /// Replace if present, append otherwise
    pub fn upsert(&mut self, entry: Entry) -> Result<()> {
        if self.contains_key(&entry.citation_key) {
            let key = entry.citation_key.clone();
            self.replace(&key, entry)?;
            Ok(())
        } else {
            self.insert(entry)
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<Entry> {
        let position = self.index.remove(key)?;
        let removed = self.entries.remove(position);
        self.reindex();
        Some(removed)
    }

    fn reindex(&mut self) {
        self.index = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, e)| (e.citation_key.clone(), i))
            .collect();
    }

    /// First free key among `base`, `base_2`, `base_3`, ...
    pub fn unique_key(&self, base: &str) -> String {
        if !self.contains_key(base) {
            return base.to_string();
        }
        (2..)
            .map(|n| format!("{base}_{n}"))
            .find(|candidate| !self.contains_key(candidate))
            .unwrap_or_else(|| base.to_string())
    }

    /// Case-insensitive substring search over title, author, year, journal and keywords
    pub fn search(&self, query: &str) -> Vec<&Entry> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return self.entries.iter().collect();
        }

        self.entries
            .iter()
            .filter(|entry| {
                SEARCH_FIELDS.iter().any(|field| {
                    entry
                        .get(field)
                        .is_some_and(|value| value.to_lowercase().contains(&needle))
                })
            })
            .collect()
    }
}

impl From<Vec<Entry>> for EntryStore {
    /// Lenient conversion used when reloading persisted state: later
    /// duplicates of a key are dropped.
    fn from(entries: Vec<Entry>) -> Self {
        let mut store = EntryStore::new();
        for entry in entries {
            if let Err(e) = store.insert(entry) {
                log::warn!("Skipping entry while loading library: {}", e);
            }
        }
        store
    }
}

impl From<EntryStore> for Vec<Entry> {
    fn from(store: EntryStore) -> Self {
        store.entries
    }
}
