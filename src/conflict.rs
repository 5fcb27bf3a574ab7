use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::detector::{conflicting_fields, merge_entries, CandidatePair};
use crate::entry::Entry;
use crate::error::{LibraryError, Result};
use crate::store::EntryStore;

/// Which side of a candidate pair wins
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    /// The entry already in the library
    A,
    /// The incoming entry
    B,
}

impl FromStr for Side {
    type Err = LibraryError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "a" | "existing" | "local" => Ok(Side::A),
            "b" | "incoming" | "remote" => Ok(Side::B),
            other => Err(LibraryError::InvalidChoice(format!(
                "unknown side '{other}' (expected 'a' or 'b')"
            ))),
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::A => write!(f, "A"),
            Side::B => write!(f, "B"),
        }
    }
}

/// Caller decision for a pending conflict
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Resolution {
    /// Merge, taking A's value for every conflicting field
    KeepA,
    /// Merge, taking B's value for every conflicting field
    KeepB,
    /// Keep both entries; B gets a suffixed citation key if needed
    KeepBoth,
    /// Pick a side per conflicting field
    PerField(BTreeMap<String, Side>),
}

impl FromStr for Resolution {
    type Err = LibraryError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "keep_a" | "a" => Ok(Resolution::KeepA),
            "keep_b" | "b" => Ok(Resolution::KeepB),
            "keep_both" | "both" => Ok(Resolution::KeepBoth),
            other => Err(LibraryError::InvalidChoice(format!(
                "unknown resolution '{other}' (expected keep_a, keep_b or keep_both)"
            ))),
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolution::KeepA => write!(f, "Keep A"),
            Resolution::KeepB => write!(f, "Keep B"),
            Resolution::KeepBoth => write!(f, "Keep both"),
            Resolution::PerField(choices) => {
                let parts: Vec<String> = choices.iter().map(|(k, v)| format!("{k}={v}")).collect();
                write!(f, "Per field ({})", parts.join(", "))
            }
        }
    }
}

/// A candidate pair held back for the caller to resolve
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conflict {
    pub id: u64,
    /// Where the incoming entry came from (file path or remote name)
    pub source: String,
    pub pair: CandidatePair,
    pub detected_at: chrono::DateTime<chrono::Utc>,
}

/// What a resolution wrote into the library
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionOutcome {
    pub pair_id: u64,
    /// Citation keys written to the store
    pub committed_keys: Vec<String>,
}

impl Conflict {
    pub fn new(id: u64, source: impl Into<String>, pair: CandidatePair) -> Self {
        Conflict {
            id,
            source: source.into(),
            pair,
            detected_at: chrono::Utc::now(),
        }
    }

    pub fn existing(&self) -> &Entry {
        &self.pair.existing
    }

    pub fn incoming(&self) -> &Entry {
        &self.pair.incoming
    }

    /// Get a human-readable description of the conflict
    pub fn description(&self) -> String {
        format!(
            "#{} {} vs {} (from {}), conflicting: {}",
            self.id,
            self.pair.existing.citation_key,
            self.pair.incoming.citation_key,
            self.source,
            self.pair.conflicting_fields.join(", ")
        )
    }

    /// Apply `resolution` to `store`
    ///
    /// Side A is re-read from the store so that edits made since detection
    /// are respected; the stored copy is only used if A has since vanished.
    pub fn apply(&self, store: &mut EntryStore, resolution: &Resolution) -> Result<ResolutionOutcome> {
        let current = store
            .get(&self.pair.existing.citation_key)
            .cloned()
            .unwrap_or_else(|| self.pair.existing.clone());
        let incoming = &self.pair.incoming;

        let committed_keys = match resolution {
            Resolution::KeepA => {
                let merged = merge_entries(&current, incoming, |_| Side::A);
                let key = merged.citation_key.clone();
                store.upsert(merged)?;
                vec![key]
            }
            Resolution::KeepB => {
                let merged = merge_entries(&current, incoming, |_| Side::B);
                let key = merged.citation_key.clone();
                store.upsert(merged)?;
                vec![key]
            }
            Resolution::PerField(choices) => {
                let missing: Vec<String> = conflicting_fields(&current, incoming)
                    .into_iter()
                    .filter(|field| !choices.contains_key(field))
                    .collect();
                if !missing.is_empty() {
                    return Err(LibraryError::UnresolvedFields {
                        pair_id: self.id,
                        fields: missing,
                    });
                }
                let merged = merge_entries(&current, incoming, |field| {
                    choices.get(field).copied().unwrap_or(Side::A)
                });
                let key = merged.citation_key.clone();
                store.upsert(merged)?;
                vec![key]
            }
            Resolution::KeepBoth => {
                let existing_key = current.citation_key.clone();
                store.upsert(current)?;

                let mut second = incoming.clone();
                second.citation_key = store.unique_key(&incoming.citation_key);
                let second_key = second.citation_key.clone();
                store.insert(second)?;
                vec![existing_key, second_key]
            }
        };

        Ok(ResolutionOutcome {
            pair_id: self.id,
            committed_keys,
        })
    }
}
