use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Field order used when writing entries back out.
///
/// Fields not listed here follow in lexicographic order.
pub const CANONICAL_FIELD_ORDER: &[&str] = &[
    "author",
    "title",
    "journal",
    "booktitle",
    "year",
    "volume",
    "number",
    "pages",
    "month",
    "publisher",
    "editor",
    "address",
    "doi",
    "url",
    "keywords",
    "abstract",
    "note",
];

/// One bibliographic record
///
/// The handful of fields the library reasons about (matching, searching,
/// display) are kept as named slots; everything else lives in `extra` so that
/// unknown fields survive a decode/encode cycle untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub citation_key: String,

    pub entry_type: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub journal: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub booktitle: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub keywords: Option<String>,

    /// Every other field, keyed by lowercase name
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

impl Entry {
    pub fn new(citation_key: impl Into<String>, entry_type: impl Into<String>) -> Self {
        Entry {
            citation_key: citation_key.into(),
            entry_type: entry_type.into().to_lowercase(),
            title: None,
            author: None,
            year: None,
            journal: None,
            booktitle: None,
            keywords: None,
            extra: BTreeMap::new(),
        }
    }

    /// Builder-style field setter
    pub fn with_field(mut self, name: &str, value: impl Into<String>) -> Self {
        self.set(name, value);
        self
    }

    fn slot(&self, name: &str) -> Option<&Option<String>> {
        match name {
            "title" => Some(&self.title),
            "author" => Some(&self.author),
            "year" => Some(&self.year),
            "journal" => Some(&self.journal),
            "booktitle" => Some(&self.booktitle),
            "keywords" => Some(&self.keywords),
            _ => None,
        }
    }

    fn slot_mut(&mut self, name: &str) -> Option<&mut Option<String>> {
        match name {
            "title" => Some(&mut self.title),
            "author" => Some(&mut self.author),
            "year" => Some(&mut self.year),
            "journal" => Some(&mut self.journal),
            "booktitle" => Some(&mut self.booktitle),
            "keywords" => Some(&mut self.keywords),
            _ => None,
        }
    }

    /// Get a field value by (case-insensitive) name
    pub fn get(&self, name: &str) -> Option<&str> {
        let name = name.to_lowercase();
        match self.slot(&name) {
            Some(slot) => slot.as_deref(),
            None => self.extra.get(&name).map(String::as_str),
        }
    }

    /// Set a field value; the name is stored lowercase
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        let name = name.to_lowercase();
        let value = value.into();
        match self.slot_mut(&name) {
            Some(slot) => *slot = Some(value),
            None => {
                self.extra.insert(name, value);
            }
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        let name = name.to_lowercase();
        match self.slot_mut(&name) {
            Some(slot) => slot.take(),
            None => self.extra.remove(&name),
        }
    }

    /// Whether the field is present with a non-blank value
    pub fn is_populated(&self, name: &str) -> bool {
        self.get(name).is_some_and(|v| !v.trim().is_empty())
    }

    /// All present fields in canonical output order
    pub fn fields(&self) -> Vec<(&str, &str)> {
        let mut present: BTreeMap<&str, &str> = BTreeMap::new();
        for name in ["title", "author", "year", "journal", "booktitle", "keywords"] {
            if let Some(Some(value)) = self.slot(name) {
                present.insert(name, value.as_str());
            }
        }
        for (name, value) in &self.extra {
            present.insert(name.as_str(), value.as_str());
        }

        let mut ordered = Vec::with_capacity(present.len());
        for name in CANONICAL_FIELD_ORDER {
            if let Some(value) = present.remove(name) {
                ordered.push((*name, value));
            }
        }
        // BTreeMap iteration gives the lexicographic tail
        ordered.extend(present);
        ordered
    }

    /// Names of all present fields, canonical order
    pub fn field_names(&self) -> Vec<String> {
        self.fields().into_iter().map(|(n, _)| n.to_string()).collect()
    }

    pub fn populated_field_count(&self) -> usize {
        self.fields()
            .iter()
            .filter(|(_, v)| !v.trim().is_empty())
            .count()
    }

    /// One-line human summary used by listings and prompts
    pub fn summary(&self) -> String {
        format!(
            "[{}] {} ({}, {})",
            self.citation_key,
            self.title.as_deref().unwrap_or("Untitled"),
            self.author.as_deref().unwrap_or("Unknown authors"),
            self.year.as_deref().unwrap_or("n.d.")
        )
    }
}
