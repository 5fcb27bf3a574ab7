use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::conflict::Side;
use crate::entry::{Entry, CANONICAL_FIELD_ORDER};
use crate::store::EntryStore;

/// Default minimum title token overlap for two entries to count as the same work
pub const DEFAULT_TITLE_THRESHOLD: f64 = 0.85;

/// Pseudo-field name used when two candidates disagree on their entry type
pub const ENTRY_TYPE_FIELD: &str = "entrytype";

/// Tunable matching parameters, stored in the `[matching]` config section
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatchConfig {
    /// Minimum title token-overlap ratio (0.0 - 1.0)
    #[serde(default = "default_title_threshold")]
    pub title_threshold: f64,
}

fn default_title_threshold() -> f64 {
    DEFAULT_TITLE_THRESHOLD
}

impl Default for MatchConfig {
    fn default() -> Self {
        MatchConfig {
            title_threshold: DEFAULT_TITLE_THRESHOLD,
        }
    }
}

/// Lowercase, replace punctuation with spaces, collapse whitespace
pub fn normalize(text: &str) -> String {
    text.chars()
        .map(|c| {
            if c.is_alphanumeric() {
                c.to_lowercase().next().unwrap_or(c)
            } else {
                ' '
            }
        })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn tokens(text: &str) -> BTreeSet<String> {
    normalize(text)
        .split(' ')
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Jaccard overlap of the normalized token sets, `None` if either side is empty
pub fn token_overlap(a: &str, b: &str) -> Option<f64> {
    let a = tokens(a);
    let b = tokens(b);
    if a.is_empty() || b.is_empty() {
        return None;
    }
    let shared = a.intersection(&b).count();
    let total = a.union(&b).count();
    Some(shared as f64 / total as f64)
}

fn collapse_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// How alike two entries are
///
/// A pure function of the two entries; swapping them gives the same value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Similarity {
    /// Title token overlap, undefined when either title is empty
    pub title: Option<f64>,
    /// Author token overlap, informational only
    pub author: Option<f64>,
    pub year_match: bool,
    pub same_key: bool,
}

impl Similarity {
    /// Ranking score used to pick between several candidates
    pub fn score(&self) -> f64 {
        self.title.unwrap_or(0.0)
    }

    pub fn is_candidate(&self, config: &MatchConfig) -> bool {
        if self.same_key {
            return true;
        }
        match self.title {
            Some(title) => title >= config.title_threshold && self.year_match,
            None => false,
        }
    }
}

/// Compare two entries
pub fn compare(a: &Entry, b: &Entry) -> Similarity {
    let field_overlap = |name: &str| match (a.get(name), b.get(name)) {
        (Some(x), Some(y)) => token_overlap(x, y),
        _ => None,
    };
    let year = |e: &Entry| e.year.as_deref().map(str::trim).unwrap_or("").to_string();

    Similarity {
        title: field_overlap("title"),
        author: field_overlap("author"),
        year_match: year(a) == year(b),
        same_key: a.citation_key == b.citation_key,
    }
}

fn canonical_rank(name: &str) -> usize {
    CANONICAL_FIELD_ORDER
        .iter()
        .position(|n| *n == name)
        .unwrap_or(CANONICAL_FIELD_ORDER.len())
}

/// Union of field names present in either entry, canonical order
fn field_union(a: &Entry, b: &Entry) -> Vec<String> {
    let mut names: Vec<String> = a
        .field_names()
        .into_iter()
        .chain(b.field_names())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    names.sort_by(|x, y| canonical_rank(x).cmp(&canonical_rank(y)).then_with(|| x.cmp(y)));
    names
}

fn populated(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

fn types_conflict(a: &Entry, b: &Entry) -> bool {
    !a.entry_type.trim().is_empty()
        && !b.entry_type.trim().is_empty()
        && !a.entry_type.eq_ignore_ascii_case(&b.entry_type)
}

/// Fields whose values differ at all, including populated vs. missing
pub fn differing_fields(a: &Entry, b: &Entry) -> Vec<String> {
    let mut fields = Vec::new();
    if !a.entry_type.eq_ignore_ascii_case(&b.entry_type) {
        fields.push(ENTRY_TYPE_FIELD.to_string());
    }
    for name in field_union(a, b) {
        let va = a.get(&name).map(collapse_whitespace).unwrap_or_default();
        let vb = b.get(&name).map(collapse_whitespace).unwrap_or_default();
        if va != vb {
            fields.push(name);
        }
    }
    fields
}

/// Fields populated in both entries with different values
pub fn conflicting_fields(a: &Entry, b: &Entry) -> Vec<String> {
    let mut fields = Vec::new();
    if types_conflict(a, b) {
        fields.push(ENTRY_TYPE_FIELD.to_string());
    }
    for name in field_union(a, b) {
        if let (Some(va), Some(vb)) = (populated(a.get(&name)), populated(b.get(&name))) {
            if collapse_whitespace(va) != collapse_whitespace(vb) {
                fields.push(name);
            }
        }
    }
    fields
}

/// Merge two entries into one carrying `a`'s citation key
///
/// Every field populated on either side ends up in the result. When both
/// sides hold different values, `choose` picks the winner for that field.
/// A populated value is never replaced by an empty one.
pub fn merge_entries<F>(a: &Entry, b: &Entry, choose: F) -> Entry
where
    F: Fn(&str) -> Side,
{
    let entry_type = if types_conflict(a, b) {
        match choose(ENTRY_TYPE_FIELD) {
            Side::A => a.entry_type.clone(),
            Side::B => b.entry_type.clone(),
        }
    } else if a.entry_type.trim().is_empty() {
        b.entry_type.clone()
    } else {
        a.entry_type.clone()
    };

    let mut merged = Entry::new(a.citation_key.clone(), entry_type);
    for name in field_union(a, b) {
        let (raw_a, raw_b) = (a.get(&name), b.get(&name));
        let value = match (populated(raw_a), populated(raw_b)) {
            (Some(va), Some(vb)) if collapse_whitespace(va) == collapse_whitespace(vb) => va,
            (Some(va), Some(vb)) => match choose(&name) {
                Side::A => va,
                Side::B => vb,
            },
            (Some(va), None) => va,
            (None, Some(vb)) => vb,
            (None, None) => match raw_a.or(raw_b) {
                Some(empty) => empty,
                None => continue,
            },
        };
        merged.set(&name, value);
    }
    merged
}

/// Two entries judged to describe the same work but disagreeing on some fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidatePair {
    /// Entry already in the library (side A)
    pub existing: Entry,
    /// Newly imported entry (side B)
    pub incoming: Entry,
    pub similarity: Similarity,
    pub differing_fields: Vec<String>,
    pub conflicting_fields: Vec<String>,
}

impl CandidatePair {
    pub fn new(existing: Entry, incoming: Entry) -> Self {
        let similarity = compare(&existing, &incoming);
        let differing_fields = differing_fields(&existing, &incoming);
        let conflicting_fields = conflicting_fields(&existing, &incoming);
        CandidatePair {
            existing,
            incoming,
            similarity,
            differing_fields,
            conflicting_fields,
        }
    }

    pub fn has_conflicts(&self) -> bool {
        !self.conflicting_fields.is_empty()
    }
}

/// Statistics about an import
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeStats {
    /// Number of entries offered for import
    pub incoming: usize,

    /// New entries appended to the library
    pub added: usize,

    /// Library entries completed with fields from a duplicate
    pub auto_merged: usize,

    /// Duplicates that brought nothing new
    pub unchanged: usize,

    /// Duplicates held back for manual resolution
    pub conflicts: usize,

    /// Entries dropped because they could not be stored (e.g. blank key)
    pub skipped: usize,
}

/// Proposed outcome of merging a batch of entries into a library
#[derive(Debug, Clone)]
pub struct MergeProposal {
    /// The library as it would look after all automatic merges
    pub library: EntryStore,
    /// Pairs that need a caller decision
    pub conflicts: Vec<CandidatePair>,
    pub stats: MergeStats,
}

fn find_candidate<'a>(
    library: &'a EntryStore,
    entry: &Entry,
    config: &MatchConfig,
) -> Option<(&'a Entry, Similarity)> {
    if let Some(same) = library.get(&entry.citation_key) {
        return Some((same, compare(same, entry)));
    }

    let mut best: Option<(&Entry, Similarity)> = None;
    for existing in library.iter() {
        let similarity = compare(existing, entry);
        if !similarity.is_candidate(config) {
            continue;
        }
        let better = best
            .as_ref()
            .map_or(true, |(_, current)| similarity.score() > current.score());
        if better {
            best = Some((existing, similarity));
        }
    }
    best
}

/// Work out how `incoming` merges into `store` without touching it
///
/// Entries are processed in order against a working copy of the library, so
/// duplicates within the batch collapse as well.
pub fn plan_import(store: &EntryStore, incoming: Vec<Entry>, config: &MatchConfig) -> MergeProposal {
    let mut library = store.clone();
    let mut conflicts = Vec::new();
    let mut stats = MergeStats {
        incoming: incoming.len(),
        ..Default::default()
    };

    for entry in incoming {
        let candidate = find_candidate(&library, &entry, config)
            .map(|(existing, _)| existing.clone());

        let Some(existing) = candidate else {
            match library.insert(entry) {
                Ok(()) => stats.added += 1,
                Err(e) => {
                    log::warn!("Skipping imported entry: {}", e);
                    stats.skipped += 1;
                }
            }
            continue;
        };

        if existing == entry {
            stats.unchanged += 1;
            continue;
        }

        let pair = CandidatePair::new(existing, entry);
        if pair.has_conflicts() {
            log::debug!(
                "Conflict between {} and {} on {:?}",
                pair.existing.citation_key,
                pair.incoming.citation_key,
                pair.conflicting_fields
            );
            stats.conflicts += 1;
            conflicts.push(pair);
            continue;
        }

        let merged = merge_entries(&pair.existing, &pair.incoming, |_| Side::A);
        if merged == pair.existing {
            stats.unchanged += 1;
            continue;
        }

        match library.replace(&pair.existing.citation_key, merged) {
            Ok(_) => stats.auto_merged += 1,
            Err(e) => {
                log::warn!("Failed to apply automatic merge: {}", e);
                stats.skipped += 1;
            }
        }
    }

    MergeProposal {
        library,
        conflicts,
        stats,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paper(key: &str, title: &str, year: &str) -> Entry {
        Entry::new(key, "article")
            .with_field("title", title)
            .with_field("year", year)
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("  {Deep}   Learning:  A Survey! "), "deep learning a survey");
        assert_eq!(normalize("---"), "");
    }

    #[test]
    fn test_token_overlap() {
        assert_eq!(token_overlap("Deep Learning", "deep  LEARNING."), Some(1.0));
        assert_eq!(token_overlap("a b c d", "a b c e"), Some(3.0 / 5.0));
        assert_eq!(token_overlap("", "anything"), None);
        assert_eq!(token_overlap("{}", "anything"), None);
    }

    #[test]
    fn test_candidate_requires_year_match() {
        let config = MatchConfig::default();
        let a = paper("a", "Deep Learning", "2020");
        let b = paper("b", "Deep Learning", "2021");
        assert!(!compare(&a, &b).is_candidate(&config));

        let c = paper("c", "Deep learning!", "2020");
        assert!(compare(&a, &c).is_candidate(&config));
    }

    #[test]
    fn test_same_key_is_always_candidate() {
        let config = MatchConfig::default();
        let a = paper("k", "One Title", "2020");
        let b = paper("k", "Completely Different", "1999");
        assert!(compare(&a, &b).is_candidate(&config));
    }

    #[test]
    fn test_empty_title_never_matches_by_title() {
        let config = MatchConfig::default();
        let a = paper("a", "", "2020");
        let b = paper("b", "", "2020");
        let sim = compare(&a, &b);
        assert_eq!(sim.title, None);
        assert!(!sim.is_candidate(&config));
    }

    #[test]
    fn test_similarity_is_symmetric() {
        let a = paper("a", "Attention Is All You Need", "2017").with_field("author", "Vaswani");
        let b = paper("b", "Attention is all you need!", "2017").with_field("author", "Vaswani, A.");
        assert_eq!(compare(&a, &b), compare(&b, &a));
    }

    #[test]
    fn test_conflicting_vs_differing_fields() {
        let a = paper("a", "Deep Learning", "2020").with_field("author", "LeCun");
        let b = paper("b", "Deep Learning", "2020")
            .with_field("author", "Bengio")
            .with_field("journal", "Nature");

        assert_eq!(conflicting_fields(&a, &b), vec!["author"]);
        assert_eq!(differing_fields(&a, &b), vec!["author", "journal"]);
    }

    #[test]
    fn test_entry_type_conflict() {
        let a = paper("a", "T", "2020");
        let mut b = paper("b", "T", "2020");
        b.entry_type = "inproceedings".to_string();
        assert_eq!(conflicting_fields(&a, &b), vec![ENTRY_TYPE_FIELD]);

        let merged = merge_entries(&a, &b, |_| Side::B);
        assert_eq!(merged.entry_type, "inproceedings");
    }

    #[test]
    fn test_merge_union_never_loses_values() {
        let a = paper("a", "Deep Learning", "2020").with_field("note", "");
        let b = paper("b", "Deep Learning", "2020")
            .with_field("journal", "Nature")
            .with_field("note", "from b");

        let merged = merge_entries(&a, &b, |_| Side::A);
        assert_eq!(merged.citation_key, "a");
        assert_eq!(merged.journal.as_deref(), Some("Nature"));
        assert_eq!(merged.get("note"), Some("from b"));
    }

    #[test]
    fn test_plan_collapses_duplicates_within_batch() {
        let store = EntryStore::new();
        let batch = vec![
            paper("x1", "Graph Networks", "2019"),
            paper("x2", "Graph networks", "2019").with_field("journal", "JMLR"),
        ];
        let proposal = plan_import(&store, batch, &MatchConfig::default());

        assert_eq!(proposal.library.len(), 1);
        assert_eq!(proposal.stats.added, 1);
        assert_eq!(proposal.stats.auto_merged, 1);
        assert_eq!(
            proposal.library.get("x1").unwrap().journal.as_deref(),
            Some("JMLR")
        );
        // Store passed in is untouched
        assert!(store.is_empty());
    }

    #[test]
    fn test_plan_prefers_best_title_match() {
        let store = EntryStore::from_entries(vec![
            paper("loose", "Learning deep graph networks for things", "2020"),
            paper("exact", "Learning deep graph networks", "2020"),
        ])
        .unwrap();
        let config = MatchConfig {
            title_threshold: 0.5,
        };
        let incoming = paper("new", "Learning Deep Graph Networks", "2020").with_field("journal", "J");
        let proposal = plan_import(&store, vec![incoming], &config);

        assert_eq!(proposal.stats.auto_merged, 1);
        assert!(proposal.library.get("exact").unwrap().journal.is_some());
        assert!(proposal.library.get("loose").unwrap().journal.is_none());
    }

    #[test]
    fn test_plan_identical_entry_is_noop() {
        let entry = paper("a", "Deep Learning", "2020");
        let store = EntryStore::from_entries(vec![entry.clone()]).unwrap();
        let proposal = plan_import(&store, vec![entry], &MatchConfig::default());

        assert_eq!(proposal.stats.unchanged, 1);
        assert!(proposal.conflicts.is_empty());
        assert_eq!(proposal.library, store);
    }
}
