use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::codec;
use crate::conflict::{Conflict, Resolution, ResolutionOutcome};
use crate::detector::{plan_import, MatchConfig, MergeProposal, MergeStats};
use crate::entry::Entry;
use crate::error::{LibraryError, Result};
use crate::store::EntryStore;
use crate::sync::{self, PullProposal, RemoteSnapshot, RemoteStore};

/// Where the session is in the current import
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Idle,
    Importing,
    AutoMerging,
    AwaitingResolution,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Phase::Idle => "idle",
            Phase::Importing => "importing",
            Phase::AutoMerging => "auto-merging",
            Phase::AwaitingResolution => "awaiting resolution",
        };
        write!(f, "{label}")
    }
}

/// Outcome of importing one batch of entries
#[derive(Debug, Clone)]
pub struct ImportReport {
    pub source: String,
    pub stats: MergeStats,
    /// Pairs from this batch now waiting for a decision
    pub conflicts: Vec<Conflict>,
}

/// Outcome of importing several files
#[derive(Debug, Default)]
pub struct BatchImport {
    pub reports: Vec<ImportReport>,
    /// Files that could not be read or parsed; the rest of the batch still ran
    pub failures: Vec<(PathBuf, LibraryError)>,
}

impl BatchImport {
    pub fn total_conflicts(&self) -> usize {
        self.reports.iter().map(|r| r.conflicts.len()).sum()
    }
}

/// Changes to apply to a single entry
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryEdit {
    pub title: Option<String>,
    pub author: Option<String>,
    pub new_key: Option<String>,
}

impl EntryEdit {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.author.is_none() && self.new_key.is_none()
    }
}

/// The one object that owns the library during a run
///
/// Holds the entry store, the duplicate pairs waiting for a decision and the
/// last synced remote content. Every caller-facing operation goes through
/// here; failed operations leave the session as it was.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LibrarySession {
    store: EntryStore,

    #[serde(default)]
    pending: Vec<Conflict>,

    #[serde(default)]
    next_pair_id: u64,

    #[serde(default)]
    phase: Phase,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    snapshot: Option<RemoteSnapshot>,

    /// Content of a pull whose import has not completed yet
    #[serde(default, skip_serializing_if = "Option::is_none")]
    staged_snapshot: Option<RemoteSnapshot>,

    #[serde(skip)]
    match_config: MatchConfig,
}

impl LibrarySession {
    pub fn new(match_config: MatchConfig) -> Self {
        LibrarySession {
            match_config,
            ..Default::default()
        }
    }

    pub fn set_match_config(&mut self, match_config: MatchConfig) {
        self.match_config = match_config;
    }

    pub fn match_config(&self) -> &MatchConfig {
        &self.match_config
    }

    pub fn store(&self) -> &EntryStore {
        &self.store
    }

    pub fn pending(&self) -> &[Conflict] {
        &self.pending
    }

    pub fn conflict(&self, pair_id: u64) -> Option<&Conflict> {
        self.pending.iter().find(|c| c.id == pair_id)
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn snapshot(&self) -> Option<&RemoteSnapshot> {
        self.snapshot.as_ref()
    }

    pub fn staged_snapshot(&self) -> Option<&RemoteSnapshot> {
        self.staged_snapshot.as_ref()
    }

    fn ensure_no_pending(&self) -> Result<()> {
        if self.pending.is_empty() {
            Ok(())
        } else {
            Err(LibraryError::ConflictPending(self.pending.len()))
        }
    }

    /// Merge `entries` into the library
    ///
    /// Automatic merges are visible as soon as this returns; pairs with
    /// conflicting fields are held until resolved or discarded.
    pub fn import_entries(&mut self, entries: Vec<Entry>, source: &str) -> Result<ImportReport> {
        self.ensure_no_pending()?;
        self.phase = Phase::Importing;

        let proposal = plan_import(&self.store, entries, &self.match_config);
        let report = self.apply_proposal(proposal, source);
        self.settle();

        Ok(report)
    }

    /// Import several `.bib` files, one after the other
    ///
    /// A file that fails to read or parse is recorded in
    /// [`BatchImport::failures`] and the batch carries on.
    pub fn import_files<P: AsRef<Path>>(&mut self, paths: &[P]) -> Result<BatchImport> {
        self.ensure_no_pending()?;
        self.phase = Phase::Importing;

        let mut batch = BatchImport::default();
        for path in paths {
            let path = path.as_ref();
            let entries = match codec::read_file(path) {
                Ok(entries) => entries,
                Err(e) => {
                    log::warn!("Skipping {}: {}", path.display(), e);
                    batch.failures.push((path.to_path_buf(), e));
                    continue;
                }
            };

            let proposal = plan_import(&self.store, entries, &self.match_config);
            let report = self.apply_proposal(proposal, &path.display().to_string());
            batch.reports.push(report);
        }

        self.settle();
        Ok(batch)
    }

    fn apply_proposal(&mut self, proposal: MergeProposal, source: &str) -> ImportReport {
        let MergeProposal {
            library,
            conflicts,
            stats,
        } = proposal;

        if conflicts.is_empty() {
            self.phase = Phase::AutoMerging;
        }
        self.store = library;

        let mut held = Vec::with_capacity(conflicts.len());
        for pair in conflicts {
            self.next_pair_id += 1;
            let conflict = Conflict::new(self.next_pair_id, source, pair);
            self.pending.push(conflict.clone());
            held.push(conflict);
        }

        log::info!(
            "Imported from {}: {} added, {} merged, {} unchanged, {} conflicts",
            source,
            stats.added,
            stats.auto_merged,
            stats.unchanged,
            stats.conflicts
        );

        ImportReport {
            source: source.to_string(),
            stats,
            conflicts: held,
        }
    }

    /// Close the import if nothing is pending, otherwise wait for decisions
    fn settle(&mut self) {
        if !self.pending.is_empty() {
            self.phase = Phase::AwaitingResolution;
            return;
        }

        self.phase = Phase::Idle;
        if let Some(staged) = self.staged_snapshot.take() {
            log::debug!("Import complete, snapshot of {} promoted", staged.filename);
            self.snapshot = Some(staged);
        }
    }

    /// Apply the caller's decision for one pending pair
    pub fn resolve_conflict(&mut self, pair_id: u64, resolution: &Resolution) -> Result<ResolutionOutcome> {
        let position = self
            .pending
            .iter()
            .position(|c| c.id == pair_id)
            .ok_or(LibraryError::UnknownPair(pair_id))?;

        let mut store = self.store.clone();
        let outcome = self.pending[position].apply(&mut store, resolution)?;
        self.store = store;
        self.pending.remove(position);

        log::info!("Resolved conflict #{} ({})", pair_id, resolution);
        self.settle();
        Ok(outcome)
    }

    /// Drop one pending pair; its incoming entry is discarded
    pub fn discard_conflict(&mut self, pair_id: u64) -> Result<()> {
        let position = self
            .pending
            .iter()
            .position(|c| c.id == pair_id)
            .ok_or(LibraryError::UnknownPair(pair_id))?;
        self.pending.remove(position);
        self.settle();
        Ok(())
    }

    /// Drop every pending pair, returning how many there were
    pub fn discard_conflicts(&mut self) -> usize {
        let count = self.pending.len();
        self.pending.clear();
        if count > 0 {
            log::info!("Discarded {} pending conflict(s)", count);
        }
        self.settle();
        count
    }

    /// Write the library to a local `.bib` file
    pub fn save(&self, path: &Path) -> Result<()> {
        codec::write_file(path, self.store.entries())?;
        log::info!("Saved {} entries to {}", self.store.len(), path.display());
        Ok(())
    }

    /// Write a timestamped copy `<base>_<YYYYMMDDHHMMSS>.bib` into `dir`
    pub fn share(&self, dir: &Path, base_name: &str) -> Result<PathBuf> {
        let path = dir.join(share_file_name(base_name, chrono::Local::now()));
        self.save(&path)?;
        Ok(path)
    }

    /// Fetch the remote library and plan its merge without committing
    pub fn pull<R: RemoteStore + ?Sized>(&self, remote: &R) -> Result<PullProposal> {
        self.ensure_no_pending()?;
        sync::pull(remote, &self.store, &self.match_config)
    }

    /// Import a pulled library
    ///
    /// The merge is planned again against the live store, so edits made since
    /// the pull are kept. The fetched content becomes the remote snapshot once
    /// the import completes.
    pub fn commit_pull(&mut self, proposal: PullProposal) -> Result<ImportReport> {
        self.ensure_no_pending()?;
        let entries = proposal.snapshot.entries()?;

        self.phase = Phase::Importing;
        let source = proposal.snapshot.filename.clone();
        self.staged_snapshot = Some(proposal.snapshot);

        let plan = plan_import(&self.store, entries, &self.match_config);
        let report = self.apply_proposal(plan, &source);
        self.settle();

        Ok(report)
    }

    /// Pull and commit in one step
    pub fn import_from_remote<R: RemoteStore + ?Sized>(&mut self, remote: &R) -> Result<ImportReport> {
        let proposal = self.pull(remote)?;
        self.commit_pull(proposal)
    }

    /// Upload the library, replacing the remote file
    pub fn push<R: RemoteStore + ?Sized>(&mut self, remote: &R) -> Result<RemoteSnapshot> {
        self.ensure_no_pending()?;
        if self.store.is_empty() {
            return Err(LibraryError::EmptyLibrary);
        }

        let snapshot = sync::push(remote, self.store.entries())?;
        self.snapshot = Some(snapshot.clone());
        Ok(snapshot)
    }

    /// Whether the remote moved on since the last pull or push
    pub fn remote_changed<R: RemoteStore + ?Sized>(&self, remote: &R) -> Result<bool> {
        sync::remote_changed(remote, self.snapshot.as_ref())
    }

    pub fn search(&self, query: &str) -> Vec<&Entry> {
        self.store.search(query)
    }

    /// Copies of the entries named by `keys`, in the order given
    pub fn export(&self, keys: &[String]) -> Result<Vec<Entry>> {
        keys.iter()
            .map(|key| {
                self.store
                    .get(key)
                    .cloned()
                    .ok_or_else(|| LibraryError::EntryNotFound(key.clone()))
            })
            .collect()
    }

    /// Change the title, author or citation key of an entry
    ///
    /// Returns the entry's key after the edit. Pending pairs that point at the
    /// renamed entry follow it.
    pub fn edit_entry(&mut self, key: &str, edit: &EntryEdit) -> Result<String> {
        let mut entry = self
            .store
            .get(key)
            .cloned()
            .ok_or_else(|| LibraryError::EntryNotFound(key.to_string()))?;

        if let Some(title) = &edit.title {
            entry.set("title", title.clone());
        }
        if let Some(author) = &edit.author {
            entry.set("author", author.clone());
        }
        if let Some(new_key) = &edit.new_key {
            entry.citation_key = new_key.trim().to_string();
        }

        let new_key = entry.citation_key.clone();
        self.store.replace(key, entry)?;

        if new_key != key {
            for conflict in &mut self.pending {
                if conflict.pair.existing.citation_key == key {
                    conflict.pair.existing.citation_key = new_key.clone();
                }
            }
        }

        log::info!("Edited entry {} (now {})", key, new_key);
        Ok(new_key)
    }

    /// Replace the whole library, e.g. with a cached one
    pub fn load(&mut self, entries: Vec<Entry>) -> Result<()> {
        self.ensure_no_pending()?;
        self.store = EntryStore::from_entries(entries)?;
        self.phase = Phase::Idle;
        Ok(())
    }
}

/// `<base>_<YYYYMMDDHHMMSS>.bib`, with any `.bib` already on `base` dropped
pub fn share_file_name<Tz: chrono::TimeZone>(base_name: &str, at: chrono::DateTime<Tz>) -> String
where
    Tz::Offset: fmt::Display,
{
    let base = base_name.trim();
    let base = base.strip_suffix(".bib").unwrap_or(base);
    let base = if base.is_empty() { "library" } else { base };
    format!("{}_{}.bib", base, at.format("%Y%m%d%H%M%S"))
}
