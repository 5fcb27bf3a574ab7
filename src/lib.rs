//! # paperref
//!
//! A personal reference-library manager for BibTeX.
//!
//! ## Overview
//!
//! `paperref` ingests BibTeX entries from local files or from a library file
//! kept on a WebDAV server, finds entries that describe the same work, merges
//! them, and asks the user only when two copies genuinely disagree. The
//! consolidated library can be saved locally, shared as a timestamped copy, or
//! pushed back to the server.
//!
//! ## Key Features
//!
//! - **Duplicate detection**: same citation key, or near-identical titles from the same year
//! - **Automatic merge**: missing fields are filled in from the duplicate
//! - **Conflict resolution**: keep either side, keep both, or pick field by field
//! - **WebDAV sync**: pull with merge, push with overwrite
//! - **Persistent session**: pending conflicts survive between command invocations
//!
//! ## Architecture
//!
//! - Data model ([`entry`], [`store`])
//! - BibTeX encoding and decoding ([`codec`])
//! - Matching, merging and conflicts ([`detector`], [`conflict`])
//! - Remote file access ([`sync`])
//! - The session that owns the library ([`session`]) and its on-disk home ([`workspace`])
//! - Configuration, logging, errors and reporting ([`settings`], [`config`], [`logger`], [`error`], [`report`])
//! - Terminal interaction ([`interactive_conflict`], [`handlers`])

/// BibTeX text to entries and back.
///
/// Parsing is done by the `biblatex` crate; serialization writes fields in a
/// fixed canonical order so output is deterministic.
pub mod codec;

/// Platform-agnostic location of the paperref data directory.
pub mod config;

/// Conflict records and how a decision is applied to the library.
pub mod conflict;

/// Title/year similarity, candidate detection and union merge.
///
/// Normalization lowercases text, turns punctuation into spaces and collapses
/// whitespace. Titles are compared by token overlap; entries whose titles
/// overlap at least the configured threshold and whose years agree are
/// treated as the same work.
pub mod detector;

/// Bibliographic entries.
pub mod entry;

/// Error taxonomy shared by the library modules.
pub mod error;

/// Command handlers behind the `paperref` binary.
pub mod handlers;

/// Terminal prompts for resolving conflicts one by one.
pub mod interactive_conflict;

/// Console and file logging.
///
/// Console level comes from `RUST_LOG`; every command also appends a line to
/// `paperref.log`, which is rotated when it grows too large.
pub mod logger;

/// Pending-conflict reports in JSON, Markdown or colored console form.
pub mod report;

/// The library session: entry store, pending pairs and remote snapshot.
pub mod session;

/// `config.toml`: WebDAV connection and matching tunables.
pub mod settings;

/// The ordered, key-indexed entry store.
pub mod store;

/// Pulling from and pushing to the remote library file.
pub mod sync;

/// Session state, cached libraries and share copies on disk.
pub mod workspace;

pub use conflict::{Resolution, Side};
pub use entry::Entry;
pub use error::{LibraryError, Result};
pub use session::LibrarySession;
pub use store::EntryStore;
