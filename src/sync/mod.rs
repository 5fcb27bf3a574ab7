//! Remote library file access and two-way reconciliation.
//!
//! The remote side is a single BibTeX file behind a [`RemoteStore`]. Pulling
//! never commits anything: it returns a [`PullProposal`] that the session
//! applies once the caller has dealt with any conflicts. Pushing overwrites
//! the remote file unconditionally (last write wins).

mod pull;
mod push;
mod snapshot;
mod webdav;

pub use pull::{pull, PullProposal};
pub use push::{push, remote_changed};
pub use snapshot::{RemoteSnapshot, SnapshotOrigin};
pub use webdav::WebDavStore;

use crate::error::Result;

/// MIME type sent with uploaded libraries
pub const BIBTEX_CONTENT_TYPE: &str = "application/x-bibtex";

/// A single remote file holding the library
pub trait RemoteStore {
    /// Name of the remote file, used in messages and snapshots
    fn filename(&self) -> &str;

    /// Download the file; `RemoteNotFound` when it does not exist
    fn fetch(&self) -> Result<Vec<u8>>;

    /// Overwrite (or create) the file
    fn store(&self, content: &[u8]) -> Result<()>;

    fn exists(&self) -> Result<bool>;
}

impl<T: RemoteStore + ?Sized> RemoteStore for &T {
    fn filename(&self) -> &str {
        (**self).filename()
    }

    fn fetch(&self) -> Result<Vec<u8>> {
        (**self).fetch()
    }

    fn store(&self, content: &[u8]) -> Result<()> {
        (**self).store(content)
    }

    fn exists(&self) -> Result<bool> {
        (**self).exists()
    }
}
