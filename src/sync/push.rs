use super::{RemoteSnapshot, RemoteStore, SnapshotOrigin};
use crate::codec;
use crate::entry::Entry;
use crate::error::{LibraryError, Result};

/// Encode `entries` and overwrite the remote file with them
///
/// There is no version check against the remote: whatever is there is
/// replaced. Returns the snapshot of what was written.
pub fn push<R: RemoteStore + ?Sized>(remote: &R, entries: &[Entry]) -> Result<RemoteSnapshot> {
    if entries.is_empty() {
        return Err(LibraryError::EmptyLibrary);
    }

    let content = codec::encode(entries).into_bytes();
    remote.store(&content)?;
    log::info!("Pushed {} entries to {}", entries.len(), remote.filename());

    Ok(RemoteSnapshot::new(remote.filename(), content, SnapshotOrigin::Push))
}

/// Whether the remote file differs from the last synced snapshot
///
/// Without a snapshot any existing remote file counts as changed. A remote
/// file that has disappeared since the snapshot also counts as changed.
pub fn remote_changed<R: RemoteStore + ?Sized>(
    remote: &R,
    snapshot: Option<&RemoteSnapshot>,
) -> Result<bool> {
    let Some(snapshot) = snapshot else {
        return remote.exists();
    };

    if snapshot.filename != remote.filename() {
        return Ok(true);
    }

    match remote.fetch() {
        Ok(current) => Ok(!snapshot.matches(&current)),
        Err(LibraryError::RemoteNotFound(_)) => Ok(true),
        Err(e) => Err(e),
    }
}
