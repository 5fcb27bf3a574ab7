use super::{RemoteSnapshot, RemoteStore, SnapshotOrigin};
use crate::codec;
use crate::detector::{plan_import, MatchConfig, MergeProposal};
use crate::error::Result;
use crate::store::EntryStore;

/// Result of fetching the remote library and planning its merge
#[derive(Debug, Clone)]
pub struct PullProposal {
    pub proposal: MergeProposal,
    /// Fetched content, to become the session's snapshot once the import completes
    pub snapshot: RemoteSnapshot,
}

impl PullProposal {
    pub fn has_conflicts(&self) -> bool {
        !self.proposal.conflicts.is_empty()
    }
}

/// Fetch the remote library and plan merging it into `store`
///
/// Nothing is committed: `store` is only read. A missing remote file is
/// reported as `RemoteNotFound`; an empty one decodes to zero entries.
pub fn pull<R: RemoteStore + ?Sized>(
    remote: &R,
    store: &EntryStore,
    config: &MatchConfig,
) -> Result<PullProposal> {
    let bytes = remote.fetch()?;
    let text = codec::decode_bytes(&bytes);
    let incoming = codec::decode_named(&text, remote.filename())?;
    log::info!(
        "Pulled {} entries from {}",
        incoming.len(),
        remote.filename()
    );

    let proposal = plan_import(store, incoming, config);
    let snapshot = RemoteSnapshot::new(remote.filename(), bytes, SnapshotOrigin::Pull);

    Ok(PullProposal { proposal, snapshot })
}
