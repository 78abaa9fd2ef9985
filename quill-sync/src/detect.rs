//! Change detection against the last sync snapshot.
//!
//! A reference is *changed* when its current content hash differs from the
//! snapshot (or the snapshot has never seen it). A reference is *unresolved*
//! when its hash is unchanged but the unit has no URL for it, e.g. after the
//! header manifest was edited by hand. References that disappeared from the
//! body are ignored: they are neither retried nor deleted remotely.

use quill_core::{fingerprint, references, ContentHash, ContentUnit};

use crate::sync_state::SyncState;

/// What differs between a loaded unit and its last successful sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeSet {
    /// No snapshot exists yet.
    pub first_sync: bool,
    /// Masked body fingerprint differs from the snapshot.
    pub body_changed: bool,
    pub body_hash: ContentHash,
    pub changed_assets: Vec<String>,
    pub unresolved_assets: Vec<String>,
}

impl ChangeSet {
    /// Changed and unresolved references, in reference order.
    pub fn pending_assets(&self) -> impl Iterator<Item = &String> {
        self.changed_assets.iter().chain(&self.unresolved_assets)
    }

    /// Nothing in the body or its assets moved since the snapshot.
    pub fn is_unchanged(&self) -> bool {
        !self.first_sync
            && !self.body_changed
            && self.changed_assets.is_empty()
            && self.unresolved_assets.is_empty()
    }
}

/// Body fingerprint that ignores which local file an image points at.
pub fn body_fingerprint(body: &str) -> ContentHash {
    fingerprint::of_text(&references::mask(body))
}

/// Compare `unit` against `state`.
pub fn detect(unit: &ContentUnit, state: Option<&SyncState>) -> ChangeSet {
    let body_hash = body_fingerprint(&unit.body);
    let mut changed_assets = Vec::new();
    let mut unresolved_assets = Vec::new();

    for (reference, record) in &unit.assets {
        let synced = state.and_then(|s| s.assets.get(reference));
        if synced != Some(&record.content_hash) {
            changed_assets.push(reference.clone());
        } else if record.remote_url.is_none() {
            unresolved_assets.push(reference.clone());
        }
    }

    let changes = ChangeSet {
        first_sync: state.is_none(),
        body_changed: state.map_or(true, |s| s.body_hash != body_hash),
        body_hash,
        changed_assets,
        unresolved_assets,
    };
    tracing::debug!(
        "{}: first_sync={} body_changed={} changed_assets={} unresolved_assets={}",
        unit.id,
        changes.first_sync,
        changes.body_changed,
        changes.changed_assets.len(),
        changes.unresolved_assets.len()
    );
    changes
}
