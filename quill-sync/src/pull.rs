//! Pull remote visibility back into local post status.
//!
//! Posts scheduled on the platform go live without any local action; pulling
//! flips their local `status` to `published` so the corpus agrees with what
//! readers see. Unlinked posts are skipped.

use std::path::Path;

use quill_core::{store, PostId, Status};
use quill_remote::{BlogHost, Visibility};

use crate::error::{PipelineError, ReconcileError, Stage, SyncError};
use crate::reconcile::LinkState;
use crate::retry::{retry_with_backoff, RetryAction, RetryPolicy};
use crate::sync_state;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PullOutcome {
    /// Never published; nothing to compare against.
    Unlinked,
    InSync { status: Status, remote: Visibility },
    Updated {
        from: Status,
        to: Status,
        remote: Visibility,
    },
}

/// Local status implied by a remote visibility.
pub fn local_status(remote: Visibility) -> Status {
    if remote.is_published() {
        Status::Published
    } else {
        Status::Draft
    }
}

/// Fetch the remote record for `id` and align its local status.
pub fn pull(
    host: &dyn BlogHost,
    posts_dir: &Path,
    id: &PostId,
    retry: &RetryPolicy,
) -> Result<PullOutcome, PipelineError> {
    let mut unit = store::load_unit(posts_dir, id)?;
    let LinkState::Linked(external_id) = LinkState::of(&unit.metadata) else {
        tracing::debug!("{id}: not linked, skipping");
        return Ok(PullOutcome::Unlinked);
    };

    let classify = |e: &quill_remote::RemoteError| {
        if e.is_transient() {
            RetryAction::Retry
        } else {
            RetryAction::Abort
        }
    };
    let record = retry_with_backoff(retry, classify, || host.fetch(&external_id)).map_err(|failed| {
        if failed.error.is_not_found() {
            PipelineError::Reconcile(ReconcileError::RecordMissing {
                external_id: external_id.clone(),
            })
        } else if failed.error.is_transient() {
            PipelineError::StageFailed {
                stage: Stage::Reconcile,
                attempts: failed.attempts,
                message: failed.error.to_string(),
            }
        } else {
            PipelineError::Reconcile(ReconcileError::Remote {
                action: "fetch",
                source: failed.error,
            })
        }
    })?;

    let remote = record.visibility;
    let from = unit.metadata.status;
    let to = local_status(remote);

    if let Some(mut state) = sync_state::load(&unit.dir)? {
        if state.remote_status != Some(remote) {
            state.remote_status = Some(remote);
            sync_state::save(&unit.dir, &state)?;
        }
    }
    if from == to {
        return Ok(PullOutcome::InSync { status: from, remote });
    }

    unit.metadata.status = to;
    store::save_unit(&unit).map_err(SyncError::from)?;
    tracing::info!("{id}: status {from} -> {to} (remote {remote})");
    Ok(PullOutcome::Updated { from, to, remote })
}
