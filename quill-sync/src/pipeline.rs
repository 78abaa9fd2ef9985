//! Publish pipeline: load → detect → assets → rewrite → reconcile → persist → notify.
//!
//! Every stage before reconciliation is side-effect free on local files, so
//! any failure up to and including reconciliation leaves `post.md` and
//! `.sync-state.json` byte-identical. Once the remote record has changed the
//! run always goes on to persist, so the external identifier is never lost.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};

use quill_core::config::BodyFormat;
use quill_core::{store, ContentUnit, ExternalId, PostId, Status};
use quill_remote::{markup, BlogHost, ImageHost, Notifier, PublishedEvent, RemotePost, Visibility};

use crate::asset_index::AssetIndex;
use crate::assets::{AssetEngine, AssetSyncReport, PendingAsset};
use crate::detect::{self, ChangeSet};
use crate::error::{PipelineError, ReconcileError, Stage, SyncError};
use crate::reconcile::{self, ReconcileAction, Reconciled};
use crate::retry::{retry_with_backoff, RetryAction, RetryPolicy};
use crate::rewrite::{self, ResolutionTable};
use crate::sync_state::{self, SyncState, STATE_VERSION};

// ---------------------------------------------------------------------------
// Options, cancellation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishOptions {
    /// Stop after detection and planning: no network, no writes.
    pub dry_run: bool,
    pub body_format: BodyFormat,
    /// Upper bound on parallel posts, and on parallel uploads per post.
    pub concurrency: usize,
    pub retry: RetryPolicy,
}

impl Default for PublishOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            body_format: BodyFormat::default(),
            concurrency: 4,
            retry: RetryPolicy::default(),
        }
    }
}

/// Cooperative cancellation, checked between stages.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Created,
    Updated,
    /// Linked and the payload matches the last one sent: no remote call.
    Unchanged,
    WouldCreate,
    WouldUpdate,
    WouldSkip,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Outcome::Created => "created",
            Outcome::Updated => "updated",
            Outcome::Unchanged => "unchanged",
            Outcome::WouldCreate => "would create",
            Outcome::WouldUpdate => "would update",
            Outcome::WouldSkip => "up to date",
        };
        f.write_str(label)
    }
}

/// Non-fatal problems; the run still succeeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    AssetRejected {
        references: Vec<String>,
        message: String,
    },
    UnresolvedReference {
        reference: String,
    },
    NotifyFailed {
        message: String,
    },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::AssetRejected {
                references,
                message,
            } => write!(f, "asset {} rejected: {message}", references.join(", ")),
            Warning::UnresolvedReference { reference } => {
                write!(f, "'{reference}' has no URL yet and was sent as-is")
            }
            Warning::NotifyFailed { message } => write!(f, "notification failed: {message}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishReport {
    pub id: PostId,
    pub outcome: Outcome,
    pub local_status: Status,
    pub external_id: Option<ExternalId>,
    pub remote_status: Option<Visibility>,
    pub url: Option<String>,
    pub synced_at: Option<DateTime<Utc>>,
    /// Distinct hashes uploaded by this run.
    pub uploaded: usize,
    /// Distinct hashes resolved from the asset index.
    pub reused: usize,
    /// References a dry run would upload.
    pub pending_uploads: Vec<String>,
    pub warnings: Vec<Warning>,
}

impl PublishReport {
    fn new(unit: &ContentUnit, state: Option<&SyncState>, outcome: Outcome) -> Self {
        Self {
            id: unit.id.clone(),
            outcome,
            local_status: unit.metadata.status,
            external_id: unit.metadata.external_id().cloned(),
            remote_status: state.and_then(|s| s.remote_status),
            url: None,
            synced_at: state.map(|s| s.synced_at),
            uploaded: 0,
            reused: 0,
            pending_uploads: Vec::new(),
            warnings: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Publisher
// ---------------------------------------------------------------------------

pub struct Publisher<'a> {
    posts_dir: PathBuf,
    index: AssetIndex,
    images: &'a dyn ImageHost,
    blog: &'a dyn BlogHost,
    notifier: Option<&'a dyn Notifier>,
    options: PublishOptions,
    cancel: CancelToken,
}

impl<'a> Publisher<'a> {
    pub fn new(
        posts_dir: &Path,
        state_dir: &Path,
        images: &'a dyn ImageHost,
        blog: &'a dyn BlogHost,
        options: PublishOptions,
    ) -> Self {
        Self {
            posts_dir: posts_dir.to_path_buf(),
            index: AssetIndex::open(state_dir),
            images,
            blog,
            notifier: None,
            options,
            cancel: CancelToken::default(),
        }
    }

    pub fn with_notifier(mut self, notifier: &'a dyn Notifier) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn index(&self) -> &AssetIndex {
        &self.index
    }

    pub fn posts_dir(&self) -> &Path {
        &self.posts_dir
    }

    /// Publish every post, at most `concurrency` at a time. Each post's
    /// result is independent of the others; results are sorted by id.
    pub fn publish_all(&self) -> Result<Vec<(PostId, Result<PublishReport, PipelineError>)>, SyncError> {
        let ids = store::list_post_ids(&self.posts_dir)?;
        let next = AtomicUsize::new(0);
        let (next, ids_ref) = (&next, &ids);
        let workers = self.options.concurrency.max(1).min(ids.len());

        let mut results: Vec<(PostId, Result<PublishReport, PipelineError>)> =
            std::thread::scope(|s| {
                let handles: Vec<_> = (0..workers)
                    .map(|_| {
                        s.spawn(move || {
                            let mut done = Vec::new();
                            loop {
                                let i = next.fetch_add(1, Ordering::SeqCst);
                                let Some(id) = ids_ref.get(i) else { break };
                                done.push((id.clone(), self.publish(id)));
                            }
                            done
                        })
                    })
                    .collect();
                handles
                    .into_iter()
                    .flat_map(|h| h.join().unwrap_or_else(|panic| std::panic::resume_unwind(panic)))
                    .collect()
            });
        results.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(results)
    }

    /// Run the full pipeline for one post (or [`preview`](Self::preview) it
    /// when `dry_run` is set).
    pub fn publish(&self, id: &PostId) -> Result<PublishReport, PipelineError> {
        if self.options.dry_run {
            return self.preview(id);
        }

        // 1. Load + validate. Local invariants fail here, before any network call.
        self.checkpoint(Stage::Load)?;
        let mut unit = store::load_unit(&self.posts_dir, id)?;
        let state = sync_state::load(&unit.dir)?;

        // 2. Detect.
        self.checkpoint(Stage::Detect)?;
        let changes = detect::detect(&unit, state.as_ref());
        let action = reconcile::plan(&unit);

        // 3. Assets.
        self.checkpoint(Stage::Assets)?;
        let pending = pending_assets(&unit, &changes);
        let assets = if pending.is_empty() {
            AssetSyncReport::default()
        } else {
            AssetEngine::new(self.images, &self.index, &self.options.retry, self.options.concurrency)
                .sync(&pending)?
        };
        if let Some(failure) = assets.exhausted.first() {
            return Err(PipelineError::StageFailed {
                stage: Stage::Assets,
                attempts: failure.attempts,
                message: assets
                    .exhausted
                    .iter()
                    .map(|f| format!("{}: {}", f.references.join(", "), f.message))
                    .collect::<Vec<_>>()
                    .join("; "),
            });
        }
        let mut report = PublishReport::new(&unit, state.as_ref(), Outcome::Unchanged);
        report.uploaded = assets.uploaded;
        report.reused = assets.reused;
        report.warnings.extend(assets.rejected.iter().map(|f| Warning::AssetRejected {
            references: f.references.clone(),
            message: f.message.clone(),
        }));
        for record in unit.assets.values_mut() {
            if record.remote_url.is_some() {
                continue;
            }
            if let Some(resolved) = assets.resolved.get(&record.content_hash) {
                record.remote_url = Some(resolved.remote_url.clone());
                record.uploaded_at = Some(resolved.uploaded_at);
            }
        }

        // 4. Rewrite, format, build payload.
        self.checkpoint(Stage::Rewrite)?;
        let now = Utc::now();
        let (post, unresolved) = build_post(
            &unit,
            &ResolutionTable::from_unit(&unit),
            self.options.body_format,
            now,
        );
        let rejected: Vec<&String> = assets.rejected.iter().flat_map(|f| &f.references).collect();
        report.warnings.extend(
            unresolved
                .into_iter()
                .filter(|r| !rejected.contains(&r))
                .map(|reference| Warning::UnresolvedReference { reference }),
        );
        let payload_hash = reconcile::payload_fingerprint(&post);

        // 5. Reconcile, or skip when the platform already has this payload.
        self.checkpoint(Stage::Reconcile)?;
        let unchanged = matches!(action, ReconcileAction::Update(_))
            && state.as_ref().is_some_and(|s| s.payload_hash == payload_hash);
        if unchanged {
            tracing::debug!("{id}: payload unchanged, skipping remote call");
            if unit.manifest() != unit.metadata.assets {
                store::save_unit(&unit).map_err(SyncError::from)?;
            }
            return Ok(report);
        }
        let reconciled = self.reconcile_with_retry(&action, &post)?;

        // 6. Persist: post file first, then the snapshot.
        unit.metadata.link_external_id(reconciled.external_id.clone());
        unit.metadata.updated_at = Some(now);
        store::save_unit(&unit).map_err(SyncError::from)?;
        let new_state = SyncState {
            version: STATE_VERSION,
            synced_at: now,
            body_hash: changes.body_hash.clone(),
            payload_hash,
            remote_status: Some(reconciled.remote_status),
            assets: unit
                .assets
                .iter()
                .filter(|(_, record)| record.remote_url.is_some())
                .map(|(reference, record)| (reference.clone(), record.content_hash.clone()))
                .collect(),
        };
        sync_state::save(&unit.dir, &new_state)?;
        tracing::info!(
            "{id}: {} {} ({})",
            if action == ReconcileAction::Create { "created" } else { "updated" },
            reconciled.external_id,
            reconciled.remote_status
        );

        report.outcome = match action {
            ReconcileAction::Create => Outcome::Created,
            ReconcileAction::Update(_) => Outcome::Updated,
        };
        report.external_id = Some(reconciled.external_id.clone());
        report.remote_status = Some(reconciled.remote_status);
        report.url = reconciled.url.clone();
        report.synced_at = Some(now);

        // 7. Notify.
        let was_live = state.as_ref().and_then(|s| s.remote_status) == Some(Visibility::Live);
        if reconciled.remote_status == Visibility::Live && !was_live {
            if let Some(warning) = self.notify(&unit, &reconciled) {
                report.warnings.push(warning);
            }
        }
        Ok(report)
    }

    /// Detection and planning only. See [`preview`].
    pub fn preview(&self, id: &PostId) -> Result<PublishReport, PipelineError> {
        preview(&self.posts_dir, &self.index, self.options.body_format, id)
    }

    fn checkpoint(&self, stage: Stage) -> Result<(), PipelineError> {
        if self.cancel.is_cancelled() {
            tracing::info!("cancelled before {stage}");
            return Err(PipelineError::Cancelled { stage });
        }
        Ok(())
    }

    fn reconcile_with_retry(
        &self,
        action: &ReconcileAction,
        post: &RemotePost,
    ) -> Result<Reconciled, PipelineError> {
        let classify = |e: &ReconcileError| {
            if e.is_transient() {
                RetryAction::Retry
            } else {
                RetryAction::Abort
            }
        };
        retry_with_backoff(&self.options.retry, classify, || {
            reconcile::reconcile(self.blog, action, post)
        })
        .map_err(|failed| {
            if failed.error.is_transient() {
                PipelineError::StageFailed {
                    stage: Stage::Reconcile,
                    attempts: failed.attempts,
                    message: failed.error.to_string(),
                }
            } else {
                PipelineError::Reconcile(failed.error)
            }
        })
    }

    fn notify(&self, unit: &ContentUnit, reconciled: &Reconciled) -> Option<Warning> {
        let notifier = self.notifier?;
        let event = PublishedEvent {
            id: unit.id.clone(),
            external_id: reconciled.external_id.clone(),
            title: unit.metadata.title.clone(),
            url: reconciled.url.clone(),
            status: reconciled.remote_status,
        };
        match notifier.notify(&event) {
            Ok(()) => None,
            Err(e) => {
                tracing::warn!("{}: notification failed: {e}", unit.id);
                Some(Warning::NotifyFailed {
                    message: e.to_string(),
                })
            }
        }
    }
}

/// Detection and planning from local files and the asset index alone: no
/// network, no writes. A linked post whose payload would hash the same as the
/// last one sent is [`Outcome::WouldSkip`].
pub fn preview(
    posts_dir: &Path,
    index: &AssetIndex,
    body_format: BodyFormat,
    id: &PostId,
) -> Result<PublishReport, PipelineError> {
    let unit = store::load_unit(posts_dir, id)?;
    let state = sync_state::load(&unit.dir)?;
    let changes = detect::detect(&unit, state.as_ref());

    let mut pending_uploads = Vec::new();
    for asset in pending_assets(&unit, &changes) {
        if index.lookup(&asset.content_hash)?.is_none() {
            pending_uploads.push(asset.reference);
        }
    }

    let outcome = match reconcile::plan(&unit) {
        ReconcileAction::Create => Outcome::WouldCreate,
        ReconcileAction::Update(_) if !pending_uploads.is_empty() => Outcome::WouldUpdate,
        ReconcileAction::Update(_) => {
            let table = ResolutionTable::known(&unit, index)?;
            let (post, _) = build_post(&unit, &table, body_format, Utc::now());
            let payload_hash = reconcile::payload_fingerprint(&post);
            if state.as_ref().is_some_and(|s| s.payload_hash == payload_hash) {
                Outcome::WouldSkip
            } else {
                Outcome::WouldUpdate
            }
        }
    };
    tracing::info!("[dry-run] {id}: {outcome}, {} upload(s)", pending_uploads.len());

    let mut report = PublishReport::new(&unit, state.as_ref(), outcome);
    report.pending_uploads = pending_uploads;
    Ok(report)
}

fn build_post(
    unit: &ContentUnit,
    table: &ResolutionTable,
    body_format: BodyFormat,
    now: DateTime<Utc>,
) -> (RemotePost, Vec<String>) {
    let rewritten = rewrite::rewrite(&unit.body, table);
    let content = markup::format_body(&rewritten.body, body_format);
    (
        reconcile::remote_post(&unit.metadata, content, now),
        rewritten.unresolved,
    )
}

/// Changed or unresolved references that still lack a URL. A changed
/// reference that already carries a URL for its current bytes (left by an
/// interrupted run) needs nothing.
fn pending_assets(unit: &ContentUnit, changes: &ChangeSet) -> Vec<PendingAsset> {
    changes
        .pending_assets()
        .filter_map(|reference| {
            let record = unit.assets.get(reference)?;
            if record.remote_url.is_some() {
                return None;
            }
            Some(PendingAsset {
                reference: reference.clone(),
                content_hash: record.content_hash.clone(),
                local_path: record.local_path.clone(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_token_is_shared_between_clones() {
        let token = CancelToken::default();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn warnings_render_for_humans() {
        let w = Warning::AssetRejected {
            references: vec!["a.png".to_string(), "b.png".to_string()],
            message: "HTTP 413".to_string(),
        };
        assert_eq!(w.to_string(), "asset a.png, b.png rejected: HTTP 413");
        let w = Warning::UnresolvedReference {
            reference: "c.png".to_string(),
        };
        assert!(w.to_string().contains("c.png"));
    }
}
