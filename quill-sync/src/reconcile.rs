//! Create-or-update against the hosting platform.
//!
//! ```text
//!   Unlinked ──create──▶ Linked(id) ──update──▶ Linked(id)
//!                            │
//!                            └─ update → 404 ─▶ RecordMissing (reported, never re-created)
//! ```
//!
//! An update is two calls: the content update, then `publish` or `revert`
//! only when the platform reports the wrong side of draft/published. A
//! failure of that second call is [`ReconcileError::PartiallyApplied`].
//! Nothing in this module retries.

use chrono::{DateTime, Utc};

use quill_core::{fingerprint, ContentHash, ContentUnit, ExternalId, Metadata, Status};
use quill_remote::{BlogHost, RemotePost, RemoteRecord, Visibility};

use crate::error::ReconcileError;

/// Whether a unit has a remote counterpart yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkState {
    Unlinked,
    Linked(ExternalId),
}

impl LinkState {
    pub fn of(metadata: &Metadata) -> Self {
        match metadata.external_id() {
            Some(id) => LinkState::Linked(id.clone()),
            None => LinkState::Unlinked,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileAction {
    Create,
    Update(ExternalId),
}

/// Decide create vs update from the persisted external identifier.
pub fn plan(unit: &ContentUnit) -> ReconcileAction {
    match LinkState::of(&unit.metadata) {
        LinkState::Unlinked => ReconcileAction::Create,
        LinkState::Linked(id) => ReconcileAction::Update(id),
    }
}

/// Result of a successful reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciled {
    pub action: ReconcileAction,
    pub external_id: ExternalId,
    pub remote_status: Visibility,
    pub url: Option<String>,
}

/// Remote visibility for a local status. Published posts dated in the
/// future are scheduled for their date.
pub fn target_visibility(
    status: Status,
    date: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> (Visibility, Option<DateTime<Utc>>) {
    match (status, date) {
        (Status::Draft, _) => (Visibility::Draft, None),
        (Status::Published, Some(date)) if date > now => (Visibility::Scheduled, Some(date)),
        (Status::Published, _) => (Visibility::Live, None),
    }
}

/// The record to send for `unit` with an already formatted body.
pub fn remote_post(metadata: &Metadata, content: String, now: DateTime<Utc>) -> RemotePost {
    let (visibility, publish_at) = target_visibility(metadata.status, metadata.date, now);
    RemotePost {
        title: metadata.title.clone(),
        content,
        labels: metadata.tags.clone(),
        visibility,
        publish_at,
    }
}

/// Fingerprint of everything a [`RemotePost`] sends.
pub fn payload_fingerprint(post: &RemotePost) -> ContentHash {
    let labels = post.labels.join("\u{1f}");
    let visibility = post.visibility.to_string();
    let publish_at = post.publish_at.map(|d| d.to_rfc3339()).unwrap_or_default();
    let fields: [&str; 5] = [&post.title, &labels, &visibility, &publish_at, &post.content];
    let mut text = String::with_capacity(post.content.len() + 128);
    for field in fields {
        text.push_str(field);
        text.push('\u{0}');
    }
    fingerprint::of_bytes(text.as_bytes())
}

/// Apply `action` for `post`.
pub fn reconcile(
    host: &dyn BlogHost,
    action: &ReconcileAction,
    post: &RemotePost,
) -> Result<Reconciled, ReconcileError> {
    match action {
        ReconcileAction::Create => {
            let record = host.create(post).map_err(|source| ReconcileError::Remote {
                action: "create",
                source,
            })?;
            tracing::info!("created remote record {} ({})", record.id, record.visibility);
            Ok(finish(action, record))
        }
        ReconcileAction::Update(id) => {
            let record = host.update(id, post).map_err(|source| {
                if source.is_not_found() {
                    ReconcileError::RecordMissing {
                        external_id: id.clone(),
                    }
                } else {
                    ReconcileError::Remote {
                        action: "update",
                        source,
                    }
                }
            })?;
            let record = align_visibility(host, id, post, record)?;
            Ok(finish(action, record))
        }
    }
}

fn align_visibility(
    host: &dyn BlogHost,
    id: &ExternalId,
    post: &RemotePost,
    record: RemoteRecord,
) -> Result<RemoteRecord, ReconcileError> {
    let wanted = post.visibility.is_published();
    if record.visibility.is_published() == wanted {
        return Ok(record);
    }
    let (action, result) = if wanted {
        ("publish", host.publish(id, post.publish_at))
    } else {
        ("revert", host.revert(id))
    };
    result.map_err(|source| {
        tracing::warn!("{id}: content updated but {action} failed: {source}");
        ReconcileError::PartiallyApplied {
            external_id: id.clone(),
            action,
            source,
        }
    })
}

fn finish(action: &ReconcileAction, record: RemoteRecord) -> Reconciled {
    Reconciled {
        action: action.clone(),
        external_id: record.id,
        remote_status: record.visibility,
        url: record.url,
    }
}
