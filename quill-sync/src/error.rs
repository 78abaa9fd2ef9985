//! Error types for quill-sync.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use quill_core::{CorpusError, ExternalId};
use quill_remote::RemoteError;

/// Local storage errors: sync state, asset index, post files.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Corpus(#[from] CorpusError),

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{path} has version {found}; this build supports up to {supported}")]
    UnsupportedVersion {
        path: PathBuf,
        found: u32,
        supported: u32,
    },
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}

pub(crate) fn json_err(path: impl Into<PathBuf>, source: serde_json::Error) -> SyncError {
    SyncError::Json {
        path: path.into(),
        source,
    }
}

/// Failures of the create-or-update step against the hosting platform.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// The call was rejected or never answered; nothing is known to be applied.
    #[error("{action} failed: {source}")]
    Remote {
        action: &'static str,
        #[source]
        source: RemoteError,
    },

    /// The post is linked but the platform no longer has the record.
    #[error("remote record {external_id} no longer exists; it will not be re-created")]
    RecordMissing { external_id: ExternalId },

    /// Content was updated but the visibility change failed.
    #[error("content of {external_id} was updated but {action} failed: {source}")]
    PartiallyApplied {
        external_id: ExternalId,
        action: &'static str,
        #[source]
        source: RemoteError,
    },
}

impl ReconcileError {
    /// Only a call that applied nothing may be repeated.
    pub fn is_transient(&self) -> bool {
        match self {
            ReconcileError::Remote { source, .. } => source.is_transient(),
            ReconcileError::RecordMissing { .. } | ReconcileError::PartiallyApplied { .. } => false,
        }
    }
}

/// Pipeline stages that can fail or be cancelled, in execution order.
///
/// Persist and notify follow reconcile and are not listed. A failed write
/// surfaces as [`PipelineError::Storage`]; a failed notification is a warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Load,
    Detect,
    Assets,
    Rewrite,
    Reconcile,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Load => "load",
            Stage::Detect => "detect",
            Stage::Assets => "assets",
            Stage::Rewrite => "rewrite",
            Stage::Reconcile => "reconcile",
        };
        f.write_str(name)
    }
}

/// Why a publish run stopped. Nothing is persisted for any of these.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A local invariant failed before any network call.
    #[error(transparent)]
    Invalid(#[from] CorpusError),

    #[error(transparent)]
    Storage(#[from] SyncError),

    /// Transient failures outlasted the retry budget.
    #[error("{stage} stage failed after {attempts} attempt(s): {message}")]
    StageFailed {
        stage: Stage,
        attempts: u32,
        message: String,
    },

    #[error(transparent)]
    Reconcile(#[from] ReconcileError),

    #[error("cancelled before the {stage} stage")]
    Cancelled { stage: Stage },
}
