//! # quill-sync
//!
//! Idempotent synchronization of posts with the image host and the blog
//! platform.
//!
//! Call [`Publisher::publish`] for one post or [`Publisher::publish_all`]
//! for the whole corpus. Repeating a run converges: unchanged assets are not
//! re-uploaded, unchanged payloads are not re-sent, and a post that already
//! has an external identifier is never created twice.

pub mod asset_index;
pub mod assets;
pub mod detect;
pub mod diff;
pub mod error;
pub mod pipeline;
pub mod pull;
pub mod reconcile;
pub mod retry;
pub mod rewrite;
pub mod sync_state;

pub use error::{PipelineError, ReconcileError, Stage, SyncError};
pub use pipeline::{CancelToken, Outcome, PublishOptions, PublishReport, Publisher, Warning};
pub use retry::RetryPolicy;
