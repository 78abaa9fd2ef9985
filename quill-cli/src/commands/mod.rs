pub mod diff;
pub mod init;
pub mod new;
pub mod publish;
pub mod pull;
pub mod status;

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};

use quill_core::config::{self, QuillConfig};
use quill_core::{store, PostId};
use quill_sync::{PublishOptions, RetryPolicy};

/// A loaded corpus: its root and `quill.yaml`.
pub struct Workspace {
    pub config: QuillConfig,
    pub posts_dir: PathBuf,
    pub state_dir: PathBuf,
}

impl Workspace {
    pub fn load(root: &Path) -> Result<Self> {
        let config = config::load_at(root)
            .with_context(|| format!("no usable corpus at '{}'; run `quill init`", root.display()))?;
        let workspace = Self {
            posts_dir: config.posts_path(root),
            state_dir: config.state_path(root),
            config,
        };
        tracing::debug!(
            "corpus at {}: posts in {}, state in {}",
            root.display(),
            workspace.posts_dir.display(),
            workspace.state_dir.display()
        );
        Ok(workspace)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.config.timeout_secs)
    }

    pub fn retry(&self) -> RetryPolicy {
        RetryPolicy::from(&self.config.retry)
    }

    pub fn options(&self, dry_run: bool) -> PublishOptions {
        PublishOptions {
            dry_run,
            body_format: self.config.body_format,
            concurrency: self.config.concurrency,
            retry: self.retry(),
        }
    }

    /// Every post id, or just `id` when given.
    pub fn ids(&self, id: Option<&str>) -> Result<Vec<PostId>> {
        match id {
            Some(raw) => Ok(vec![parse_id(raw)?]),
            None => store::list_post_ids(&self.posts_dir)
                .with_context(|| format!("failed to list posts in '{}'", self.posts_dir.display())),
        }
    }
}

pub fn parse_id(raw: &str) -> Result<PostId> {
    PostId::parse(raw).with_context(|| format!("'{raw}' is not a valid post id"))
}
