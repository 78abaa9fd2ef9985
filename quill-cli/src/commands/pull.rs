//! `quill pull [<post-id>]`: adopt remote visibility into local status.

use std::path::Path;

use anyhow::{bail, Result};
use clap::Args;
use colored::Colorize;

use quill_remote::HttpBlogHost;
use quill_sync::pull::{pull, PullOutcome};

use super::Workspace;

/// Arguments for `quill pull`.
#[derive(Args, Debug)]
pub struct PullArgs {
    /// Only this post; every linked post otherwise.
    pub id: Option<String>,
}

impl PullArgs {
    pub fn run(self, root: &Path) -> Result<()> {
        let workspace = Workspace::load(root)?;
        let blog = HttpBlogHost::new(&workspace.config.blog_host, workspace.timeout());
        let retry = workspace.retry();

        let mut failed = 0;
        for id in workspace.ids(self.id.as_deref())? {
            match pull(&blog, &workspace.posts_dir, &id, &retry) {
                Ok(PullOutcome::Unlinked) => {}
                Ok(PullOutcome::InSync { status, remote }) => {
                    println!("{} '{id}' {status} ({remote})", "·".bright_black());
                }
                Ok(PullOutcome::Updated { from, to, remote }) => {
                    println!("{} '{id}' {from} → {to} ({remote})", "✓".green());
                }
                Err(err) => {
                    failed += 1;
                    tracing::warn!("{id}: pull failed: {err:?}");
                    println!("{} '{id}' failed: {err}", "✗".red().bold());
                }
            }
        }
        if failed > 0 {
            bail!("{failed} post(s) could not be pulled");
        }
        Ok(())
    }
}
