//! `quill publish`: upload images and create or update remote posts.

use std::path::Path;

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;

use quill_core::PostId;
use quill_remote::{HttpBlogHost, HttpImageHost, Notifier, WebhookNotifier};
use quill_sync::{Outcome, PipelineError, PublishReport, Publisher};

use super::{parse_id, Workspace};

/// Arguments for `quill publish`.
#[derive(Args, Debug)]
pub struct PublishArgs {
    /// Post id to publish (omit when using `--all`).
    pub id: Option<String>,

    /// Publish every post in the corpus.
    #[arg(long, conflicts_with = "id")]
    pub all: bool,

    /// Show what would be uploaded and sent without any network call or write.
    #[arg(long)]
    pub dry_run: bool,
}

impl PublishArgs {
    pub fn run(self, root: &Path) -> Result<()> {
        let workspace = Workspace::load(root)?;
        let config = &workspace.config;
        let timeout = workspace.timeout();

        let images = HttpImageHost::new(&config.image_host, timeout);
        let blog = HttpBlogHost::new(&config.blog_host, timeout);
        let webhook = config
            .notify
            .as_ref()
            .map(|notify| WebhookNotifier::new(notify, timeout));

        let mut publisher = Publisher::new(
            &workspace.posts_dir,
            &workspace.state_dir,
            &images,
            &blog,
            workspace.options(self.dry_run),
        );
        if let Some(webhook) = webhook.as_ref() {
            publisher = publisher.with_notifier(webhook as &dyn Notifier);
        }

        let results = if self.all {
            publisher.publish_all().context("publish --all failed")?
        } else {
            let raw = self
                .id
                .as_deref()
                .context("provide a post id or use --all")?;
            let id = parse_id(raw)?;
            let result = publisher.publish(&id);
            vec![(id, result)]
        };

        if results.is_empty() {
            println!("No posts found in '{}'.", workspace.posts_dir.display());
            return Ok(());
        }

        let mut failed = 0;
        for (id, result) in &results {
            match result {
                Ok(report) => print_report(report, self.dry_run),
                Err(err) => {
                    failed += 1;
                    print_failure(id, err);
                }
            }
        }
        if failed > 0 {
            bail!("{failed} of {} post(s) failed", results.len());
        }
        Ok(())
    }
}

fn print_report(report: &PublishReport, dry_run: bool) {
    let prefix = if dry_run { "[dry-run] " } else { "" };
    let mark = match report.outcome {
        Outcome::Created | Outcome::Updated => "✓".green(),
        Outcome::Unchanged | Outcome::WouldSkip => "·".bright_black(),
        Outcome::WouldCreate | Outcome::WouldUpdate => "~".yellow(),
    };
    let mut line = format!("{prefix}{mark} '{}' {}", report.id, report.outcome);
    if let Some(external_id) = report.external_id.as_ref() {
        line.push_str(&format!(" [{external_id}]"));
    }
    if let Some(status) = report.remote_status {
        line.push_str(&format!(" {status}"));
    }
    println!("{line}");

    if let Some(url) = report.url.as_ref() {
        println!("  →  {url}");
    }
    if report.uploaded + report.reused > 0 {
        println!("  ⇡  {} uploaded, {} reused", report.uploaded, report.reused);
    }
    for reference in &report.pending_uploads {
        println!("  ~  {reference}");
    }
    for warning in &report.warnings {
        println!("  {}  {warning}", "!".yellow().bold());
    }
}

fn print_failure(id: &PostId, err: &PipelineError) {
    tracing::warn!("{id}: publish failed: {err:?}");
    println!("{} '{id}' failed: {err}", "✗".red().bold());
    if let PipelineError::Reconcile(quill_sync::ReconcileError::RecordMissing { .. }) = err {
        println!("  The remote post is gone. Remove externalId from its header to publish it anew.");
    }
}
