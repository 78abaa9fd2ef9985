//! `quill status`: what a publish would do, per post.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use quill_sync::asset_index::AssetIndex;
use quill_sync::pipeline::preview;
use quill_sync::{Outcome, PublishReport};

use super::Workspace;

/// Arguments for `quill status`.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl StatusArgs {
    pub fn run(self, root: &Path) -> Result<()> {
        let workspace = Workspace::load(root)?;
        let index = AssetIndex::open(&workspace.state_dir);

        let rows: Vec<PostStatus> = workspace
            .ids(None)?
            .into_iter()
            .map(|id| {
                match preview(&workspace.posts_dir, &index, workspace.config.body_format, &id) {
                    Ok(report) => PostStatus::from_report(&report),
                    Err(err) => PostStatus::invalid(id.to_string(), err.to_string()),
                }
            })
            .collect();

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&rows).context("failed to serialize status JSON")?
            );
            return Ok(());
        }
        print_table(&rows);
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct PostStatus {
    id: String,
    /// `draft` / `published`, or `invalid` when the post does not load.
    status: String,
    external_id: Option<String>,
    remote_status: Option<String>,
    plan: String,
    pending_uploads: Vec<String>,
    last_sync_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip)]
    needs_publish: bool,
}

impl PostStatus {
    fn from_report(report: &PublishReport) -> Self {
        Self {
            id: report.id.to_string(),
            status: report.local_status.to_string(),
            external_id: report.external_id.as_ref().map(|e| e.to_string()),
            remote_status: report.remote_status.map(|s| s.to_string()),
            plan: plan_key(report.outcome).to_string(),
            pending_uploads: report.pending_uploads.clone(),
            last_sync_at: report.synced_at,
            error: None,
            needs_publish: report.outcome != Outcome::WouldSkip,
        }
    }

    fn invalid(id: String, error: String) -> Self {
        Self {
            id,
            status: "invalid".to_string(),
            external_id: None,
            remote_status: None,
            plan: "blocked".to_string(),
            pending_uploads: Vec::new(),
            last_sync_at: None,
            error: Some(error),
            needs_publish: false,
        }
    }
}

#[derive(Tabled)]
struct StatusTableRow {
    #[tabled(rename = "post")]
    id: String,
    #[tabled(rename = "status")]
    status: String,
    #[tabled(rename = "remote")]
    remote: String,
    #[tabled(rename = "plan")]
    plan: String,
    #[tabled(rename = "last sync")]
    last_sync: String,
}

fn plan_key(outcome: Outcome) -> &'static str {
    match outcome {
        Outcome::WouldCreate | Outcome::Created => "create",
        Outcome::WouldUpdate | Outcome::Updated => "update",
        Outcome::WouldSkip | Outcome::Unchanged => "current",
    }
}

fn plan_label(row: &PostStatus) -> String {
    let label = match row.plan.as_str() {
        "create" => "CREATE",
        "update" => "UPDATE",
        "current" => "CURRENT",
        _ => "BLOCKED",
    };
    match row.pending_uploads.len() {
        0 => label.to_string(),
        n => format!("{label} (+{n} image{})", if n == 1 { "" } else { "s" }),
    }
}

fn print_table(rows: &[PostStatus]) {
    let pending = rows.iter().filter(|r| r.needs_publish).count();
    let invalid = rows.iter().filter(|r| r.error.is_some()).count();
    println!(
        "quill v{} | {} posts | {} to publish | {} invalid",
        env!("CARGO_PKG_VERSION"),
        rows.len(),
        pending,
        invalid,
    );
    if rows.is_empty() {
        println!("No posts yet. Run `quill new <id> --title ...` to start one.");
        return;
    }

    let table_rows: Vec<StatusTableRow> = rows
        .iter()
        .map(|row| StatusTableRow {
            id: row.id.clone(),
            status: row.status.clone(),
            remote: match (&row.external_id, &row.remote_status) {
                (Some(id), Some(status)) => format!("{status} [{id}]"),
                (Some(id), None) => format!("[{id}]"),
                (None, _) => "-".to_string(),
            },
            plan: plan_label(row),
            last_sync: row
                .last_sync_at
                .map(format_age)
                .unwrap_or_else(|| "never".to_string()),
        })
        .collect();
    let mut table = Table::new(table_rows);
    table.with(Style::rounded());
    println!("{table}");

    for row in rows {
        if let Some(error) = row.error.as_ref() {
            println!("{} {}: {error}", "✗".red().bold(), row.id);
        }
    }
    if pending > 0 {
        println!("Run 'quill publish --all' to bring them up to date.");
    }
}

fn format_age(timestamp: DateTime<Utc>) -> String {
    let seconds = Utc::now()
        .signed_duration_since(timestamp)
        .num_seconds()
        .max(0);
    let age = if seconds < 60 {
        format!("{seconds}s")
    } else if seconds < 60 * 60 {
        format!("{}m", seconds / 60)
    } else if seconds < 60 * 60 * 24 {
        format!("{}h", seconds / (60 * 60))
    } else {
        format!("{}d", seconds / (60 * 60 * 24))
    };
    format!("{age} ago")
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    #[test]
    fn age_picks_the_largest_whole_unit() {
        assert_eq!(format_age(Utc::now() - Duration::seconds(5)), "5s ago");
        assert_eq!(format_age(Utc::now() - Duration::minutes(3)), "3m ago");
        assert_eq!(format_age(Utc::now() - Duration::hours(7)), "7h ago");
        assert_eq!(format_age(Utc::now() - Duration::days(2)), "2d ago");
        assert_eq!(format_age(Utc::now() + Duration::hours(1)), "0s ago");
    }

    #[test]
    fn plan_keys_collapse_dry_and_real_outcomes() {
        assert_eq!(plan_key(Outcome::WouldCreate), "create");
        assert_eq!(plan_key(Outcome::Updated), "update");
        assert_eq!(plan_key(Outcome::WouldSkip), "current");
    }
}
