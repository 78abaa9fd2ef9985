//! `quill diff <post-id>`: show the body rewrite a publish would send.

use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;

use quill_sync::asset_index::AssetIndex;
use quill_sync::diff::diff_post;

use super::{parse_id, Workspace};

/// Arguments for `quill diff`.
#[derive(Args, Debug)]
pub struct DiffArgs {
    /// Post id to diff.
    pub id: String,
}

impl DiffArgs {
    pub fn run(self, root: &Path) -> Result<()> {
        let workspace = Workspace::load(root)?;
        let id = parse_id(&self.id)?;
        let index = AssetIndex::open(&workspace.state_dir);

        let diff = diff_post(&workspace.posts_dir, &id, &index)
            .with_context(|| format!("diff failed for '{id}'"))?;

        if diff.is_empty() {
            println!("No differences for '{id}'.");
        } else {
            print!("{}", diff.unified_diff);
            if !diff.unified_diff.ends_with('\n') {
                println!();
            }
        }
        for reference in &diff.unresolved {
            println!("  ?  {reference} (not uploaded yet)");
        }
        Ok(())
    }
}
