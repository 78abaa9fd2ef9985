//! `quill init`: write `quill.yaml` and the posts directory.

use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;

use quill_core::{config, store};

/// Write a commented `quill.yaml` at the corpus root. Existing files are kept.
#[derive(Args, Debug)]
pub struct InitArgs {}

impl InitArgs {
    pub fn run(self, root: &Path) -> Result<()> {
        let path = config::config_path(root);
        if path.exists() {
            println!("✓ Already initialized: {}", path.display());
            return Ok(());
        }
        store::write_atomic(&path, config::TEMPLATE.as_bytes())
            .with_context(|| format!("failed to write '{}'", path.display()))?;

        // The template is ours, so its posts_dir is always usable.
        let config = config::load_at(root).context("generated config did not load")?;
        let posts = config.posts_path(root);
        std::fs::create_dir_all(&posts)
            .with_context(|| format!("failed to create '{}'", posts.display()))?;

        println!("✓ Wrote {}", path.display());
        println!("  Posts go in: {}", posts.display());
        println!("  Set the token variables named in it before publishing.");
        Ok(())
    }
}
