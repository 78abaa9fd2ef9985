//! `quill new <post-id> --title <title>`

use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Args;

use quill_core::store;

use super::{parse_id, Workspace};

/// Create a draft post directory with a fresh header.
#[derive(Args, Debug)]
pub struct NewArgs {
    /// Directory name of the post; becomes its stable id.
    pub id: String,

    /// Post title.
    #[arg(long, short = 't')]
    pub title: String,
}

impl NewArgs {
    pub fn run(self, root: &Path) -> Result<()> {
        let workspace = Workspace::load(root)?;
        let id = parse_id(&self.id)?;
        let created = store::create_unit(&workspace.posts_dir, &id, &self.title, Utc::now(), "\n")
            .with_context(|| format!("failed to create post '{id}'"))?;
        match created {
            Some(dir) => println!("✓ Created draft '{id}' in {}", dir.display()),
            None => println!("✓ '{id}' already exists, left untouched"),
        }
        Ok(())
    }
}
