//! Unified diff of a post body against the body a publish would send.

use std::path::Path;

use similar::TextDiff;

use quill_core::{store, ContentUnit, PostId};

use crate::asset_index::AssetIndex;
use crate::rewrite::{self, ResolutionTable};
use crate::SyncError;

/// Diff for one post. `unified_diff` is empty when nothing would be rewritten.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BodyDiff {
    pub id: PostId,
    pub unified_diff: String,
    /// References with no known URL; they would be sent untouched.
    pub unresolved: Vec<String>,
}

impl BodyDiff {
    pub fn is_empty(&self) -> bool {
        self.unified_diff.is_empty()
    }
}

/// Load the post `id` and diff it. No network, no writes.
pub fn diff_post(posts_dir: &Path, id: &PostId, index: &AssetIndex) -> Result<BodyDiff, SyncError> {
    let unit = store::load_unit(posts_dir, id)?;
    diff_unit(&unit, index)
}

/// Diff the local body against its rewrite, using only URLs already known
/// from the post's manifest or the asset index.
pub fn diff_unit(unit: &ContentUnit, index: &AssetIndex) -> Result<BodyDiff, SyncError> {
    let table = ResolutionTable::known(unit, index)?;
    let local = normalize_line_endings(&unit.body);
    let rewritten = rewrite::rewrite(&local, &table);

    let unified_diff = if rewritten.body == local {
        String::new()
    } else {
        let old_header = format!("a/{}/{}", unit.id, store::POST_FILE);
        let new_header = format!("b/{}/{}", unit.id, store::POST_FILE);
        TextDiff::from_lines(&local, &rewritten.body)
            .unified_diff()
            .header(&old_header, &new_header)
            .context_radius(3)
            .to_string()
    };

    Ok(BodyDiff {
        id: unit.id.clone(),
        unified_diff,
        unresolved: rewritten.unresolved,
    })
}

fn normalize_line_endings(content: &str) -> String {
    content.replace("\r\n", "\n")
}
