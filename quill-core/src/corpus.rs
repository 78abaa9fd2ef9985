//! Read contract for the rendering and listing layer.
//!
//! Consumers never see symbolic references: the body of a [`PublishedPost`]
//! has every reference resolved from the post's persisted manifest. Posts
//! whose manifest cannot resolve a reference keep that reference as-is.

use std::path::Path;

use chrono::{DateTime, Utc};

use crate::error::CorpusError;
use crate::store;
use crate::types::{ContentUnit, PostId, Status};
use crate::references;

/// A post as seen by readers.
#[derive(Debug, Clone, PartialEq)]
pub struct PublishedPost {
    pub id: PostId,
    pub title: String,
    pub date: DateTime<Utc>,
    pub status: Status,
    pub category: Option<String>,
    pub tags: Vec<String>,
    /// Body with references resolved to remote URLs.
    pub body: String,
}

impl PublishedPost {
    /// Build the reader view of a loaded unit.
    pub fn from_unit(unit: &ContentUnit) -> Self {
        let body = references::replace(&unit.body, |reference| {
            unit.assets
                .get(reference)
                .and_then(|record| record.remote_url.as_deref())
        });
        Self {
            id: unit.id.clone(),
            title: unit.metadata.title.clone(),
            // Loaded units always carry a date; `validate` enforces it.
            date: unit.metadata.date.unwrap_or_default(),
            status: unit.metadata.status,
            category: unit.metadata.category.clone(),
            tags: unit.metadata.tags.clone(),
            body,
        }
    }

    /// A post is visible only once published and no longer future-dated.
    pub fn is_visible(&self, now: DateTime<Utc>) -> bool {
        self.status == Status::Published && self.date <= now
    }
}

/// Load every post under `posts_dir`, newest first.
///
/// A post that does not load is logged and left out; only failing to list
/// the directory is an error.
pub fn load_corpus(posts_dir: &Path) -> Result<Vec<PublishedPost>, CorpusError> {
    let mut posts = Vec::new();
    for id in store::list_post_ids(posts_dir)? {
        match store::load_unit(posts_dir, &id) {
            Ok(unit) => posts.push(PublishedPost::from_unit(&unit)),
            Err(e) => tracing::warn!("{id}: skipped: {e}"),
        }
    }
    posts.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| a.id.cmp(&b.id)));
    Ok(posts)
}

/// Posts readers may see at `now`, newest first.
pub fn visible_posts(
    posts_dir: &Path,
    now: DateTime<Utc>,
) -> Result<Vec<PublishedPost>, CorpusError> {
    Ok(load_corpus(posts_dir)?
        .into_iter()
        .filter(|p| p.is_visible(now))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint;
    use chrono::Duration;
    use tempfile::TempDir;

    fn write(root: &Path, id: &str, status: &str, date: &str, body: &str) {
        let dir = root.join(id);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("post.md"),
            format!("---\ntitle: {id}\ndate: {date}\nstatus: {status}\n---\n{body}"),
        )
        .unwrap();
    }

    #[test]
    fn future_dated_posts_are_hidden_even_when_published() {
        let tmp = TempDir::new().unwrap();
        let now: DateTime<Utc> = "2025-10-12T12:00:00Z".parse().unwrap();
        write(tmp.path(), "past", "published", "2025-10-01T00:00:00Z", "x\n");
        write(tmp.path(), "future", "published", "2025-11-01T00:00:00Z", "x\n");
        write(tmp.path(), "draft", "draft", "2025-09-01T00:00:00Z", "x\n");

        let visible = visible_posts(tmp.path(), now).unwrap();
        let ids: Vec<_> = visible.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["past"]);

        let later = visible_posts(tmp.path(), now + Duration::days(60)).unwrap();
        assert_eq!(later.len(), 2);
        assert_eq!(later[0].id.as_str(), "future", "newest first");
    }

    #[test]
    fn unloadable_posts_are_skipped() {
        let tmp = TempDir::new().unwrap();
        let now: DateTime<Utc> = "2025-10-12T12:00:00Z".parse().unwrap();
        write(tmp.path(), "good", "published", "2025-10-01T00:00:00Z", "x\n");
        let broken = tmp.path().join("broken");
        std::fs::create_dir_all(&broken).unwrap();
        std::fs::write(
            broken.join("post.md"),
            "---\ndate: 2025-10-01T00:00:00Z\nstatus: published\n---\nno title\n",
        )
        .unwrap();

        let visible = visible_posts(tmp.path(), now).unwrap();
        let ids: Vec<_> = visible.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["good"]);
    }

    #[test]
    fn body_references_resolve_from_manifest() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("p");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("a.png"), b"A").unwrap();
        std::fs::write(dir.join("b.png"), b"B").unwrap();
        std::fs::write(
            dir.join("post.md"),
            format!(
                "---\ntitle: P\ndate: 2025-10-01T00:00:00Z\nstatus: published\nassets:\n  a.png:\n    contentHash: {}\n    remoteUrl: https://cdn/a.png\n---\n![a](./a.png) ![b](b.png)\n",
                fingerprint::of_bytes(b"A")
            ),
        )
        .unwrap();

        let posts = load_corpus(tmp.path()).unwrap();
        assert_eq!(posts[0].body, "![a](https://cdn/a.png) ![b](b.png)\n");
    }
}
