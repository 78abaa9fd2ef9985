//! Directory-per-post storage.
//!
//! # Storage layout
//!
//! ```text
//! <root>/
//!   quill.yaml
//!   posts/
//!     <post_id>/
//!       post.md             (metadata header + body)
//!       cover.png           (assets, referenced relatively from the body)
//!       .sync-state.json    (owned by quill-sync)
//!   .quill/
//!     assets/<hash>.json    (global asset index, owned by quill-sync)
//! ```
//!
//! Every write goes through [`write_atomic`]: the rendering layer reads these
//! files directly and must never see a half-written header.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::error::{io_err, CorpusError};
use crate::types::{AssetRecord, ContentUnit, Metadata, PostId};
use crate::{fingerprint, frontmatter, references};

/// File name of the post document inside each post directory.
pub const POST_FILE: &str = "post.md";

// ---------------------------------------------------------------------------
// 1. Path helpers
// ---------------------------------------------------------------------------

/// `<posts_dir>/<id>/`: pure, no I/O.
pub fn post_dir(posts_dir: &Path, id: &PostId) -> PathBuf {
    posts_dir.join(id.as_str())
}

/// Lists the ids of all post directories (those containing `post.md`), sorted.
pub fn list_post_ids(posts_dir: &Path) -> Result<Vec<PostId>, CorpusError> {
    if !posts_dir.exists() {
        return Ok(vec![]);
    }
    let mut ids: Vec<PostId> = std::fs::read_dir(posts_dir)
        .map_err(|e| io_err(posts_dir, e))?
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
        .filter(|e| e.path().join(POST_FILE).is_file())
        .filter_map(|e| PostId::parse(&e.file_name().to_string_lossy()).ok())
        .collect();
    ids.sort();
    Ok(ids)
}

// ---------------------------------------------------------------------------
// 2. Load
// ---------------------------------------------------------------------------

/// Load the post `id` from `<posts_dir>/<id>/post.md`.
pub fn load_unit(posts_dir: &Path, id: &PostId) -> Result<ContentUnit, CorpusError> {
    load_unit_at(&post_dir(posts_dir, id))
}

/// Load and validate the post stored in `dir`.
///
/// Asset records are built from the references present in the body. A
/// persisted `remoteUrl` is carried over only when its recorded hash matches
/// the bytes currently on disk.
pub fn load_unit_at(dir: &Path) -> Result<ContentUnit, CorpusError> {
    let raw_id = dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let id = PostId::parse(&raw_id)?;

    let path = dir.join(POST_FILE);
    if !path.is_file() {
        return Err(CorpusError::PostNotFound { path });
    }
    let content = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
    let (metadata, body) = frontmatter::parse(&content, &path)?;
    frontmatter::validate(&metadata, &path)?;

    let mut assets = BTreeMap::new();
    for reference in references::distinct(&body) {
        let local_path = dir.join(&reference);
        if !local_path.is_file() {
            return Err(CorpusError::MissingAsset {
                id: id.to_string(),
                reference,
                path: local_path,
            });
        }
        let content_hash = fingerprint::of_file(&local_path)?;
        let (remote_url, uploaded_at) = match metadata.assets.get(&reference) {
            Some(saved) if saved.content_hash == content_hash => {
                (saved.remote_url.clone(), saved.uploaded_at)
            }
            Some(_) => {
                tracing::debug!("{id}: '{reference}' changed on disk, dropping its remote URL");
                (None, None)
            }
            None => (None, None),
        };
        assets.insert(
            reference,
            AssetRecord {
                local_path,
                content_hash,
                remote_url,
                uploaded_at,
            },
        );
    }

    Ok(ContentUnit {
        id,
        dir: dir.to_path_buf(),
        metadata,
        body,
        assets,
    })
}

// ---------------------------------------------------------------------------
// 3. Save (atomic)
// ---------------------------------------------------------------------------

/// Atomically rewrite `post.md` for `unit`.
///
/// The header manifest is regenerated from `unit.assets`; the rest of the
/// header is written exactly as held in `unit.metadata`.
pub fn save_unit(unit: &ContentUnit) -> Result<(), CorpusError> {
    let mut metadata = unit.metadata.clone();
    metadata.assets = unit.manifest();
    let text = frontmatter::serialize(&metadata, &unit.body)?;
    write_atomic(&unit.post_path(), text.as_bytes())
}

/// Create a new post directory with a draft header.
///
/// Returns `Ok(None)` without touching anything if the post already exists.
pub fn create_unit(
    posts_dir: &Path,
    id: &PostId,
    title: &str,
    date: DateTime<Utc>,
    body: &str,
) -> Result<Option<PathBuf>, CorpusError> {
    let dir = post_dir(posts_dir, id);
    let path = dir.join(POST_FILE);
    if path.exists() {
        return Ok(None);
    }
    std::fs::create_dir_all(&dir).map_err(|e| io_err(&dir, e))?;
    let text = frontmatter::serialize(&Metadata::new(title, date), body)?;
    write_atomic(&path, text.as_bytes())?;
    Ok(Some(dir))
}

/// Write `bytes` to `path` via a `.tmp` sibling and rename.
///
/// The `.tmp` file is always in the same directory as the target, so the
/// rename never crosses filesystems. On failure the original is untouched and
/// the `.tmp` is removed.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), CorpusError> {
    let Some(file_name) = path.file_name() else {
        return Err(io_err(path, std::io::Error::other("path has no file name")));
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
    }
    let tmp = path.with_file_name(format!("{}.tmp", file_name.to_string_lossy()));
    std::fs::write(&tmp, bytes).map_err(|e| io_err(&tmp, e))?;
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(io_err(path, e));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
