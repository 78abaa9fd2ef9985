//! Domain types for the content corpus.
//!
//! All path fields use `PathBuf`; never `&str` or `String` for filesystem paths.
//! Header types serialize with serde + serde_yaml using camelCase keys.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CorpusError;

/// Highest metadata `schemaVersion` this build reads and writes.
pub const SCHEMA_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Stable identifier of a post: its directory name under the posts directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PostId(String);

impl PostId {
    /// Validate a directory name as a post id.
    pub fn parse(raw: &str) -> Result<Self, CorpusError> {
        let invalid = |reason| CorpusError::InvalidId {
            id: raw.to_owned(),
            reason,
        };
        if raw.trim().is_empty() {
            return Err(invalid("id is empty"));
        }
        if raw.contains('/') || raw.contains('\\') {
            return Err(invalid("id contains a path separator"));
        }
        if raw.starts_with('.') {
            return Err(invalid("id starts with '.'"));
        }
        Ok(Self(raw.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Opaque identifier assigned by the hosting platform on first creation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExternalId(pub String);

impl fmt::Display for ExternalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for ExternalId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ExternalId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Content-addressed fingerprint in `sha256:<hex>` form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentHash(pub String);

impl ContentHash {
    /// The bare hex digest, without the algorithm prefix.
    pub fn hex(&self) -> &str {
        self.0
            .split_once(':')
            .map(|(_, hex)| hex)
            .unwrap_or(self.0.as_str())
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for ContentHash {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Local publication status. Drives remote visibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[default]
    Draft,
    Published,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Draft => write!(f, "draft"),
            Status::Published => write!(f, "published"),
        }
    }
}

// ---------------------------------------------------------------------------
// Header records
// ---------------------------------------------------------------------------

/// Asset manifest entry as persisted in the metadata header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedAsset {
    pub content_hash: ContentHash,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uploaded_at: Option<DateTime<Utc>>,
}

/// The versioned metadata header at the top of `post.md`.
///
/// Unknown keys are kept in `extra` so a read-modify-write never drops fields
/// owned by other tools.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    external_id: Option<ExternalId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub assets: BTreeMap<String, PersistedAsset>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

impl Metadata {
    /// A fresh draft header with the given title and date.
    pub fn new(title: impl Into<String>, date: DateTime<Utc>) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            title: title.into(),
            date: Some(date),
            status: Status::Draft,
            category: None,
            tags: Vec::new(),
            external_id: None,
            updated_at: None,
            assets: BTreeMap::new(),
            extra: BTreeMap::new(),
        }
    }

    pub fn external_id(&self) -> Option<&ExternalId> {
        self.external_id.as_ref()
    }

    /// Record the identifier returned by a successful reconciliation.
    /// Once linked, a post stays linked.
    pub fn link_external_id(&mut self, id: ExternalId) {
        self.external_id = Some(id);
    }
}

// ---------------------------------------------------------------------------
// In-memory content unit
// ---------------------------------------------------------------------------

/// One image referenced by a post body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetRecord {
    pub local_path: PathBuf,
    pub content_hash: ContentHash,
    /// Only set when it was produced from bytes with `content_hash`.
    pub remote_url: Option<String>,
    pub uploaded_at: Option<DateTime<Utc>>,
}

impl AssetRecord {
    pub fn to_persisted(&self) -> PersistedAsset {
        PersistedAsset {
            content_hash: self.content_hash.clone(),
            remote_url: self.remote_url.clone(),
            uploaded_at: self.uploaded_at,
        }
    }
}

/// One post: metadata header, body text, and the manifest of referenced assets.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentUnit {
    pub id: PostId,
    /// Directory holding `post.md` and the asset files.
    pub dir: PathBuf,
    pub metadata: Metadata,
    pub body: String,
    /// Keyed by symbolic reference.
    pub assets: BTreeMap<String, AssetRecord>,
}

impl ContentUnit {
    /// Path of the post file inside the unit directory.
    pub fn post_path(&self) -> PathBuf {
        self.dir.join(crate::store::POST_FILE)
    }

    /// The header manifest for the current asset records. Entries for
    /// references no longer in the body are not carried over.
    pub fn manifest(&self) -> BTreeMap<String, PersistedAsset> {
        self.assets
            .iter()
            .map(|(reference, record)| (reference.clone(), record.to_persisted()))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
