//! Per-post sync snapshot.
//!
//! Persists a [`SyncState`] JSON document at `<post_dir>/.sync-state.json`.
//! It is replaced wholesale, through the same `.tmp` + rename path as the
//! post file, and only after a run fully succeeds.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use quill_core::{store, ContentHash};
use quill_remote::Visibility;

use crate::error::{io_err, json_err, SyncError};

/// File name of the snapshot inside each post directory.
pub const STATE_FILE: &str = ".sync-state.json";

/// Highest snapshot version this build reads and writes.
pub const STATE_VERSION: u32 = 1;

/// What was true after the last successful run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncState {
    pub version: u32,
    pub synced_at: DateTime<Utc>,
    /// Body fingerprint with asset references masked.
    pub body_hash: ContentHash,
    /// Fingerprint of the exact payload last sent to the platform.
    pub payload_hash: ContentHash,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_status: Option<Visibility>,
    /// Reference → content hash of every asset resolved by that run.
    #[serde(default)]
    pub assets: BTreeMap<String, ContentHash>,
}

/// `<post_dir>/.sync-state.json`: pure, no I/O.
pub fn state_path(post_dir: &Path) -> PathBuf {
    post_dir.join(STATE_FILE)
}

/// Load the snapshot for a post. `Ok(None)` before the first successful run.
pub fn load(post_dir: &Path) -> Result<Option<SyncState>, SyncError> {
    let path = state_path(post_dir);
    if !path.exists() {
        return Ok(None);
    }
    let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
    let state: SyncState = serde_json::from_str(&contents).map_err(|e| json_err(&path, e))?;
    if state.version > STATE_VERSION {
        return Err(SyncError::UnsupportedVersion {
            path,
            found: state.version,
            supported: STATE_VERSION,
        });
    }
    Ok(Some(state))
}

/// Replace the snapshot atomically.
pub fn save(post_dir: &Path, state: &SyncState) -> Result<(), SyncError> {
    let path = state_path(post_dir);
    let json = serde_json::to_string_pretty(state).map_err(|e| json_err(&path, e))?;
    store::write_atomic(&path, json.as_bytes())?;
    Ok(())
}
