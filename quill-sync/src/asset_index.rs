//! Global content-hash → URL index.
//!
//! One JSON file per hash at `<state_dir>/assets/<hex>.json`. Entries are
//! insert-once: a new entry is written to a private temp file and hard-linked
//! into place, which fails when the entry already exists. Readers therefore
//! never see a partial entry, and when two writers race the first one wins.
//!
//! Within a process, [`AssetIndex::resolve_with`] serialises work per hash so
//! two posts sharing an image perform a single upload.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use quill_core::ContentHash;

use crate::error::{io_err, json_err, SyncError};

/// One confirmed upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexEntry {
    pub content_hash: ContentHash,
    pub remote_url: String,
    pub uploaded_at: DateTime<Utc>,
}

/// Outcome of [`AssetIndex::resolve_with`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub entry: IndexEntry,
    /// `true` when this call performed the upload.
    pub uploaded: bool,
}

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

#[derive(Debug)]
pub struct AssetIndex {
    dir: PathBuf,
    gates: Mutex<HashMap<ContentHash, Arc<Mutex<()>>>>,
}

impl AssetIndex {
    /// Index rooted at `<state_dir>/assets`. No I/O until first use.
    pub fn open(state_dir: &Path) -> Self {
        Self {
            dir: state_dir.join("assets"),
            gates: Mutex::new(HashMap::new()),
        }
    }

    pub fn entry_path(&self, hash: &ContentHash) -> PathBuf {
        self.dir.join(format!("{}.json", hash.hex()))
    }

    pub fn lookup(&self, hash: &ContentHash) -> Result<Option<IndexEntry>, SyncError> {
        let path = self.entry_path(hash);
        let contents = match std::fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_err(&path, e)),
        };
        let entry = serde_json::from_str(&contents).map_err(|e| json_err(&path, e))?;
        Ok(Some(entry))
    }

    /// Insert `entry` unless its hash is already indexed.
    ///
    /// Returns whichever entry is in the index afterwards.
    pub fn insert_if_absent(&self, entry: IndexEntry) -> Result<IndexEntry, SyncError> {
        std::fs::create_dir_all(&self.dir).map_err(|e| io_err(&self.dir, e))?;
        let path = self.entry_path(&entry.content_hash);
        let tmp = self.dir.join(format!(
            ".{}.{}.{}.tmp",
            entry.content_hash.hex(),
            std::process::id(),
            TMP_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));
        let json = serde_json::to_string_pretty(&entry).map_err(|e| json_err(&tmp, e))?;
        std::fs::write(&tmp, json).map_err(|e| io_err(&tmp, e))?;

        let linked = std::fs::hard_link(&tmp, &path);
        let _ = std::fs::remove_file(&tmp);
        match linked {
            Ok(()) => {
                tracing::debug!("indexed {} -> {}", entry.content_hash, entry.remote_url);
                Ok(entry)
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => match self.lookup(&entry.content_hash)? {
                Some(existing) => {
                    tracing::debug!("{} already indexed, keeping existing entry", entry.content_hash);
                    Ok(existing)
                }
                None => Err(io_err(&path, e)),
            },
            Err(e) => Err(io_err(&path, e)),
        }
    }

    /// Return the indexed entry for `hash`, or run `upload` and index its URL.
    ///
    /// Concurrent callers for the same hash in this process wait for each
    /// other; the second one observes the first one's entry.
    pub fn resolve_with<E, F>(&self, hash: &ContentHash, upload: F) -> Result<Resolved, E>
    where
        F: FnOnce() -> Result<String, E>,
        E: From<SyncError>,
    {
        let gate = self.gate(hash);
        let resolved = {
            let _held = gate.lock().unwrap_or_else(PoisonError::into_inner);
            self.resolve_locked(hash, upload)
        };
        self.release(hash, gate);
        resolved
    }

    fn resolve_locked<E, F>(&self, hash: &ContentHash, upload: F) -> Result<Resolved, E>
    where
        F: FnOnce() -> Result<String, E>,
        E: From<SyncError>,
    {
        if let Some(entry) = self.lookup(hash)? {
            return Ok(Resolved {
                entry,
                uploaded: false,
            });
        }
        let remote_url = upload()?;
        let entry = self.insert_if_absent(IndexEntry {
            content_hash: hash.clone(),
            remote_url,
            uploaded_at: Utc::now(),
        })?;
        Ok(Resolved {
            entry,
            uploaded: true,
        })
    }

    fn gate(&self, hash: &ContentHash) -> Arc<Mutex<()>> {
        let mut gates = self.gates.lock().unwrap_or_else(PoisonError::into_inner);
        gates.entry(hash.clone()).or_default().clone()
    }

    /// Drop the gate for `hash` once no other caller holds it.
    ///
    /// Clones are only made and dropped under the map lock, so the count is
    /// exact: the map's reference plus `gate`.
    fn release(&self, hash: &ContentHash, gate: Arc<Mutex<()>>) {
        let mut gates = self.gates.lock().unwrap_or_else(PoisonError::into_inner);
        if Arc::strong_count(&gate) == 2 {
            gates.remove(hash);
        }
        drop(gate);
    }

    #[cfg(test)]
    fn gate_count(&self) -> usize {
        self.gates.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;
    use tempfile::TempDir;

    fn entry(hash: &str, url: &str) -> IndexEntry {
        IndexEntry {
            content_hash: ContentHash::from(hash),
            remote_url: url.to_string(),
            uploaded_at: "2025-10-12T10:00:00Z".parse().unwrap(),
        }
    }

    #[test]
    fn lookup_missing_is_none() {
        let tmp = TempDir::new().unwrap();
        let index = AssetIndex::open(tmp.path());
        assert!(index.lookup(&ContentHash::from("sha256:ab")).unwrap().is_none());
    }

    #[test]
    fn first_insert_wins() {
        let tmp = TempDir::new().unwrap();
        let index = AssetIndex::open(tmp.path());
        let first = index.insert_if_absent(entry("sha256:ab", "https://cdn/1")).unwrap();
        let second = index.insert_if_absent(entry("sha256:ab", "https://cdn/2")).unwrap();
        assert_eq!(first.remote_url, "https://cdn/1");
        assert_eq!(second.remote_url, "https://cdn/1");
        assert_eq!(
            index.lookup(&ContentHash::from("sha256:ab")).unwrap().unwrap().remote_url,
            "https://cdn/1"
        );
        assert_eq!(index.entry_path(&ContentHash::from("sha256:ab")), tmp.path().join("assets/ab.json"));
    }

    #[test]
    fn no_temp_files_left_behind() {
        let tmp = TempDir::new().unwrap();
        let index = AssetIndex::open(tmp.path());
        index.insert_if_absent(entry("sha256:ab", "https://cdn/1")).unwrap();
        index.insert_if_absent(entry("sha256:ab", "https://cdn/2")).unwrap();
        let names: Vec<_> = std::fs::read_dir(tmp.path().join("assets"))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["ab.json"]);
    }

    #[test]
    fn concurrent_resolves_upload_once() {
        let tmp = TempDir::new().unwrap();
        let index = AssetIndex::open(tmp.path());
        let hash = ContentHash::from("sha256:cafe");
        let uploads = AtomicUsize::new(0);
        let (index, hash, uploads) = (&index, &hash, &uploads);

        let results: Vec<Resolved> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    s.spawn(move || {
                        index
                            .resolve_with::<SyncError, _>(hash, || {
                                uploads.fetch_add(1, Ordering::SeqCst);
                                std::thread::sleep(Duration::from_millis(20));
                                Ok("https://cdn/cafe.png".to_string())
                            })
                            .unwrap()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(uploads.load(Ordering::SeqCst), 1);
        assert_eq!(results.iter().filter(|r| r.uploaded).count(), 1);
        assert!(results.iter().all(|r| r.entry.remote_url == "https://cdn/cafe.png"));
        assert_eq!(index.gate_count(), 0);
    }

    #[test]
    fn gates_are_released_after_each_resolve() {
        let tmp = TempDir::new().unwrap();
        let index = AssetIndex::open(tmp.path());
        for hex in ["01", "02", "03"] {
            let hash = ContentHash::from(format!("sha256:{hex}").as_str());
            index
                .resolve_with::<SyncError, _>(&hash, || Ok(format!("https://cdn/{hex}.png")))
                .unwrap();
            assert_eq!(index.gate_count(), 0);
        }
        // Cache hits go through the gate too.
        index
            .resolve_with::<SyncError, _>(&ContentHash::from("sha256:01"), || unreachable!())
            .unwrap();
        assert_eq!(index.gate_count(), 0);
    }

    #[test]
    fn failed_upload_indexes_nothing() {
        let tmp = TempDir::new().unwrap();
        let index = AssetIndex::open(tmp.path());
        let hash = ContentHash::from("sha256:beef");

        #[derive(Debug)]
        struct Boom;
        impl From<SyncError> for Boom {
            fn from(_: SyncError) -> Self {
                Boom
            }
        }

        let result = index.resolve_with(&hash, || Err::<String, _>(Boom));
        assert!(result.is_err());
        assert!(index.lookup(&hash).unwrap().is_none());
        assert_eq!(index.gate_count(), 0);
    }
}
