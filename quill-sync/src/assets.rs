//! Asset sync engine.
//!
//! Pending assets are grouped by content hash, so each distinct image is
//! resolved once per batch however many references point at it. Each hash
//! is looked up in the [`AssetIndex`] first and only uploaded on a miss.
//! Uploads fan out over at most `concurrency` scoped threads and the report
//! is assembled once every worker has finished.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{DateTime, Utc};

use quill_core::ContentHash;
use quill_remote::{AssetUpload, ImageHost, RemoteError};

use crate::asset_index::{AssetIndex, Resolved};
use crate::error::{io_err, SyncError};
use crate::retry::{retry_with_backoff, Failed, RetryAction, RetryPolicy};

/// One reference that needs a URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingAsset {
    pub reference: String,
    pub content_hash: ContentHash,
    pub local_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAsset {
    pub remote_url: String,
    pub uploaded_at: DateTime<Utc>,
}

/// A hash that could not be resolved, with every reference sharing it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetFailure {
    pub content_hash: ContentHash,
    pub references: Vec<String>,
    pub attempts: u32,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssetSyncReport {
    /// Keyed by content hash.
    pub resolved: BTreeMap<ContentHash, ResolvedAsset>,
    /// Hashes uploaded by this batch.
    pub uploaded: usize,
    /// Hashes found in the index.
    pub reused: usize,
    /// Rejected by the image host; not retried.
    pub rejected: Vec<AssetFailure>,
    /// Transient failures that outlasted the retry budget.
    pub exhausted: Vec<AssetFailure>,
}

enum UploadFailure {
    Local(SyncError),
    Remote(Failed<RemoteError>),
}

impl From<SyncError> for UploadFailure {
    fn from(e: SyncError) -> Self {
        UploadFailure::Local(e)
    }
}

struct Job<'p> {
    hash: ContentHash,
    assets: Vec<&'p PendingAsset>,
}

pub struct AssetEngine<'a> {
    host: &'a dyn ImageHost,
    index: &'a AssetIndex,
    retry: &'a RetryPolicy,
    concurrency: usize,
}

impl<'a> AssetEngine<'a> {
    pub fn new(
        host: &'a dyn ImageHost,
        index: &'a AssetIndex,
        retry: &'a RetryPolicy,
        concurrency: usize,
    ) -> Self {
        Self {
            host,
            index,
            retry,
            concurrency: concurrency.max(1),
        }
    }

    /// Resolve every pending asset to a URL.
    ///
    /// Per-asset failures land in the report; only local storage errors
    /// (index or asset file unreadable) abort the batch.
    pub fn sync(&self, pending: &[PendingAsset]) -> Result<AssetSyncReport, SyncError> {
        let mut groups: BTreeMap<&ContentHash, Vec<&PendingAsset>> = BTreeMap::new();
        for asset in pending {
            groups.entry(&asset.content_hash).or_default().push(asset);
        }
        let jobs: Vec<Job<'_>> = groups
            .into_iter()
            .map(|(hash, assets)| Job {
                hash: hash.clone(),
                assets,
            })
            .collect();

        let next = AtomicUsize::new(0);
        let (next, jobs_ref) = (&next, &jobs);
        let workers = self.concurrency.min(jobs.len());
        let outcomes: Vec<(usize, Result<Resolved, UploadFailure>)> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..workers)
                .map(|_| {
                    s.spawn(move || {
                        let mut done = Vec::new();
                        loop {
                            let i = next.fetch_add(1, Ordering::SeqCst);
                            let Some(job) = jobs_ref.get(i) else { break };
                            done.push((i, self.resolve(job)));
                        }
                        done
                    })
                })
                .collect();
            handles
                .into_iter()
                .flat_map(|h| h.join().unwrap_or_else(|panic| std::panic::resume_unwind(panic)))
                .collect()
        });

        let mut report = AssetSyncReport::default();
        for (i, outcome) in outcomes {
            let job = &jobs[i];
            match outcome {
                Ok(resolved) => {
                    if resolved.uploaded {
                        report.uploaded += 1;
                    } else {
                        report.reused += 1;
                    }
                    report.resolved.insert(
                        job.hash.clone(),
                        ResolvedAsset {
                            remote_url: resolved.entry.remote_url,
                            uploaded_at: resolved.entry.uploaded_at,
                        },
                    );
                }
                Err(UploadFailure::Local(e)) => return Err(e),
                Err(UploadFailure::Remote(failed)) => {
                    let failure = AssetFailure {
                        content_hash: job.hash.clone(),
                        references: job.assets.iter().map(|a| a.reference.clone()).collect(),
                        attempts: failed.attempts,
                        message: failed.error.to_string(),
                    };
                    if failed.error.is_transient() {
                        tracing::warn!(
                            "{} ({}) still failing after {} attempt(s): {}",
                            failure.references.join(", "),
                            failure.content_hash,
                            failure.attempts,
                            failure.message
                        );
                        report.exhausted.push(failure);
                    } else {
                        tracing::warn!(
                            "{} ({}) rejected: {}",
                            failure.references.join(", "),
                            failure.content_hash,
                            failure.message
                        );
                        report.rejected.push(failure);
                    }
                }
            }
        }
        tracing::info!(
            "assets: {} uploaded, {} reused, {} rejected, {} exhausted",
            report.uploaded,
            report.reused,
            report.rejected.len(),
            report.exhausted.len()
        );
        Ok(report)
    }

    fn resolve(&self, job: &Job<'_>) -> Result<Resolved, UploadFailure> {
        // Every asset in a job has the same bytes; the first one names the upload.
        let first = job.assets[0];
        self.index.resolve_with(&job.hash, || {
            let bytes = std::fs::read(&first.local_path)
                .map_err(|e| io_err(&first.local_path, e))?;
            let upload = AssetUpload {
                content_hash: &job.hash,
                reference: &first.reference,
                bytes: &bytes,
            };
            retry_with_backoff(self.retry, classify, || self.host.upload(&upload))
                .map_err(UploadFailure::Remote)
        })
    }
}

fn classify(e: &RemoteError) -> RetryAction {
    if e.is_transient() {
        RetryAction::Retry
    } else {
        RetryAction::Abort
    }
}
