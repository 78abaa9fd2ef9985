#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use quill_core::config::BodyFormat;
use quill_core::{ExternalId, PostId};
use quill_remote::{
    AssetUpload, BlogHost, ImageHost, Notifier, PublishedEvent, RemoteError, RemotePost,
    RemoteRecord, Visibility,
};
use quill_sync::{PublishOptions, Publisher, RetryPolicy};
use tempfile::TempDir;

pub const PAST: &str = "2025-01-01T09:00:00Z";
pub const FUTURE: &str = "2099-01-01T09:00:00Z";

fn status_error(call: &str, status: u16) -> RemoteError {
    if status == 0 {
        RemoteError::Transport {
            url: format!("https://fake/{call}"),
            message: "connection reset".to_string(),
        }
    } else {
        RemoteError::Status {
            url: format!("https://fake/{call}"),
            status,
            body: String::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Image host
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FakeImages {
    uploads: Mutex<Vec<String>>,
    /// reference → (status, remaining failures). Status 0 is a transport error.
    failures: Mutex<HashMap<String, (u16, usize)>>,
}

impl FakeImages {
    pub fn fail(&self, reference: &str, status: u16, times: usize) {
        self.failures
            .lock()
            .unwrap()
            .insert(reference.to_string(), (status, times));
    }

    pub fn upload_count(&self) -> usize {
        self.uploads.lock().unwrap().len()
    }

    pub fn uploads(&self) -> Vec<String> {
        self.uploads.lock().unwrap().clone()
    }
}

impl ImageHost for FakeImages {
    fn upload(&self, asset: &AssetUpload<'_>) -> Result<String, RemoteError> {
        self.uploads.lock().unwrap().push(asset.reference.to_string());
        let mut failures = self.failures.lock().unwrap();
        if let Some((status, remaining)) = failures.get_mut(asset.reference) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(status_error("upload", *status));
            }
        }
        Ok(format!("https://cdn.test/{}", asset.content_hash.hex()))
    }
}

// ---------------------------------------------------------------------------
// Blog host
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FakeBlog {
    records: Mutex<BTreeMap<String, RemoteRecord>>,
    calls: Mutex<Vec<String>>,
    failures: Mutex<HashMap<&'static str, (u16, usize)>>,
    next_id: Mutex<u32>,
}

impl FakeBlog {
    /// The next `times` calls named `call` fail with `status` (0 = transport).
    pub fn fail(&self, call: &'static str, status: u16, times: usize) {
        self.failures.lock().unwrap().insert(call, (status, times));
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, call: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| *c == call).count()
    }

    pub fn record(&self, id: &ExternalId) -> Option<RemoteRecord> {
        self.records.lock().unwrap().get(&id.0).cloned()
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    /// Out-of-band deletion on the platform.
    pub fn delete(&self, id: &ExternalId) {
        self.records.lock().unwrap().remove(&id.0);
    }

    /// Out-of-band visibility change (e.g. a scheduled post going live).
    pub fn set_visibility(&self, id: &ExternalId, visibility: Visibility) {
        if let Some(record) = self.records.lock().unwrap().get_mut(&id.0) {
            record.visibility = visibility;
        }
    }

    fn enter(&self, call: &'static str) -> Result<(), RemoteError> {
        self.calls.lock().unwrap().push(call.to_string());
        let mut failures = self.failures.lock().unwrap();
        if let Some((status, remaining)) = failures.get_mut(call) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(status_error(call, *status));
            }
        }
        Ok(())
    }

    fn with_record(
        &self,
        id: &ExternalId,
        call: &str,
        f: impl FnOnce(&mut RemoteRecord),
    ) -> Result<RemoteRecord, RemoteError> {
        let mut records = self.records.lock().unwrap();
        let Some(record) = records.get_mut(&id.0) else {
            return Err(status_error(call, 404));
        };
        f(record);
        Ok(record.clone())
    }
}

fn visibility_for(at: Option<DateTime<Utc>>) -> Visibility {
    match at {
        Some(at) if at > Utc::now() => Visibility::Scheduled,
        _ => Visibility::Live,
    }
}

impl BlogHost for FakeBlog {
    fn create(&self, post: &RemotePost) -> Result<RemoteRecord, RemoteError> {
        self.enter("create")?;
        let id = {
            let mut next = self.next_id.lock().unwrap();
            *next += 1;
            format!("post-{}", *next)
        };
        let visibility = match post.visibility {
            Visibility::Draft => Visibility::Draft,
            _ => visibility_for(post.publish_at),
        };
        let record = RemoteRecord {
            id: ExternalId::from(id.as_str()),
            url: Some(format!("https://blog.test/{id}.html")),
            visibility,
            published: post.publish_at,
            updated: Some(Utc::now()),
            title: post.title.clone(),
            content: post.content.clone(),
            labels: post.labels.clone(),
        };
        self.records.lock().unwrap().insert(id, record.clone());
        Ok(record)
    }

    fn update(&self, id: &ExternalId, post: &RemotePost) -> Result<RemoteRecord, RemoteError> {
        self.enter("update")?;
        self.with_record(id, "update", |record| {
            record.title = post.title.clone();
            record.content = post.content.clone();
            record.labels = post.labels.clone();
            record.updated = Some(Utc::now());
        })
    }

    fn publish(
        &self,
        id: &ExternalId,
        publish_at: Option<DateTime<Utc>>,
    ) -> Result<RemoteRecord, RemoteError> {
        self.enter("publish")?;
        self.with_record(id, "publish", |record| {
            record.visibility = visibility_for(publish_at);
            record.published = publish_at.or(Some(Utc::now()));
        })
    }

    fn revert(&self, id: &ExternalId) -> Result<RemoteRecord, RemoteError> {
        self.enter("revert")?;
        self.with_record(id, "revert", |record| record.visibility = Visibility::Draft)
    }

    fn fetch(&self, id: &ExternalId) -> Result<RemoteRecord, RemoteError> {
        self.enter("fetch")?;
        self.with_record(id, "fetch", |_| {})
    }
}

// ---------------------------------------------------------------------------
// Notifier
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FakeNotifier {
    events: Mutex<Vec<PublishedEvent>>,
    fail: Mutex<bool>,
}

impl FakeNotifier {
    pub fn failing() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            fail: Mutex::new(true),
        }
    }

    pub fn events(&self) -> Vec<PublishedEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl Notifier for FakeNotifier {
    fn notify(&self, event: &PublishedEvent) -> Result<(), RemoteError> {
        self.events.lock().unwrap().push(event.clone());
        if *self.fail.lock().unwrap() {
            return Err(status_error("notify", 500));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Corpus fixture
// ---------------------------------------------------------------------------

pub struct Corpus {
    pub root: TempDir,
    pub images: FakeImages,
    pub blog: FakeBlog,
}

impl Corpus {
    pub fn new() -> Self {
        Self {
            root: TempDir::new().expect("tempdir"),
            images: FakeImages::default(),
            blog: FakeBlog::default(),
        }
    }

    pub fn posts_dir(&self) -> PathBuf {
        self.root.path().join("posts")
    }

    pub fn state_dir(&self) -> PathBuf {
        self.root.path().join(".quill")
    }

    pub fn post_dir(&self, id: &str) -> PathBuf {
        self.posts_dir().join(id)
    }

    pub fn post_path(&self, id: &str) -> PathBuf {
        self.post_dir(id).join("post.md")
    }

    pub fn state_path(&self, id: &str) -> PathBuf {
        self.post_dir(id).join(".sync-state.json")
    }

    /// Write `post.md` with the given status and date, replacing any header.
    pub fn write_post(&self, id: &str, status: &str, date: &str, body: &str) -> PostId {
        let dir = self.post_dir(id);
        fs::create_dir_all(&dir).expect("post dir");
        fs::write(
            dir.join("post.md"),
            format!("---\ntitle: Post {id}\ndate: {date}\nstatus: {status}\ntags:\n- rust\n---\n{body}"),
        )
        .expect("write post");
        PostId::parse(id).expect("post id")
    }

    pub fn write_asset(&self, id: &str, name: &str, bytes: &[u8]) {
        let dir = self.post_dir(id);
        fs::create_dir_all(&dir).expect("post dir");
        fs::write(dir.join(name), bytes).expect("write asset");
    }

    pub fn read_post(&self, id: &str) -> String {
        fs::read_to_string(self.post_path(id)).expect("read post")
    }

    /// Edit the stored header in place, keeping everything the pipeline wrote.
    pub fn edit_post(&self, id: &str, from: &str, to: &str) {
        let text = self.read_post(id);
        assert!(text.contains(from), "{from:?} not in post {id}");
        fs::write(self.post_path(id), text.replacen(from, to, 1)).expect("edit post");
    }

    pub fn options() -> PublishOptions {
        PublishOptions {
            dry_run: false,
            body_format: BodyFormat::Markdown,
            concurrency: 4,
            retry: RetryPolicy::none(),
        }
    }

    pub fn publisher(&self) -> Publisher<'_> {
        self.publisher_with(Self::options())
    }

    pub fn publisher_with(&self, options: PublishOptions) -> Publisher<'_> {
        Publisher::new(
            &self.posts_dir(),
            &self.state_dir(),
            &self.images,
            &self.blog,
            options,
        )
    }
}

pub fn snapshot(path: &Path) -> Option<Vec<u8>> {
    fs::read(path).ok()
}
