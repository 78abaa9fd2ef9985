use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::prelude::*;
use predicates::str::contains;
use tempfile::TempDir;

fn quill_cmd(root: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("quill"));
    cmd.arg("--root").arg(root).env_remove("RUST_LOG");
    cmd
}

/// A corpus whose hosts point at a port nothing listens on.
fn corpus() -> TempDir {
    let root = TempDir::new().expect("root");
    fs::write(
        root.path().join("quill.yaml"),
        "body_format: markdown\n\
         timeout_secs: 2\n\
         retry:\n  max_retries: 0\n  base_delay_ms: 0\n  max_delay_ms: 0\n\
         image_host:\n  endpoint: http://127.0.0.1:1/images\n\
         blog_host:\n  endpoint: http://127.0.0.1:1/blogger/v3\n  blog_id: \"42\"\n",
    )
    .expect("config");
    fs::create_dir_all(root.path().join("posts")).expect("posts");
    root
}

fn write_post(root: &Path, id: &str, header: &str, body: &str) -> PathBuf {
    let dir = root.join("posts").join(id);
    fs::create_dir_all(&dir).expect("post dir");
    let path = dir.join("post.md");
    fs::write(&path, format!("---\n{header}---\n{body}")).expect("post");
    path
}

#[test]
fn init_writes_template_once() {
    let root = TempDir::new().expect("root");

    quill_cmd(root.path())
        .arg("init")
        .assert()
        .success()
        .stdout(contains("Wrote"));
    let config = fs::read_to_string(root.path().join("quill.yaml")).expect("config");
    assert!(config.contains("blog_host:"));
    assert!(root.path().join("posts").is_dir());

    fs::write(root.path().join("quill.yaml"), "# edited\n").expect("edit");
    quill_cmd(root.path())
        .arg("init")
        .assert()
        .success()
        .stdout(contains("Already initialized"));
    assert_eq!(
        fs::read_to_string(root.path().join("quill.yaml")).expect("config"),
        "# edited\n"
    );
}

#[test]
fn commands_without_config_point_at_init() {
    let root = TempDir::new().expect("root");
    quill_cmd(root.path())
        .arg("status")
        .assert()
        .failure()
        .stderr(contains("quill init"));
}

#[test]
fn new_creates_a_draft_and_never_overwrites() {
    let root = corpus();

    quill_cmd(root.path())
        .args(["new", "first-post", "--title", "First post"])
        .assert()
        .success()
        .stdout(contains("Created draft 'first-post'"));
    let path = root.path().join("posts/first-post/post.md");
    let text = fs::read_to_string(&path).expect("post");
    assert!(text.contains("title: First post"));
    assert!(text.contains("status: draft"));

    fs::write(&path, text.replace("First post", "Kept")).expect("edit");
    quill_cmd(root.path())
        .args(["new", "first-post", "--title", "Other"])
        .assert()
        .success()
        .stdout(contains("already exists"));
    assert!(fs::read_to_string(&path).expect("post").contains("title: Kept"));
}

#[test]
fn new_rejects_ids_with_separators() {
    let root = corpus();
    quill_cmd(root.path())
        .args(["new", "a/b", "--title", "x"])
        .assert()
        .failure()
        .stderr(contains("not a valid post id"));
}

#[test]
fn status_json_reports_plans_and_invalid_posts() {
    let root = corpus();
    write_post(
        root.path(),
        "hello",
        "title: Hello\ndate: 2025-01-01T09:00:00Z\nstatus: published\n",
        "![c](cover.png)\n",
    );
    fs::write(root.path().join("posts/hello/cover.png"), b"png").expect("asset");
    write_post(root.path(), "broken", "date: 2025-01-01T09:00:00Z\n", "no title\n");

    let output = quill_cmd(root.path())
        .args(["status", "--json"])
        .output()
        .expect("run status");
    assert!(
        output.status.success(),
        "stderr={}",
        String::from_utf8_lossy(&output.stderr)
    );
    let rows: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    let rows = rows.as_array().expect("array");
    assert_eq!(rows.len(), 2);

    let broken = &rows[0];
    assert_eq!(broken["id"], "broken");
    assert_eq!(broken["status"], "invalid");
    assert!(broken["error"].as_str().expect("error").contains("title"));

    let hello = &rows[1];
    assert_eq!(hello["id"], "hello");
    assert_eq!(hello["status"], "published");
    assert_eq!(hello["plan"], "create");
    assert_eq!(hello["pendingUploads"], serde_json::json!(["cover.png"]));
    assert!(hello["lastSyncAt"].is_null());
}

#[test]
fn status_table_summarises_the_corpus() {
    let root = corpus();
    write_post(
        root.path(),
        "hello",
        "title: Hello\ndate: 2025-01-01T09:00:00Z\n",
        "body\n",
    );
    quill_cmd(root.path())
        .arg("status")
        .assert()
        .success()
        .stdout(contains("1 posts | 1 to publish"))
        .stdout(contains("hello"))
        .stdout(contains("never"));
}

#[test]
fn dry_run_touches_nothing() {
    let root = corpus();
    let path = write_post(
        root.path(),
        "hello",
        "title: Hello\ndate: 2025-01-01T09:00:00Z\nstatus: published\n",
        "![c](cover.png)\n",
    );
    fs::write(root.path().join("posts/hello/cover.png"), b"png").expect("asset");
    let before = fs::read(&path).expect("before");

    quill_cmd(root.path())
        .args(["publish", "hello", "--dry-run"])
        .assert()
        .success()
        .stdout(contains("[dry-run]"))
        .stdout(contains("would create"))
        .stdout(contains("cover.png"));

    assert_eq!(fs::read(&path).expect("after"), before);
    assert!(!root.path().join("posts/hello/.sync-state.json").exists());
    assert!(!root.path().join(".quill").exists());
}

#[test]
fn failed_publish_exits_non_zero_and_keeps_files() {
    let root = corpus();
    let path = write_post(
        root.path(),
        "hello",
        "title: Hello\ndate: 2025-01-01T09:00:00Z\nstatus: published\n",
        "just prose\n",
    );
    let before = fs::read(&path).expect("before");

    quill_cmd(root.path())
        .args(["publish", "--all"])
        .assert()
        .failure()
        .stdout(contains("'hello' failed"))
        .stderr(contains("hello: publish failed"))
        .stderr(contains("1 of 1 post(s) failed"));

    assert_eq!(fs::read(&path).expect("after"), before);
    assert!(!root.path().join("posts/hello/.sync-state.json").exists());
}

#[test]
fn verbose_flag_logs_where_the_corpus_lives() {
    let root = corpus();
    quill_cmd(root.path())
        .args(["-vv", "status"])
        .assert()
        .success()
        .stderr(contains("posts in"));
}

#[test]
fn publish_requires_an_id_or_all() {
    let root = corpus();
    quill_cmd(root.path())
        .arg("publish")
        .assert()
        .failure()
        .stderr(contains("--all"));
    quill_cmd(root.path())
        .args(["publish", "hello", "--all"])
        .assert()
        .failure()
        .stderr(contains("cannot be used with").or(contains("conflict")));
}

#[test]
fn diff_shows_known_rewrites_and_unresolved_references() {
    let root = corpus();
    write_post(
        root.path(),
        "hello",
        "title: Hello\ndate: 2025-01-01T09:00:00Z\n",
        "intro\n\n![c](cover.png)\n",
    );
    fs::write(root.path().join("posts/hello/cover.png"), b"png").expect("asset");

    quill_cmd(root.path())
        .args(["diff", "hello"])
        .assert()
        .success()
        .stdout(contains("No differences for 'hello'."))
        .stdout(contains("cover.png (not uploaded yet)"));
}
