//! `quill.yaml`: corpus configuration.
//!
//! Secrets never live in the file: each host names the environment variable
//! holding its bearer token (`token_env`), resolved at client construction.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// File name of the configuration at the corpus root.
pub const CONFIG_FILE: &str = "quill.yaml";

/// How the rewritten body is sent to the hosting platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BodyFormat {
    /// Markdown converted to HTML before sending.
    #[default]
    Html,
    /// Markdown sent verbatim.
    Markdown,
}

/// Backoff settings for transient network failures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrySettings {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

/// Image distribution service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageHostConfig {
    pub endpoint: String,
    #[serde(default = "default_folder")]
    pub folder: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_env: Option<String>,
}

/// Blog hosting platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlogHostConfig {
    pub endpoint: String,
    pub blog_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_env: Option<String>,
}

/// Optional webhook notified when a post goes live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotifyConfig {
    pub webhook_url: String,
}

/// Root of `quill.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuillConfig {
    #[serde(default = "default_posts_dir")]
    pub posts_dir: PathBuf,
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,
    #[serde(default)]
    pub body_format: BodyFormat,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub retry: RetrySettings,
    pub image_host: ImageHostConfig,
    pub blog_host: BlogHostConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notify: Option<NotifyConfig>,
}

fn default_max_retries() -> u32 {
    2
}
fn default_base_delay_ms() -> u64 {
    500
}
fn default_max_delay_ms() -> u64 {
    8_000
}
fn default_folder() -> String {
    "blog-posts".to_string()
}
fn default_posts_dir() -> PathBuf {
    PathBuf::from("posts")
}
fn default_state_dir() -> PathBuf {
    PathBuf::from(".quill")
}
fn default_concurrency() -> usize {
    4
}
fn default_timeout_secs() -> u64 {
    30
}

impl QuillConfig {
    /// `posts_dir` resolved against the corpus root.
    pub fn posts_path(&self, root: &Path) -> PathBuf {
        root.join(&self.posts_dir)
    }

    /// `state_dir` resolved against the corpus root.
    pub fn state_path(&self, root: &Path) -> PathBuf {
        root.join(&self.state_dir)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrency == 0 {
            return Err(ConfigError::Invalid {
                field: "concurrency",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "timeout_secs",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.retry.base_delay_ms > self.retry.max_delay_ms {
            return Err(ConfigError::Invalid {
                field: "retry.base_delay_ms",
                reason: "must not exceed retry.max_delay_ms".to_string(),
            });
        }
        for (field, value) in [
            ("image_host.endpoint", &self.image_host.endpoint),
            ("blog_host.endpoint", &self.blog_host.endpoint),
            ("blog_host.blog_id", &self.blog_host.blog_id),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::Invalid {
                    field,
                    reason: "must not be empty".to_string(),
                });
            }
        }
        Ok(())
    }
}

/// `<root>/quill.yaml`: pure, no I/O.
pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

/// Load and validate `<root>/quill.yaml`.
pub fn load_at(root: &Path) -> Result<QuillConfig, ConfigError> {
    let path = config_path(root);
    if !path.exists() {
        return Err(ConfigError::NotFound { path });
    }
    let contents = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
        path: path.clone(),
        source,
    })?;
    parse(&contents, &path)
}

/// Parse and validate config text; `path` is only used for error context.
pub fn parse(contents: &str, path: &Path) -> Result<QuillConfig, ConfigError> {
    let config: QuillConfig = serde_yaml::from_str(contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    config.validate()?;
    Ok(config)
}

/// Template written by `quill init`.
pub const TEMPLATE: &str = r#"# quill corpus configuration
posts_dir: posts
state_dir: .quill

# html: markdown is converted before sending; markdown: sent verbatim
body_format: html

# parallel posts per run, and parallel uploads per post
concurrency: 4
timeout_secs: 30

retry:
  max_retries: 2
  base_delay_ms: 500
  max_delay_ms: 8000

image_host:
  endpoint: https://images.example.com/v1
  folder: blog-posts
  token_env: QUILL_IMAGE_TOKEN

blog_host:
  endpoint: https://www.googleapis.com/blogger/v3
  blog_id: "0000000000000000000"
  token_env: QUILL_BLOG_TOKEN

# notify:
#   webhook_url: https://hooks.example.com/quill
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn template_parses_with_defaults() {
        let config = parse(TEMPLATE, Path::new("quill.yaml")).expect("template must parse");
        assert_eq!(config.posts_dir, PathBuf::from("posts"));
        assert_eq!(config.body_format, BodyFormat::Html);
        assert_eq!(config.concurrency, 4);
        assert_eq!(config.retry, RetrySettings::default());
        assert!(config.notify.is_none());
        assert_eq!(config.image_host.token_env.as_deref(), Some("QUILL_IMAGE_TOKEN"));
    }

    #[test]
    fn minimal_config_fills_defaults() {
        let yaml = "image_host:\n  endpoint: http://img\nblog_host:\n  endpoint: http://blog\n  blog_id: b1\n";
        let config = parse(yaml, Path::new("quill.yaml")).unwrap();
        assert_eq!(config.state_dir, PathBuf::from(".quill"));
        assert_eq!(config.image_host.folder, "blog-posts");
        assert_eq!(config.timeout_secs, 30);
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let yaml = "concurrency: 0\nimage_host:\n  endpoint: http://img\nblog_host:\n  endpoint: http://blog\n  blog_id: b1\n";
        let err = parse(yaml, Path::new("quill.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "concurrency", .. }));
    }

    #[test]
    fn missing_file_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let err = load_at(tmp.path()).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound { .. }));
        assert!(err.to_string().contains("quill init"));
    }

    #[test]
    fn unknown_body_format_is_a_parse_error() {
        let yaml = "body_format: pdf\nimage_host:\n  endpoint: http://img\nblog_host:\n  endpoint: http://blog\n  blog_id: b1\n";
        let err = parse(yaml, Path::new("quill.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn paths_resolve_against_root() {
        let config = parse(TEMPLATE, Path::new("quill.yaml")).unwrap();
        let root = Path::new("/corpus");
        assert_eq!(config.posts_path(root), PathBuf::from("/corpus/posts"));
        assert_eq!(config.state_path(root), PathBuf::from("/corpus/.quill"));
    }
}
