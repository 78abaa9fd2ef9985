//! Blog hosting platform client.
//!
//! The wire shape follows the Blogger v3 posts resource:
//!
//! | call     | request                                              |
//! |----------|------------------------------------------------------|
//! | create   | `POST /blogs/{blog}/posts?isDraft=<bool>`            |
//! | update   | `PUT /blogs/{blog}/posts/{id}`                       |
//! | publish  | `POST /blogs/{blog}/posts/{id}/publish[?publishDate]`|
//! | revert   | `POST /blogs/{blog}/posts/{id}/revert`               |
//! | fetch    | `GET /blogs/{blog}/posts/{id}?view=AUTHOR`           |

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use quill_core::{config::BlogHostConfig, ExternalId};

use crate::error::{decode_err, from_ureq, RemoteError};
use crate::http;

/// Visibility of a record on the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Visibility {
    Draft,
    Live,
    Scheduled,
}

impl Visibility {
    /// Live and scheduled records are both "published" from the author's side.
    pub fn is_published(self) -> bool {
        matches!(self, Visibility::Live | Visibility::Scheduled)
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Visibility::Draft => write!(f, "DRAFT"),
            Visibility::Live => write!(f, "LIVE"),
            Visibility::Scheduled => write!(f, "SCHEDULED"),
        }
    }
}

/// What we send: final title, formatted body, labels and target visibility.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemotePost {
    pub title: String,
    pub content: String,
    pub labels: Vec<String>,
    pub visibility: Visibility,
    /// Publish date for scheduled posts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publish_at: Option<DateTime<Utc>>,
}

/// What the platform reports back.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RemoteRecord {
    pub id: ExternalId,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(rename = "status")]
    pub visibility: Visibility,
    #[serde(default)]
    pub published: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated: Option<DateTime<Utc>>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub labels: Vec<String>,
}

/// The remote record store. Calls are not retried here.
pub trait BlogHost: Send + Sync {
    fn create(&self, post: &RemotePost) -> Result<RemoteRecord, RemoteError>;
    fn update(&self, id: &ExternalId, post: &RemotePost) -> Result<RemoteRecord, RemoteError>;
    fn publish(
        &self,
        id: &ExternalId,
        publish_at: Option<DateTime<Utc>>,
    ) -> Result<RemoteRecord, RemoteError>;
    fn revert(&self, id: &ExternalId) -> Result<RemoteRecord, RemoteError>;
    fn fetch(&self, id: &ExternalId) -> Result<RemoteRecord, RemoteError>;
}

#[derive(Debug, Serialize)]
struct PostBody<'a> {
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<&'a str>,
    title: &'a str,
    content: &'a str,
    labels: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    published: Option<String>,
}

impl<'a> PostBody<'a> {
    fn new(id: Option<&'a ExternalId>, post: &'a RemotePost) -> Self {
        Self {
            kind: "blogger#post",
            id: id.map(|id| id.0.as_str()),
            title: &post.title,
            content: &post.content,
            labels: &post.labels,
            published: post.publish_at.map(rfc3339),
        }
    }
}

fn rfc3339(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// HTTP implementation of [`BlogHost`].
#[derive(Debug, Clone)]
pub struct HttpBlogHost {
    agent: ureq::Agent,
    endpoint: String,
    blog_id: String,
    token: Option<String>,
}

impl HttpBlogHost {
    pub fn new(config: &BlogHostConfig, timeout: Duration) -> Self {
        Self {
            agent: http::agent(timeout),
            endpoint: config.endpoint.clone(),
            blog_id: config.blog_id.clone(),
            token: http::token_from_env(config.token_env.as_deref()),
        }
    }

    fn posts_url(&self, rest: &[&str]) -> String {
        let mut segments = vec!["blogs", self.blog_id.as_str(), "posts"];
        segments.extend_from_slice(rest);
        http::join(&self.endpoint, &segments)
    }

    fn call(
        &self,
        request: ureq::Request,
        url: &str,
        body: Option<&PostBody<'_>>,
    ) -> Result<RemoteRecord, RemoteError> {
        let request = http::authorize(request, self.token.as_deref());
        let response = match body {
            Some(body) => request.send_json(body),
            None => request.call(),
        }
        .map_err(|e| from_ureq(url, e))?;
        response.into_json().map_err(|e| decode_err(url, e))
    }
}

impl BlogHost for HttpBlogHost {
    fn create(&self, post: &RemotePost) -> Result<RemoteRecord, RemoteError> {
        let url = self.posts_url(&[]);
        let is_draft = post.visibility == Visibility::Draft;
        tracing::info!("creating post '{}' (draft: {is_draft})", post.title);
        let request = self
            .agent
            .post(&url)
            .query("isDraft", if is_draft { "true" } else { "false" });
        self.call(request, &url, Some(&PostBody::new(None, post)))
    }

    fn update(&self, id: &ExternalId, post: &RemotePost) -> Result<RemoteRecord, RemoteError> {
        let url = self.posts_url(&[&id.0]);
        tracing::info!("updating post {id}");
        self.call(self.agent.put(&url), &url, Some(&PostBody::new(Some(id), post)))
    }

    fn publish(
        &self,
        id: &ExternalId,
        publish_at: Option<DateTime<Utc>>,
    ) -> Result<RemoteRecord, RemoteError> {
        let url = self.posts_url(&[&id.0, "publish"]);
        tracing::info!("publishing post {id}");
        let mut request = self.agent.post(&url);
        if let Some(at) = publish_at {
            request = request.query("publishDate", &rfc3339(at));
        }
        self.call(request, &url, None)
    }

    fn revert(&self, id: &ExternalId) -> Result<RemoteRecord, RemoteError> {
        let url = self.posts_url(&[&id.0, "revert"]);
        tracing::info!("reverting post {id} to draft");
        self.call(self.agent.post(&url), &url, None)
    }

    fn fetch(&self, id: &ExternalId) -> Result<RemoteRecord, RemoteError> {
        let url = self.posts_url(&[&id.0]);
        tracing::debug!("fetching post {id}");
        self.call(self.agent.get(&url).query("view", "AUTHOR"), &url, None)
    }
}
