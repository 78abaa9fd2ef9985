//! Best-effort notification after a post goes live.

use std::time::Duration;

use serde::Serialize;

use quill_core::{config::NotifyConfig, ExternalId, PostId};

use crate::blog::Visibility;
use crate::error::{from_ureq, RemoteError};
use crate::http;

/// Event sent when a post transitions to live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishedEvent {
    pub id: PostId,
    #[serde(rename = "externalId")]
    pub external_id: ExternalId,
    pub title: String,
    pub url: Option<String>,
    pub status: Visibility,
}

pub trait Notifier: Send + Sync {
    fn notify(&self, event: &PublishedEvent) -> Result<(), RemoteError>;
}

/// POSTs the event as JSON to a configured webhook.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    agent: ureq::Agent,
    url: String,
}

impl WebhookNotifier {
    pub fn new(config: &NotifyConfig, timeout: Duration) -> Self {
        Self {
            agent: http::agent(timeout),
            url: config.webhook_url.clone(),
        }
    }
}

impl Notifier for WebhookNotifier {
    fn notify(&self, event: &PublishedEvent) -> Result<(), RemoteError> {
        tracing::info!("notifying {} about {}", self.url, event.id);
        self.agent
            .post(&self.url)
            .send_json(event)
            .map_err(|e| from_ureq(&self.url, e))?;
        Ok(())
    }
}
