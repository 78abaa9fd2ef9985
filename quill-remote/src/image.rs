//! Image distribution service.
//!
//! Objects are addressed by content fingerprint: the object key is
//! `<folder>/<hex digest><.ext>`, so uploading the same bytes twice, from any
//! post or any process, lands on the same URL.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use quill_core::{config::ImageHostConfig, ContentHash};

use crate::error::{decode_err, from_ureq, RemoteError};
use crate::http;

/// One asset to upload.
#[derive(Debug, Clone, Copy)]
pub struct AssetUpload<'a> {
    pub content_hash: &'a ContentHash,
    /// Symbolic reference, used for the extension and for logs.
    pub reference: &'a str,
    pub bytes: &'a [u8],
}

/// Accepts raw asset bytes and returns a stable URL.
pub trait ImageHost: Send + Sync {
    fn upload(&self, asset: &AssetUpload<'_>) -> Result<String, RemoteError>;
}

/// `PUT {endpoint}/{folder}/{hex}{.ext}` with the raw bytes as body.
#[derive(Debug, Clone)]
pub struct HttpImageHost {
    agent: ureq::Agent,
    endpoint: String,
    folder: String,
    token: Option<String>,
}

/// Hosts in the Cloudinary mould send both keys; `secure_url` wins.
#[derive(Debug, Deserialize)]
struct UploadResponse {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    secure_url: Option<String>,
}

impl UploadResponse {
    fn into_url(self) -> Option<String> {
        self.secure_url.or(self.url)
    }
}

impl HttpImageHost {
    pub fn new(config: &ImageHostConfig, timeout: Duration) -> Self {
        Self {
            agent: http::agent(timeout),
            endpoint: config.endpoint.clone(),
            folder: config.folder.clone(),
            token: http::token_from_env(config.token_env.as_deref()),
        }
    }

    fn object_url(&self, asset: &AssetUpload<'_>) -> String {
        http::join(&self.endpoint, &[&self.folder, &object_name(asset)])
    }
}

impl ImageHost for HttpImageHost {
    fn upload(&self, asset: &AssetUpload<'_>) -> Result<String, RemoteError> {
        let url = self.object_url(asset);
        tracing::info!("uploading {} ({} bytes) to {url}", asset.reference, asset.bytes.len());
        let request = http::authorize(self.agent.put(&url), self.token.as_deref())
            .set("Content-Type", content_type(asset.reference));
        let response = request
            .send_bytes(asset.bytes)
            .map_err(|e| from_ureq(&url, e))?;
        let body: UploadResponse = response.into_json().map_err(|e| decode_err(&url, e))?;
        body.into_url()
            .ok_or_else(|| decode_err(&url, "response carries neither `secure_url` nor `url`"))
    }
}

/// `<hex digest>` plus the lowercased extension of the reference, if any.
pub fn object_name(asset: &AssetUpload<'_>) -> String {
    match extension(asset.reference) {
        Some(ext) => format!("{}.{ext}", asset.content_hash.hex()),
        None => asset.content_hash.hex().to_owned(),
    }
}

fn extension(reference: &str) -> Option<String> {
    Path::new(reference)
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .filter(|e| !e.is_empty())
}

fn content_type(reference: &str) -> &'static str {
    match extension(reference).as_deref() {
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("svg") => "image/svg+xml",
        Some("avif") => "image/avif",
        _ => "application/octet-stream",
    }
}
