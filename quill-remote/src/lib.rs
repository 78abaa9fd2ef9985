//! # quill-remote
//!
//! Seams to the external collaborators of a publish run, plus their blocking
//! HTTP implementations:
//!
//! - [`ImageHost`]: content-addressed image distribution service
//! - [`BlogHost`]: remote blog record store
//! - [`Notifier`]: optional webhook fired when a post goes live
//!
//! [`markup::format_body`] turns a rewritten markdown body into what the
//! platform expects.
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use quill_core::ExternalId;
//! use quill_remote::{BlogHost, HttpBlogHost};
//!
//! fn show(config: &quill_core::config::QuillConfig) {
//!     let host = HttpBlogHost::new(&config.blog_host, Duration::from_secs(config.timeout_secs));
//!     if let Ok(record) = host.fetch(&ExternalId::from("8123")) {
//!         println!("{} is {}", record.id, record.visibility);
//!     }
//! }
//! ```

pub mod blog;
pub mod error;
pub mod http;
pub mod image;
pub mod markup;
pub mod notify;

pub use blog::{BlogHost, HttpBlogHost, RemotePost, RemoteRecord, Visibility};
pub use error::RemoteError;
pub use image::{AssetUpload, HttpImageHost, ImageHost};
pub use notify::{Notifier, PublishedEvent, WebhookNotifier};
