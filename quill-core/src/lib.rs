//! quill core library: content model, header codec, storage, configuration.
//!
//! - [`types`]: post ids, metadata header, asset records, content units
//! - [`frontmatter`]: header parse / serialize / validate
//! - [`references`]: symbolic asset reference scanning and replacement
//! - [`fingerprint`]: SHA-256 content fingerprints
//! - [`store`]: directory-per-post load / save (atomic)
//! - [`config`]: `quill.yaml`
//! - [`corpus`]: read contract for renderers

pub mod config;
pub mod corpus;
pub mod error;
pub mod fingerprint;
pub mod frontmatter;
pub mod references;
pub mod store;
pub mod types;

pub use error::{ConfigError, CorpusError};
pub use types::{
    AssetRecord, ContentHash, ContentUnit, ExternalId, Metadata, PersistedAsset, PostId, Status,
};
