//! Error types for quill-core.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading, validating, or persisting a post.
///
/// Every variant is a local failure: none of them can be produced after a
/// network call has been made on behalf of the post.
#[derive(Debug, Error)]
pub enum CorpusError {
    /// Underlying I/O failure, annotated with the offending path.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML serialization error (write path).
    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// The post file does not start with a `---` delimited header.
    #[error("no metadata header found in {path}; the file must start with a '---' line")]
    MissingHeader { path: PathBuf },

    /// The header is not valid YAML or does not match the metadata schema.
    #[error("failed to parse metadata header in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// A required metadata field is absent or empty.
    #[error("missing required metadata field '{field}' in {path}")]
    MissingField { path: PathBuf, field: &'static str },

    /// The header was written by a newer schema than this build understands.
    #[error("unsupported schemaVersion {found} in {path} (max supported: {supported})")]
    UnsupportedVersion {
        path: PathBuf,
        found: u32,
        supported: u32,
    },

    /// The post directory name cannot be used as a stable id.
    #[error("invalid post id '{id}': {reason}")]
    InvalidId { id: String, reason: &'static str },

    /// The body references an asset file that does not exist next to the post.
    #[error("post '{id}' references missing asset '{reference}' (expected at {path})")]
    MissingAsset {
        id: String,
        reference: String,
        path: PathBuf,
    },

    /// No post directory with this id exists under the posts directory.
    #[error("post not found at {path}")]
    PostNotFound { path: PathBuf },
}

/// Errors raised while loading `quill.yaml`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("config not found at {path}; run `quill init` first")]
    NotFound { path: PathBuf },

    /// YAML parse error on load: includes file path and line context from serde_yaml.
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid config value for '{field}': {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Convenience constructor for [`CorpusError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> CorpusError {
    CorpusError::Io {
        path: path.into(),
        source,
    }
}
