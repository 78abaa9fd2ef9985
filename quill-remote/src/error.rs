//! Error types for quill-remote.

use thiserror::Error;

/// All errors a remote collaborator call can produce.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// The request never got an HTTP answer (DNS, connect, timeout, reset).
    #[error("transport error calling {url}: {message}")]
    Transport { url: String, message: String },

    /// The service answered with a non-success status.
    #[error("{url} returned HTTP {status}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },

    /// The service answered 2xx but the payload was not what we expected.
    #[error("unexpected response from {url}: {message}")]
    Decode { url: String, message: String },
}

impl RemoteError {
    /// Transient failures are worth retrying: no answer at all, request
    /// timeout, rate limiting, or a server-side error. Everything else is an
    /// application-level rejection.
    pub fn is_transient(&self) -> bool {
        match self {
            RemoteError::Transport { .. } => true,
            RemoteError::Status { status, .. } => {
                matches!(status, 408 | 429) || (500..=599).contains(status)
            }
            RemoteError::Decode { .. } => false,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, RemoteError::Status { status: 404, .. })
    }
}

/// Longest response body kept in an error message.
const MAX_BODY: usize = 512;

/// Map a `ureq` failure onto [`RemoteError`].
pub(crate) fn from_ureq(url: &str, err: ureq::Error) -> RemoteError {
    match err {
        ureq::Error::Status(status, response) => {
            let mut body = response.into_string().unwrap_or_default();
            if body.len() > MAX_BODY {
                let mut cut = MAX_BODY;
                while !body.is_char_boundary(cut) {
                    cut -= 1;
                }
                body.truncate(cut);
            }
            RemoteError::Status {
                url: url.to_owned(),
                status,
                body,
            }
        }
        ureq::Error::Transport(transport) => RemoteError::Transport {
            url: url.to_owned(),
            message: transport.to_string(),
        },
    }
}

pub(crate) fn decode_err(url: &str, err: impl std::fmt::Display) -> RemoteError {
    RemoteError::Decode {
        url: url.to_owned(),
        message: err.to_string(),
    }
}
