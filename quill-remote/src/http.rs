//! Shared blocking HTTP plumbing.

use std::time::Duration;

/// Build an agent whose every request is bounded by `timeout`.
pub fn agent(timeout: Duration) -> ureq::Agent {
    ureq::AgentBuilder::new()
        .timeout_connect(timeout)
        .timeout(timeout)
        .user_agent(concat!("quill/", env!("CARGO_PKG_VERSION")))
        .build()
}

/// Read a bearer token from the environment variable named in config.
///
/// A named-but-unset variable is logged and treated as no token; the remote
/// service then rejects the call, which surfaces as a normal rejection.
pub fn token_from_env(var: Option<&str>) -> Option<String> {
    let var = var?;
    match std::env::var(var) {
        Ok(token) if !token.trim().is_empty() => Some(token),
        _ => {
            tracing::warn!("environment variable {var} is not set; sending unauthenticated requests");
            None
        }
    }
}

/// Attach `Authorization: Bearer` when a token is configured.
pub fn authorize(request: ureq::Request, token: Option<&str>) -> ureq::Request {
    match token {
        Some(token) => request.set("Authorization", &format!("Bearer {token}")),
        None => request,
    }
}

/// Join an endpoint and path segments with exactly one `/` between them.
pub fn join(endpoint: &str, segments: &[&str]) -> String {
    let mut url = endpoint.trim_end_matches('/').to_owned();
    for segment in segments {
        url.push('/');
        url.push_str(segment.trim_matches('/'));
    }
    url
}
