//! Bounded exponential backoff for remote calls.

use std::time::Duration;

use quill_core::config::RetrySettings;

/// Retry decision returned by the error classifier callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryAction {
    Retry,
    Abort,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetrySettings::default())
    }
}

impl From<&RetrySettings> for RetryPolicy {
    fn from(settings: &RetrySettings) -> Self {
        Self {
            max_retries: settings.max_retries,
            base_delay: Duration::from_millis(settings.base_delay_ms),
            max_delay: Duration::from_millis(settings.max_delay_ms),
        }
    }
}

impl RetryPolicy {
    /// No retries and no waiting.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// `min(base_delay * 2^retry, max_delay)` for a 0-indexed retry.
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        let factor = 1u32.checked_shl(retry).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// The last error of a call that did not succeed, and how often it was tried.
#[derive(Debug)]
pub struct Failed<E> {
    pub error: E,
    pub attempts: u32,
}

/// Retry `operation` with exponential backoff.
///
/// Returns the first `Ok`, or the last error once retries are exhausted or
/// the classifier returns [`RetryAction::Abort`].
pub fn retry_with_backoff<T, E, F, C>(
    policy: &RetryPolicy,
    classifier: C,
    mut operation: F,
) -> Result<T, Failed<E>>
where
    F: FnMut() -> Result<T, E>,
    C: Fn(&E) -> RetryAction,
    E: std::fmt::Display,
{
    let total_attempts = policy.max_retries + 1;
    let mut attempt = 0;
    loop {
        attempt += 1;
        let error = match operation() {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };
        if classifier(&error) == RetryAction::Abort || attempt >= total_attempts {
            return Err(Failed {
                error,
                attempts: attempt,
            });
        }
        let delay = policy.delay_for_retry(attempt - 1);
        tracing::warn!(
            "retryable error (attempt {attempt}/{total_attempts}), retrying in {}ms: {error}",
            delay.as_millis()
        );
        std::thread::sleep(delay);
    }
}
