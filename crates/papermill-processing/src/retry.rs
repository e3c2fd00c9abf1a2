//! Failure classification and the bounded retry/backoff policy shared by
//! all converters.
//!
//! Classification is a pure function over the observed failure, so the
//! retry decision can be tested without any network call. Only
//! `Transient` failures are retried; `Permanent` and `NotFound` abort
//! immediately.

use std::future::Future;
use std::time::Duration;

/// Closed classification of an external failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Network/transport failure or HTTP 5xx. Worth retrying.
    Transient,
    /// Any other non-success response. Retrying cannot succeed.
    Permanent,
    /// The referenced resource does not exist upstream.
    NotFound,
}

/// An error from an external conversion capability, already classified.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct ExternalError {
    kind: FailureKind,
    message: String,
}

impl ExternalError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Transient,
            message: message.into(),
        }
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Permanent,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::NotFound,
            message: message.into(),
        }
    }

    pub fn with_kind(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> FailureKind {
        self.kind
    }
}

/// Classify a non-success HTTP status code.
pub fn classify_status(status: u16) -> FailureKind {
    match status {
        500..=599 => FailureKind::Transient,
        404 => FailureKind::NotFound,
        _ => FailureKind::Permanent,
    }
}

/// Classify a `reqwest` transport error. Errors that carry a response
/// status defer to `classify_status`; pure transport failures (connect,
/// timeout, interrupted body) are transient.
pub fn classify_reqwest(err: &reqwest::Error) -> FailureKind {
    match err.status() {
        Some(status) => classify_status(status.as_u16()),
        None => FailureKind::Transient,
    }
}

/// Bounded retry policy: up to `max_attempts` total attempts, exponential
/// backoff capped at `max_delay` before each retry.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(30_000),
        }
    }
}

impl RetryPolicy {
    /// Backoff before the retry following the given 0-based failed attempt:
    /// `min(base × 2^attempt, max)`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let base_ms = self.base_delay.as_millis() as u64;
        let factor = 2u64.saturating_pow(attempt);
        let delay_ms = base_ms
            .saturating_mul(factor)
            .min(self.max_delay.as_millis() as u64);
        Duration::from_millis(delay_ms)
    }
}

/// Drive an operation under the retry policy.
///
/// The operation receives the 0-based attempt index. Transient failures
/// sleep the backoff and retry; anything else (and the final transient
/// failure) is surfaced as-is.
pub async fn run_with_retry<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T, ExternalError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, ExternalError>>,
{
    let mut attempt = 0;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) => {
                let failed_attempt = attempt;
                attempt += 1;
                if err.kind() != FailureKind::Transient || attempt >= policy.max_attempts {
                    return Err(err);
                }
                let delay = policy.delay_for(failed_attempt);
                tracing::warn!(
                    attempt = failed_attempt + 1,
                    max_attempts = policy.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Transient failure, backing off before retry"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn classification_table() {
        assert_eq!(classify_status(500), FailureKind::Transient);
        assert_eq!(classify_status(503), FailureKind::Transient);
        assert_eq!(classify_status(599), FailureKind::Transient);
        assert_eq!(classify_status(404), FailureKind::NotFound);
        assert_eq!(classify_status(400), FailureKind::Permanent);
        assert_eq!(classify_status(401), FailureKind::Permanent);
        assert_eq!(classify_status(422), FailureKind::Permanent);
    }

    #[test]
    fn backoff_doubles_then_caps() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(0), Duration::from_millis(1000));
        assert_eq!(policy.delay_for(1), Duration::from_millis(2000));
        assert_eq!(policy.delay_for(2), Duration::from_millis(4000));
        assert_eq!(policy.delay_for(4), Duration::from_millis(16_000));
        // 1000 * 2^5 = 32000 exceeds the cap.
        assert_eq!(policy.delay_for(5), Duration::from_millis(30_000));
        assert_eq!(policy.delay_for(63), Duration::from_millis(30_000));
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failures_retry_exactly_three_times() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = Arc::clone(&calls);

        let started = tokio::time::Instant::now();
        let result: Result<(), _> = run_with_retry(&RetryPolicy::default(), |_| {
            let calls = Arc::clone(&calls_clone);
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(ExternalError::transient("connection reset"))
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // Waited 1s before attempt 2 and 2s before attempt 3.
        assert_eq!(started.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn permanent_failure_aborts_immediately() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = Arc::clone(&calls);

        let result: Result<(), _> = run_with_retry(&RetryPolicy::default(), |_| {
            let calls = Arc::clone(&calls_clone);
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(ExternalError::permanent("unsupported input"))
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_after_transient_failure() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = Arc::clone(&calls);

        let result = run_with_retry(&RetryPolicy::default(), |attempt| {
            let calls = Arc::clone(&calls_clone);
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                if attempt == 0 {
                    Err(ExternalError::transient("503 from upstream"))
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
