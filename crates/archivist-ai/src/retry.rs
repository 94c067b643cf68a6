//! Jittered exponential backoff retry loop: up to R=3
//! attempts, base 1s / cap 15s, retrying only `Transient`/`RateLimited`
//! errors. Hard deadline D=120s per request is enforced by the caller via
//! `tokio::time::timeout` around the whole retry loop, matching the
//! teacher's `execute_stage` per-stage timeout pattern.

use crate::error::AiError;
use rand::Rng;
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base: Duration,
    pub cap: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base: Duration::from_secs(1),
            cap: Duration::from_secs(15),
        }
    }
}

impl RetryPolicy {
    /// `min(base * 2^attempt, cap)`, jittered by up to ±25%.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let raw_ms = self.base.as_millis().saturating_mul(1u128 << attempt.min(30));
        let capped_ms = raw_ms.min(self.cap.as_millis()) as u64;
        let jitter = rand::thread_rng().gen_range(0.75..=1.25);
        Duration::from_millis(((capped_ms as f64) * jitter) as u64)
    }
}

/// Runs `op` up to `policy.max_attempts` times, sleeping between attempts
/// per [`RetryPolicy::delay_for_attempt`]. Only `AiError::is_retriable`
/// errors are retried; anything else returns immediately.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T, AiError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, AiError>>,
{
    let mut last_err = None;
    for attempt in 0..policy.max_attempts {
        match op().await {
            Ok(v) => return Ok(v),
            Err(e) if e.is_retriable() && attempt + 1 < policy.max_attempts => {
                tracing::warn!(attempt, error = %e, "AI provider call failed, retrying");
                tokio::time::sleep(policy.delay_for_attempt(attempt)).await;
                last_err = Some(e);
            }
            Err(e) => return Err(e),
        }
    }
    Err(last_err.expect("loop runs at least once"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn retries_transient_errors_up_to_max_attempts() {
        let policy = RetryPolicy {
            max_attempts: 3,
            base: Duration::from_millis(1),
            cap: Duration::from_millis(5),
        };
        let calls = AtomicU32::new(0);
        let result: Result<(), AiError> = with_retry(&policy, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(AiError::Transient("boom".into())) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn never_retries_malformed_response() {
        let policy = RetryPolicy::default();
        let calls = AtomicU32::new(0);
        let result: Result<(), AiError> = with_retry(&policy, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(AiError::MalformedResponse("bad".into())) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn succeeds_after_transient_failure() {
        let policy = RetryPolicy {
            max_attempts: 3,
            base: Duration::from_millis(1),
            cap: Duration::from_millis(5),
        };
        let calls = AtomicU32::new(0);
        let result = with_retry(&policy, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(AiError::Transient("boom".into()))
                } else {
                    Ok(42)
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(result, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
