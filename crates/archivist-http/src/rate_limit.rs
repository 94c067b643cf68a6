//! A tiny in-process token-bucket rate limiter, used for the login
//! endpoint's "10/minute per source address" limit. Grounded on the teacher's own
//! `RateLimiter` (`mcp-agent-mail-server::RateLimiter`), which keeps a
//! `Mutex<HashMap<key, (tokens, last_refill)>>` bucket per key and
//! refills it continuously at `per_minute / 60` tokens/second; this is
//! the single-process equivalent, swapping `dashmap` in for the
//! mutex-guarded map since the rest of this crate's fallback storage
//! already leans on it (`archivist_session::InMemorySessionBackend`).

use dashmap::DashMap;
use std::time::Instant;

struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

pub struct RateLimiter {
    buckets: DashMap<String, Bucket>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self { buckets: DashMap::new() }
    }

    /// Consumes one token for `key` if available. `per_minute` tokens are
    /// replenished continuously; `burst` caps how many can accumulate.
    pub fn allow(&self, key: &str, per_minute: u32, burst: u32) -> bool {
        if per_minute == 0 {
            return true;
        }
        let rate_per_sec = f64::from(per_minute) / 60.0;
        let burst = f64::from(burst.max(1));
        let now = Instant::now();

        let mut entry = self.buckets.entry(key.to_string()).or_insert_with(|| Bucket { tokens: burst, last_refill: now });
        let elapsed = now.saturating_duration_since(entry.last_refill).as_secs_f64();
        entry.tokens = (entry.tokens + elapsed * rate_per_sec).min(burst);
        entry.last_refill = now;

        if entry.tokens >= 1.0 {
            entry.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_up_to_burst_then_rejects() {
        let limiter = RateLimiter::new();
        for _ in 0..10 {
            assert!(limiter.allow("1.2.3.4", 10, 10));
        }
        assert!(!limiter.allow("1.2.3.4", 10, 10));
    }

    #[test]
    fn distinct_keys_have_independent_buckets() {
        let limiter = RateLimiter::new();
        for _ in 0..10 {
            assert!(limiter.allow("a", 10, 10));
        }
        assert!(limiter.allow("b", 10, 10));
    }
}
