//! Per-provider circuit breaker: `closed → open → half-open`
//! after K=5 consecutive failures or one explicit quota/rate error; stays
//! `open` for C=60s; `half-open` permits exactly one probe. State is
//! shared across workers via atomics,
//! generalized from the teacher's lock-contention circuit breaker
//! (`mcp-agent-mail-db::retry::CircuitBreaker`) to a three-state machine
//! with an explicit single-probe gate for `half_open`.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        };
        write!(f, "{s}")
    }
}

pub struct CircuitBreaker {
    failures: AtomicU32,
    open_until_us: AtomicU64,
    probe_in_flight: AtomicBool,
    threshold: u32,
    cooldown: Duration,
    epoch: Instant,
}

impl CircuitBreaker {
    /// K=5, C=60s.
    pub fn new() -> Self {
        Self::with_params(5, Duration::from_secs(60))
    }

    pub fn with_params(threshold: u32, cooldown: Duration) -> Self {
        Self {
            failures: AtomicU32::new(0),
            open_until_us: AtomicU64::new(0),
            probe_in_flight: AtomicBool::new(false),
            threshold,
            cooldown,
            epoch: Instant::now(),
        }
    }

    fn now_us(&self) -> u64 {
        self.epoch.elapsed().as_micros().min(u64::MAX as u128) as u64
    }

    pub fn state(&self) -> CircuitState {
        let open_until = self.open_until_us.load(Ordering::Acquire);
        if open_until > 0 {
            if self.now_us() < open_until {
                return CircuitState::Open;
            }
            return CircuitState::HalfOpen;
        }
        CircuitState::Closed
    }

    /// Whether a call may proceed right now. In `half_open`, only the
    /// first caller to observe the state gets `true`; concurrent callers
    /// see `false` until the probe resolves.
    pub fn try_acquire(&self) -> bool {
        match self.state() {
            CircuitState::Closed => true,
            CircuitState::Open => false,
            CircuitState::HalfOpen => !self.probe_in_flight.swap(true, Ordering::AcqRel),
        }
    }

    pub fn record_success(&self) {
        self.failures.store(0, Ordering::Release);
        self.open_until_us.store(0, Ordering::Release);
        self.probe_in_flight.store(false, Ordering::Release);
    }

    /// `forced_open` implements "one explicit quota/rate error" opening
    /// the circuit immediately regardless of the consecutive-failure
    /// counter.
    pub fn record_failure(&self, forced_open: bool) {
        self.probe_in_flight.store(false, Ordering::Release);
        let count = self.failures.fetch_add(1, Ordering::AcqRel) + 1;
        if forced_open || count >= self.threshold {
            let open_until = self.now_us() + self.cooldown.as_micros().min(u64::MAX as u128) as u64;
            self.open_until_us.store(open_until, Ordering::Release);
        }
    }

    pub fn failure_count(&self) -> u32 {
        self.failures.load(Ordering::Acquire)
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stays_closed_under_threshold() {
        let cb = CircuitBreaker::with_params(5, Duration::from_secs(60));
        for _ in 0..4 {
            cb.record_failure(false);
        }
        assert_eq!(cb.state(), CircuitState::Closed);
        assert!(cb.try_acquire());
    }

    #[test]
    fn opens_at_threshold() {
        let cb = CircuitBreaker::with_params(5, Duration::from_secs(60));
        for _ in 0..5 {
            cb.record_failure(false);
        }
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(!cb.try_acquire());
    }

    #[test]
    fn quota_error_forces_open_on_first_failure() {
        let cb = CircuitBreaker::with_params(5, Duration::from_secs(60));
        cb.record_failure(true);
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[test]
    fn half_open_permits_exactly_one_probe() {
        let cb = CircuitBreaker::with_params(1, Duration::from_millis(10));
        cb.record_failure(true);
        assert_eq!(cb.state(), CircuitState::Open);
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        assert!(cb.try_acquire());
        assert!(!cb.try_acquire());
    }

    #[test]
    fn success_resets_to_closed() {
        let cb = CircuitBreaker::with_params(1, Duration::from_millis(10));
        cb.record_failure(true);
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        cb.try_acquire();
        cb.record_success();
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.failure_count(), 0);
    }
}
