//! Per-endpoint circuit breaker (§4.6.3): Closed → Open → HalfOpen → Closed,
//! with a sliding window of recent failures driving the Closed → Open
//! transition.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::error::{CircuitOpenSnafu, ResourceError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

/// Configuration shared by every breaker a [`BreakerRegistry`] creates.
#[derive(Debug, Clone, Copy)]
pub struct BreakerConfig {
    pub failure_threshold: u32,
    pub success_threshold: u32,
    pub reset_timeout: Duration,
    pub failure_window: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        BreakerConfig {
            failure_threshold: 5,
            success_threshold: 2,
            reset_timeout: Duration::from_secs(30),
            failure_window: Duration::from_secs(60),
        }
    }
}

struct Inner {
    state: BreakerState,
    failures: Vec<Instant>,
    half_open_successes: u32,
    opened_at: Option<Instant>,
    times_opened: u32,
}

impl Inner {
    fn new() -> Self {
        Inner {
            state: BreakerState::Closed,
            failures: Vec::new(),
            half_open_successes: 0,
            opened_at: None,
            times_opened: 0,
        }
    }

    fn prune(&mut self, now: Instant, window: Duration) {
        self.failures.retain(|&t| now.duration_since(t) <= window);
    }
}

/// A single endpoint's breaker. All transitions happen under one mutex, so
/// the breaker is safe to share across concurrent callers (§4.6.3,
/// "state transitions are atomic with respect to concurrent callers").
pub struct CircuitBreaker {
    config: BreakerConfig,
    inner: Mutex<Inner>,
    host: String,
    port: u16,
}

impl CircuitBreaker {
    pub fn new(host: impl Into<String>, port: u16, config: BreakerConfig) -> Self {
        CircuitBreaker { config, inner: Mutex::new(Inner::new()), host: host.into(), port }
    }

    pub fn state(&self) -> BreakerState {
        self.inner.lock().unwrap().state
    }

    pub fn times_opened(&self) -> u32 {
        self.inner.lock().unwrap().times_opened
    }

    /// Checks whether a call may proceed. A stale Open breaker whose
    /// `reset_timeout` has elapsed transitions to HalfOpen and the call is
    /// admitted as the trial; an Open breaker still within its timeout
    /// fails fast.
    pub fn try_acquire(&self) -> Result<(), ResourceError> {
        let now = Instant::now();
        let mut inner = self.inner.lock().unwrap();
        inner.prune(now, self.config.failure_window);

        match inner.state {
            BreakerState::Closed | BreakerState::HalfOpen => Ok(()),
            BreakerState::Open => {
                let opened_at = inner.opened_at.expect("Open implies opened_at set");
                if now >= opened_at + self.config.reset_timeout {
                    inner.state = BreakerState::HalfOpen;
                    inner.half_open_successes = 0;
                    Ok(())
                } else {
                    let retry_after = (opened_at + self.config.reset_timeout).duration_since(now);
                    CircuitOpenSnafu {
                        host: self.host.clone(),
                        port: self.port,
                        retry_after_secs: retry_after.as_secs(),
                    }
                    .fail()
                }
            }
        }
    }

    /// Records the outcome of a call already admitted by [`try_acquire`].
    pub fn record_success(&self) {
        let mut inner = self.inner.lock().unwrap();
        match inner.state {
            BreakerState::Closed => {}
            BreakerState::HalfOpen => {
                inner.half_open_successes += 1;
                if inner.half_open_successes >= self.config.success_threshold {
                    inner.state = BreakerState::Closed;
                    inner.failures.clear();
                    inner.opened_at = None;
                }
            }
            BreakerState::Open => {}
        }
    }

    pub fn record_failure(&self) {
        let now = Instant::now();
        let mut inner = self.inner.lock().unwrap();
        match inner.state {
            BreakerState::Closed => {
                inner.prune(now, self.config.failure_window);
                inner.failures.push(now);
                if inner.failures.len() as u32 >= self.config.failure_threshold {
                    inner.state = BreakerState::Open;
                    inner.opened_at = Some(now);
                    inner.times_opened += 1;
                }
            }
            BreakerState::HalfOpen => {
                inner.state = BreakerState::Open;
                inner.opened_at = Some(now);
                inner.times_opened += 1;
                inner.failures.clear();
            }
            BreakerState::Open => {}
        }
    }
}

/// Creates breakers on first use and shares their configuration (§4.6.3,
/// "a breaker registry maps (host, port) to a breaker instance").
pub struct BreakerRegistry {
    config: BreakerConfig,
    breakers: Mutex<HashMap<(String, u16), std::sync::Arc<CircuitBreaker>>>,
}

impl BreakerRegistry {
    pub fn new(config: BreakerConfig) -> Self {
        BreakerRegistry { config, breakers: Mutex::new(HashMap::new()) }
    }

    pub fn get(&self, host: &str, port: u16) -> std::sync::Arc<CircuitBreaker> {
        let mut breakers = self.breakers.lock().unwrap();
        breakers
            .entry((host.to_string(), port))
            .or_insert_with(|| std::sync::Arc::new(CircuitBreaker::new(host, port, self.config)))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    fn fast_config() -> BreakerConfig {
        BreakerConfig {
            failure_threshold: 2,
            success_threshold: 1,
            reset_timeout: Duration::from_millis(20),
            failure_window: Duration::from_secs(60),
        }
    }

    #[test]
    fn closed_breaker_opens_after_threshold_failures() {
        let breaker = CircuitBreaker::new("scp", 104, fast_config());
        breaker.try_acquire().unwrap();
        breaker.record_failure();
        assert_eq!(breaker.state(), BreakerState::Closed);
        breaker.record_failure();
        assert_eq!(breaker.state(), BreakerState::Open);
        assert_eq!(breaker.times_opened(), 1);
    }

    #[test]
    fn open_breaker_fails_fast_until_reset_timeout() {
        let breaker = CircuitBreaker::new("scp", 104, fast_config());
        breaker.record_failure();
        breaker.record_failure();
        assert!(breaker.try_acquire().is_err());

        sleep(Duration::from_millis(30));
        assert!(breaker.try_acquire().is_ok());
        assert_eq!(breaker.state(), BreakerState::HalfOpen);
    }

    #[test]
    fn half_open_failure_reopens_immediately() {
        let breaker = CircuitBreaker::new("scp", 104, fast_config());
        breaker.record_failure();
        breaker.record_failure();
        sleep(Duration::from_millis(30));
        breaker.try_acquire().unwrap();
        assert_eq!(breaker.state(), BreakerState::HalfOpen);

        breaker.record_failure();
        assert_eq!(breaker.state(), BreakerState::Open);
        assert_eq!(breaker.times_opened(), 2);
    }

    #[test]
    fn half_open_success_closes_breaker() {
        let breaker = CircuitBreaker::new("scp", 104, fast_config());
        breaker.record_failure();
        breaker.record_failure();
        sleep(Duration::from_millis(30));
        breaker.try_acquire().unwrap();

        breaker.record_success();
        assert_eq!(breaker.state(), BreakerState::Closed);
    }

    #[test]
    fn registry_shares_one_breaker_per_endpoint() {
        let registry = BreakerRegistry::new(fast_config());
        let a = registry.get("scp", 104);
        let b = registry.get("scp", 104);
        a.record_failure();
        a.record_failure();
        assert_eq!(b.state(), BreakerState::Open);
    }
}
