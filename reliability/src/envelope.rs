//! Ties the retry executor to the circuit breaker (§4.6.2's
//! `use_circuit_breaker` policy flag): when enabled, every attempt first
//! consults the endpoint's breaker and counts a trip as a Resource-class
//! failure feeding the same retry loop.

use crate::circuit_breaker::BreakerRegistry;
use crate::error::ErrorCategory;
use crate::retry::{retry, CancellationToken, RetryPolicy};

/// Either the breaker refused the call, or the operation itself failed.
#[derive(Debug)]
pub enum GuardedError<E> {
    BreakerOpen(crate::error::ResourceError),
    Operation(E),
}

impl<E: std::fmt::Display> std::fmt::Display for GuardedError<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GuardedError::BreakerOpen(e) => write!(f, "{e}"),
            GuardedError::Operation(e) => write!(f, "{e}"),
        }
    }
}

/// Bundles a breaker registry with a retry policy so callers get one entry
/// point for "retry this operation against this endpoint, honoring its
/// circuit breaker."
pub struct ReliabilityEnvelope {
    pub breakers: BreakerRegistry,
}

impl ReliabilityEnvelope {
    pub fn new(breakers: BreakerRegistry) -> Self {
        ReliabilityEnvelope { breakers }
    }

    /// Runs `op` against `host:port` under `policy`. If
    /// `policy.use_circuit_breaker` is set, each attempt first checks the
    /// endpoint's breaker; a fail-fast refusal is treated as a retryable
    /// Resource failure like any other, so the same backoff schedule
    /// governs both kinds of setback.
    pub async fn call<T, E, Op, Fut>(
        &self,
        host: &str,
        port: u16,
        policy: &RetryPolicy,
        cancellation: &CancellationToken,
        mut classify: impl FnMut(&E) -> ErrorCategory,
        mut op: Op,
    ) -> Result<T, crate::error::RetryError<GuardedError<E>>>
    where
        Op: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
    {
        let breaker = policy.use_circuit_breaker.then(|| self.breakers.get(host, port));

        retry(
            policy,
            cancellation,
            |err: &GuardedError<E>| match err {
                GuardedError::BreakerOpen(_) => ErrorCategory::Resource,
                GuardedError::Operation(e) => classify(e),
            },
            move || {
                let breaker = breaker.clone();
                let fut = op();
                async move {
                    if let Some(breaker) = &breaker {
                        if let Err(e) = breaker.try_acquire() {
                            return Err(GuardedError::BreakerOpen(e));
                        }
                    }
                    match fut.await {
                        Ok(value) => {
                            if let Some(breaker) = &breaker {
                                breaker.record_success();
                            }
                            Ok(value)
                        }
                        Err(err) => {
                            if let Some(breaker) = &breaker {
                                breaker.record_failure();
                            }
                            Err(GuardedError::Operation(err))
                        }
                    }
                }
            },
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit_breaker::BreakerConfig;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn breaker_trip_is_retried_like_any_other_failure() {
        let envelope = ReliabilityEnvelope::new(BreakerRegistry::new(BreakerConfig {
            failure_threshold: 1,
            success_threshold: 1,
            reset_timeout: Duration::from_millis(5),
            failure_window: Duration::from_secs(60),
        }));
        let mut policy = RetryPolicy::default();
        policy.max_attempts = 4;
        policy.initial_delay = Duration::from_millis(10);
        let cancellation = CancellationToken::new();
        let calls = Arc::new(AtomicU32::new(0));
        let calls2 = calls.clone();

        let result: Result<u32, _> = envelope
            .call(
                "scp",
                104,
                &policy,
                &cancellation,
                |_: &&'static str| ErrorCategory::Transient,
                move || {
                    let calls = calls2.clone();
                    async move {
                        let n = calls.fetch_add(1, Ordering::SeqCst);
                        if n == 0 {
                            Err("first attempt fails and trips the breaker")
                        } else {
                            Ok(99)
                        }
                    }
                },
            )
            .await;

        assert_eq!(result.unwrap(), 99);
        assert!(calls.load(Ordering::SeqCst) >= 2);
    }
}
