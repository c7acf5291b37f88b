//! Retry executor (§4.6.2): replays a fallible async operation according
//! to a backoff policy, stopping on success, on a non-retryable error, on
//! policy exhaustion, or on cancellation.

use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio::sync::watch;

use crate::error::{default_retryable_categories, ErrorCategory, RetriesExhausted, RetryError};

/// A backoff strategy, evaluated per attempt (§4.6.2's table). `n` is the
/// zero-based attempt index of the *retry* being scheduled (the delay
/// before attempt 2 is computed with `n = 0`).
#[derive(Debug, Clone, Copy)]
pub enum BackoffStrategy {
    Fixed,
    Exponential { factor: f64 },
    ExponentialWithJitter { factor: f64, jitter_ratio: f64 },
    Linear { increment: f64 },
}

impl BackoffStrategy {
    /// Computes the delay before the `n`-th retry (zero-based), clamped to
    /// `max_delay`. Exposed so other crates scheduling their own retries
    /// (e.g. the queue's requeue-with-backoff) can reuse the same formula.
    pub fn delay(&self, n: u32, initial_delay: Duration, max_delay: Duration) -> Duration {
        let d0 = initial_delay.as_secs_f64();
        let raw = match *self {
            BackoffStrategy::Fixed => d0,
            BackoffStrategy::Exponential { factor } => d0 * factor.powi(n as i32),
            BackoffStrategy::ExponentialWithJitter { factor, jitter_ratio } => {
                let base = d0 * factor.powi(n as i32);
                let jitter = rand::thread_rng().gen_range(-jitter_ratio..=jitter_ratio);
                base * (1.0 + jitter)
            }
            BackoffStrategy::Linear { increment } => d0 * (1.0 + n as f64 * increment),
        };
        Duration::from_secs_f64(raw.max(0.0)).min(max_delay)
    }
}

/// Retry policy (§4.6.2). `max_total_time` is a ceiling on elapsed wall
/// time; a scheduled delay that would cross it aborts the retry loop
/// instead of waiting.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub max_total_time: Option<Duration>,
    pub strategy: BackoffStrategy,
    pub retryable_categories: HashSet<ErrorCategory>,
    pub use_circuit_breaker: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_total_time: None,
            strategy: BackoffStrategy::Exponential { factor: 2.0 },
            retryable_categories: default_retryable_categories(),
            use_circuit_breaker: true,
        }
    }
}

/// A cooperative cancellation signal. Cloning shares the same underlying
/// flag; `cancel()` can be called from any clone.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    tx: watch::Sender<bool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        CancellationToken { tx }
    }

    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs `op` under `policy`, retrying on retryable failures until success,
/// exhaustion, or cancellation (§4.6.2). `classify` maps the operation's
/// error type to an [`ErrorCategory`].
pub async fn retry<T, E, Op, Fut>(
    policy: &RetryPolicy,
    cancellation: &CancellationToken,
    mut classify: impl FnMut(&E) -> ErrorCategory,
    mut op: Op,
) -> Result<T, RetryError<E>>
where
    Op: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let started = tokio::time::Instant::now();
    let mut attempts_made: Vec<E> = Vec::new();

    for attempt in 1..=policy.max_attempts {
        if cancellation.is_cancelled() {
            return Err(RetryError::Cancelled);
        }

        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                let category = classify(&err);
                let retryable = policy.retryable_categories.contains(&category);
                attempts_made.push(err);

                if !retryable || attempt >= policy.max_attempts {
                    return Err(RetryError::Exhausted(RetriesExhausted { attempts: attempts_made }));
                }

                let delay = policy.strategy.delay(attempt - 1, policy.initial_delay, policy.max_delay);
                if let Some(max_total) = policy.max_total_time {
                    if started.elapsed() + delay > max_total {
                        return Err(RetryError::Exhausted(RetriesExhausted { attempts: attempts_made }));
                    }
                }

                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = wait_for_cancel(cancellation) => {
                        return Err(RetryError::Cancelled);
                    }
                }
            }
        }
    }

    Err(RetryError::Exhausted(RetriesExhausted { attempts: attempts_made }))
}

async fn wait_for_cancel(token: &CancellationToken) {
    let mut rx = token.tx.subscribe();
    loop {
        if *rx.borrow() {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn always_transient(_: &&'static str) -> ErrorCategory {
        ErrorCategory::Transient
    }

    #[tokio::test]
    async fn succeeds_without_retry_on_first_attempt() {
        let policy = RetryPolicy::default();
        let token = CancellationToken::new();
        let calls = Arc::new(AtomicU32::new(0));
        let calls2 = calls.clone();

        let result: Result<u32, RetryError<&'static str>> = retry(
            &policy,
            &token,
            always_transient,
            move || {
                let calls = calls2.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(42)
                }
            },
        )
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_until_success_within_max_attempts() {
        let mut policy = RetryPolicy::default();
        policy.initial_delay = Duration::from_millis(10);
        policy.strategy = BackoffStrategy::Fixed;
        let token = CancellationToken::new();
        let calls = Arc::new(AtomicU32::new(0));
        let calls2 = calls.clone();

        let result: Result<u32, RetryError<&'static str>> = retry(
            &policy,
            &token,
            always_transient,
            move || {
                let calls = calls2.clone();
                async move {
                    let n = calls.fetch_add(1, Ordering::SeqCst);
                    if n < 2 {
                        Err("not yet")
                    } else {
                        Ok(7)
                    }
                }
            },
        )
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn exhaustion_surfaces_aggregate_error() {
        let mut policy = RetryPolicy::default();
        policy.max_attempts = 2;
        policy.initial_delay = Duration::from_millis(1);
        let token = CancellationToken::new();

        let result: Result<u32, RetryError<&'static str>> =
            retry(&policy, &token, always_transient, || async { Err("boom") }).await;

        match result {
            Err(RetryError::Exhausted(e)) => assert_eq!(e.attempts, vec!["boom", "boom"]),
            other => panic!("expected Exhausted, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn non_retryable_error_stops_immediately() {
        let policy = RetryPolicy::default();
        let token = CancellationToken::new();
        let calls = Arc::new(AtomicU32::new(0));
        let calls2 = calls.clone();

        let result: Result<u32, RetryError<&'static str>> = retry(
            &policy,
            &token,
            |_: &&'static str| ErrorCategory::Permanent,
            move || {
                let calls = calls2.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err("unrecoverable")
                }
            },
        )
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cancellation_short_circuits() {
        let policy = RetryPolicy::default();
        let token = CancellationToken::new();
        token.cancel();

        let result: Result<u32, RetryError<&'static str>> =
            retry(&policy, &token, always_transient, || async { Err("boom") }).await;

        assert!(matches!(result, Err(RetryError::Cancelled)));
    }
}
