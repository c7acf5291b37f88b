//! Reliability envelope (§4.6) wrapping an association in retry, circuit
//! breaking, and connection pooling.
//!
//! - [`error`] classifies failures into the shared taxonomy.
//! - [`retry`] replays a fallible operation per a backoff policy.
//! - [`circuit_breaker`] fails fast against endpoints in persistent trouble.
//! - [`pool`] bounds and reuses live associations per endpoint.
//! - [`envelope`] composes retry and the breaker into one call surface.

pub mod circuit_breaker;
pub mod envelope;
pub mod error;
pub mod pool;
pub mod retry;

pub use circuit_breaker::{BreakerConfig, BreakerRegistry, BreakerState, CircuitBreaker};
pub use envelope::{GuardedError, ReliabilityEnvelope};
pub use error::{default_retryable_categories, classify, is_retryable, ErrorCategory, ResourceError, RetryError};
pub use pool::{Manager, Object, Pool, PoolConfig, PoolStats};
pub use retry::{retry as retry_with_policy, BackoffStrategy, CancellationToken, RetryPolicy};
