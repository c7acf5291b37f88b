//! Connection pool (§4.6.4): per-endpoint pool of live associations bounded
//! by `max_connections`, with LRU reuse, idle eviction, and optional
//! acquire-time health checks.
//!
//! Shaped after the generic object-pool pattern used for DICOM association
//! pooling elsewhere in the ecosystem: a `Manager` trait creates and
//! recycles objects, a `Pool<M>` hands out RAII `Object<M>` guards that
//! return themselves to the pool on drop.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::time::Instant;

use crate::error::ResourceError;

/// Creates and validates pooled objects on the pool's behalf.
pub trait Manager: Send + Sync {
    type Object: Send;
    type Error: Send;

    async fn create(&self) -> Result<Self::Object, Self::Error>;

    /// Validates a pooled object before reuse, e.g. a C-ECHO probe over an
    /// idle association (§4.6.4, "if `validate_on_acquire`, perform a
    /// C-ECHO before handing out").
    async fn validate(&self, object: &Self::Object) -> bool;
}

#[derive(Debug, Clone, Copy)]
pub struct PoolConfig {
    pub max_connections: usize,
    pub min_connections: usize,
    pub acquire_timeout: Duration,
    pub idle_timeout: Duration,
    pub validate_on_acquire: bool,
    pub health_check_interval: Option<Duration>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        PoolConfig {
            max_connections: 4,
            min_connections: 0,
            acquire_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(300),
            validate_on_acquire: false,
            health_check_interval: None,
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PoolStats {
    pub created: u64,
    pub closed: u64,
    pub acquired: u64,
    pub timed_out: u64,
}

struct Slot<T> {
    object: T,
    idle_since: Instant,
}

struct Counters {
    created: AtomicU64,
    closed: AtomicU64,
    acquired: AtomicU64,
    timed_out: AtomicU64,
}

impl Counters {
    fn new() -> Self {
        Counters {
            created: AtomicU64::new(0),
            closed: AtomicU64::new(0),
            acquired: AtomicU64::new(0),
            timed_out: AtomicU64::new(0),
        }
    }
}

struct Shared<M: Manager> {
    manager: M,
    config: PoolConfig,
    idle: Mutex<VecDeque<Slot<M::Object>>>,
    semaphore: Semaphore,
    counters: Counters,
    in_use: AtomicU64,
}

/// A bounded pool of `M::Object`s for one endpoint.
pub struct Pool<M: Manager> {
    shared: Arc<Shared<M>>,
}

impl<M: Manager> Clone for Pool<M> {
    fn clone(&self) -> Self {
        Pool { shared: self.shared.clone() }
    }
}

impl<M: Manager> Pool<M> {
    pub fn new(manager: M, config: PoolConfig) -> Self {
        Pool {
            shared: Arc::new(Shared {
                manager,
                semaphore: Semaphore::new(config.max_connections),
                config,
                idle: Mutex::new(VecDeque::new()),
                counters: Counters::new(),
                in_use: AtomicU64::new(0),
            }),
        }
    }

    /// Borrows an object from the pool (§4.6.4 `acquire`): reuses the most
    /// recently idle slot, creates a new one while under `max_connections`,
    /// or blocks up to `acquire_timeout` for one to free up.
    pub async fn acquire(&self) -> Result<Object<M>, ResourceError> {
        let permit = tokio::time::timeout(self.shared.config.acquire_timeout, self.shared.semaphore.acquire())
            .await
            .map_err(|_| {
                self.shared.counters.timed_out.fetch_add(1, Ordering::Relaxed);
                ResourceError::AcquireTimeout { waited_ms: self.shared.config.acquire_timeout.as_millis() as u64 }
            })?
            .expect("semaphore is never closed");
        permit.forget();

        loop {
            let candidate = self.shared.idle.lock().unwrap().pop_back();
            let object = match candidate {
                Some(slot) => {
                    if self.shared.config.validate_on_acquire && !self.shared.manager.validate(&slot.object).await {
                        self.shared.counters.closed.fetch_add(1, Ordering::Relaxed);
                        continue;
                    }
                    slot.object
                }
                None => {
                    let object = self.shared.manager.create().await.map_err(|_| ResourceError::PoolExhausted {
                        in_use: self.shared.in_use.load(Ordering::Relaxed) as usize,
                        max_connections: self.shared.config.max_connections,
                    })?;
                    self.shared.counters.created.fetch_add(1, Ordering::Relaxed);
                    object
                }
            };

            self.shared.counters.acquired.fetch_add(1, Ordering::Relaxed);
            self.shared.in_use.fetch_add(1, Ordering::Relaxed);
            return Ok(Object { pool: Arc::downgrade(&self.shared), object: Some(object), healthy: true });
        }
    }

    /// Evicts idle connections older than `idle_timeout` (§4.6.4
    /// background maintenance). Intended to be driven by a periodic task.
    pub fn evict_idle(&self) {
        let now = Instant::now();
        let mut idle = self.shared.idle.lock().unwrap();
        let before = idle.len();
        idle.retain(|slot| now.duration_since(slot.idle_since) <= self.shared.config.idle_timeout);
        let evicted = before - idle.len();
        if evicted > 0 {
            // Idle slots hold no semaphore permit (that permit was already
            // returned when the object was dropped into `idle`); evicting
            // them must only drop the slots, not mint fresh permits.
            self.shared.counters.closed.fetch_add(evicted as u64, Ordering::Relaxed);
        }
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            created: self.shared.counters.created.load(Ordering::Relaxed),
            closed: self.shared.counters.closed.load(Ordering::Relaxed),
            acquired: self.shared.counters.acquired.load(Ordering::Relaxed),
            timed_out: self.shared.counters.timed_out.load(Ordering::Relaxed),
        }
    }

    /// Current `{total, available, in_use}`; always satisfies
    /// `total == available + in_use` (§4.6.4).
    pub fn usage(&self) -> (usize, usize, usize) {
        let available = self.shared.idle.lock().unwrap().len();
        let in_use = self.shared.in_use.load(Ordering::Relaxed) as usize;
        (available + in_use, available, in_use)
    }
}

/// A borrowed pooled object. Returns to the pool on drop if marked
/// healthy, otherwise is discarded (§4.6.4 `release`).
pub struct Object<M: Manager> {
    pool: std::sync::Weak<Shared<M>>,
    object: Option<M::Object>,
    healthy: bool,
}

impl<M: Manager> Object<M> {
    /// Marks this object unhealthy; it will be destroyed rather than
    /// returned to the pool when dropped.
    pub fn mark_unhealthy(&mut self) {
        self.healthy = false;
    }
}

impl<M: Manager> std::ops::Deref for Object<M> {
    type Target = M::Object;

    fn deref(&self) -> &Self::Target {
        self.object.as_ref().expect("object taken only on drop")
    }
}

impl<M: Manager> std::ops::DerefMut for Object<M> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.object.as_mut().expect("object taken only on drop")
    }
}

impl<M: Manager> Drop for Object<M> {
    fn drop(&mut self) {
        if let Some(shared) = self.pool.upgrade() {
            shared.in_use.fetch_sub(1, Ordering::Relaxed);
            if let Some(object) = self.object.take() {
                if self.healthy {
                    shared.idle.lock().unwrap().push_back(Slot { object, idle_since: Instant::now() });
                    shared.semaphore.add_permits(1);
                } else {
                    shared.counters.closed.fetch_add(1, Ordering::Relaxed);
                    shared.semaphore.add_permits(1);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    struct CountingManager {
        created: AtomicUsize,
    }

    impl Manager for CountingManager {
        type Object = usize;
        type Error = ();

        async fn create(&self) -> Result<usize, ()> {
            Ok(self.created.fetch_add(1, Ordering::SeqCst))
        }

        async fn validate(&self, _object: &usize) -> bool {
            true
        }
    }

    #[tokio::test]
    async fn acquire_creates_up_to_max_connections() {
        let manager = CountingManager { created: AtomicUsize::new(0) };
        let pool = Pool::new(manager, PoolConfig { max_connections: 2, ..Default::default() });

        let a = pool.acquire().await.unwrap();
        let b = pool.acquire().await.unwrap();
        let (total, available, in_use) = pool.usage();
        assert_eq!((total, available, in_use), (2, 0, 2));
        drop(a);
        drop(b);
    }

    #[tokio::test]
    async fn released_connection_is_reused() {
        let manager = CountingManager { created: AtomicUsize::new(0) };
        let pool = Pool::new(manager, PoolConfig { max_connections: 1, ..Default::default() });

        let first = pool.acquire().await.unwrap();
        let value = *first;
        drop(first);

        let second = pool.acquire().await.unwrap();
        assert_eq!(*second, value);
        assert_eq!(pool.stats().created, 1);
    }

    #[tokio::test]
    async fn acquire_times_out_when_exhausted() {
        let manager = CountingManager { created: AtomicUsize::new(0) };
        let pool = Pool::new(
            manager,
            PoolConfig { max_connections: 1, acquire_timeout: Duration::from_millis(20), ..Default::default() },
        );
        let _held = pool.acquire().await.unwrap();

        let err = pool.acquire().await.unwrap_err();
        assert!(matches!(err, ResourceError::AcquireTimeout { .. }));
        assert_eq!(pool.stats().timed_out, 1);
    }

    #[tokio::test]
    async fn unhealthy_object_is_not_returned_to_pool() {
        let manager = CountingManager { created: AtomicUsize::new(0) };
        let pool = Pool::new(manager, PoolConfig { max_connections: 1, ..Default::default() });

        let mut obj = pool.acquire().await.unwrap();
        obj.mark_unhealthy();
        drop(obj);

        let _next = pool.acquire().await.unwrap();
        assert_eq!(pool.stats().created, 2);
    }

    #[test]
    fn usage_invariant_holds_when_idle() {
        let manager = CountingManager { created: AtomicUsize::new(0) };
        let pool = Pool::new(manager, PoolConfig::default());
        let (total, available, in_use) = pool.usage();
        assert_eq!(total, available + in_use);
    }
}
