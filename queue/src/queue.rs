//! The queue itself (§4.7): admission control, a priority/FIFO scheduler
//! of `max_concurrent_transfers` workers, the start/pause/resume/drain/stop
//! lifecycle, and the connectivity hooks that wake it back up.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use dicom_reliability::{default_retryable_categories, BackoffStrategy, ErrorCategory};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::error::{self, Result};
use crate::item::{ItemStatus, Priority, QueuedStoreItem};
use crate::store::Store;

/// Current run state of the queue as a whole, distinct from any one
/// item's status (§4.7 Lifecycle).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Stopped,
    Running,
    Paused,
    Draining,
}

/// Tunables named in spec.md §6, with the defaults listed there.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// 0 disables the item-count limit.
    pub max_queue_items: u64,
    /// 0 disables the byte-size limit.
    pub max_queue_size_bytes: u64,
    pub max_retry_attempts: u32,
    pub completed_retention_duration: Duration,
    pub max_concurrent_transfers: usize,
    pub priority_ordering: bool,
    pub auto_retry_on_connectivity_restored: bool,
    pub connectivity_restored_delay: Duration,
    pub auto_remove_completed: bool,
    pub backoff: BackoffStrategy,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        QueueConfig {
            max_queue_items: 0,
            max_queue_size_bytes: 0,
            max_retry_attempts: 10,
            completed_retention_duration: Duration::from_secs(3600),
            max_concurrent_transfers: 1,
            priority_ordering: true,
            auto_retry_on_connectivity_restored: true,
            connectivity_restored_delay: Duration::from_secs(5),
            auto_remove_completed: true,
            backoff: BackoffStrategy::Exponential { factor: 2.0 },
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

/// The outcome of one delivery attempt, classified into the same
/// [`ErrorCategory`] taxonomy the reliability envelope uses, so retryability
/// is decided consistently across the crate boundary.
#[derive(Debug, Clone)]
pub struct DeliveryFailure {
    pub category: ErrorCategory,
    pub message: String,
}

/// Delivers one queued item. Implemented by the caller, typically a thin
/// wrapper around a pooled association's C-STORE (§4.7 "worker ...
/// attempts delivery").
pub trait Deliverer: Send + Sync {
    async fn deliver(&self, item: &QueuedStoreItem, blob: Vec<u8>) -> std::result::Result<(), DeliveryFailure>;
}

pub(crate) fn now_secs() -> u64 {
    std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0)
}

struct Shared<D: Deliverer> {
    store: Mutex<Store>,
    items: Mutex<BTreeMap<Uuid, QueuedStoreItem>>,
    /// Insertion order of live ids, for FIFO tie-breaking within a
    /// priority tier; entries are removed alongside their item.
    order: Mutex<Vec<Uuid>>,
    total_bytes: AtomicU64,
    config: QueueConfig,
    run_state: Mutex<RunState>,
    notify: Notify,
    connectivity_lost: AtomicBool,
    deliverer: D,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

/// A durable, crash-resumable queue of C-STORE intents. Cloning shares the
/// same backing state; the clone is cheap (an `Arc` bump) so workers,
/// lifecycle callers, and connectivity monitors can each hold one.
pub struct Queue<D: Deliverer + 'static> {
    shared: Arc<Shared<D>>,
}

impl<D: Deliverer + 'static> Clone for Queue<D> {
    fn clone(&self) -> Self {
        Queue { shared: self.shared.clone() }
    }
}

impl<D: Deliverer + 'static> Queue<D> {
    /// Opens (or creates) the queue rooted at `root`, replaying its
    /// journal to reconstruct in-memory state (§4.7 On-disk layout).
    pub fn open(root: impl Into<std::path::PathBuf>, config: QueueConfig, deliverer: D) -> Result<Self> {
        let store = Store::open(root)?;
        let items = store.replay()?;
        let order: Vec<Uuid> = items.keys().copied().collect();
        let total_bytes = items.values().map(|i| i.file_size).sum();

        Ok(Queue {
            shared: Arc::new(Shared {
                store: Mutex::new(store),
                items: Mutex::new(items),
                order: Mutex::new(order),
                total_bytes: AtomicU64::new(total_bytes),
                config,
                run_state: Mutex::new(RunState::Stopped),
                notify: Notify::new(),
                connectivity_lost: AtomicBool::new(false),
                deliverer,
                workers: Mutex::new(Vec::new()),
            }),
        })
    }

    pub fn run_state(&self) -> RunState {
        *self.shared.run_state.lock().unwrap()
    }

    /// Current `(item_count, total_bytes)` across every tracked item,
    /// including ones not yet eligible for delivery.
    pub fn usage(&self) -> (u64, u64) {
        let count = self.shared.items.lock().unwrap().len() as u64;
        (count, self.shared.total_bytes.load(Ordering::Relaxed))
    }

    pub fn status_of(&self, id: Uuid) -> Option<QueuedStoreItem> {
        self.shared.items.lock().unwrap().get(&id).cloned()
    }

    pub fn list(&self) -> Vec<QueuedStoreItem> {
        self.shared.items.lock().unwrap().values().cloned().collect()
    }

    /// Admits a new item if the queue isn't full or draining (§4.7
    /// Admission control), persists it, and wakes a worker.
    pub fn enqueue(&self, item: QueuedStoreItem, blob: Vec<u8>) -> Result<Uuid> {
        if *self.shared.run_state.lock().unwrap() == RunState::Draining {
            return error::DrainingSnafu.fail();
        }

        let config = &self.shared.config;
        if config.max_queue_items > 0 {
            let current = self.shared.items.lock().unwrap().len() as u64;
            if current >= config.max_queue_items {
                return error::QueueFullSnafu { current, limit: config.max_queue_items, unit: "items" }.fail();
            }
        }
        if config.max_queue_size_bytes > 0 {
            let current = self.shared.total_bytes.load(Ordering::Relaxed);
            if current + item.file_size >= config.max_queue_size_bytes {
                return error::QueueFullSnafu { current, limit: config.max_queue_size_bytes, unit: "bytes" }.fail();
            }
        }

        let id = item.id;
        self.shared.store.lock().unwrap().enqueue(&item, &blob, now_secs())?;
        self.shared.total_bytes.fetch_add(item.file_size, Ordering::Relaxed);
        self.shared.items.lock().unwrap().insert(id, item);
        self.shared.order.lock().unwrap().push(id);
        self.shared.notify.notify_waiters();
        Ok(id)
    }

    /// Cancels a still-pending item (§4.7 "Pending → Cancelled").
    pub fn cancel(&self, id: Uuid) -> Result<()> {
        self.transition(id, |item| {
            if item.status == ItemStatus::Pending {
                item.status = ItemStatus::Cancelled;
                Ok(())
            } else {
                error::NotFoundSnafu { id }.fail()
            }
        })
    }

    /// Manually retries a terminally failed item (§4.7 "Failed → Pending
    /// (on manual retry)"). `attempt_count` is left untouched so the
    /// caller can see how many automatic attempts preceded the manual one.
    pub fn retry(&self, id: Uuid) -> Result<()> {
        self.transition(id, |item| {
            if item.status == ItemStatus::Failed {
                item.status = ItemStatus::Pending;
                Ok(())
            } else {
                error::NotFoundSnafu { id }.fail()
            }
        })
    }

    fn transition(&self, id: Uuid, f: impl FnOnce(&mut QueuedStoreItem) -> Result<()>) -> Result<()> {
        let mut items = self.shared.items.lock().unwrap();
        let item = items.get_mut(&id).ok_or(()).map_err(|_| error::NotFoundSnafu { id }.build())?;
        f(&mut *item)?;
        let snapshot = item.clone();
        drop(items);
        self.shared.store.lock().unwrap().update_status(&snapshot, now_secs())?;
        self.shared.notify.notify_waiters();
        Ok(())
    }

    /// Starts `max_concurrent_transfers` worker tasks (§4.7 Lifecycle
    /// `start`). A no-op if already running.
    pub fn start(&self) {
        let mut state = self.shared.run_state.lock().unwrap();
        if *state == RunState::Running {
            return;
        }
        *state = RunState::Running;
        drop(state);

        let mut workers = self.shared.workers.lock().unwrap();
        if !workers.is_empty() {
            return;
        }
        for _ in 0..self.shared.config.max_concurrent_transfers.max(1) {
            let queue = self.clone();
            workers.push(tokio::spawn(async move { queue.worker_loop().await }));
        }
    }

    pub fn pause(&self) {
        let mut state = self.shared.run_state.lock().unwrap();
        if *state == RunState::Running {
            *state = RunState::Paused;
        }
    }

    pub fn resume(&self) {
        let mut state = self.shared.run_state.lock().unwrap();
        if *state == RunState::Paused {
            *state = RunState::Running;
        }
        drop(state);
        self.shared.notify.notify_waiters();
    }

    /// Stops admitting new enqueues; running workers drain the remaining
    /// eligible items (§4.7 Lifecycle `drain`).
    pub fn drain(&self) {
        let mut state = self.shared.run_state.lock().unwrap();
        if *state == RunState::Running {
            *state = RunState::Draining;
        }
    }

    /// Forces a clean halt: stops admitting work and aborts every worker
    /// task (§4.7 Lifecycle `stop`).
    pub fn stop(&self) {
        *self.shared.run_state.lock().unwrap() = RunState::Stopped;
        self.shared.notify.notify_waiters();
        for handle in self.shared.workers.lock().unwrap().drain(..) {
            handle.abort();
        }
    }

    /// Idempotent signal that the network path to every endpoint is down
    /// (§4.7 Connectivity hooks). Workers keep running; delivery attempts
    /// will simply keep failing (and backing off) until restoration.
    pub fn notify_connectivity_lost(&self) {
        self.shared.connectivity_lost.store(true, Ordering::SeqCst);
    }

    /// Idempotent signal that connectivity returned. Wakes the scheduler
    /// after `connectivity_restored_delay` if
    /// `auto_retry_on_connectivity_restored` is set.
    pub fn notify_connectivity_restored(&self) {
        let was_lost = self.shared.connectivity_lost.swap(false, Ordering::SeqCst);
        if !was_lost || !self.shared.config.auto_retry_on_connectivity_restored {
            return;
        }
        let delay = self.shared.config.connectivity_restored_delay;
        let queue = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            queue.shared.notify.notify_waiters();
        });
    }

    /// Removes every `Completed` item older than
    /// `completed_retention_duration`, if `auto_remove_completed` is set
    /// (§4.7 Retention). `now` is injected so callers (and tests) don't
    /// depend on wall-clock timing.
    pub fn sweep_retention(&self, now: u64) -> Result<usize> {
        if !self.shared.config.auto_remove_completed {
            return Ok(0);
        }
        let retention_secs = self.shared.config.completed_retention_duration.as_secs();
        let expired: Vec<Uuid> = self
            .shared
            .items
            .lock()
            .unwrap()
            .values()
            .filter(|item| {
                item.status == ItemStatus::Completed
                    && item.completed_at.map(|t| now.saturating_sub(t) >= retention_secs).unwrap_or(false)
            })
            .map(|item| item.id)
            .collect();

        for id in &expired {
            self.shared.items.lock().unwrap().remove(id);
            self.shared.order.lock().unwrap().retain(|x| x != id);
            self.shared.store.lock().unwrap().remove(*id, now)?;
        }
        Ok(expired.len())
    }

    /// Picks the next eligible item per §4.7 Scheduler ordering: when
    /// `priority_ordering` is set, high before medium before low, FIFO
    /// within a tier; otherwise plain FIFO. Marks it `Sending` and
    /// persists that before returning, so two workers never race onto the
    /// same item.
    fn claim_next(&self) -> Option<(QueuedStoreItem, Vec<u8>)> {
        let tiers: &[Priority] =
            if self.shared.config.priority_ordering { &[Priority::High, Priority::Medium, Priority::Low] } else { &[] };

        let mut items = self.shared.items.lock().unwrap();
        let order = self.shared.order.lock().unwrap();
        let max_retry = self.shared.config.max_retry_attempts;

        let chosen_id = if tiers.is_empty() {
            order.iter().find(|id| items.get(id).map(|i| i.is_eligible(max_retry)).unwrap_or(false)).copied()
        } else {
            tiers.iter().find_map(|tier| {
                order
                    .iter()
                    .find(|id| items.get(id).map(|i| i.priority == *tier && i.is_eligible(max_retry)).unwrap_or(false))
                    .copied()
            })
        };
        drop(order);

        let id = chosen_id?;
        let item = items.get_mut(&id).expect("chosen_id came from items");
        item.status = ItemStatus::Sending;
        let snapshot = item.clone();
        drop(items);

        if let Err(e) = self.shared.store.lock().unwrap().update_status(&snapshot, now_secs()) {
            tracing::warn!(id = %id, error = %e, "failed to persist Sending status, item stays in memory as Sending");
        }
        let blob = self.shared.store.lock().unwrap().read_blob(id).ok()?;
        Some((snapshot, blob))
    }

    async fn worker_loop(self) {
        loop {
            match *self.shared.run_state.lock().unwrap() {
                RunState::Stopped => return,
                RunState::Paused => {
                    // `resume()`'s `notify_waiters()` stores no permit, so a
                    // wakeup landing between the read of `Paused` above and
                    // the `notified()` registration below would otherwise be
                    // lost; the bounded sleep re-checks `run_state` instead
                    // of parking indefinitely on a single notification.
                    tokio::select! {
                        _ = self.shared.notify.notified() => {}
                        _ = tokio::time::sleep(Duration::from_millis(250)) => {}
                    }
                    continue;
                }
                RunState::Running | RunState::Draining => {}
            }

            let Some((item, blob)) = self.claim_next() else {
                tokio::select! {
                    _ = self.shared.notify.notified() => {}
                    _ = tokio::time::sleep(Duration::from_millis(250)) => {}
                }
                continue;
            };

            let outcome = self.shared.deliverer.deliver(&item, blob).await;
            self.apply_outcome(item, outcome);
        }
    }

    fn apply_outcome(&self, mut item: QueuedStoreItem, outcome: std::result::Result<(), DeliveryFailure>) {
        let now = now_secs();
        item.last_attempt_at = Some(now);

        match outcome {
            Ok(()) => {
                item.status = ItemStatus::Completed;
                item.completed_at = Some(now);
                item.last_error = None;
            }
            Err(failure) => {
                item.attempt_count += 1;
                item.last_error = Some(failure.message);
                let retryable = default_retryable_categories().contains(&failure.category);
                if retryable && item.attempt_count < self.shared.config.max_retry_attempts {
                    // Stays `Sending` for the backoff window; a crash here
                    // is indistinguishable from a crash mid-transfer and
                    // the usual replay rule (Sending -> Pending) applies.
                    let delay = self.shared.config.backoff.delay(
                        item.attempt_count - 1,
                        self.shared.config.initial_delay,
                        self.shared.config.max_delay,
                    );
                    let queue = self.clone();
                    let retry_item = item.clone();
                    tokio::spawn(async move {
                        tokio::time::sleep(delay).await;
                        queue.release_for_retry(retry_item);
                    });
                    self.persist_quiet(&item);
                    return;
                }
                item.status = ItemStatus::Failed;
            }
        }

        self.persist_quiet(&item);
        let mut items = self.shared.items.lock().unwrap();
        if let Some(slot) = items.get_mut(&item.id) {
            *slot = item;
        }
        drop(items);
        self.shared.notify.notify_waiters();
    }

    fn release_for_retry(&self, mut item: QueuedStoreItem) {
        item.status = ItemStatus::Pending;
        self.persist_quiet(&item);
        let mut items = self.shared.items.lock().unwrap();
        if let Some(slot) = items.get_mut(&item.id) {
            *slot = item;
        }
        drop(items);
        self.shared.notify.notify_waiters();
    }

    fn persist_quiet(&self, item: &QueuedStoreItem) {
        if let Err(e) = self.shared.store.lock().unwrap().update_status(item, now_secs()) {
            tracing::warn!(id = %item.id, error = %e, "failed to persist status change");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone)]
    struct AlwaysSucceeds;

    impl Deliverer for AlwaysSucceeds {
        async fn deliver(&self, _item: &QueuedStoreItem, _blob: Vec<u8>) -> std::result::Result<(), DeliveryFailure> {
            Ok(())
        }
    }

    #[derive(Clone)]
    struct AlwaysFailsTransient;

    impl Deliverer for AlwaysFailsTransient {
        async fn deliver(&self, _item: &QueuedStoreItem, _blob: Vec<u8>) -> std::result::Result<(), DeliveryFailure> {
            Err(DeliveryFailure { category: ErrorCategory::Transient, message: "connection reset".into() })
        }
    }

    #[derive(Clone)]
    struct AlwaysFailsPermanent;

    impl Deliverer for AlwaysFailsPermanent {
        async fn deliver(&self, _item: &QueuedStoreItem, _blob: Vec<u8>) -> std::result::Result<(), DeliveryFailure> {
            Err(DeliveryFailure { category: ErrorCategory::Permanent, message: "sop class not supported".into() })
        }
    }

    fn sample(priority: Priority) -> QueuedStoreItem {
        QueuedStoreItem::new("c", "i", "t", "h", 104, "a", "b", priority, 3)
    }

    #[test]
    fn admission_rejects_over_item_limit() {
        let dir = tempfile::tempdir().unwrap();
        let config = QueueConfig { max_queue_items: 1, ..Default::default() };
        let queue = Queue::open(dir.path(), config, AlwaysSucceeds).unwrap();
        queue.enqueue(sample(Priority::Medium), vec![1]).unwrap();
        let err = queue.enqueue(sample(Priority::Medium), vec![2]).unwrap_err();
        assert!(matches!(err, crate::error::Error::QueueFull { .. }));
    }

    #[test]
    fn admission_rejects_over_byte_limit() {
        let dir = tempfile::tempdir().unwrap();
        let config = QueueConfig { max_queue_size_bytes: 5, ..Default::default() };
        let queue = Queue::open(dir.path(), config, AlwaysSucceeds).unwrap();
        let mut first = sample(Priority::Medium);
        first.file_size = 4;
        queue.enqueue(first, vec![0; 4]).unwrap();
        let mut second = sample(Priority::Medium);
        second.file_size = 4;
        let err = queue.enqueue(second, vec![0; 4]).unwrap_err();
        assert!(matches!(err, crate::error::Error::QueueFull { .. }));
    }

    #[test]
    fn draining_rejects_new_enqueues() {
        let dir = tempfile::tempdir().unwrap();
        let queue = Queue::open(dir.path(), QueueConfig::default(), AlwaysSucceeds).unwrap();
        *queue.shared.run_state.lock().unwrap() = RunState::Draining;
        let err = queue.enqueue(sample(Priority::Medium), vec![1]).unwrap_err();
        assert!(matches!(err, crate::error::Error::Draining));
    }

    #[test]
    fn cancel_moves_pending_to_cancelled() {
        let dir = tempfile::tempdir().unwrap();
        let queue = Queue::open(dir.path(), QueueConfig::default(), AlwaysSucceeds).unwrap();
        let id = queue.enqueue(sample(Priority::Low), vec![1]).unwrap();
        queue.cancel(id).unwrap();
        assert_eq!(queue.status_of(id).unwrap().status, ItemStatus::Cancelled);
    }

    #[test]
    fn claim_next_prefers_high_priority_regardless_of_enqueue_order() {
        let dir = tempfile::tempdir().unwrap();
        let queue = Queue::open(dir.path(), QueueConfig::default(), AlwaysSucceeds).unwrap();
        let low = queue.enqueue(sample(Priority::Low), vec![1]).unwrap();
        let high = queue.enqueue(sample(Priority::High), vec![2]).unwrap();

        let (claimed, _) = queue.claim_next().unwrap();
        assert_eq!(claimed.id, high);
        assert_eq!(queue.status_of(low).unwrap().status, ItemStatus::Pending);
    }

    #[test]
    fn claim_next_is_fifo_within_a_tier() {
        let dir = tempfile::tempdir().unwrap();
        let queue = Queue::open(dir.path(), QueueConfig::default(), AlwaysSucceeds).unwrap();
        let first = queue.enqueue(sample(Priority::Medium), vec![1]).unwrap();
        let _second = queue.enqueue(sample(Priority::Medium), vec![2]).unwrap();

        let (claimed, _) = queue.claim_next().unwrap();
        assert_eq!(claimed.id, first);
    }

    #[test]
    fn plain_fifo_ignores_priority_when_disabled() {
        let dir = tempfile::tempdir().unwrap();
        let config = QueueConfig { priority_ordering: false, ..Default::default() };
        let queue = Queue::open(dir.path(), config, AlwaysSucceeds).unwrap();
        let first = queue.enqueue(sample(Priority::Low), vec![1]).unwrap();
        let _second = queue.enqueue(sample(Priority::High), vec![2]).unwrap();

        let (claimed, _) = queue.claim_next().unwrap();
        assert_eq!(claimed.id, first);
    }

    #[test]
    fn exhausted_attempts_are_not_eligible_for_claim() {
        let dir = tempfile::tempdir().unwrap();
        let config = QueueConfig { max_retry_attempts: 1, ..Default::default() };
        let queue = Queue::open(dir.path(), config, AlwaysSucceeds).unwrap();
        let id = queue.enqueue(sample(Priority::Medium), vec![1]).unwrap();
        {
            let mut items = queue.shared.items.lock().unwrap();
            items.get_mut(&id).unwrap().attempt_count = 1;
        }
        assert!(queue.claim_next().is_none());
    }

    #[tokio::test]
    async fn successful_delivery_marks_item_completed() {
        let dir = tempfile::tempdir().unwrap();
        let queue = Queue::open(dir.path(), QueueConfig::default(), AlwaysSucceeds).unwrap();
        let id = queue.enqueue(sample(Priority::Medium), vec![1]).unwrap();
        let (item, blob) = queue.claim_next().unwrap();
        let outcome = queue.shared.deliverer.deliver(&item, blob).await;
        queue.apply_outcome(item, outcome);

        let reloaded = queue.status_of(id).unwrap();
        assert_eq!(reloaded.status, ItemStatus::Completed);
        assert!(reloaded.completed_at.is_some());
    }

    #[tokio::test]
    async fn permanent_failure_lands_in_failed_without_retry() {
        let dir = tempfile::tempdir().unwrap();
        let queue = Queue::open(dir.path(), QueueConfig::default(), AlwaysFailsPermanent).unwrap();
        let id = queue.enqueue(sample(Priority::Medium), vec![1]).unwrap();
        let (item, blob) = queue.claim_next().unwrap();
        let outcome = queue.shared.deliverer.deliver(&item, blob).await;
        queue.apply_outcome(item, outcome);

        let reloaded = queue.status_of(id).unwrap();
        assert_eq!(reloaded.status, ItemStatus::Failed);
        assert_eq!(reloaded.attempt_count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failure_schedules_a_retry_back_to_pending() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = QueueConfig::default();
        config.initial_delay = Duration::from_millis(10);
        config.backoff = BackoffStrategy::Fixed;
        let queue = Queue::open(dir.path(), config, AlwaysFailsTransient).unwrap();
        let id = queue.enqueue(sample(Priority::Medium), vec![1]).unwrap();
        let (item, blob) = queue.claim_next().unwrap();
        let outcome = queue.shared.deliverer.deliver(&item, blob).await;
        queue.apply_outcome(item, outcome);

        assert_eq!(queue.status_of(id).unwrap().status, ItemStatus::Sending);

        tokio::time::sleep(Duration::from_millis(50)).await;
        let reloaded = queue.status_of(id).unwrap();
        assert_eq!(reloaded.status, ItemStatus::Pending);
        assert_eq!(reloaded.attempt_count, 1);
    }

    #[test]
    fn retention_sweep_removes_old_completed_items_only() {
        let dir = tempfile::tempdir().unwrap();
        let queue = Queue::open(dir.path(), QueueConfig::default(), AlwaysSucceeds).unwrap();
        let id = queue.enqueue(sample(Priority::Medium), vec![1]).unwrap();
        {
            let mut items = queue.shared.items.lock().unwrap();
            let item = items.get_mut(&id).unwrap();
            item.status = ItemStatus::Completed;
            item.completed_at = Some(1_000);
        }

        assert_eq!(queue.sweep_retention(1_000 + 3600 - 1).unwrap(), 0);
        assert_eq!(queue.sweep_retention(1_000 + 3600).unwrap(), 1);
        assert!(queue.status_of(id).is_none());
    }

    #[test]
    fn connectivity_restored_is_idempotent_when_not_previously_lost() {
        let dir = tempfile::tempdir().unwrap();
        let queue = Queue::open(dir.path(), QueueConfig::default(), AlwaysSucceeds).unwrap();
        queue.notify_connectivity_restored();
        queue.notify_connectivity_restored();
    }
}
