//! The queued unit of work (§3 `Queued Store Item`): everything needed to
//! retry a C-STORE against an endpoint, plus the bookkeeping a crash-safe
//! queue needs to resume it.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Relative urgency used to order the scheduler's eligible set when
/// `priority_ordering` is enabled (§4.7 Scheduler).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Medium
    }
}

/// A status DAG position (§4.7 State invariants): Pending → Sending →
/// {Completed, Failed, Pending}; Pending → Cancelled; Failed → Pending on
/// manual retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Pending,
    Sending,
    Completed,
    Failed,
    Cancelled,
}

/// One durable C-STORE intent. Persisted as a JSON sidecar (`<id>.meta`)
/// next to its dataset bytes (`<id>.blob`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuedStoreItem {
    pub id: Uuid,
    pub sop_class_uid: String,
    pub sop_instance_uid: String,
    pub transfer_syntax_uid: String,
    pub host: String,
    pub port: u16,
    pub calling_ae: String,
    pub called_ae: String,
    pub priority: Priority,
    pub file_size: u64,
    pub status: ItemStatus,
    pub attempt_count: u32,
    pub last_attempt_at: Option<u64>,
    pub last_error: Option<String>,
    pub completed_at: Option<u64>,
}

impl QueuedStoreItem {
    /// Builds a new item in `Pending` status with no attempts recorded
    /// yet. `file_size` is the caller-supplied blob length so admission
    /// control doesn't need to stat the blob on the hot path.
    pub fn new(
        sop_class_uid: impl Into<String>,
        sop_instance_uid: impl Into<String>,
        transfer_syntax_uid: impl Into<String>,
        host: impl Into<String>,
        port: u16,
        calling_ae: impl Into<String>,
        called_ae: impl Into<String>,
        priority: Priority,
        file_size: u64,
    ) -> Self {
        QueuedStoreItem {
            id: Uuid::new_v4(),
            sop_class_uid: sop_class_uid.into(),
            sop_instance_uid: sop_instance_uid.into(),
            transfer_syntax_uid: transfer_syntax_uid.into(),
            host: host.into(),
            port,
            calling_ae: calling_ae.into(),
            called_ae: called_ae.into(),
            priority,
            file_size,
            status: ItemStatus::Pending,
            attempt_count: 0,
            last_attempt_at: None,
            last_error: None,
            completed_at: None,
        }
    }

    /// Whether this item is eligible for the scheduler to pick up (§4.7
    /// Scheduler: "status=Pending and attempt_count < max_retry_attempts").
    pub fn is_eligible(&self, max_retry_attempts: u32) -> bool {
        self.status == ItemStatus::Pending && self.attempt_count < max_retry_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_item_starts_pending_with_no_attempts() {
        let item = QueuedStoreItem::new(
            "1.2.840.10008.5.1.4.1.1.7",
            "1.2.3.4",
            "1.2.840.10008.1.2.1",
            "pacs.example.org",
            104,
            "MY_SCU",
            "PACS_SERVER",
            Priority::High,
            4096,
        );
        assert_eq!(item.status, ItemStatus::Pending);
        assert_eq!(item.attempt_count, 0);
        assert!(item.is_eligible(10));
    }

    #[test]
    fn exhausted_retries_are_not_eligible() {
        let mut item = QueuedStoreItem::new("c", "i", "t", "h", 104, "a", "b", Priority::Low, 0);
        item.attempt_count = 10;
        assert!(!item.is_eligible(10));
    }

    #[test]
    fn priority_orders_high_before_low() {
        let mut priorities = vec![Priority::Low, Priority::High, Priority::Medium];
        priorities.sort_by(|a, b| b.cmp(a));
        assert_eq!(priorities, vec![Priority::High, Priority::Medium, Priority::Low]);
    }
}
