//! Durable item storage (§4.7 On-disk layout): a root directory holding
//! `index.log` plus one `<uuid>.meta`/`<uuid>.blob` pair per item.
//!
//! Metadata writes go through write-then-rename so a reader (or a crash)
//! never observes a half-written `.meta` file (§6 "metadata writes use
//! write-then-rename").

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use snafu::ResultExt;
use uuid::Uuid;

use crate::error::{IoSnafu, Result, SerializationSnafu};
use crate::item::{ItemStatus, QueuedStoreItem};
use crate::journal::{Journal, JournalRecord};

pub struct Store {
    root: PathBuf,
    items_dir: PathBuf,
    journal: Journal,
}

impl Store {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let items_dir = root.join("items");
        fs::create_dir_all(&items_dir).context(IoSnafu { path: items_dir.clone() })?;
        let journal = Journal::open(&root)?;
        Ok(Store { root, items_dir, journal })
    }

    fn meta_path(&self, id: Uuid) -> PathBuf {
        self.items_dir.join(format!("{id}.meta"))
    }

    fn blob_path(&self, id: Uuid) -> PathBuf {
        self.items_dir.join(format!("{id}.blob"))
    }

    /// Persists a brand-new item: blob first (so a crash between the two
    /// writes never leaves a `.meta` pointing at a missing blob on a
    /// *successful* enqueue), then metadata, then the journal record.
    pub fn enqueue(&mut self, item: &QueuedStoreItem, blob: &[u8], ts: u64) -> Result<()> {
        write_atomic(&self.blob_path(item.id), blob)?;
        write_meta(&self.meta_path(item.id), item)?;
        self.journal.append(&JournalRecord::Enqueue { ts, id: item.id, item: Box::new(item.clone()) })
    }

    /// Persists a status transition: metadata sidecar first, then the
    /// journal record, matching "the journal is fsynced on every state
    /// transition" (§6).
    pub fn update_status(&mut self, item: &QueuedStoreItem, ts: u64) -> Result<()> {
        write_meta(&self.meta_path(item.id), item)?;
        self.journal.append(&JournalRecord::StatusChange {
            ts,
            id: item.id,
            status: item.status,
            attempt_count: item.attempt_count,
            last_attempt_at: item.last_attempt_at,
            last_error: item.last_error.clone(),
            completed_at: item.completed_at,
        })
    }

    pub fn remove(&mut self, id: Uuid, ts: u64) -> Result<()> {
        let meta = self.meta_path(id);
        let blob = self.blob_path(id);
        if meta.exists() {
            fs::remove_file(&meta).context(IoSnafu { path: meta })?;
        }
        if blob.exists() {
            fs::remove_file(&blob).context(IoSnafu { path: blob })?;
        }
        self.journal.append(&JournalRecord::Remove { ts, id })
    }

    pub fn read_blob(&self, id: Uuid) -> Result<Vec<u8>> {
        let path = self.blob_path(id);
        fs::read(&path).context(IoSnafu { path })
    }

    pub fn blob_exists(&self, id: Uuid) -> bool {
        self.blob_path(id).exists()
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Replays `index.log` to reconstruct every item's last known state
    /// (§4.7 "Startup replays the journal to reconstruct in-memory
    /// state"), then applies the two startup corrections the spec
    /// mandates: a missing blob forces `Failed`, and an item caught mid
    /// `Sending` (implying a crash) is rewound to `Pending` with its
    /// `attempt_count` unchanged.
    pub fn replay(&self) -> Result<BTreeMap<Uuid, QueuedStoreItem>> {
        let mut items: BTreeMap<Uuid, QueuedStoreItem> = BTreeMap::new();

        for record in Journal::replay(&self.root)? {
            match record {
                JournalRecord::Enqueue { id, item, .. } => {
                    items.insert(id, *item);
                }
                JournalRecord::StatusChange { id, status, attempt_count, last_attempt_at, last_error, completed_at, .. } => {
                    if let Some(item) = items.get_mut(&id) {
                        item.status = status;
                        item.attempt_count = attempt_count;
                        item.last_attempt_at = last_attempt_at;
                        item.last_error = last_error;
                        item.completed_at = completed_at;
                    }
                }
                JournalRecord::Remove { id, .. } => {
                    items.remove(&id);
                }
                JournalRecord::Clear { .. } => {
                    items.clear();
                }
            }
        }

        for item in items.values_mut() {
            if item.status == ItemStatus::Sending {
                item.status = ItemStatus::Pending;
            }
            if !matches!(item.status, ItemStatus::Completed | ItemStatus::Cancelled) && !self.blob_exists(item.id) {
                item.status = ItemStatus::Failed;
            }
        }

        Ok(items)
    }

    /// Wipes every item and starts a fresh journal (§4.7 journal op
    /// `clear`).
    pub fn clear(&mut self, ts: u64) -> Result<()> {
        if self.items_dir.exists() {
            fs::remove_dir_all(&self.items_dir).context(IoSnafu { path: self.items_dir.clone() })?;
        }
        fs::create_dir_all(&self.items_dir).context(IoSnafu { path: self.items_dir.clone() })?;
        self.journal.append(&JournalRecord::Clear { ts })
    }
}

fn write_meta(path: &Path, item: &QueuedStoreItem) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(item).context(SerializationSnafu { id: item.id })?;
    write_atomic(path, &bytes)
}

/// Write-then-rename: the new content lands fully formed in a sibling
/// `.tmp` file, fsynced, then atomically renamed over the target so a
/// concurrent reader never observes a partial write.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = path.with_extension(format!("{}.tmp", path.extension().and_then(|e| e.to_str()).unwrap_or("")));
    fs::write(&tmp, bytes).context(IoSnafu { path: tmp.clone() })?;
    {
        let f = fs::File::open(&tmp).context(IoSnafu { path: tmp.clone() })?;
        f.sync_all().context(IoSnafu { path: tmp.clone() })?;
    }
    fs::rename(&tmp, path).context(IoSnafu { path: path.to_path_buf() })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::Priority;

    fn sample() -> QueuedStoreItem {
        QueuedStoreItem::new("c", "i", "t", "h", 104, "a", "b", Priority::Medium, 3)
    }

    #[test]
    fn enqueue_then_replay_reconstructs_pending_item() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = Store::open(dir.path()).unwrap();
        let item = sample();
        store.enqueue(&item, b"abc", 1).unwrap();

        let reopened = Store::open(dir.path()).unwrap();
        let items = reopened.replay().unwrap();
        assert_eq!(items.len(), 1);
        let reloaded = &items[&item.id];
        assert_eq!(reloaded.status, ItemStatus::Pending);
        assert_eq!(reloaded.id, item.id);
        assert_eq!(reopened.read_blob(item.id).unwrap(), b"abc");
    }

    #[test]
    fn sending_at_replay_time_rewinds_to_pending() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = Store::open(dir.path()).unwrap();
        let mut item = sample();
        store.enqueue(&item, b"abc", 1).unwrap();
        item.status = ItemStatus::Sending;
        item.attempt_count = 2;
        store.update_status(&item, 2).unwrap();

        let items = store.replay().unwrap();
        let reloaded = &items[&item.id];
        assert_eq!(reloaded.status, ItemStatus::Pending);
        assert_eq!(reloaded.attempt_count, 2);
    }

    #[test]
    fn missing_blob_is_marked_failed_on_replay() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = Store::open(dir.path()).unwrap();
        let item = sample();
        store.enqueue(&item, b"abc", 1).unwrap();
        fs::remove_file(store.blob_path(item.id)).unwrap();

        let items = store.replay().unwrap();
        assert_eq!(items[&item.id].status, ItemStatus::Failed);
    }

    #[test]
    fn remove_deletes_blob_and_meta() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = Store::open(dir.path()).unwrap();
        let item = sample();
        store.enqueue(&item, b"abc", 1).unwrap();
        store.remove(item.id, 2).unwrap();

        assert!(!store.meta_path(item.id).exists());
        assert!(!store.blob_path(item.id).exists());
    }

    #[test]
    fn clear_empties_store_and_journal_reflects_it() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = Store::open(dir.path()).unwrap();
        store.enqueue(&sample(), b"abc", 1).unwrap();
        store.clear(2).unwrap();

        let items = store.replay().unwrap();
        assert!(items.is_empty());
    }
}
