//! In-memory queue store for testing.

use crate::error::StoreResult;
use crate::queue::QueueStore;
use parking_lot::RwLock;
use syncline_protocol::QueueEntry;
use uuid::Uuid;

/// An in-memory queue store.
///
/// Entries live only as long as the process; suitable for unit tests and
/// sessions that do not need restart durability.
///
/// # Thread Safety
///
/// The store is thread-safe and can be shared across tasks.
#[derive(Debug, Default)]
pub struct MemoryQueueStore {
    entries: RwLock<Vec<QueueEntry>>,
}

impl MemoryQueueStore {
    /// Creates a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store preloaded with entries, preserving their order.
    #[must_use]
    pub fn with_entries(entries: Vec<QueueEntry>) -> Self {
        Self {
            entries: RwLock::new(entries),
        }
    }
}

impl QueueStore for MemoryQueueStore {
    fn insert(&self, entry: QueueEntry) -> StoreResult<()> {
        self.entries.write().push(entry);
        Ok(())
    }

    fn update(&self, entry: &QueueEntry) -> StoreResult<()> {
        let mut entries = self.entries.write();
        if let Some(existing) = entries.iter_mut().find(|e| e.id == entry.id) {
            *existing = entry.clone();
        }
        Ok(())
    }

    fn remove(&self, id: Uuid) -> StoreResult<bool> {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|e| e.id != id);
        Ok(entries.len() < before)
    }

    fn remove_by_identity(&self, collection: &str, item_id: &str) -> StoreResult<usize> {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|e| e.identity() != (collection, item_id));
        Ok(before - entries.len())
    }

    fn clear(&self, collection: Option<&str>) -> StoreResult<usize> {
        let mut entries = self.entries.write();
        let before = entries.len();
        match collection {
            Some(name) => entries.retain(|e| e.collection_name != name),
            None => entries.clear(),
        }
        Ok(before - entries.len())
    }

    fn load(&self) -> StoreResult<Vec<QueueEntry>> {
        Ok(self.entries.read().clone())
    }

    fn len(&self) -> StoreResult<usize> {
        Ok(self.entries.read().len())
    }
}
