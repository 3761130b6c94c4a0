//! File-backed queue store for persistent queues.

use crate::error::{StoreError, StoreResult};
use crate::queue::QueueStore;
use fs2::FileExt;
use parking_lot::RwLock;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use syncline_protocol::QueueEntry;
use uuid::Uuid;

/// A file-backed queue store.
///
/// The queue is persisted as a JSON snapshot. Every mutation rewrites the
/// snapshot through a temporary file followed by an atomic rename, so a
/// crash mid-write leaves the previous snapshot intact and a queue write
/// is durable before the call returns.
///
/// A sidecar lock file guards against two processes opening the same
/// queue; the advisory lock is held for the store's lifetime.
///
/// # Example
///
/// ```no_run
/// use syncline_store::{FileQueueStore, QueueStore};
/// use std::path::Path;
///
/// let store = FileQueueStore::open(Path::new("pending.json")).unwrap();
/// assert!(store.is_empty().unwrap());
/// ```
#[derive(Debug)]
pub struct FileQueueStore {
    path: PathBuf,
    _lock_file: File,
    entries: RwLock<Vec<QueueEntry>>,
}

impl FileQueueStore {
    /// Opens or creates a queue store at the given path.
    ///
    /// An existing snapshot is loaded; a missing or empty file starts an
    /// empty queue.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Locked`] when another process holds the
    /// queue, [`StoreError::Corrupted`] when the snapshot cannot be
    /// parsed, or an I/O error.
    pub fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let lock_path = path.with_extension("lock");
        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)?;
        lock_file.try_lock_exclusive().map_err(|_| StoreError::Locked {
            path: path.display().to_string(),
        })?;

        let entries = match std::fs::read(path) {
            Ok(bytes) if bytes.is_empty() => Vec::new(),
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| StoreError::Corrupted(e.to_string()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };

        tracing::debug!(
            path = %path.display(),
            entries = entries.len(),
            "opened queue store"
        );

        Ok(Self {
            path: path.to_path_buf(),
            _lock_file: lock_file,
            entries: RwLock::new(entries),
        })
    }

    /// Returns the snapshot path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes the snapshot through a temporary file and atomic rename.
    fn persist(&self, entries: &[QueueEntry]) -> StoreResult<()> {
        let tmp_path = self.path.with_extension("tmp");
        let bytes = serde_json::to_vec(entries)?;

        let mut tmp = File::create(&tmp_path)?;
        tmp.write_all(&bytes)?;
        tmp.sync_all()?;
        std::fs::rename(&tmp_path, &self.path)?;

        Ok(())
    }

    /// Applies a mutation to the in-memory mirror and persists the result.
    ///
    /// The mirror is only updated after the snapshot reaches disk.
    fn mutate<R>(&self, f: impl FnOnce(&mut Vec<QueueEntry>) -> R) -> StoreResult<R> {
        let mut entries = self.entries.write();
        let mut staged = entries.clone();
        let result = f(&mut staged);
        self.persist(&staged)?;
        *entries = staged;
        Ok(result)
    }
}

impl QueueStore for FileQueueStore {
    fn insert(&self, entry: QueueEntry) -> StoreResult<()> {
        self.mutate(|entries| entries.push(entry))
    }

    fn update(&self, entry: &QueueEntry) -> StoreResult<()> {
        self.mutate(|entries| {
            if let Some(existing) = entries.iter_mut().find(|e| e.id == entry.id) {
                *existing = entry.clone();
            }
        })
    }

    fn remove(&self, id: Uuid) -> StoreResult<bool> {
        self.mutate(|entries| {
            let before = entries.len();
            entries.retain(|e| e.id != id);
            entries.len() < before
        })
    }

    fn remove_by_identity(&self, collection: &str, item_id: &str) -> StoreResult<usize> {
        self.mutate(|entries| {
            let before = entries.len();
            entries.retain(|e| e.identity() != (collection, item_id));
            before - entries.len()
        })
    }

    fn clear(&self, collection: Option<&str>) -> StoreResult<usize> {
        self.mutate(|entries| {
            let before = entries.len();
            match collection {
                Some(name) => entries.retain(|e| e.collection_name != name),
                None => entries.clear(),
            }
            before - entries.len()
        })
    }

    fn load(&self) -> StoreResult<Vec<QueueEntry>> {
        Ok(self.entries.read().clone())
    }

    fn len(&self) -> StoreResult<usize> {
        Ok(self.entries.read().len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use syncline_protocol::{Operation, SyncItem};

    fn make_entry(collection: &str, id: &str) -> QueueEntry {
        let item = SyncItem::new(collection, id, json!({"v": 1}));
        QueueEntry::new(&item, Operation::Create)
    }

    #[test]
    fn entries_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("queue.json");

        let entry = make_entry("lessons", "L1");
        {
            let store = FileQueueStore::open(&path).unwrap();
            store.insert(entry.clone()).unwrap();
        }

        let store = FileQueueStore::open(&path).unwrap();
        assert_eq!(store.load().unwrap(), vec![entry]);
    }

    #[test]
    fn retry_bookkeeping_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("queue.json");

        let mut entry = make_entry("lessons", "L1");
        {
            let store = FileQueueStore::open(&path).unwrap();
            store.insert(entry.clone()).unwrap();
            entry.record_failure("connection reset");
            store.update(&entry).unwrap();
        }

        let store = FileQueueStore::open(&path).unwrap();
        let loaded = store.load().unwrap();
        assert_eq!(loaded[0].retry_count, 1);
        assert_eq!(loaded[0].last_error.as_deref(), Some("connection reset"));
    }

    #[test]
    fn missing_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileQueueStore::open(&dir.path().join("fresh.json")).unwrap();
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn corrupted_snapshot_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("queue.json");
        std::fs::write(&path, b"not json").unwrap();

        let result = FileQueueStore::open(&path);
        assert!(matches!(result, Err(StoreError::Corrupted(_))));
    }

    #[test]
    fn second_open_is_rejected_while_locked() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("queue.json");

        let _store = FileQueueStore::open(&path).unwrap();
        let second = FileQueueStore::open(&path);
        assert!(matches!(second, Err(StoreError::Locked { .. })));
    }

    #[test]
    fn remove_and_clear_persist() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("queue.json");

        let store = FileQueueStore::open(&path).unwrap();
        let entry = make_entry("lessons", "L1");
        store.insert(entry.clone()).unwrap();
        store.insert(make_entry("notes", "N1")).unwrap();

        assert!(store.remove(entry.id).unwrap());
        assert_eq!(store.clear(None).unwrap(), 1);
        drop(store);

        let store = FileQueueStore::open(&path).unwrap();
        assert!(store.is_empty().unwrap());
    }
}
