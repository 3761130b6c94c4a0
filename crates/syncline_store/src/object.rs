//! Local object store interface and reference implementation.

use crate::error::StoreResult;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;

/// Usage statistics of an object store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// Number of stored values.
    pub entries: usize,
    /// Approximate stored size in bytes.
    pub approximate_bytes: u64,
    /// Reads that found a value.
    pub hits: u64,
    /// Reads that found nothing.
    pub misses: u64,
    /// Values dropped by eviction.
    pub evictions: u64,
}

/// A local key/value store for synced records.
///
/// This is the persistence collaborator the engine's callers write pulled
/// records into. The engine itself only depends on the interface: opaque
/// values keyed by `(collection, id)`, usage statistics, and eviction.
/// Encryption, if any, is the implementation's concern.
///
/// # Implementors
///
/// - [`MemoryObjectStore`] — in-memory, least-recently-used eviction
pub trait ObjectStore: Send + Sync {
    /// Reads a value. Counts as a hit or miss in [`ObjectStore::stats`].
    fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Value>>;

    /// Writes a value, replacing any previous one.
    fn put(&self, collection: &str, id: &str, value: Value) -> StoreResult<()>;

    /// Removes a value. Returns whether it existed.
    fn remove(&self, collection: &str, id: &str) -> StoreResult<bool>;

    /// Returns true when a value exists, without touching hit/miss counts.
    fn contains(&self, collection: &str, id: &str) -> StoreResult<bool>;

    /// Returns usage statistics.
    fn stats(&self) -> StoreResult<StoreStats>;

    /// Evicts values until at most `target_entries` remain.
    ///
    /// Returns the number of values evicted.
    fn evict(&self, target_entries: usize) -> StoreResult<usize>;

    /// Removes every value.
    fn clear(&self) -> StoreResult<()>;
}

struct Slot {
    value: Value,
    bytes: u64,
    touched: u64,
}

struct Inner {
    slots: HashMap<(String, String), Slot>,
    clock: u64,
    bytes: u64,
    hits: u64,
    misses: u64,
    evictions: u64,
}

/// An in-memory object store with least-recently-used eviction.
///
/// When a capacity is configured, `put` evicts the least recently touched
/// values to stay within it. Reads refresh recency.
pub struct MemoryObjectStore {
    inner: Mutex<Inner>,
    capacity: Option<usize>,
}

impl MemoryObjectStore {
    /// Creates an unbounded store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                slots: HashMap::new(),
                clock: 0,
                bytes: 0,
                hits: 0,
                misses: 0,
                evictions: 0,
            }),
            capacity: None,
        }
    }

    /// Creates a store that holds at most `capacity` values.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let mut store = Self::new();
        store.capacity = Some(capacity);
        store
    }
}

impl Default for MemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Inner {
    /// Drops least-recently-touched slots until `target` remain.
    fn evict_to(&mut self, target: usize) -> usize {
        let mut evicted = 0;
        while self.slots.len() > target {
            let oldest = self
                .slots
                .iter()
                .min_by_key(|(_, slot)| slot.touched)
                .map(|(key, _)| key.clone());
            let Some(key) = oldest else { break };
            if let Some(slot) = self.slots.remove(&key) {
                self.bytes -= slot.bytes;
                self.evictions += 1;
                evicted += 1;
            }
        }
        evicted
    }
}

impl ObjectStore for MemoryObjectStore {
    fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Value>> {
        let mut inner = self.inner.lock();
        inner.clock += 1;
        let clock = inner.clock;

        let value = inner
            .slots
            .get_mut(&(collection.to_string(), id.to_string()))
            .map(|slot| {
                slot.touched = clock;
                slot.value.clone()
            });

        match value {
            Some(value) => {
                inner.hits += 1;
                Ok(Some(value))
            }
            None => {
                inner.misses += 1;
                Ok(None)
            }
        }
    }

    fn put(&self, collection: &str, id: &str, value: Value) -> StoreResult<()> {
        let mut inner = self.inner.lock();
        inner.clock += 1;
        let clock = inner.clock;
        let bytes = value.to_string().len() as u64;

        if let Some(old) = inner
            .slots
            .insert(
                (collection.to_string(), id.to_string()),
                Slot {
                    value,
                    bytes,
                    touched: clock,
                },
            )
        {
            inner.bytes -= old.bytes;
        }
        inner.bytes += bytes;

        if let Some(capacity) = self.capacity {
            inner.evict_to(capacity);
        }
        Ok(())
    }

    fn remove(&self, collection: &str, id: &str) -> StoreResult<bool> {
        let mut inner = self.inner.lock();
        match inner
            .slots
            .remove(&(collection.to_string(), id.to_string()))
        {
            Some(slot) => {
                inner.bytes -= slot.bytes;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn contains(&self, collection: &str, id: &str) -> StoreResult<bool> {
        Ok(self
            .inner
            .lock()
            .slots
            .contains_key(&(collection.to_string(), id.to_string())))
    }

    fn stats(&self) -> StoreResult<StoreStats> {
        let inner = self.inner.lock();
        Ok(StoreStats {
            entries: inner.slots.len(),
            approximate_bytes: inner.bytes,
            hits: inner.hits,
            misses: inner.misses,
            evictions: inner.evictions,
        })
    }

    fn evict(&self, target_entries: usize) -> StoreResult<usize> {
        Ok(self.inner.lock().evict_to(target_entries))
    }

    fn clear(&self) -> StoreResult<()> {
        let mut inner = self.inner.lock();
        inner.slots.clear();
        inner.bytes = 0;
        Ok(())
    }
}
