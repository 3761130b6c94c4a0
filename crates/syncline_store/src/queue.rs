//! Durable queue store trait definition.

use crate::error::StoreResult;
use syncline_protocol::QueueEntry;
use uuid::Uuid;

/// A durable store for pending outbound mutations.
///
/// Queue stores persist [`QueueEntry`] values so they survive process
/// restarts. The engine treats every mutation as an independent,
/// idempotent, per-entry operation — implementations never need
/// cross-entry transactions.
///
/// # Invariants
///
/// - `insert` is durable before it returns
/// - `update` matches on the synthetic entry id and is a no-op for a
///   missing entry
/// - `load` returns entries in enqueue order
/// - Implementations must be `Send + Sync` for concurrent access
///
/// # Implementors
///
/// - [`crate::MemoryQueueStore`] — for tests and ephemeral sessions
/// - [`crate::FileQueueStore`] — for persistent queues
pub trait QueueStore: Send + Sync {
    /// Persists a new entry.
    fn insert(&self, entry: QueueEntry) -> StoreResult<()>;

    /// Rewrites an existing entry (matched by synthetic id).
    ///
    /// Used to persist retry bookkeeping after a failed attempt.
    fn update(&self, entry: &QueueEntry) -> StoreResult<()>;

    /// Removes one entry by synthetic id. Returns whether it existed.
    fn remove(&self, id: Uuid) -> StoreResult<bool>;

    /// Removes every entry for the logical record `(collection, item_id)`.
    ///
    /// Returns the number of entries removed.
    fn remove_by_identity(&self, collection: &str, item_id: &str) -> StoreResult<usize>;

    /// Removes every entry, or every entry of one collection.
    ///
    /// Returns the number of entries removed.
    fn clear(&self, collection: Option<&str>) -> StoreResult<usize>;

    /// Returns all entries in enqueue order.
    fn load(&self) -> StoreResult<Vec<QueueEntry>>;

    /// Returns the number of stored entries.
    fn len(&self) -> StoreResult<usize>;

    /// Returns true when no entries are stored.
    fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len()? == 0)
    }
}
