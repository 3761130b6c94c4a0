//! Upload-path utilities: coalescing, prioritization, batch building.

use std::collections::HashMap;
use syncline_protocol::{Operation, QueueEntry};
use uuid::Uuid;

/// An ordered group of entries from one collection, sent in a single
/// push request. Ephemeral — built for one transmission attempt, never
/// persisted.
#[derive(Debug, Clone)]
pub struct Batch {
    /// Collection shared by every entry.
    pub collection_name: String,
    /// Entries in transmission order.
    pub entries: Vec<QueueEntry>,
}

impl Batch {
    /// Number of entries in the batch.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true when the batch holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Collapses duplicate entries for the same logical record.
///
/// Input must be in enqueue order. For each `(collection, item id)` the
/// latest enqueued state survives; intermediate states are discarded. An
/// un-pushed Create absorbed by a later Update keeps operation Create
/// (the server has never seen the record); a later Delete supersedes
/// everything.
///
/// Returns the surviving entries (still in enqueue order) and the ids of
/// superseded entries, which the caller drops from the durable queue.
pub fn coalesce(entries: Vec<QueueEntry>) -> (Vec<QueueEntry>, Vec<Uuid>) {
    let mut survivors: Vec<QueueEntry> = Vec::with_capacity(entries.len());
    let mut by_identity: HashMap<(String, String), usize> = HashMap::new();
    let mut superseded = Vec::new();

    for entry in entries {
        let key = (entry.collection_name.clone(), entry.item_id.clone());
        match by_identity.get(&key) {
            Some(&index) => {
                let previous = std::mem::replace(&mut survivors[index], entry);
                let survivor = &mut survivors[index];
                if previous.operation == Operation::Create
                    && survivor.operation == Operation::Update
                {
                    survivor.operation = Operation::Create;
                }
                superseded.push(previous.id);
            }
            None => {
                by_identity.insert(key, survivors.len());
                survivors.push(entry);
            }
        }
    }

    (survivors, superseded)
}

/// Orders entries for transmission.
///
/// Stable sort: priority class by urgency, then fewer retries first,
/// then older enqueue time first.
pub fn prioritize(entries: &mut [QueueEntry]) {
    entries.sort_by_key(|e| (e.priority.rank(), e.retry_count, e.enqueued_at));
}

/// Carves prioritized entries into collection-pure, size-capped batches.
///
/// Collections named in `collection_order` dispatch first, in that
/// order; unlisted collections follow in first-appearance order. Entry
/// order within a collection is preserved.
pub fn build_batches(
    entries: Vec<QueueEntry>,
    batch_size: usize,
    collection_order: &[String],
) -> Vec<Batch> {
    let batch_size = batch_size.max(1);

    let mut groups: Vec<(String, Vec<QueueEntry>)> = Vec::new();
    let mut index_of: HashMap<String, usize> = HashMap::new();

    for entry in entries {
        let collection = entry.collection_name.clone();
        match index_of.get(&collection) {
            Some(&i) => groups[i].1.push(entry),
            None => {
                index_of.insert(collection.clone(), groups.len());
                groups.push((collection, vec![entry]));
            }
        }
    }

    let rank = |name: &str| {
        collection_order
            .iter()
            .position(|c| c == name)
            .unwrap_or(collection_order.len())
    };
    groups.sort_by_key(|(name, _)| rank(name));

    let mut batches = Vec::new();
    for (collection_name, group) in groups {
        let mut group = group.into_iter().peekable();
        while group.peek().is_some() {
            let entries: Vec<QueueEntry> = group.by_ref().take(batch_size).collect();
            batches.push(Batch {
                collection_name: collection_name.clone(),
                entries,
            });
        }
    }
    batches
}
