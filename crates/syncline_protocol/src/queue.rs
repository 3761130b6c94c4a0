//! Durable queue entries.

use crate::item::{now_millis, Operation, Priority, SyncItem};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// A pending mutation awaiting transmission.
///
/// The entry id is synthetic and unique per enqueue — the same logical
/// record may be queued several times before a sync completes. The logical
/// identity is `(collection_name, item_id)`.
///
/// Lifecycle: created on enqueue; `retry_count`/`last_attempt_at`/
/// `last_error` mutated on failed transmission; removed on confirmed
/// success or explicit clear. `retry_count` never decreases while the
/// entry exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueEntry {
    /// Synthetic id, unique per enqueue.
    pub id: Uuid,
    /// Id of the logical record this entry mutates.
    pub item_id: String,
    /// Collection the record belongs to.
    pub collection_name: String,
    /// Mutation kind.
    pub operation: Operation,
    /// Payload; absent for deletes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Transmission urgency.
    pub priority: Priority,
    /// When the entry was enqueued.
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub enqueued_at: DateTime<Utc>,
    /// Failed transmission attempts so far.
    pub retry_count: u32,
    /// Time of the most recent failed attempt.
    #[serde(
        default,
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_attempt_at: Option<DateTime<Utc>>,
    /// Message of the most recent failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl QueueEntry {
    /// Creates an entry for a record mutation.
    ///
    /// Deletes carry no payload; creates and updates snapshot the record's
    /// data at enqueue time.
    pub fn new(item: &SyncItem, operation: Operation) -> Self {
        let data = match operation {
            Operation::Delete => None,
            Operation::Create | Operation::Update => Some(item.data.clone()),
        };

        Self {
            id: Uuid::new_v4(),
            item_id: item.id.clone(),
            collection_name: item.collection_name.clone(),
            operation,
            data,
            priority: item.priority.unwrap_or_default(),
            enqueued_at: now_millis(),
            retry_count: 0,
            last_attempt_at: None,
            last_error: None,
        }
    }

    /// Returns the logical identity as a `(collection, item id)` pair.
    pub fn identity(&self) -> (&str, &str) {
        (&self.collection_name, &self.item_id)
    }

    /// Records a failed transmission attempt.
    pub fn record_failure(&mut self, error: impl Into<String>) {
        self.retry_count += 1;
        self.last_attempt_at = Some(now_millis());
        self.last_error = Some(error.into());
    }

    /// Approximate payload size in bytes, for statistics.
    pub fn payload_size(&self) -> usize {
        self.data
            .as_ref()
            .map(|d| d.to_string().len())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn make_item(id: &str) -> SyncItem {
        SyncItem::new("lessons", id, json!({"title": "t"}))
    }

    #[test]
    fn entry_ids_are_unique_per_enqueue() {
        let item = make_item("L1");
        let a = QueueEntry::new(&item, Operation::Create);
        let b = QueueEntry::new(&item, Operation::Update);

        assert_ne!(a.id, b.id);
        assert_eq!(a.identity(), b.identity());
    }

    #[test]
    fn delete_carries_no_payload() {
        let item = make_item("L1");
        let entry = QueueEntry::new(&item, Operation::Delete);
        assert!(entry.data.is_none());
        assert_eq!(entry.payload_size(), 0);
    }

    #[test]
    fn record_failure_is_monotonic() {
        let item = make_item("L1");
        let mut entry = QueueEntry::new(&item, Operation::Create);
        assert_eq!(entry.retry_count, 0);
        assert!(entry.last_attempt_at.is_none());

        entry.record_failure("connection reset");
        assert_eq!(entry.retry_count, 1);
        assert!(entry.last_attempt_at.is_some());
        assert_eq!(entry.last_error.as_deref(), Some("connection reset"));

        entry.record_failure("timed out");
        assert_eq!(entry.retry_count, 2);
        assert_eq!(entry.last_error.as_deref(), Some("timed out"));
    }

    #[test]
    fn entry_roundtrip() {
        let item = make_item("L1").with_priority(Priority::Critical);
        let mut entry = QueueEntry::new(&item, Operation::Update);
        entry.record_failure("boom");

        let encoded = serde_json::to_value(&entry).unwrap();
        assert_eq!(encoded["collectionName"], "lessons");
        assert_eq!(encoded["operation"], "update");
        assert_eq!(encoded["priority"], "critical");
        assert_eq!(encoded["retryCount"], 1);

        let decoded: QueueEntry = serde_json::from_value(encoded).unwrap();
        assert_eq!(decoded, entry);
    }
}
