//! Logical records and their classification enums.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The current instant truncated to millisecond precision.
///
/// Timestamps travel as millisecond epochs, so sub-millisecond precision
/// would be lost on the wire; truncating at creation keeps local and
/// round-tripped values identical.
pub(crate) fn now_millis() -> DateTime<Utc> {
    DateTime::from_timestamp_millis(Utc::now().timestamp_millis()).unwrap_or_default()
}

/// Urgency class of a record or queue entry.
///
/// Ordering is by urgency: `Critical` sorts before `High`, which sorts
/// before `Medium` and `Low`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Must be transmitted at the first opportunity.
    Critical,
    /// Transmitted before ordinary traffic.
    High,
    /// Default urgency.
    #[default]
    Medium,
    /// Transmitted after everything else.
    Low,
}

impl Priority {
    /// Numeric urgency rank; lower is more urgent.
    pub fn rank(&self) -> u8 {
        match self {
            Priority::Critical => 0,
            Priority::High => 1,
            Priority::Medium => 2,
            Priority::Low => 3,
        }
    }
}

/// The mutation kind carried by a queue entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    /// Record did not exist on the server before.
    Create,
    /// Record exists and its payload changed.
    Update,
    /// Record should be removed from the server.
    Delete,
}

/// Where a record stands relative to the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    /// Local changes not yet confirmed by the server.
    Pending,
    /// Server has acknowledged the current state.
    Synced,
    /// The last transmission attempt failed.
    Failed,
}

/// Conflict marker carried on a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictStatus {
    /// A version clash was reported and is awaiting resolution.
    Detected,
    /// The clash has been resolved locally.
    Resolved,
}

/// A logical record to synchronize.
///
/// Identity is `(collection_name, id)`. The `data` payload is opaque — the
/// engine never mutates it except when producing a resolved replacement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncItem {
    /// Record id, unique within its collection.
    pub id: String,
    /// Collection the record belongs to.
    pub collection_name: String,
    /// Opaque payload owned by the caller.
    pub data: Value,
    /// Last local modification time.
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub last_modified: DateTime<Utc>,
    /// Creation time.
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    /// Monotonic version used for optimistic concurrency.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<u64>,
    /// Transmission urgency.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    /// Sync state marker.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sync_status: Option<SyncStatus>,
    /// Conflict state marker.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conflict_status: Option<ConflictStatus>,
}

impl SyncItem {
    /// Creates a new record with both timestamps set to now.
    pub fn new(
        collection_name: impl Into<String>,
        id: impl Into<String>,
        data: Value,
    ) -> Self {
        let now = now_millis();
        Self {
            id: id.into(),
            collection_name: collection_name.into(),
            data,
            last_modified: now,
            created_at: now,
            version: None,
            priority: None,
            sync_status: None,
            conflict_status: None,
        }
    }

    /// Sets the version.
    pub fn with_version(mut self, version: u64) -> Self {
        self.version = Some(version);
        self
    }

    /// Sets the priority.
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Returns the record identity as a `(collection, id)` pair.
    pub fn identity(&self) -> (&str, &str) {
        (&self.collection_name, &self.id)
    }
}
