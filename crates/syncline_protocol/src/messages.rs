//! Request and response messages for the sync endpoints.

use crate::conflict::{Conflict, ResolutionStrategy};
use crate::item::{now_millis, SyncItem};
use crate::queue::QueueEntry;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Identity of a record deleted on the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletedItem {
    /// Collection of the deleted record.
    pub collection_name: String,
    /// Id of the deleted record.
    pub id: String,
}

/// Parameters of a pull request.
///
/// Sent as query parameters:
/// `GET <sync-endpoint>/pull?lastSyncTime=<ms>&collections=<csv>&compress=<bool>`.
#[derive(Debug, Clone, PartialEq)]
pub struct PullRequest {
    /// Only changes after this instant are requested.
    pub last_sync_time: DateTime<Utc>,
    /// Restrict to these collections; `None` pulls everything.
    pub collections: Option<Vec<String>>,
    /// Ask the server to compress the response.
    pub compress: bool,
}

impl PullRequest {
    /// Creates a pull request for all collections.
    pub fn since(last_sync_time: DateTime<Utc>) -> Self {
        Self {
            last_sync_time,
            collections: None,
            compress: false,
        }
    }

    /// Restricts the pull to the given collections.
    pub fn with_collections(mut self, collections: Vec<String>) -> Self {
        self.collections = Some(collections);
        self
    }

    /// Requests a compressed response.
    pub fn with_compression(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    /// Encodes the request as URL query pairs.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![(
            "lastSyncTime",
            self.last_sync_time.timestamp_millis().to_string(),
        )];
        if let Some(collections) = &self.collections {
            pairs.push(("collections", collections.join(",")));
        }
        pairs.push(("compress", self.compress.to_string()));
        pairs
    }
}

/// Server response to a pull request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullResponse {
    /// Records changed since the requested instant.
    #[serde(default)]
    pub changes: Vec<SyncItem>,
    /// Records deleted since the requested instant.
    #[serde(default)]
    pub deleted_items: Vec<DeletedItem>,
    /// Server time of this response; becomes the next `lastSyncTime`.
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    /// Size of the response payload in bytes.
    #[serde(default)]
    pub byte_size: u64,
}

impl PullResponse {
    /// Creates an empty response stamped with the given server time.
    pub fn empty(timestamp: DateTime<Utc>) -> Self {
        Self {
            changes: Vec::new(),
            deleted_items: Vec::new(),
            timestamp,
            byte_size: 0,
        }
    }
}

/// Body of a push request: `POST <sync-endpoint>/push`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushRequest {
    /// Queue entries in transmission order.
    pub items: Vec<QueueEntry>,
    /// Client wall-clock time at send.
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub client_time: DateTime<Utc>,
    /// Whether the client asked for a compressed exchange.
    pub compress: bool,
}

impl PushRequest {
    /// Creates a push request stamped with the current client time.
    pub fn new(items: Vec<QueueEntry>, compress: bool) -> Self {
        Self {
            items,
            client_time: now_millis(),
            compress,
        }
    }
}

/// Wrapper for a compressed push body:
/// `{ "compressed": true, "data": <base64 gzip of the JSON body> }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushEnvelope {
    /// Always true; marks the body as wrapped.
    pub compressed: bool,
    /// Base64-encoded gzip of the serialized [`PushRequest`].
    pub data: String,
}

/// Server response to a push request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushResponse {
    /// False when the batch was rejected wholesale.
    pub success: bool,
    /// Number of entries the server accepted.
    #[serde(default)]
    pub processed: u32,
    /// Logical record ids the server rejected individually.
    #[serde(default)]
    pub failed: Vec<String>,
    /// Version clashes detected during the push.
    #[serde(default)]
    pub conflicts: Vec<Conflict>,
    /// Size of the exchange in bytes.
    #[serde(default)]
    pub byte_size: u64,
    /// Server-side error message when the batch was rejected.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PushResponse {
    /// Creates a fully-successful response.
    pub fn success(processed: u32) -> Self {
        Self {
            success: true,
            processed,
            failed: Vec::new(),
            conflicts: Vec::new(),
            byte_size: 0,
            error: None,
        }
    }

    /// Creates a response with individually-failed record ids.
    pub fn with_failed(processed: u32, failed: Vec<String>) -> Self {
        Self {
            success: failed.is_empty(),
            processed,
            failed,
            conflicts: Vec::new(),
            byte_size: 0,
            error: None,
        }
    }

    /// Creates a response carrying conflicts.
    pub fn with_conflicts(processed: u32, conflicts: Vec<Conflict>) -> Self {
        Self {
            success: conflicts.is_empty(),
            processed,
            failed: Vec::new(),
            conflicts,
            byte_size: 0,
            error: None,
        }
    }
}

/// Body of a conflict-resolve request:
/// `PUT <collection-endpoint>/<id>/resolve`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveRequest {
    /// The reconciled payload.
    pub data: Value,
    /// Strategy that produced it.
    pub resolution: ResolutionStrategy,
}

/// Frames exchanged over the duplex push channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChannelMessage {
    /// Server-initiated notification that remote state changed.
    SyncUpdate {
        /// Opaque notification payload.
        payload: Value,
    },
    /// Liveness probe.
    Ping,
    /// Reply to a liveness probe.
    Pong,
}
