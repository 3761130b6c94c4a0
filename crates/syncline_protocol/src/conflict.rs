//! Conflict representation and resolution.

use crate::item::{now_millis, ConflictStatus, SyncItem, SyncStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Errors from conflict resolution.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResolveError {
    /// `Manual` resolution was requested without replacement data.
    #[error("manual resolution for {collection}/{id} requires custom data")]
    MissingManualData {
        /// Collection of the conflicted record.
        collection: String,
        /// Id of the conflicted record.
        id: String,
    },
}

/// Strategy for reconciling a version clash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStrategy {
    /// Keep the local data.
    ClientWins,
    /// Accept the remote data.
    ServerWins,
    /// Compare timestamps; ties favor the server.
    NewestWins,
    /// Caller supplies the replacement data.
    Manual,
    /// Shallow field merge; client overrides server on key collision.
    Merge,
}

impl ResolutionStrategy {
    /// Returns true if this strategy resolves without caller input.
    pub fn auto_resolves(&self) -> bool {
        !matches!(self, ResolutionStrategy::Manual)
    }
}

/// A server-reported version clash for one record.
///
/// Created when the server rejects a push with a version mismatch; removed
/// from the engine's conflict set once resolved. Conflicts are held in
/// memory only — an unresolved conflict re-surfaces on the next push of
/// the still-queued entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conflict {
    /// Id of the conflicted record.
    pub id: String,
    /// Collection of the conflicted record.
    pub collection_name: String,
    /// The client's payload at push time.
    pub client_data: Value,
    /// The server's authoritative payload.
    pub server_data: Value,
    /// Last modification time on the client.
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub client_timestamp: DateTime<Utc>,
    /// Last modification time on the server.
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub server_timestamp: DateTime<Utc>,
    /// Server's version of the record, when reported.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_version: Option<u64>,
    /// Whether the conflict has been resolved.
    #[serde(default)]
    pub resolved: bool,
    /// Strategy used for resolution, once resolved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<ResolutionStrategy>,
    /// The reconciled payload, once resolved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_data: Option<Value>,
}

impl Conflict {
    /// Returns the record identity as a `(collection, id)` pair.
    pub fn identity(&self) -> (&str, &str) {
        (&self.collection_name, &self.id)
    }

    /// Marks the conflict resolved with the given strategy and payload.
    pub fn mark_resolved(&mut self, strategy: ResolutionStrategy, data: Value) {
        self.resolved = true;
        self.resolution = Some(strategy);
        self.resolved_data = Some(data);
    }
}

/// Resolves a conflict under the given strategy.
///
/// Pure: the inputs are not mutated. The returned item is a new record
/// carrying the reconciled payload, marked resolved and pending, with a
/// version incremented past the server's reported version when present.
///
/// `Manual` requires `custom_data` and fails without it; every other
/// strategy ignores `custom_data`.
pub fn resolve(
    conflict: &Conflict,
    strategy: ResolutionStrategy,
    custom_data: Option<Value>,
) -> Result<SyncItem, ResolveError> {
    let data = match strategy {
        ResolutionStrategy::ClientWins => conflict.client_data.clone(),
        ResolutionStrategy::ServerWins => conflict.server_data.clone(),
        ResolutionStrategy::NewestWins => {
            if conflict.client_timestamp > conflict.server_timestamp {
                conflict.client_data.clone()
            } else {
                conflict.server_data.clone()
            }
        }
        ResolutionStrategy::Manual => custom_data.ok_or_else(|| ResolveError::MissingManualData {
            collection: conflict.collection_name.clone(),
            id: conflict.id.clone(),
        })?,
        ResolutionStrategy::Merge => merge_shallow(&conflict.server_data, &conflict.client_data),
    };

    let now = now_millis();
    Ok(SyncItem {
        id: conflict.id.clone(),
        collection_name: conflict.collection_name.clone(),
        data,
        last_modified: now,
        created_at: now,
        version: conflict.server_version.map(|v| v + 1),
        priority: None,
        sync_status: Some(SyncStatus::Pending),
        conflict_status: Some(ConflictStatus::Resolved),
    })
}

/// Shallow merge of two JSON objects; `overlay` wins on key collision.
///
/// Non-object inputs degrade to the overlay (client) value.
fn merge_shallow(base: &Value, overlay: &Value) -> Value {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => {
            let mut merged: Map<String, Value> = base.clone();
            for (key, value) in overlay {
                merged.insert(key.clone(), value.clone());
            }
            Value::Object(merged)
        }
        _ => overlay.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn make_conflict(client_offset_ms: i64) -> Conflict {
        let server_time = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();
        Conflict {
            id: "L1".into(),
            collection_name: "lessons".into(),
            client_data: json!({"title": "client", "local": true}),
            server_data: json!({"title": "server", "remote": true}),
            client_timestamp: server_time + chrono::Duration::milliseconds(client_offset_ms),
            server_timestamp: server_time,
            server_version: Some(7),
            resolved: false,
            resolution: None,
            resolved_data: None,
        }
    }

    #[test]
    fn client_wins_keeps_client_data() {
        let conflict = make_conflict(0);
        let item = resolve(&conflict, ResolutionStrategy::ClientWins, None).unwrap();
        assert_eq!(item.data, conflict.client_data);
    }

    #[test]
    fn server_wins_takes_server_data() {
        let conflict = make_conflict(0);
        let item = resolve(&conflict, ResolutionStrategy::ServerWins, None).unwrap();
        assert_eq!(item.data, conflict.server_data);
    }

    #[test]
    fn newest_wins_compares_timestamps() {
        let newer_client = make_conflict(1);
        let item = resolve(&newer_client, ResolutionStrategy::NewestWins, None).unwrap();
        assert_eq!(item.data, newer_client.client_data);

        let newer_server = make_conflict(-1);
        let item = resolve(&newer_server, ResolutionStrategy::NewestWins, None).unwrap();
        assert_eq!(item.data, newer_server.server_data);
    }

    #[test]
    fn newest_wins_tie_favors_server() {
        let tie = make_conflict(0);
        let item = resolve(&tie, ResolutionStrategy::NewestWins, None).unwrap();
        assert_eq!(item.data, tie.server_data);
    }

    #[test]
    fn manual_requires_custom_data() {
        let conflict = make_conflict(0);

        let err = resolve(&conflict, ResolutionStrategy::Manual, None).unwrap_err();
        assert!(matches!(err, ResolveError::MissingManualData { .. }));

        let item = resolve(
            &conflict,
            ResolutionStrategy::Manual,
            Some(json!({"title": "hand-picked"})),
        )
        .unwrap();
        assert_eq!(item.data, json!({"title": "hand-picked"}));
    }

    #[test]
    fn merge_is_shallow_and_client_overrides() {
        let conflict = make_conflict(0);
        let item = resolve(&conflict, ResolutionStrategy::Merge, None).unwrap();
        assert_eq!(
            item.data,
            json!({"title": "client", "local": true, "remote": true})
        );
    }

    #[test]
    fn merge_of_non_objects_degrades_to_client() {
        let mut conflict = make_conflict(0);
        conflict.server_data = json!("scalar");
        let item = resolve(&conflict, ResolutionStrategy::Merge, None).unwrap();
        assert_eq!(item.data, conflict.client_data);
    }

    #[test]
    fn resolution_stamps_status_and_version() {
        let conflict = make_conflict(0);
        let item = resolve(&conflict, ResolutionStrategy::ServerWins, None).unwrap();

        assert_eq!(item.sync_status, Some(SyncStatus::Pending));
        assert_eq!(item.conflict_status, Some(ConflictStatus::Resolved));
        assert_eq!(item.version, Some(8));
    }

    #[test]
    fn version_absent_when_server_version_unknown() {
        let mut conflict = make_conflict(0);
        conflict.server_version = None;
        let item = resolve(&conflict, ResolutionStrategy::ClientWins, None).unwrap();
        assert_eq!(item.version, None);
    }

    #[test]
    fn mark_resolved_records_strategy() {
        let mut conflict = make_conflict(0);
        conflict.mark_resolved(ResolutionStrategy::ServerWins, json!({"title": "server"}));
        assert!(conflict.resolved);
        assert_eq!(conflict.resolution, Some(ResolutionStrategy::ServerWins));
    }

    #[test]
    fn strategy_auto_resolution() {
        assert!(ResolutionStrategy::ServerWins.auto_resolves());
        assert!(ResolutionStrategy::Merge.auto_resolves());
        assert!(!ResolutionStrategy::Manual.auto_resolves());
    }
}
