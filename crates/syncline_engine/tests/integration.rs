//! End-to-end engine tests against a scripted transport.

use parking_lot::Mutex;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use syncline_engine::{
    EngineConfig, EngineError, MockTransport, StaticMonitor, SyncEngine, SyncEvent, SyncOptions,
    SyncState,
};
use syncline_protocol::{
    Conflict, Operation, Priority, PushResponse, ResolutionStrategy, SyncItem,
};
use syncline_store::MemoryQueueStore;

type TestEngine = SyncEngine<MockTransport, MemoryQueueStore, StaticMonitor>;

fn make_engine(config: EngineConfig, transport: MockTransport, monitor: StaticMonitor) -> TestEngine {
    SyncEngine::new(config, transport, MemoryQueueStore::new(), monitor)
}

fn make_item(collection: &str, id: &str, data: serde_json::Value) -> SyncItem {
    SyncItem::new(collection, id, data)
}

fn make_conflict(collection: &str, id: &str) -> Conflict {
    let now = chrono::Utc::now();
    Conflict {
        id: id.to_string(),
        collection_name: collection.to_string(),
        client_data: json!({"title": "client"}),
        server_data: json!({"title": "server"}),
        client_timestamp: now - chrono::Duration::seconds(10),
        server_timestamp: now,
        server_version: Some(4),
        resolved: false,
        resolution: None,
        resolved_data: None,
    }
}

#[tokio::test]
async fn push_success_drains_queue() {
    let engine = make_engine(
        EngineConfig::new("https://sync.test"),
        MockTransport::new(),
        StaticMonitor::online(),
    );

    engine
        .enqueue(&make_item("lessons", "L1", json!({"title": "t"})), Operation::Create)
        .unwrap();
    assert!(engine.has_unsynced_changes().unwrap());

    let report = engine.sync(SyncOptions::default()).await.unwrap();

    assert!(report.is_success());
    assert_eq!(report.pushed, 1);
    assert!(!engine.has_unsynced_changes().unwrap());
    assert_eq!(engine.status(), SyncState::Completed);
    assert_eq!(engine.stats().unwrap().items_pushed, 1);
}

#[tokio::test]
async fn partial_batch_failure_retries_only_rejected_entries() {
    let transport = MockTransport::new();
    transport.enqueue_push(Ok(PushResponse::with_failed(2, vec!["id2".to_string()])));

    let engine = make_engine(
        EngineConfig::new("https://sync.test"),
        transport,
        StaticMonitor::online(),
    );

    for id in ["id1", "id2", "id3"] {
        engine
            .enqueue(&make_item("lessons", id, json!({"id": id})), Operation::Update)
            .unwrap();
    }

    let report = engine.sync(SyncOptions::default()).await.unwrap();
    assert!(report.is_success());
    assert_eq!(report.pushed, 2);

    let stats = engine.stats().unwrap();
    assert_eq!(stats.pending_count, 1);
    assert_eq!(stats.failed_count, 1);

    // Only the rejected entry remains, with its retry bookkeeping bumped.
    let remaining = engine.stats().unwrap();
    assert_eq!(remaining.pending_by_collection.get("lessons"), Some(&1));
}

#[tokio::test]
async fn conflict_surfaced_and_auto_resolved_server_wins() {
    let transport = MockTransport::new();
    let conflict = make_conflict("lessons", "L1");
    transport.enqueue_push(Ok(PushResponse::with_conflicts(0, vec![conflict])));

    let engine = make_engine(
        EngineConfig::new("https://sync.test")
            .with_default_resolution(ResolutionStrategy::ServerWins)
            .with_auto_resolve(true),
        transport,
        StaticMonitor::online(),
    );

    engine
        .enqueue(&make_item("lessons", "L1", json!({"title": "client"})), Operation::Update)
        .unwrap();

    let report = engine.sync(SyncOptions::default()).await.unwrap();
    assert!(report.is_success());
    assert_eq!(report.conflicts, 1);

    // The conflict set is empty and the server's data was pushed back.
    assert!(engine.conflicts(None).is_empty());
    assert!(!engine.has_unsynced_changes().unwrap());

    let resolve_calls = engine_transport(&engine).resolve_calls();
    assert_eq!(resolve_calls.len(), 1);
    assert_eq!(resolve_calls[0].2.data, json!({"title": "server"}));
    assert_eq!(resolve_calls[0].2.resolution, ResolutionStrategy::ServerWins);
}

#[tokio::test]
async fn offline_sync_short_circuits_without_touching_the_queue() {
    let engine = make_engine(
        EngineConfig::new("https://sync.test"),
        MockTransport::new(),
        StaticMonitor::offline(),
    );

    engine
        .enqueue(&make_item("lessons", "L1", json!({})), Operation::Create)
        .unwrap();

    let report = engine.sync(SyncOptions::default()).await.unwrap();

    assert!(matches!(report.error, Some(EngineError::NetworkUnavailable)));
    assert_eq!(engine.status(), SyncState::Offline);
    assert_eq!(engine.stats().unwrap().pending_count, 1);
    assert_eq!(engine_transport(&engine).pull_count(), 0);
    assert!(engine_transport(&engine).pushed_requests().is_empty());
}

#[tokio::test]
async fn duplicate_enqueues_coalesce_to_latest_state() {
    let engine = make_engine(
        EngineConfig::new("https://sync.test"),
        MockTransport::new(),
        StaticMonitor::online(),
    );

    engine
        .enqueue(&make_item("lessons", "L1", json!({"rev": 1})), Operation::Create)
        .unwrap();
    engine
        .enqueue(&make_item("lessons", "L1", json!({"rev": 2})), Operation::Update)
        .unwrap();
    engine
        .enqueue(&make_item("lessons", "L1", json!({"rev": 3})), Operation::Update)
        .unwrap();

    let report = engine.sync(SyncOptions::default()).await.unwrap();
    assert!(report.is_success());
    assert_eq!(report.pushed, 1);

    let pushed = engine_transport(&engine).pushed_requests();
    assert_eq!(pushed.len(), 1);
    assert_eq!(pushed[0].items.len(), 1);
    assert_eq!(pushed[0].items[0].operation, Operation::Create);
    assert_eq!(pushed[0].items[0].data, Some(json!({"rev": 3})));
    assert!(!engine.has_unsynced_changes().unwrap());
}

#[tokio::test]
async fn transmission_order_follows_priority_then_age() {
    let engine = make_engine(
        EngineConfig::new("https://sync.test"),
        MockTransport::new(),
        StaticMonitor::online(),
    );

    let plan = [
        ("low", Priority::Low),
        ("crit-old", Priority::Critical),
        ("medium", Priority::Medium),
        ("high", Priority::High),
        ("crit-new", Priority::Critical),
    ];
    for (id, priority) in plan {
        let item = make_item("lessons", id, json!({"id": id})).with_priority(priority);
        engine.enqueue(&item, Operation::Update).unwrap();
    }

    engine.sync(SyncOptions::default()).await.unwrap();

    let pushed = engine_transport(&engine).pushed_requests();
    assert_eq!(pushed.len(), 1);
    let order: Vec<&str> = pushed[0].items.iter().map(|e| e.item_id.as_str()).collect();
    assert_eq!(order, vec!["crit-old", "crit-new", "high", "medium", "low"]);
}

#[tokio::test]
async fn download_failure_does_not_block_upload() {
    let transport = MockTransport::new();
    transport.enqueue_pull(Err(EngineError::Timeout));

    let engine = make_engine(
        EngineConfig::new("https://sync.test"),
        transport,
        StaticMonitor::online(),
    );
    engine
        .enqueue(&make_item("lessons", "L1", json!({})), Operation::Create)
        .unwrap();

    let report = engine.sync(SyncOptions::default()).await.unwrap();

    assert!(report.is_success());
    assert_eq!(report.pushed, 1);
    assert!(!report.errors.is_empty());
    assert!(!engine.has_unsynced_changes().unwrap());
}

#[tokio::test]
async fn authentication_failure_on_pull_aborts_the_cycle() {
    let transport = MockTransport::new();
    transport.enqueue_pull(Err(EngineError::Auth("token expired".into())));

    let engine = make_engine(
        EngineConfig::new("https://sync.test"),
        transport,
        StaticMonitor::online(),
    );
    engine
        .enqueue(&make_item("lessons", "L1", json!({})), Operation::Create)
        .unwrap();

    let report = engine.sync(SyncOptions::default()).await.unwrap();

    assert!(matches!(report.error, Some(EngineError::Auth(_))));
    assert_eq!(engine.status(), SyncState::Error);
    assert!(engine_transport(&engine).pushed_requests().is_empty());
    assert_eq!(engine.stats().unwrap().pending_count, 1);
}

#[tokio::test]
async fn authentication_failure_on_push_halts_remaining_batches() {
    let transport = MockTransport::new();
    transport.enqueue_push(Err(EngineError::Auth("token expired".into())));

    let engine = make_engine(
        EngineConfig::new("https://sync.test")
            .with_batch_size(1)
            .with_max_concurrent_requests(1),
        transport,
        StaticMonitor::online(),
    );
    engine
        .enqueue(&make_item("lessons", "L1", json!({})), Operation::Update)
        .unwrap();
    engine
        .enqueue(&make_item("lessons", "L2", json!({})), Operation::Update)
        .unwrap();

    let report = engine.sync(SyncOptions::default()).await.unwrap();

    assert!(matches!(report.error, Some(EngineError::Auth(_))));
    assert_eq!(engine.status(), SyncState::Error);
    // Nothing was confirmed; both records remain queued.
    assert_eq!(engine.stats().unwrap().pending_count, 2);
}

#[tokio::test]
async fn abort_discards_in_flight_results() {
    let transport = MockTransport::new();
    transport.set_push_delay(Duration::from_millis(200));

    let engine = make_engine(
        EngineConfig::new("https://sync.test"),
        transport,
        StaticMonitor::online(),
    );
    engine
        .enqueue(&make_item("lessons", "L1", json!({})), Operation::Create)
        .unwrap();

    let running = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.sync(SyncOptions::default()).await })
    };

    tokio::time::sleep(Duration::from_millis(50)).await;
    engine.abort();

    let report = running.await.unwrap().unwrap();
    assert!(matches!(report.error, Some(EngineError::Aborted)));
    assert_eq!(engine.status(), SyncState::Idle);
    // The push completed on the wire but its result was not applied.
    assert!(engine.has_unsynced_changes().unwrap());
}

#[tokio::test]
async fn progress_is_monotonic_across_partial_failures() {
    let transport = MockTransport::new();
    transport.enqueue_push(Err(EngineError::Timeout));

    let engine = make_engine(
        EngineConfig::new("https://sync.test")
            .with_batch_size(1)
            .with_max_concurrent_requests(1),
        transport,
        StaticMonitor::online(),
    );
    for id in ["a", "b", "c", "d"] {
        engine
            .enqueue(&make_item("lessons", id, json!({})), Operation::Update)
            .unwrap();
    }

    let progress = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&progress);
    engine.subscribe(Arc::new(move |event: &SyncEvent| -> Result<(), String> {
        if let SyncEvent::Progress { processed, total, .. } = event {
            sink.lock().push((*processed, *total));
        }
        Ok(())
    }));

    let report = engine.sync(SyncOptions::default()).await.unwrap();
    assert!(report.is_success());

    let observed = progress.lock().clone();
    assert_eq!(observed.len(), 4);
    assert!(observed.windows(2).all(|w| w[0].0 < w[1].0));
    assert_eq!(observed.last(), Some(&(4, 4)));
}

#[tokio::test]
async fn manual_resolution_requires_custom_data() {
    let transport = MockTransport::new();
    transport.enqueue_push(Ok(PushResponse::with_conflicts(
        0,
        vec![make_conflict("lessons", "L1")],
    )));

    let engine = make_engine(
        EngineConfig::new("https://sync.test").with_auto_resolve(false),
        transport,
        StaticMonitor::online(),
    );
    engine
        .enqueue(&make_item("lessons", "L1", json!({"title": "client"})), Operation::Update)
        .unwrap();
    engine.sync(SyncOptions::default()).await.unwrap();
    assert_eq!(engine.conflicts(None).len(), 1);

    let missing = engine
        .resolve_conflict("lessons", "L1", ResolutionStrategy::Manual, None)
        .await;
    assert!(matches!(missing, Err(EngineError::Resolve(_))));
    // The misuse leaves the conflict tracked.
    assert_eq!(engine.conflicts(None).len(), 1);

    let resolved = engine
        .resolve_conflict(
            "lessons",
            "L1",
            ResolutionStrategy::Manual,
            Some(json!({"title": "hand-merged"})),
        )
        .await
        .unwrap();
    assert_eq!(resolved.data, json!({"title": "hand-merged"}));
    assert_eq!(resolved.version, Some(5));
    assert!(engine.conflicts(None).is_empty());
}

#[tokio::test]
async fn offline_resolution_requeues_the_resolved_item() {
    let transport = MockTransport::new();
    transport.enqueue_push(Ok(PushResponse::with_conflicts(
        0,
        vec![make_conflict("lessons", "L1")],
    )));

    let monitor = StaticMonitor::online();
    let engine = make_engine(
        EngineConfig::new("https://sync.test").with_auto_resolve(false),
        transport,
        monitor,
    );
    engine
        .enqueue(&make_item("lessons", "L1", json!({"title": "client"})), Operation::Update)
        .unwrap();
    engine.sync(SyncOptions::default()).await.unwrap();
    assert_eq!(engine.conflicts(None).len(), 1);

    engine.handle_network_change(false);
    engine_monitor(&engine).set(syncline_engine::NetworkStatus::offline());

    let resolved = engine
        .resolve_conflict("lessons", "L1", ResolutionStrategy::ClientWins, None)
        .await
        .unwrap();
    assert_eq!(resolved.data, json!({"title": "client"}));

    // No immediate server update happened; the resolved item is queued.
    assert!(engine_transport(&engine).resolve_calls().is_empty());
    assert!(engine.conflicts(None).is_empty());
    assert_eq!(engine.stats().unwrap().pending_count, 1);
}

#[tokio::test]
async fn scoped_sync_only_touches_requested_collections() {
    let engine = make_engine(
        EngineConfig::new("https://sync.test"),
        MockTransport::new(),
        StaticMonitor::online(),
    );
    engine
        .enqueue(&make_item("lessons", "L1", json!({})), Operation::Update)
        .unwrap();
    engine
        .enqueue(&make_item("notes", "N1", json!({})), Operation::Update)
        .unwrap();

    let report = engine
        .sync_collection("lessons", SyncOptions::default())
        .await
        .unwrap();
    assert!(report.is_success());
    assert_eq!(report.pushed, 1);

    let stats = engine.stats().unwrap();
    assert_eq!(stats.pending_count, 1);
    assert_eq!(stats.pending_by_collection.get("notes"), Some(&1));
}

#[tokio::test]
async fn pull_statistics_and_remote_change_events() {
    let transport = MockTransport::new();
    let timestamp = chrono::Utc::now();
    transport.enqueue_pull(Ok(syncline_protocol::PullResponse {
        changes: vec![
            make_item("lessons", "L1", json!({"v": 1})),
            make_item("lessons", "L2", json!({"v": 2})),
        ],
        deleted_items: vec![syncline_protocol::DeletedItem {
            collection_name: "lessons".into(),
            id: "L9".into(),
        }],
        timestamp,
        byte_size: 512,
    }));

    let engine = make_engine(
        EngineConfig::new("https://sync.test"),
        transport,
        StaticMonitor::online(),
    );

    let remote = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&remote);
    engine.subscribe(Arc::new(move |event: &SyncEvent| -> Result<(), String> {
        if let SyncEvent::RemoteChanges { changed, deleted } = event {
            sink.lock().push((*changed, *deleted));
        }
        Ok(())
    }));

    let report = engine.sync(SyncOptions::default()).await.unwrap();
    assert!(report.is_success());
    assert_eq!(report.pulled, 2);

    let stats = engine.stats().unwrap();
    assert_eq!(stats.items_pulled, 2);
    assert_eq!(stats.bytes_downloaded, 512);
    assert_eq!(stats.last_sync_time, Some(timestamp));
    assert_eq!(*remote.lock(), vec![(2, 1)]);
}

#[tokio::test]
async fn batch_network_failure_leaves_entries_retryable() {
    let transport = MockTransport::new();
    transport.enqueue_push(Err(EngineError::network_retryable("connection reset")));

    let engine = make_engine(
        EngineConfig::new("https://sync.test"),
        transport,
        StaticMonitor::online(),
    );
    engine
        .enqueue(&make_item("lessons", "L1", json!({})), Operation::Create)
        .unwrap();

    // The cycle itself completes; the batch failure is converted into
    // retry bookkeeping rather than a terminal error.
    let report = engine.sync(SyncOptions::default()).await.unwrap();
    assert!(report.is_success());
    assert!(!report.errors.is_empty());
    let stats = engine.stats().unwrap();
    assert_eq!(stats.pending_count, 1);
    assert_eq!(stats.failed_count, 1);

    // The next cycle drains the queue.
    let report = engine.sync(SyncOptions::default()).await.unwrap();
    assert!(report.is_success());
    assert!(!engine.has_unsynced_changes().unwrap());
}

#[tokio::test]
async fn sync_with_retry_waits_out_network_unavailability() {
    let monitor = Arc::new(StaticMonitor::offline());
    let engine: SyncEngine<MockTransport, MemoryQueueStore, Arc<StaticMonitor>> = SyncEngine::new(
        EngineConfig::new("https://sync.test").with_retry(
            syncline_engine::RetryConfig::new(3)
                .with_base_delay(Duration::from_millis(5))
                .with_max_delay(Duration::from_millis(20)),
        ),
        MockTransport::new(),
        MemoryQueueStore::new(),
        Arc::clone(&monitor),
    );
    engine
        .enqueue(&make_item("lessons", "L1", json!({})), Operation::Create)
        .unwrap();

    // Connectivity returns as soon as the first attempt reports failure.
    let flip = Arc::clone(&monitor);
    engine.subscribe(Arc::new(move |event: &SyncEvent| -> Result<(), String> {
        if matches!(event, SyncEvent::Error { .. }) {
            flip.set(syncline_engine::NetworkStatus::online(
                syncline_engine::NetworkType::Wifi,
            ));
        }
        Ok(())
    }));

    let report = engine.sync_with_retry(SyncOptions::default()).await.unwrap();
    assert!(report.is_success());
    assert!(!engine.has_unsynced_changes().unwrap());
}

fn engine_transport(engine: &TestEngine) -> &MockTransport {
    engine.transport()
}

fn engine_monitor(engine: &TestEngine) -> &StaticMonitor {
    engine.monitor()
}
