//! The sync orchestrator.

use crate::backoff::backoff_delay;
use crate::batch::{build_batches, coalesce, prioritize, Batch};
use crate::cancel::CancelToken;
use crate::channel::{PushChannel, PushChannelHandle};
use crate::config::{EngineConfig, ResolvedOptions, SyncMode, SyncOptions};
use crate::error::{EngineError, EngineResult};
use crate::events::{EventBus, SubscriptionId, SyncEvent, SyncListener};
use crate::network::{should_sync, NetworkMonitor, NetworkStatus};
use crate::state::{SyncReport, SyncState, SyncStats};
use crate::transport::Transport;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use syncline_protocol::{
    resolve, Conflict, Operation, PullRequest, PushRequest, PushResponse, QueueEntry,
    ResolutionStrategy, ResolveRequest, SyncItem,
};
use syncline_store::QueueStore;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

struct EngineInner<T, Q, N> {
    config: EngineConfig,
    transport: Arc<T>,
    queue: Arc<Q>,
    monitor: Arc<N>,
    events: Arc<EventBus>,
    state: RwLock<SyncState>,
    paused: AtomicBool,
    cancel: CancelToken,
    conflicts: RwLock<HashMap<(String, String), Conflict>>,
    last_sync_time: RwLock<Option<DateTime<Utc>>>,
    items_pushed: AtomicU64,
    items_pulled: AtomicU64,
    bytes_uploaded: AtomicU64,
    bytes_downloaded: AtomicU64,
    cycles_completed: AtomicU64,
}

/// The sync engine orchestrates reconciliation with a remote authority.
///
/// One logical sync runs at a time per instance; concurrent `sync` calls
/// fail fast with [`EngineError::SyncInProgress`]. All mutable state —
/// the conflict set, listener registry, counters — is owned by the
/// instance, so independent sessions are independent instances.
///
/// The engine is a cheap clone handle over shared state, so background
/// triggers (opportunistic, periodic, reconnect) can hold their own copy.
/// It is generic over its collaborators: a [`Transport`], a durable
/// [`QueueStore`], and a [`NetworkMonitor`].
pub struct SyncEngine<T, Q, N> {
    inner: Arc<EngineInner<T, Q, N>>,
}

impl<T, Q, N> Clone for SyncEngine<T, Q, N> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T, Q, N> SyncEngine<T, Q, N>
where
    T: Transport + 'static,
    Q: QueueStore + 'static,
    N: NetworkMonitor + 'static,
{
    /// Creates a new engine.
    pub fn new(config: EngineConfig, transport: T, queue: Q, monitor: N) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                config,
                transport: Arc::new(transport),
                queue: Arc::new(queue),
                monitor: Arc::new(monitor),
                events: Arc::new(EventBus::new()),
                state: RwLock::new(SyncState::Idle),
                paused: AtomicBool::new(false),
                cancel: CancelToken::new(),
                conflicts: RwLock::new(HashMap::new()),
                last_sync_time: RwLock::new(None),
                items_pushed: AtomicU64::new(0),
                items_pulled: AtomicU64::new(0),
                bytes_uploaded: AtomicU64::new(0),
                bytes_downloaded: AtomicU64::new(0),
                cycles_completed: AtomicU64::new(0),
            }),
        }
    }

    /// Current state.
    pub fn status(&self) -> SyncState {
        *self.inner.state.read()
    }

    /// Current connectivity snapshot, read fresh from the monitor.
    pub fn network_status(&self) -> NetworkStatus {
        self.inner.monitor.status()
    }

    /// Returns true when the monitor reports a route to the server.
    pub fn is_online(&self) -> bool {
        self.inner.monitor.status().online
    }

    /// Returns true when the durable queue holds pending entries.
    pub fn has_unsynced_changes(&self) -> EngineResult<bool> {
        Ok(!self.inner.queue.is_empty()?)
    }

    /// Registers an event listener.
    pub fn subscribe(&self, listener: Arc<dyn SyncListener>) -> SubscriptionId {
        self.inner.events.subscribe(listener)
    }

    /// Removes an event listener.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.events.unsubscribe(id)
    }

    /// The engine's event bus.
    pub fn events(&self) -> &Arc<EventBus> {
        &self.inner.events
    }

    /// The transport collaborator.
    pub fn transport(&self) -> &T {
        self.inner.transport.as_ref()
    }

    /// The durable queue store collaborator.
    pub fn queue(&self) -> &Q {
        self.inner.queue.as_ref()
    }

    /// The network monitor collaborator.
    pub fn monitor(&self) -> &N {
        self.inner.monitor.as_ref()
    }

    /// Suspends automatic triggers without touching an in-flight cycle.
    pub fn pause(&self) {
        self.inner.paused.store(true, Ordering::SeqCst);
        self.inner.events.emit(&SyncEvent::Paused);
    }

    /// Resumes automatic triggers.
    pub fn resume(&self) {
        self.inner.paused.store(false, Ordering::SeqCst);
        self.inner.events.emit(&SyncEvent::Resumed);
    }

    /// Returns true while automatic triggers are suspended.
    pub fn is_paused(&self) -> bool {
        self.inner.paused.load(Ordering::SeqCst)
    }

    /// Cancels the in-flight cycle cooperatively.
    ///
    /// Requests already issued may complete; their results are discarded.
    pub fn abort(&self) {
        self.inner.cancel.cancel();
        if self.status().is_active() {
            self.set_state(SyncState::Aborted);
        }
        self.inner.events.emit(&SyncEvent::Aborted);
    }

    /// Recomputes statistics from queue contents plus counters.
    pub fn stats(&self) -> EngineResult<SyncStats> {
        let entries = self.inner.queue.load()?;
        let mut pending_by_collection: HashMap<String, usize> = HashMap::new();
        let mut failed_count = 0;
        for entry in &entries {
            *pending_by_collection
                .entry(entry.collection_name.clone())
                .or_insert(0) += 1;
            if entry.retry_count > 0 {
                failed_count += 1;
            }
        }

        Ok(SyncStats {
            pending_count: entries.len(),
            failed_count,
            conflict_count: self.inner.conflicts.read().len(),
            last_sync_time: *self.inner.last_sync_time.read(),
            pending_by_collection,
            items_pushed: self.inner.items_pushed.load(Ordering::Relaxed),
            items_pulled: self.inner.items_pulled.load(Ordering::Relaxed),
            bytes_uploaded: self.inner.bytes_uploaded.load(Ordering::Relaxed),
            bytes_downloaded: self.inner.bytes_downloaded.load(Ordering::Relaxed),
            cycles_completed: self.inner.cycles_completed.load(Ordering::Relaxed),
        })
    }

    /// Durably enqueues a mutation; never fails for sync-related reasons.
    ///
    /// In auto/opportunistic mode while online, a best-effort background
    /// cycle is kicked off; its failure is logged and swallowed.
    pub fn enqueue(&self, item: &SyncItem, operation: Operation) -> EngineResult<QueueEntry> {
        let entry = QueueEntry::new(item, operation);
        self.inner.queue.insert(entry.clone())?;
        self.inner.events.emit(&SyncEvent::QueueChanged {
            pending: self.inner.queue.len()?,
        });

        if self.inner.config.mode.triggers_on_enqueue() && !self.is_paused() && self.is_online() {
            self.spawn_background_sync("opportunistic");
        }

        Ok(entry)
    }

    /// Removes every queued entry for one logical record.
    pub fn remove_from_queue(&self, collection: &str, id: &str) -> EngineResult<usize> {
        let removed = self.inner.queue.remove_by_identity(collection, id)?;
        if removed > 0 {
            self.inner.events.emit(&SyncEvent::QueueChanged {
                pending: self.inner.queue.len()?,
            });
        }
        Ok(removed)
    }

    /// Wipes the queue, or one collection's share of it.
    pub fn clear_queue(&self, collection: Option<&str>) -> EngineResult<usize> {
        let removed = self.inner.queue.clear(collection)?;
        self.inner.events.emit(&SyncEvent::QueueChanged {
            pending: self.inner.queue.len()?,
        });
        Ok(removed)
    }

    /// Unresolved conflicts, optionally filtered by collection.
    pub fn conflicts(&self, collection: Option<&str>) -> Vec<Conflict> {
        self.inner
            .conflicts
            .read()
            .values()
            .filter(|c| collection.map_or(true, |name| c.collection_name == name))
            .cloned()
            .collect()
    }

    /// Resolves a tracked conflict.
    ///
    /// Attempts an immediate server update; when that fails or the client
    /// is offline, the resolved item is re-queued for a later push. The
    /// conflict leaves the tracked set either way.
    pub async fn resolve_conflict(
        &self,
        collection: &str,
        id: &str,
        strategy: ResolutionStrategy,
        custom_data: Option<serde_json::Value>,
    ) -> EngineResult<SyncItem> {
        let key = (collection.to_string(), id.to_string());
        let conflict = self
            .inner
            .conflicts
            .read()
            .get(&key)
            .cloned()
            .ok_or_else(|| EngineError::ConflictNotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            })?;

        let resolved_item = resolve(&conflict, strategy, custom_data)?;
        let request = ResolveRequest {
            data: resolved_item.data.clone(),
            resolution: strategy,
        };

        let immediate = if self.is_online() {
            self.inner
                .transport
                .resolve_item(collection, id, &request)
                .await
        } else {
            Err(EngineError::NetworkUnavailable)
        };

        match immediate {
            Ok(_) => {
                // Server is authoritative again; stale queued entries go away.
                self.inner.queue.remove_by_identity(collection, id)?;
            }
            Err(e) => {
                tracing::warn!(
                    collection,
                    id,
                    error = %e,
                    "immediate conflict update failed; re-queuing resolved item"
                );
                self.inner.queue.remove_by_identity(collection, id)?;
                self.inner
                    .queue
                    .insert(QueueEntry::new(&resolved_item, Operation::Update))?;
            }
        }

        self.inner.conflicts.write().remove(&key);
        self.inner.events.emit(&SyncEvent::ConflictResolved {
            collection: collection.to_string(),
            id: id.to_string(),
        });
        self.inner.events.emit(&SyncEvent::QueueChanged {
            pending: self.inner.queue.len()?,
        });

        Ok(resolved_item)
    }

    /// Fetches the single authoritative record, bypassing the queue.
    pub async fn sync_item(&self, collection: &str, id: &str) -> EngineResult<Option<SyncItem>> {
        self.inner.transport.fetch_item(collection, id).await
    }

    /// Runs a cycle restricted to one collection.
    pub async fn sync_collection(
        &self,
        collection: &str,
        mut options: SyncOptions,
    ) -> EngineResult<SyncReport> {
        options.collections = Some(vec![collection.to_string()]);
        self.sync(options).await
    }

    /// Runs one sync cycle.
    ///
    /// Network ineligibility, abort, and operational failures are
    /// embedded in the returned report; `Err` is reserved for the
    /// already-running precondition.
    pub async fn sync(&self, options: SyncOptions) -> EngineResult<SyncReport> {
        let from = {
            let mut state = self.inner.state.write();
            if state.is_active() {
                return Err(EngineError::SyncInProgress);
            }
            let from = *state;
            *state = SyncState::Connecting;
            from
        };
        self.inner.events.emit(&SyncEvent::StateChanged {
            from,
            to: SyncState::Connecting,
        });

        self.inner.cancel.reset();
        let started = Instant::now();
        let mut report = SyncReport::new();

        let status = self.inner.monitor.status();
        if !should_sync(&status, None, &self.inner.config.policy) {
            tracing::info!("sync declined by network policy");
            self.set_state(SyncState::Offline);
            return Ok(self.finish(report, Some(EngineError::NetworkUnavailable), started));
        }

        let resolved = options.merge_onto(&self.inner.config);
        self.inner.events.emit(&SyncEvent::Started {
            collections: resolved.collections.clone(),
        });
        self.set_state(SyncState::Syncing);

        if resolved.direction.includes_download() {
            match self.download(&resolved, &mut report).await {
                Ok(()) => {}
                Err(EngineError::Aborted) => {
                    return Ok(self.finish_aborted(report, started));
                }
                Err(e) if e.is_fatal_for_cycle() => {
                    self.set_state(SyncState::Error);
                    return Ok(self.finish(report, Some(e), started));
                }
                Err(e) => {
                    // Download failures other than authentication do not
                    // block the upload.
                    tracing::warn!(error = %e, "download failed; continuing with upload");
                    self.inner.events.emit(&SyncEvent::Error {
                        message: e.to_string(),
                    });
                    report.errors.push(e.to_string());
                }
            }
        }

        if self.inner.cancel.is_cancelled() {
            return Ok(self.finish_aborted(report, started));
        }

        if resolved.direction.includes_upload() {
            match self.upload(&resolved, &mut report).await {
                Ok(()) => {}
                Err(EngineError::Aborted) => {
                    return Ok(self.finish_aborted(report, started));
                }
                Err(e) => {
                    self.set_state(SyncState::Error);
                    return Ok(self.finish(report, Some(e), started));
                }
            }
        }

        self.inner.cycles_completed.fetch_add(1, Ordering::Relaxed);
        self.set_state(SyncState::Completed);
        let report = self.finish(report, None, started);
        self.inner.events.emit(&SyncEvent::Completed {
            stats: report.stats.clone(),
        });
        Ok(report)
    }

    /// Runs cycles until one succeeds, backing off between retryable
    /// failures.
    pub async fn sync_with_retry(&self, options: SyncOptions) -> EngineResult<SyncReport> {
        let retry = self.inner.config.retry.clone();
        let attempts = retry.max_attempts.max(1);

        for attempt in 0..attempts {
            if attempt > 0 {
                let delay = backoff_delay(attempt - 1, retry.base_delay, retry.max_delay);
                tracing::debug!(attempt, ?delay, "waiting before sync retry");
                tokio::time::sleep(delay).await;
            }

            let report = self.sync(options.clone()).await?;
            let retryable = report.error.as_ref().map_or(false, |e| {
                e.is_retryable() || matches!(e, EngineError::NetworkUnavailable)
            });
            if !retryable || attempt + 1 == attempts {
                return Ok(report);
            }
        }

        unreachable!("retry loop returns on its final attempt");
    }

    /// Spawns the periodic trigger task, honoring pause/resume.
    ///
    /// Returns `None` unless the mode is periodic and an interval is
    /// configured. Stop the task by aborting the returned handle.
    pub fn start_periodic(&self) -> Option<tokio::task::JoinHandle<()>> {
        if self.inner.config.mode != SyncMode::Periodic {
            return None;
        }
        let interval = self.inner.config.sync_interval?;
        let engine = self.clone();

        Some(tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                if engine.is_paused() {
                    continue;
                }
                match engine.sync(SyncOptions::default()).await {
                    Ok(report) if report.is_success() => {}
                    Ok(report) => tracing::debug!(error = ?report.error, "periodic sync failed"),
                    Err(e) => tracing::debug!(error = %e, "periodic sync rejected"),
                }
            }
        }))
    }

    /// Feeds a connectivity change into the engine.
    ///
    /// Going offline forces [`SyncState::Offline`] and cancels any
    /// in-flight attempt; coming back online triggers a best-effort
    /// background cycle in every mode but manual.
    pub fn handle_network_change(&self, online: bool) {
        if !online {
            if self.status().is_active() {
                self.inner.cancel.cancel();
            }
            self.set_state(SyncState::Offline);
            return;
        }

        if self.status() == SyncState::Offline {
            self.set_state(SyncState::Idle);
        }
        if self.inner.config.mode != SyncMode::Manual && !self.is_paused() {
            self.spawn_background_sync("reconnect");
        }
    }

    /// Attaches a duplex push channel feeding this engine's event bus.
    pub async fn connect_push_channel(&self, url: &str) -> EngineResult<PushChannelHandle> {
        PushChannel::new(url)
            .connect(Arc::clone(&self.inner.events))
            .await
    }

    // --- cycle internals ---

    fn spawn_background_sync(&self, trigger: &'static str) {
        let engine = self.clone();
        tokio::spawn(async move {
            match engine.sync(SyncOptions::default()).await {
                Ok(report) if report.is_success() => {}
                Ok(report) => {
                    tracing::debug!(trigger, error = ?report.error, "background sync failed")
                }
                Err(e) => tracing::debug!(trigger, error = %e, "background sync rejected"),
            }
        });
    }

    fn set_state(&self, to: SyncState) {
        let from = {
            let mut state = self.inner.state.write();
            let from = *state;
            *state = to;
            from
        };
        if from != to {
            self.inner.events.emit(&SyncEvent::StateChanged { from, to });
        }
    }

    fn finish(
        &self,
        mut report: SyncReport,
        error: Option<EngineError>,
        started: Instant,
    ) -> SyncReport {
        if let Some(e) = &error {
            self.inner.events.emit(&SyncEvent::Error {
                message: e.to_string(),
            });
        }
        report.error = error;
        report.duration = started.elapsed();
        report.stats = self.stats().unwrap_or_default();
        report
    }

    fn finish_aborted(&self, report: SyncReport, started: Instant) -> SyncReport {
        self.set_state(SyncState::Idle);
        self.finish(report, Some(EngineError::Aborted), started)
    }

    async fn download(
        &self,
        resolved: &ResolvedOptions,
        report: &mut SyncReport,
    ) -> EngineResult<()> {
        self.inner.cancel.check()?;

        let since = (*self.inner.last_sync_time.read()).unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
        let mut request = PullRequest::since(since).with_compression(self.inner.config.compress);
        if let Some(collections) = &resolved.collections {
            request = request.with_collections(collections.clone());
        }

        let response = self.inner.transport.pull(&request).await?;
        // A response that lands after an abort is discarded, not applied.
        self.inner.cancel.check()?;

        let pulled = response.changes.len() as u64;
        report.pulled += pulled;
        self.inner.items_pulled.fetch_add(pulled, Ordering::Relaxed);
        self.inner
            .bytes_downloaded
            .fetch_add(response.byte_size, Ordering::Relaxed);
        *self.inner.last_sync_time.write() = Some(response.timestamp);

        tracing::debug!(
            changed = response.changes.len(),
            deleted = response.deleted_items.len(),
            "pulled remote changes"
        );
        self.inner.events.emit(&SyncEvent::RemoteChanges {
            changed: response.changes.len(),
            deleted: response.deleted_items.len(),
        });

        Ok(())
    }

    async fn upload(
        &self,
        resolved: &ResolvedOptions,
        report: &mut SyncReport,
    ) -> EngineResult<()> {
        let all = self.inner.queue.load()?;
        let entries: Vec<QueueEntry> = match &resolved.collections {
            Some(collections) => all
                .into_iter()
                .filter(|e| collections.contains(&e.collection_name))
                .collect(),
            None => all,
        };

        let (mut entries, superseded) = coalesce(entries);
        for id in superseded {
            self.inner.queue.remove(id)?;
        }
        prioritize(&mut entries);

        let total = entries.len();
        if total == 0 {
            return Ok(());
        }

        let batches = build_batches(
            entries,
            self.inner.config.batch_size,
            &self.inner.config.collection_priorities,
        );

        let semaphore = Arc::new(Semaphore::new(self.inner.config.max_concurrent_requests));
        let mut tasks: JoinSet<(Batch, EngineResult<PushResponse>)> = JoinSet::new();
        for batch in batches {
            let transport = Arc::clone(&self.inner.transport);
            let semaphore = Arc::clone(&semaphore);
            let cancel = self.inner.cancel.clone();
            let compress = self.inner.config.compress;
            tasks.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return (batch, Err(EngineError::Aborted));
                };
                if let Err(e) = cancel.check() {
                    return (batch, Err(e));
                }
                let request = PushRequest::new(batch.entries.clone(), compress);
                let result = transport.push(&request).await;
                (batch, result)
            });
        }

        let mut processed = 0usize;
        let mut fatal: Option<EngineError> = None;
        while let Some(joined) = tasks.join_next().await {
            let Ok((batch, result)) = joined else {
                report.errors.push("push task failed to complete".into());
                continue;
            };
            processed += batch.len();

            let discard = fatal.is_some()
                || (self.inner.cancel.is_cancelled()
                    && !matches!(result, Err(EngineError::Aborted)));
            if discard {
                self.emit_progress(processed, total);
                continue;
            }

            match result {
                Ok(response) => {
                    self.apply_push_response(&batch, response, resolved, report)
                        .await?;
                }
                Err(EngineError::Aborted) => {
                    // Batch was never sent; its entries stay untouched.
                }
                Err(e) => {
                    let message = e.to_string();
                    for entry in &batch.entries {
                        let mut entry = entry.clone();
                        entry.record_failure(&message);
                        self.inner.queue.update(&entry)?;
                    }
                    self.inner.events.emit(&SyncEvent::Error {
                        message: message.clone(),
                    });
                    report.errors.push(message);

                    if e.is_fatal_for_cycle() {
                        self.inner.cancel.cancel();
                        fatal = Some(e);
                    }
                }
            }
            self.emit_progress(processed, total);
        }

        if let Some(e) = fatal {
            return Err(e);
        }
        self.inner.cancel.check()?;
        Ok(())
    }

    async fn apply_push_response(
        &self,
        batch: &Batch,
        response: PushResponse,
        resolved: &ResolvedOptions,
        report: &mut SyncReport,
    ) -> EngineResult<()> {
        if !response.success && response.failed.is_empty() && response.conflicts.is_empty() {
            let message = response
                .error
                .unwrap_or_else(|| "push rejected by server".to_string());
            for entry in &batch.entries {
                let mut entry = entry.clone();
                entry.record_failure(&message);
                self.inner.queue.update(&entry)?;
            }
            self.inner.events.emit(&SyncEvent::Error {
                message: message.clone(),
            });
            report.errors.push(message);
            return Ok(());
        }

        let uploaded = if response.byte_size > 0 {
            response.byte_size
        } else {
            batch.entries.iter().map(|e| e.payload_size() as u64).sum()
        };
        self.inner
            .bytes_uploaded
            .fetch_add(uploaded, Ordering::Relaxed);

        let failed: HashSet<&str> = response.failed.iter().map(String::as_str).collect();
        let conflicted: HashSet<(&str, &str)> = response
            .conflicts
            .iter()
            .map(|c| (c.collection_name.as_str(), c.id.as_str()))
            .collect();

        for entry in &batch.entries {
            if failed.contains(entry.item_id.as_str()) {
                let mut entry = entry.clone();
                entry.record_failure("rejected by server");
                self.inner.queue.update(&entry)?;
            } else if conflicted.contains(&entry.identity()) {
                // Conflicted entries stay queued; resolution decides.
            } else if self.inner.queue.remove(entry.id)? {
                report.pushed += 1;
                self.inner.items_pushed.fetch_add(1, Ordering::Relaxed);
            }
        }

        for conflict in response.conflicts {
            report.conflicts += 1;
            let key = (conflict.collection_name.clone(), conflict.id.clone());
            self.inner
                .conflicts
                .write()
                .insert(key.clone(), conflict.clone());
            self.inner.events.emit(&SyncEvent::ConflictDetected { conflict });

            if self.inner.config.auto_resolve_conflicts && resolved.resolution.auto_resolves() {
                if let Err(e) = self
                    .resolve_conflict(&key.0, &key.1, resolved.resolution, None)
                    .await
                {
                    tracing::warn!(
                        collection = %key.0,
                        id = %key.1,
                        error = %e,
                        "automatic conflict resolution failed"
                    );
                    report.errors.push(format!("auto-resolve failed: {e}"));
                }
            }
        }

        self.inner.events.emit(&SyncEvent::QueueChanged {
            pending: self.inner.queue.len()?,
        });
        Ok(())
    }

    fn emit_progress(&self, processed: usize, total: usize) {
        let percentage = if total == 0 {
            100.0
        } else {
            processed as f32 / total as f32 * 100.0
        };
        self.inner.events.emit(&SyncEvent::Progress {
            processed,
            total,
            percentage,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::StaticMonitor;
    use crate::transport::MockTransport;
    use serde_json::json;
    use syncline_store::MemoryQueueStore;

    fn make_engine(
        config: EngineConfig,
        transport: MockTransport,
        monitor: StaticMonitor,
    ) -> SyncEngine<MockTransport, MemoryQueueStore, StaticMonitor> {
        SyncEngine::new(config, transport, MemoryQueueStore::new(), monitor)
    }

    #[test]
    fn initial_state_is_idle() {
        let engine = make_engine(
            EngineConfig::new("https://sync.test"),
            MockTransport::new(),
            StaticMonitor::online(),
        );
        assert_eq!(engine.status(), SyncState::Idle);
        assert!(!engine.is_paused());
    }

    #[tokio::test]
    async fn concurrent_sync_fails_fast() {
        let transport = MockTransport::new();
        transport.set_push_delay(std::time::Duration::from_millis(200));
        let engine = make_engine(
            EngineConfig::new("https://sync.test"),
            transport,
            StaticMonitor::online(),
        );

        let item = SyncItem::new("lessons", "L1", json!({"n": 1}));
        engine.enqueue(&item, Operation::Create).unwrap();

        let racer = engine.clone();
        let running = tokio::spawn(async move { racer.sync(SyncOptions::default()).await });

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        let second = engine.sync(SyncOptions::default()).await;
        assert!(matches!(second, Err(EngineError::SyncInProgress)));

        let first = running.await.unwrap().unwrap();
        assert!(first.is_success());
    }

    #[tokio::test]
    async fn pause_and_resume_toggle_the_flag() {
        let engine = make_engine(
            EngineConfig::new("https://sync.test"),
            MockTransport::new(),
            StaticMonitor::online(),
        );

        engine.pause();
        assert!(engine.is_paused());
        engine.resume();
        assert!(!engine.is_paused());
    }

    #[tokio::test]
    async fn network_down_forces_offline() {
        let engine = make_engine(
            EngineConfig::new("https://sync.test"),
            MockTransport::new(),
            StaticMonitor::online(),
        );

        engine.handle_network_change(false);
        assert_eq!(engine.status(), SyncState::Offline);

        engine.handle_network_change(true);
        assert_eq!(engine.status(), SyncState::Idle);
    }

    #[tokio::test]
    async fn resolve_conflict_without_tracking_fails() {
        let engine = make_engine(
            EngineConfig::new("https://sync.test"),
            MockTransport::new(),
            StaticMonitor::online(),
        );

        let result = engine
            .resolve_conflict("lessons", "ghost", ResolutionStrategy::ServerWins, None)
            .await;
        assert!(matches!(result, Err(EngineError::ConflictNotFound { .. })));
    }

    #[tokio::test]
    async fn sync_item_bypasses_the_queue() {
        let transport = MockTransport::new();
        let item = SyncItem::new("lessons", "L1", json!({"title": "authoritative"}));
        transport.enqueue_fetch(Ok(Some(item.clone())));

        let engine = make_engine(
            EngineConfig::new("https://sync.test"),
            transport,
            StaticMonitor::online(),
        );

        let fetched = engine.sync_item("lessons", "L1").await.unwrap();
        assert_eq!(fetched, Some(item));
        assert!(!engine.has_unsynced_changes().unwrap());
    }
}
