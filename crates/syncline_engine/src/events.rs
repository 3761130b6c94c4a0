//! Typed publish/subscribe surface for sync lifecycle events.

use crate::state::{SyncState, SyncStats};
use parking_lot::RwLock;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use syncline_protocol::Conflict;

/// Lifecycle events emitted by the engine.
///
/// Every error the engine returns is also emitted as
/// [`SyncEvent::Error`], so passive observers and active callers observe
/// the same failures.
#[derive(Debug, Clone)]
pub enum SyncEvent {
    /// A sync cycle began.
    Started {
        /// Collection filter of the cycle, when scoped.
        collections: Option<Vec<String>>,
    },
    /// A batch finished (successfully or not).
    Progress {
        /// Entries attempted so far.
        processed: usize,
        /// Entries in this cycle.
        total: usize,
        /// `processed / total` as a percentage.
        percentage: f32,
    },
    /// A sync cycle finished cleanly.
    Completed {
        /// Statistics snapshot at completion.
        stats: SyncStats,
    },
    /// The engine state changed.
    StateChanged {
        /// Previous state.
        from: SyncState,
        /// New state.
        to: SyncState,
    },
    /// An error occurred (also returned/embedded for active callers).
    Error {
        /// Error description.
        message: String,
    },
    /// The server reported a version clash.
    ConflictDetected {
        /// The clash.
        conflict: Conflict,
    },
    /// A tracked conflict was resolved.
    ConflictResolved {
        /// Collection of the record.
        collection: String,
        /// Id of the record.
        id: String,
    },
    /// The durable queue gained or lost entries.
    QueueChanged {
        /// Entries now pending.
        pending: usize,
    },
    /// A pull delivered remote changes.
    RemoteChanges {
        /// Records changed on the server.
        changed: usize,
        /// Records deleted on the server.
        deleted: usize,
    },
    /// The duplex channel delivered a server notification.
    RemoteNotification {
        /// Opaque notification payload.
        payload: Value,
    },
    /// Automatic triggers were suspended.
    Paused,
    /// Automatic triggers were resumed.
    Resumed,
    /// An operator requested cancellation.
    Aborted,
}

/// A subscriber to engine events.
///
/// Returning `Err` is logged and never interrupts delivery to the
/// remaining subscribers.
pub trait SyncListener: Send + Sync {
    /// Handles one event.
    fn on_event(&self, event: &SyncEvent) -> Result<(), String>;
}

impl<F> SyncListener for F
where
    F: Fn(&SyncEvent) -> Result<(), String> + Send + Sync,
{
    fn on_event(&self, event: &SyncEvent) -> Result<(), String> {
        self(event)
    }
}

/// Identifies one subscription for later removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Ordered fan-out of [`SyncEvent`]s to subscribers.
///
/// Subscribers are invoked in subscription order. A failing subscriber is
/// logged and skipped; delivery continues.
#[derive(Default)]
pub struct EventBus {
    listeners: RwLock<Vec<(SubscriptionId, Arc<dyn SyncListener>)>>,
    next_id: AtomicU64,
}

impl EventBus {
    /// Creates an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a subscriber; returns its id.
    pub fn subscribe(&self, listener: Arc<dyn SyncListener>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.listeners.write().push((id, listener));
        id
    }

    /// Removes a subscriber. Returns whether it was registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|(registered, _)| *registered != id);
        listeners.len() < before
    }

    /// Delivers an event to every subscriber in order.
    pub fn emit(&self, event: &SyncEvent) {
        let listeners = self.listeners.read().clone();
        for (id, listener) in listeners {
            if let Err(message) = listener.on_event(event) {
                tracing::warn!(subscription = id.0, error = %message, "event listener failed");
            }
        }
    }

    /// Returns the number of subscribers.
    pub fn len(&self) -> usize {
        self.listeners.read().len()
    }

    /// Returns true when no subscribers are registered.
    pub fn is_empty(&self) -> bool {
        self.listeners.read().is_empty()
    }
}
