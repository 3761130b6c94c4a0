//! Sync state machine states, statistics, and cycle reports.

use crate::error::EngineError;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::time::Duration;

/// The current state of the sync engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// No cycle is running.
    Idle,
    /// A cycle is checking eligibility and preparing.
    Connecting,
    /// A cycle is exchanging data with the server.
    Syncing,
    /// The last cycle finished cleanly.
    Completed,
    /// The last cycle failed unrecoverably.
    Error,
    /// The network monitor declined the last attempt.
    Offline,
    /// An operator cancelled the running cycle.
    Aborted,
}

impl SyncState {
    /// Returns true while a cycle is in flight.
    pub fn is_active(&self) -> bool {
        matches!(self, SyncState::Connecting | SyncState::Syncing)
    }

    /// Returns true if a new cycle may start from this state.
    pub fn can_start_sync(&self) -> bool {
        !self.is_active()
    }
}

/// Aggregate statistics, recomputed on demand from queue contents plus
/// counters. Read-only to callers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncStats {
    /// Entries awaiting transmission.
    pub pending_count: usize,
    /// Pending entries that have failed at least once.
    pub failed_count: usize,
    /// Unresolved conflicts currently tracked.
    pub conflict_count: usize,
    /// Server timestamp of the last successful pull.
    pub last_sync_time: Option<DateTime<Utc>>,
    /// Pending entries per collection.
    pub pending_by_collection: HashMap<String, usize>,
    /// Entries confirmed by the server over this engine's lifetime.
    pub items_pushed: u64,
    /// Records received from the server over this engine's lifetime.
    pub items_pulled: u64,
    /// Bytes sent in push bodies.
    pub bytes_uploaded: u64,
    /// Bytes received in pull responses.
    pub bytes_downloaded: u64,
    /// Sync cycles completed cleanly.
    pub cycles_completed: u64,
}

/// Outcome of one sync cycle.
///
/// Ordinary operational failures are embedded here rather than thrown, so
/// periodic and background callers can poll without exception-driven
/// control flow; `errors` collects the non-fatal ones.
#[derive(Debug)]
pub struct SyncReport {
    /// Entries the server confirmed during this cycle.
    pub pushed: u64,
    /// Records pulled during this cycle.
    pub pulled: u64,
    /// Conflicts surfaced during this cycle.
    pub conflicts: usize,
    /// Wall-clock duration of the cycle.
    pub duration: Duration,
    /// Statistics snapshot taken at cycle end.
    pub stats: SyncStats,
    /// The failure that ended the cycle, when one did.
    pub error: Option<EngineError>,
    /// Non-fatal failures observed along the way.
    pub errors: Vec<String>,
}

impl SyncReport {
    /// Creates an empty report.
    pub(crate) fn new() -> Self {
        Self {
            pushed: 0,
            pulled: 0,
            conflicts: 0,
            duration: Duration::ZERO,
            stats: SyncStats::default(),
            error: None,
            errors: Vec::new(),
        }
    }

    /// Returns true when the cycle completed without a terminal failure.
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}
