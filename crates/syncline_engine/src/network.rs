//! Network status observation and sync eligibility.

use crate::config::SyncPolicy;
use parking_lot::RwLock;

/// Transport class of the current connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NetworkType {
    /// Wi-Fi.
    Wifi,
    /// Wired.
    Ethernet,
    /// Mobile data.
    Cellular,
    /// Connection type could not be determined.
    #[default]
    Unknown,
}

/// A point-in-time connectivity snapshot.
///
/// Snapshots are recomputed on demand and never cached beyond a single
/// read.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NetworkStatus {
    /// Whether any route to the server exists.
    pub online: bool,
    /// Transport class.
    pub network_type: NetworkType,
    /// Measured round-trip latency, when known.
    pub latency_ms: Option<u32>,
    /// Estimated bandwidth, when known.
    pub bandwidth_kbps: Option<u32>,
    /// Whether the connection is metered.
    pub metered: bool,
}

impl NetworkStatus {
    /// Snapshot for a disconnected client.
    pub fn offline() -> Self {
        Self::default()
    }

    /// Snapshot for an unmetered connection of the given type.
    pub fn online(network_type: NetworkType) -> Self {
        Self {
            online: true,
            network_type,
            ..Self::default()
        }
    }

    /// Marks the snapshot as metered.
    pub fn with_metered(mut self, metered: bool) -> Self {
        self.metered = metered;
        self
    }
}

/// Supplies connectivity snapshots to the engine.
pub trait NetworkMonitor: Send + Sync {
    /// Returns the current connectivity snapshot.
    fn status(&self) -> NetworkStatus;
}

impl<M: NetworkMonitor + ?Sized> NetworkMonitor for std::sync::Arc<M> {
    fn status(&self) -> NetworkStatus {
        (**self).status()
    }
}

/// Decides whether a sync may start right now.
///
/// Pure predicate over the snapshot, an optional battery fraction in
/// `[0, 1]`, and the policy flags — no side effects, so eligibility is
/// deterministic under test.
pub fn should_sync(
    status: &NetworkStatus,
    battery_level: Option<f32>,
    policy: &SyncPolicy,
) -> bool {
    if policy.require_online && !status.online {
        return false;
    }

    if status.metered && !policy.allow_metered {
        return false;
    }

    if let Some(level) = battery_level {
        if level < policy.min_battery_level && !policy.allow_low_battery {
            return false;
        }
    }

    true
}

/// A monitor that reports a programmable snapshot.
///
/// Intended for tests and for hosts that feed connectivity changes in
/// from platform APIs.
#[derive(Debug, Default)]
pub struct StaticMonitor {
    status: RwLock<NetworkStatus>,
}

impl StaticMonitor {
    /// Creates a monitor reporting the given snapshot.
    pub fn new(status: NetworkStatus) -> Self {
        Self {
            status: RwLock::new(status),
        }
    }

    /// Creates a monitor reporting an online, unmetered connection.
    pub fn online() -> Self {
        Self::new(NetworkStatus::online(NetworkType::Wifi))
    }

    /// Creates a monitor reporting a disconnected client.
    pub fn offline() -> Self {
        Self::new(NetworkStatus::offline())
    }

    /// Replaces the reported snapshot.
    pub fn set(&self, status: NetworkStatus) {
        *self.status.write() = status;
    }
}

impl NetworkMonitor for StaticMonitor {
    fn status(&self) -> NetworkStatus {
        self.status.read().clone()
    }
}
