//! Configuration for the sync engine.

use std::time::Duration;
use syncline_protocol::ResolutionStrategy;

/// When the engine initiates sync cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncMode {
    /// Only when the caller invokes `sync`.
    #[default]
    Manual,
    /// On enqueue while online, plus manual calls.
    Auto,
    /// On a fixed interval, plus manual calls.
    Periodic,
    /// On enqueue and reconnect, best effort.
    Opportunistic,
}

impl SyncMode {
    /// Returns true if an enqueue should kick off a background sync.
    pub fn triggers_on_enqueue(&self) -> bool {
        matches!(self, SyncMode::Auto | SyncMode::Opportunistic)
    }
}

/// Which directions a sync cycle covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncDirection {
    /// Push queued local mutations only.
    Upload,
    /// Pull remote changes only.
    Download,
    /// Pull, then push.
    #[default]
    Bidirectional,
}

impl SyncDirection {
    /// Returns true if the cycle pushes local changes.
    pub fn includes_upload(&self) -> bool {
        matches!(self, SyncDirection::Upload | SyncDirection::Bidirectional)
    }

    /// Returns true if the cycle pulls remote changes.
    pub fn includes_download(&self) -> bool {
        matches!(self, SyncDirection::Download | SyncDirection::Bidirectional)
    }
}

/// Policy flags consulted by the network-eligibility predicate.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncPolicy {
    /// Refuse to sync while offline.
    pub require_online: bool,
    /// Permit syncing over metered connections.
    pub allow_metered: bool,
    /// Permit syncing below the battery threshold.
    pub allow_low_battery: bool,
    /// Battery fraction below which sync is refused.
    pub min_battery_level: f32,
}

impl Default for SyncPolicy {
    fn default() -> Self {
        Self {
            require_online: true,
            allow_metered: false,
            allow_low_battery: false,
            min_battery_level: 0.2,
        }
    }
}

/// Configuration for retry behavior.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of attempts for a whole-cycle retry loop.
    pub max_attempts: u32,
    /// Base delay; the floor of every backoff.
    pub base_delay: Duration,
    /// Cap applied to the exponential curve.
    pub max_delay: Duration,
    /// Whether to add up to ±25% jitter.
    pub add_jitter: bool,
}

impl RetryConfig {
    /// Creates a retry configuration with the given attempt budget.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(60),
            add_jitter: true,
        }
    }

    /// Creates a configuration that never retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            add_jitter: false,
        }
    }

    /// Sets the base delay.
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Sets the delay cap.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Disables jitter, for deterministic tests.
    pub fn without_jitter(mut self) -> Self {
        self.add_jitter = false;
        self
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::new(3)
    }
}

/// Configuration for a sync engine instance.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Base URL of the sync endpoint.
    pub endpoint: String,
    /// When cycles are initiated.
    pub mode: SyncMode,
    /// Default directions for a cycle.
    pub direction: SyncDirection,
    /// Default conflict-resolution strategy.
    pub default_resolution: ResolutionStrategy,
    /// Resolve server-reported conflicts during the cycle when the
    /// default strategy permits it.
    pub auto_resolve_conflicts: bool,
    /// Maximum entries per batch.
    pub batch_size: usize,
    /// Retry behavior.
    pub retry: RetryConfig,
    /// Interval for periodic mode.
    pub sync_interval: Option<Duration>,
    /// Batches in flight at once.
    pub max_concurrent_requests: usize,
    /// Per-request timeout.
    pub request_timeout: Duration,
    /// Compress push bodies and ask for compressed pulls.
    pub compress: bool,
    /// Whether the local store encrypts at rest (delegated; recorded
    /// here for the stats surface only).
    pub encrypt: bool,
    /// Collections in dispatch order; unlisted collections follow.
    pub collection_priorities: Vec<String>,
    /// Network-eligibility policy.
    pub policy: SyncPolicy,
}

impl EngineConfig {
    /// Creates a configuration for the given sync endpoint.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            mode: SyncMode::default(),
            direction: SyncDirection::default(),
            default_resolution: ResolutionStrategy::ServerWins,
            auto_resolve_conflicts: true,
            batch_size: 50,
            retry: RetryConfig::default(),
            sync_interval: None,
            max_concurrent_requests: 3,
            request_timeout: Duration::from_secs(30),
            compress: false,
            encrypt: false,
            collection_priorities: Vec::new(),
            policy: SyncPolicy::default(),
        }
    }

    /// Sets the sync mode.
    pub fn with_mode(mut self, mode: SyncMode) -> Self {
        self.mode = mode;
        self
    }

    /// Sets the default direction.
    pub fn with_direction(mut self, direction: SyncDirection) -> Self {
        self.direction = direction;
        self
    }

    /// Sets the default conflict-resolution strategy.
    pub fn with_default_resolution(mut self, strategy: ResolutionStrategy) -> Self {
        self.default_resolution = strategy;
        self
    }

    /// Enables or disables in-cycle conflict auto-resolution.
    pub fn with_auto_resolve(mut self, auto_resolve: bool) -> Self {
        self.auto_resolve_conflicts = auto_resolve;
        self
    }

    /// Sets the batch size.
    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size.max(1);
        self
    }

    /// Sets the retry configuration.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the periodic sync interval.
    pub fn with_sync_interval(mut self, interval: Duration) -> Self {
        self.sync_interval = Some(interval);
        self
    }

    /// Sets the bound on concurrent batch requests.
    pub fn with_max_concurrent_requests(mut self, limit: usize) -> Self {
        self.max_concurrent_requests = limit.max(1);
        self
    }

    /// Sets the per-request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Enables compressed exchanges.
    pub fn with_compression(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    /// Sets the collection dispatch order.
    pub fn with_collection_priorities(mut self, collections: Vec<String>) -> Self {
        self.collection_priorities = collections;
        self
    }

    /// Sets the network-eligibility policy.
    pub fn with_policy(mut self, policy: SyncPolicy) -> Self {
        self.policy = policy;
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new("")
    }
}

/// Per-call overrides merged field-by-field over [`EngineConfig`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncOptions {
    /// Overrides the cycle direction.
    pub direction: Option<SyncDirection>,
    /// Restricts the cycle to these collections.
    pub collections: Option<Vec<String>>,
    /// Overrides the conflict-resolution strategy.
    pub resolution: Option<ResolutionStrategy>,
}

impl SyncOptions {
    /// Restricts the cycle to one collection.
    pub fn for_collection(name: impl Into<String>) -> Self {
        Self {
            collections: Some(vec![name.into()]),
            ..Self::default()
        }
    }

    /// Resolves the options against engine defaults.
    pub fn merge_onto(&self, config: &EngineConfig) -> ResolvedOptions {
        ResolvedOptions {
            direction: self.direction.unwrap_or(config.direction),
            collections: self.collections.clone(),
            resolution: self.resolution.unwrap_or(config.default_resolution),
        }
    }
}

/// The effective options of one cycle after merging.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedOptions {
    /// Directions the cycle covers.
    pub direction: SyncDirection,
    /// Collection filter; `None` covers everything.
    pub collections: Option<Vec<String>>,
    /// Conflict-resolution strategy in effect.
    pub resolution: ResolutionStrategy,
}
