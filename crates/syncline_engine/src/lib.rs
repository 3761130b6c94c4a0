//! # Syncline Engine
//!
//! Offline-first sync orchestrator for Syncline.
//!
//! This crate provides:
//! - The sync state machine ([`SyncEngine`]) driving download-then-upload
//!   cycles against a remote authority
//! - Durable-queue batching with priority ordering and bounded concurrent
//!   dispatch
//! - Conflict surfacing and resolution with configurable strategies
//! - Exponential backoff with jitter and a retryable/fatal error taxonomy
//! - A network-eligibility predicate over connectivity, metering, and
//!   battery policy
//! - Transports: an HTTP request/response channel and an optional
//!   WebSocket duplex push channel
//! - A typed publish/subscribe event surface
//!
//! ## Architecture
//!
//! One logical sync runs at a time per engine instance; concurrent calls
//! fail fast. Inside a cycle, remote changes are pulled first (the server
//! is authoritative about its own timeline), then queued local mutations
//! are pushed in collection-pure batches with bounded concurrency.
//!
//! ## Key invariants
//!
//! - Enqueue is durable before it returns and never fails because a
//!   background sync failed
//! - Per-entry failures never abort a batch; per-batch failures never
//!   abort the cycle; only authentication failures do
//! - Cancellation is cooperative: checked at network boundaries, and a
//!   response that arrives after an abort is discarded, not applied
//! - Progress is monotonic even under partial failure

mod backoff;
mod batch;
mod cancel;
mod channel;
mod config;
mod engine;
mod error;
mod events;
mod http;
mod network;
mod state;
mod transport;

pub use backoff::backoff_delay;
pub use batch::{build_batches, coalesce, prioritize, Batch};
pub use cancel::CancelToken;
pub use channel::{PushChannel, PushChannelHandle};
pub use config::{
    EngineConfig, ResolvedOptions, RetryConfig, SyncDirection, SyncMode, SyncOptions, SyncPolicy,
};
pub use engine::SyncEngine;
pub use error::{EngineError, EngineResult};
pub use events::{EventBus, SubscriptionId, SyncEvent, SyncListener};
pub use http::{HttpTransport, StaticToken, TokenProvider};
pub use network::{should_sync, NetworkMonitor, NetworkStatus, NetworkType, StaticMonitor};
pub use state::{SyncReport, SyncState, SyncStats};
pub use transport::{MockTransport, Transport};
