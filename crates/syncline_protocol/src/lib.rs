//! # Syncline Protocol
//!
//! Data model and wire messages for the Syncline sync engine.
//!
//! This crate provides:
//! - The logical record type ([`SyncItem`]) and its enums
//! - Durable queue entries ([`QueueEntry`]) with retry bookkeeping
//! - Conflict representation and the pure conflict resolver
//! - Pull/push/resolve request and response messages
//! - Duplex push-channel frames
//!
//! ## Wire format
//!
//! All messages serialize as JSON with camelCase field names and
//! millisecond-epoch timestamps. Record payloads are opaque
//! [`serde_json::Value`]s keyed by `(collectionName, id)` — the engine
//! never interprets them.
//!
//! ## Key invariants
//!
//! - A queue entry's `retryCount` is monotonically non-decreasing until
//!   the entry is removed
//! - Resolution always produces a new item marked resolved/pending with a
//!   version incremented past the server's reported version when present

mod conflict;
mod item;
mod messages;
mod queue;

pub use conflict::{resolve, Conflict, ResolutionStrategy, ResolveError};
pub use item::{ConflictStatus, Operation, Priority, SyncItem, SyncStatus};
pub use messages::{
    ChannelMessage, DeletedItem, PullRequest, PullResponse, PushEnvelope, PushRequest,
    PushResponse, ResolveRequest,
};
pub use queue::QueueEntry;
