//! # Syncline Store
//!
//! Persistence collaborators for the Syncline sync engine.
//!
//! This crate provides:
//! - [`QueueStore`] — the durable queue holding pending outbound mutations
//!   across process restarts, with in-memory and file-backed
//!   implementations
//! - [`ObjectStore`] — the local key/value store interface (get/put/
//!   remove/stats/evict) the engine's callers persist synced records into,
//!   with an in-memory reference implementation
//!
//! ## Key invariants
//!
//! - A queue write is durable before the call returns
//! - Queue mutations are independent, idempotent, per-entry operations —
//!   partial batch failure never corrupts unrelated entries
//! - Object-store stats are cheap to read and safe to poll concurrently

mod error;
mod file;
mod memory;
mod object;
mod queue;

pub use error::{StoreError, StoreResult};
pub use file::FileQueueStore;
pub use memory::MemoryQueueStore;
pub use object::{MemoryObjectStore, ObjectStore, StoreStats};
pub use queue::QueueStore;
