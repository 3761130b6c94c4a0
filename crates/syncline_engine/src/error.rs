//! Error taxonomy for the sync engine.

use syncline_protocol::ResolveError;
use syncline_store::StoreError;
use thiserror::Error;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors that can occur during sync operations.
///
/// Conflicts are not errors — they are a first-class result surfaced
/// through [`crate::SyncEvent::ConflictDetected`] and the engine's
/// conflict set.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The transport could not reach the server.
    #[error("network error: {message}")]
    Network {
        /// Error message.
        message: String,
        /// Whether the operation can be retried.
        retryable: bool,
    },

    /// The server answered with a failure status.
    #[error("server error (status {status}): {message}")]
    Server {
        /// HTTP status code.
        status: u16,
        /// Error message.
        message: String,
    },

    /// The request did not complete within the configured timeout.
    #[error("request timed out")]
    Timeout,

    /// Authentication failed; fatal for the current sync cycle.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// The server refused the payload for quota reasons; fatal for the
    /// affected entries only.
    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),

    /// The payload was rejected as malformed.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    /// A sync is already running on this engine instance.
    #[error("sync already in progress")]
    SyncInProgress,

    /// The sync was cancelled cooperatively.
    #[error("sync aborted")]
    Aborted,

    /// The network monitor declined the sync.
    #[error("network unavailable for sync")]
    NetworkUnavailable,

    /// No tracked conflict matches the given record.
    #[error("no tracked conflict for {collection}/{id}")]
    ConflictNotFound {
        /// Collection of the record.
        collection: String,
        /// Id of the record.
        id: String,
    },

    /// Conflict resolution was misused.
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// The durable store failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// A response could not be understood.
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl EngineError {
    /// Creates a retryable network error.
    pub fn network_retryable(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable network error.
    pub fn network_fatal(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
            retryable: false,
        }
    }

    /// Classifies an HTTP failure status.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            401 | 403 => Self::Auth(message),
            408 => Self::Timeout,
            413 | 429 => Self::QuotaExceeded(message),
            400..=499 => Self::InvalidPayload(message),
            _ => Self::Server { status, message },
        }
    }

    /// Returns true if a later attempt may succeed.
    ///
    /// Retryable: network failures, transient (5xx) server failures,
    /// timeouts. Everything else surfaces without blind retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            EngineError::Network { retryable, .. } => *retryable,
            EngineError::Timeout => true,
            EngineError::Server { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Returns true if the error must halt the whole sync cycle.
    pub fn is_fatal_for_cycle(&self) -> bool {
        matches!(self, EngineError::Auth(_))
    }
}
