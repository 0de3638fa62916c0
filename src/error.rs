//! Error types for cache and page-state operations
//!
//! Cache misses are not errors: `DashboardCache::get` returns `Option` and
//! records a miss. Persistence failures never reach callers either; the cache
//! logs them and keeps serving from memory. What remains here are caller
//! errors (rejected input, misuse of the save lifecycle) and the transport
//! errors a save endpoint can produce.

use thiserror::Error;

/// Errors surfaced by `dashstate` operations.
#[derive(Debug, Error)]
pub enum StateError {
    /// Caller-supplied input was rejected before any state changed.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A page operation was invoked before `initialize_page`.
    #[error("page has not been initialized")]
    PageNotInitialized,

    /// `save_changes` was called while a previous save was still in flight.
    #[error("a save is already in flight")]
    SaveInFlight,

    /// The save endpoint rejected the payload or failed outright.
    #[error("save failed: {0}")]
    SaveFailed(String),

    /// HTTP transport error while talking to a save endpoint.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Durable storage I/O error.
    #[error("storage error: {0}")]
    Storage(#[from] std::io::Error),

    /// JSON serialization or deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Convenience result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StateError>;
