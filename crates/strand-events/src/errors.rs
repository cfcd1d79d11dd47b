//! Error types for the session store.
//!
//! [`EventStoreError`] is returned by every store, backend and rewind
//! operation. Caller misuse (unknown session, out-of-order timestamp, bad
//! rewind target) gets its own variant; storage failures are grouped under
//! [`EventStoreError::is_persistence`].

use thiserror::Error;

/// Errors that can occur during session store operations.
#[derive(Debug, Error)]
pub enum EventStoreError {
    /// `SQLite` database error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Connection pool error.
    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    /// JSON serialization/deserialization error.
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),

    /// Schema migration failed.
    #[error("migration error: {message}")]
    Migration {
        /// Describes which migration failed and why.
        message: String,
    },

    /// No session exists under the given key.
    #[error("session not found: {0}")]
    SessionNotFound(String),

    /// A session with the requested id already exists.
    #[error("session already exists: {0}")]
    AlreadyExists(String),

    /// The event's timestamp is earlier than the session's last event.
    #[error("event timestamp {timestamp} is before last event timestamp {last}")]
    OutOfOrder {
        /// Timestamp of the rejected event.
        timestamp: f64,
        /// Timestamp of the session's last physical event.
        last: f64,
    },

    /// No raw event in the session carries the requested invocation id.
    #[error("no event for invocation {0}")]
    InvalidRewindTarget(String),

    /// A compaction range overlaps an active compaction or is no longer visible.
    #[error("compaction conflict: {0}")]
    CompactionConflict(String),

    /// An event with the same id is already in the session log.
    #[error("duplicate event: {0}")]
    DuplicateEvent(String),

    /// The request is malformed or uses reserved actions.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// Internal error (e.g. corrupt stored row).
    #[error("internal error: {0}")]
    Internal(String),
}

impl EventStoreError {
    /// Whether this is a storage failure rather than a rejected request.
    pub fn is_persistence(&self) -> bool {
        matches!(
            self,
            Self::Sqlite(_)
                | Self::Pool(_)
                | Self::Serde(_)
                | Self::Migration { .. }
                | Self::Internal(_)
        )
    }
}

/// Convenience type alias for session store results.
pub type Result<T> = std::result::Result<T, EventStoreError>;

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
