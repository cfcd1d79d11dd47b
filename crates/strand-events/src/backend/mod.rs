//! Storage backends for session logs.
//!
//! A backend stores session rows and their append-only event logs. It does no
//! validation of its own: ordering, duplicate and conflict checks happen in
//! [`SessionStore`](crate::store::SessionStore) under the per-session lock,
//! and the backend only has to make each call atomic.
//!
//! - [`MemoryBackend`]: `DashMap` of copy-on-write logs
//! - [`SqliteBackend`](crate::sqlite::SqliteBackend): `rusqlite` over an `r2d2` pool

mod memory;

pub use memory::MemoryBackend;

use std::sync::Arc;

use strand_core::EventId;

use crate::errors::Result;
use crate::types::{Event, SessionKey, SessionMeta};

/// Immutable view of one session's stored data.
///
/// Holding a snapshot never blocks writers: the memory backend clones its log
/// on write while a snapshot is alive, and `SQLite` reads run in their own
/// transaction.
#[derive(Clone, Debug)]
pub struct SessionSnapshot {
    /// Session row.
    pub meta: SessionMeta,
    /// Full physical log in commit order.
    pub events: Arc<Vec<Event>>,
}

/// Session row plus the timestamp of its last physical event.
///
/// Enough to validate an ordinary append without loading the log.
#[derive(Clone, Debug, PartialEq)]
pub struct LogTail {
    /// Session row.
    pub meta: SessionMeta,
    /// Timestamp of the newest event, `None` for an empty log.
    pub last_timestamp: Option<f64>,
}

/// Session row update recorded together with a rewind marker.
#[derive(Clone, Debug, PartialEq)]
pub struct BranchPointer {
    /// The marker event that became the active rewind.
    pub active_from: EventId,
    /// Branch label opened by the marker.
    pub branch: String,
}

/// Persistence for session rows and their event logs.
pub trait StorageBackend: Send + Sync {
    /// Insert a new session, with an optional seed event as its first entry.
    ///
    /// Fails with `AlreadyExists` if the key is taken.
    fn create(&self, meta: &SessionMeta, seed: Option<&Event>) -> Result<()>;

    /// Session row plus its full physical log, or `None` if absent.
    fn snapshot(&self, key: &SessionKey) -> Result<Option<SessionSnapshot>>;

    /// Session row and last event timestamp, or `None` if absent.
    fn tail(&self, key: &SessionKey) -> Result<Option<LogTail>>;

    /// Whether the session's log already holds `event_id`.
    fn contains_event(&self, key: &SessionKey, event_id: &EventId) -> Result<bool>;

    /// Append one event and bump the session's update time, atomically.
    ///
    /// With a `pointer`, the session's active rewind and branch are updated
    /// in the same commit.
    fn append(&self, key: &SessionKey, event: &Event, pointer: Option<&BranchPointer>)
    -> Result<()>;

    /// Remove a session and its log. Returns whether it existed.
    fn delete(&self, key: &SessionKey) -> Result<bool>;

    /// Session rows for an app/user pair, oldest first.
    fn list(&self, app_name: &str, user_id: &str) -> Result<Vec<SessionMeta>>;
}
