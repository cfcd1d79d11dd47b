//! [`SessionStore`]: the session API over a [`StorageBackend`].
//!
//! Reads take a backend snapshot without locking. Every write (append,
//! compaction install, rewind, delete) runs under the session's lock, and
//! the lock is only awaited before any validation, so a caller that gives up
//! waiting leaves no trace and a write that reached the backend is complete.

use std::sync::Arc;

use strand_core::{SessionId, now_seconds};
use strand_settings::{StorageBackendKind, StorageSettings};
use tracing::{debug, info};

use super::locks::{LockTable, SessionGuard};
use crate::backend::{BranchPointer, MemoryBackend, SessionSnapshot, StorageBackend};
use crate::errors::{EventStoreError, Result};
use crate::projector;
use crate::sqlite::{ConnectionConfig, SqliteBackend};
use crate::types::{Event, Session, SessionKey, SessionMeta, State};

/// Sessions and their event logs, with one writer at a time per session.
pub struct SessionStore {
    backend: Arc<dyn StorageBackend>,
    locks: LockTable,
}

impl SessionStore {
    /// Store over the given backend.
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self {
            backend,
            locks: LockTable::default(),
        }
    }

    /// Store over a fresh [`MemoryBackend`].
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryBackend::new()))
    }

    /// Store over the backend selected by `settings`.
    pub fn open(settings: &StorageSettings) -> Result<Self> {
        let backend: Arc<dyn StorageBackend> = match settings.backend {
            StorageBackendKind::Memory => Arc::new(MemoryBackend::new()),
            StorageBackendKind::Sqlite => Arc::new(SqliteBackend::open(
                &settings.resolved_database_path(),
                &ConnectionConfig::from(settings),
            )?),
        };
        Ok(Self::new(backend))
    }

    // ─────────────────────────────────────────────────────────────────────
    // Session lifecycle
    // ─────────────────────────────────────────────────────────────────────

    /// Create a session, generating an id when `session_id` is `None`.
    ///
    /// A non-empty `seed` is recorded as a synthetic first event whose state
    /// delta sets every seeded key.
    pub async fn create_session(
        &self,
        app_name: &str,
        user_id: &str,
        session_id: Option<SessionId>,
        seed: Option<State>,
    ) -> Result<Session> {
        let key = SessionKey::new(app_name, user_id, session_id.unwrap_or_default());
        let seed = seed.filter(|s| !s.is_empty()).map(Event::seed);
        let meta = SessionMeta::new(key.clone(), now_seconds());

        self.backend.create(&meta, seed.as_ref())?;
        info!(session = %key, seeded = seed.is_some(), "session created");

        let events: Vec<Event> = seed.into_iter().collect();
        let meta = SessionMeta {
            last_update_time: events.last().map_or(meta.created_at, Event::timestamp),
            ..meta
        };
        Ok(Session::materialize(&meta, &events))
    }

    /// Materialized view: visible events and their projected state.
    pub fn get_session(&self, app_name: &str, user_id: &str, session_id: &SessionId) -> Result<Session> {
        let snapshot = self.snapshot(&key(app_name, user_id, session_id))?;
        Ok(Session::materialize(&snapshot.meta, &snapshot.events))
    }

    /// Append one event and return the updated view.
    ///
    /// Fails with `OutOfOrder` if the event is older than the last event in
    /// the log, `DuplicateEvent` if its id is already present, and
    /// `CompactionConflict` if it carries a compaction that cannot be
    /// installed. Rewind markers are reserved for [`RewindCoordinator`]
    /// (`InvalidOperation`). Events without a branch inherit the session's
    /// current branch.
    ///
    /// [`RewindCoordinator`]: super::RewindCoordinator
    pub async fn append_event(
        &self,
        app_name: &str,
        user_id: &str,
        session_id: &SessionId,
        mut event: Event,
    ) -> Result<Session> {
        if event.rewind_info().is_some() {
            return Err(EventStoreError::InvalidOperation(
                "rewind markers can only be written by rewind".into(),
            ));
        }
        if !event.timestamp().is_finite() {
            return Err(EventStoreError::InvalidOperation(format!(
                "event {} has a non-finite timestamp",
                event.id()
            )));
        }

        let key = key(app_name, user_id, session_id);
        let _guard = self.lock(&key).await;
        let tail = self
            .backend
            .tail(&key)?
            .ok_or_else(|| EventStoreError::SessionNotFound(key.to_string()))?;

        if let Some(last) = tail.last_timestamp {
            if event.timestamp() < last {
                debug!(session = %key, event_id = %event.id(), "rejected out-of-order event");
                return Err(EventStoreError::OutOfOrder {
                    timestamp: event.timestamp(),
                    last,
                });
            }
        }
        if self.backend.contains_event(&key, event.id())? {
            return Err(EventStoreError::DuplicateEvent(event.id().to_string()));
        }
        if let Some(compaction) = event.compaction_info() {
            let snapshot = self.snapshot(&key)?;
            let visible = projector::visible_events(&snapshot.events);
            if let Some(reason) = projector::compaction_conflict(&visible, compaction) {
                debug!(session = %key, event_id = %event.id(), %reason, "compaction rejected");
                return Err(EventStoreError::CompactionConflict(reason));
            }
        }

        event.stamp_branch(tail.meta.branch.as_deref());
        self.commit(&key, event, None)
    }

    /// Physically remove a session and its log.
    pub async fn delete_session(
        &self,
        app_name: &str,
        user_id: &str,
        session_id: &SessionId,
    ) -> Result<()> {
        let key = key(app_name, user_id, session_id);
        let _guard = self.lock(&key).await;
        if !self.backend.delete(&key)? {
            return Err(EventStoreError::SessionNotFound(key.to_string()));
        }
        info!(session = %key, "session deleted");
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Inspection
    // ─────────────────────────────────────────────────────────────────────

    /// The full append-only log, including rewound-away events, rewind
    /// markers and compaction events.
    pub fn physical_events(
        &self,
        app_name: &str,
        user_id: &str,
        session_id: &SessionId,
    ) -> Result<Vec<Event>> {
        let snapshot = self.snapshot(&key(app_name, user_id, session_id))?;
        Ok(snapshot.events.to_vec())
    }

    /// Timestamp of the newest physical event, `None` for an empty log.
    ///
    /// Appends older than this fail with `OutOfOrder`. Reads only the tail.
    pub fn last_timestamp(
        &self,
        app_name: &str,
        user_id: &str,
        session_id: &SessionId,
    ) -> Result<Option<f64>> {
        let key = key(app_name, user_id, session_id);
        self.backend
            .tail(&key)?
            .map(|tail| tail.last_timestamp)
            .ok_or_else(|| EventStoreError::SessionNotFound(key.to_string()))
    }

    /// Session rows for an app/user pair, oldest first. Events are not loaded.
    pub fn list_sessions(&self, app_name: &str, user_id: &str) -> Result<Vec<SessionMeta>> {
        self.backend.list(app_name, user_id)
    }

    /// Number of sessions with a write in flight or waiting.
    pub fn lock_count(&self) -> usize {
        self.locks.len()
    }

    // ─────────────────────────────────────────────────────────────────────
    // Crate-internal write path
    // ─────────────────────────────────────────────────────────────────────

    pub(crate) async fn lock(&self, key: &SessionKey) -> SessionGuard<'_> {
        self.locks.acquire(key).await
    }

    pub(crate) fn snapshot(&self, key: &SessionKey) -> Result<SessionSnapshot> {
        self.backend
            .snapshot(key)?
            .ok_or_else(|| EventStoreError::SessionNotFound(key.to_string()))
    }

    /// Write a validated event and return the view after it. The caller
    /// holds the session lock, so no other write lands in between.
    pub(crate) fn commit(
        &self,
        key: &SessionKey,
        event: Event,
        pointer: Option<&BranchPointer>,
    ) -> Result<Session> {
        self.backend.append(key, &event, pointer)?;
        debug!(
            session = %key,
            event_id = %event.id(),
            invocation_id = %event.invocation_id(),
            author = event.author(),
            "event appended"
        );
        let snapshot = self.snapshot(key)?;
        Ok(Session::materialize(&snapshot.meta, &snapshot.events))
    }
}

fn key(app_name: &str, user_id: &str, session_id: &SessionId) -> SessionKey {
    SessionKey::new(app_name, user_id, session_id.clone())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
