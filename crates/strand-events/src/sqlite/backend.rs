//! [`StorageBackend`] over `SQLite`.
//!
//! Each call checks out one pooled connection and runs in one transaction.
//! Reads run in a deferred transaction so the session row and its events come
//! from the same WAL snapshot.

use std::sync::Arc;

use strand_core::EventId;
use tracing::{debug, info};

use super::connection::{self, ConnectionConfig, ConnectionPool, PooledConnection};
use super::migrations::run_migrations;
use super::repositories::{EventRepo, SessionRepo};
use crate::backend::{BranchPointer, LogTail, SessionSnapshot, StorageBackend};
use crate::errors::{EventStoreError, Result};
use crate::types::{Event, SessionKey, SessionMeta};

/// `SQLite`-backed session storage.
pub struct SqliteBackend {
    pool: ConnectionPool,
}

impl SqliteBackend {
    /// Open (creating if needed) a database file and apply migrations.
    pub fn open(path: &str, config: &ConnectionConfig) -> Result<Self> {
        if let Some(parent) = std::path::Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    EventStoreError::Internal(format!("cannot create {}: {e}", parent.display()))
                })?;
            }
        }
        info!(path, pool_size = config.pool_size, "opening sqlite session store");
        Self::with_pool(connection::new_file(path, config)?)
    }

    /// Private in-memory database.
    pub fn in_memory() -> Result<Self> {
        Self::with_pool(connection::new_in_memory(&ConnectionConfig::default())?)
    }

    /// Wrap an existing pool and apply migrations.
    pub fn with_pool(pool: ConnectionPool) -> Result<Self> {
        let conn = pool.get()?;
        let applied = run_migrations(&conn)?;
        debug!(applied, "sqlite schema ready");
        drop(conn);
        Ok(Self { pool })
    }

    fn conn(&self) -> Result<PooledConnection> {
        Ok(self.pool.get()?)
    }
}

impl StorageBackend for SqliteBackend {
    fn create(&self, meta: &SessionMeta, seed: Option<&Event>) -> Result<()> {
        let conn = self.conn()?;
        let tx = conn.unchecked_transaction()?;
        let session_key = SessionRepo::insert(&tx, meta).map_err(|e| match e {
            EventStoreError::Sqlite(rusqlite::Error::SqliteFailure(failure, _))
                if failure.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                EventStoreError::AlreadyExists(meta.key.to_string())
            }
            other => other,
        })?;
        if let Some(seed) = seed {
            EventRepo::insert(&tx, session_key, 1, seed)?;
        }
        tx.commit()?;
        Ok(())
    }

    fn snapshot(&self, key: &SessionKey) -> Result<Option<SessionSnapshot>> {
        let conn = self.conn()?;
        let tx = conn.unchecked_transaction()?;
        let Some(row) = SessionRepo::get(&tx, key)? else {
            return Ok(None);
        };
        let events = EventRepo::list_for_session(&tx, row.session_key)?
            .into_iter()
            .map(super::row_types::EventRow::into_event)
            .collect::<Result<Vec<_>>>()?;
        tx.commit()?;
        Ok(Some(SessionSnapshot {
            meta: row.into_meta(),
            events: Arc::new(events),
        }))
    }

    fn tail(&self, key: &SessionKey) -> Result<Option<LogTail>> {
        let conn = self.conn()?;
        let tx = conn.unchecked_transaction()?;
        let Some(row) = SessionRepo::get(&tx, key)? else {
            return Ok(None);
        };
        let last_timestamp = EventRepo::last_timestamp(&tx, row.session_key)?;
        tx.commit()?;
        Ok(Some(LogTail {
            meta: row.into_meta(),
            last_timestamp,
        }))
    }

    fn contains_event(&self, key: &SessionKey, event_id: &EventId) -> Result<bool> {
        let conn = self.conn()?;
        match SessionRepo::get(&conn, key)? {
            Some(row) => EventRepo::exists(&conn, row.session_key, event_id.as_str()),
            None => Ok(false),
        }
    }

    fn append(
        &self,
        key: &SessionKey,
        event: &Event,
        pointer: Option<&BranchPointer>,
    ) -> Result<()> {
        let conn = self.conn()?;
        let tx = conn.unchecked_transaction()?;
        let row = SessionRepo::get(&tx, key)?
            .ok_or_else(|| EventStoreError::SessionNotFound(key.to_string()))?;
        let sequence = EventRepo::next_sequence(&tx, row.session_key)?;
        EventRepo::insert(&tx, row.session_key, sequence, event).map_err(|e| match e {
            EventStoreError::Sqlite(rusqlite::Error::SqliteFailure(failure, _))
                if failure.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                EventStoreError::DuplicateEvent(event.id().to_string())
            }
            other => other,
        })?;
        SessionRepo::touch(&tx, row.session_key, event.timestamp())?;
        if let Some(pointer) = pointer {
            SessionRepo::set_branch(
                &tx,
                row.session_key,
                pointer.active_from.as_str(),
                &pointer.branch,
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    fn delete(&self, key: &SessionKey) -> Result<bool> {
        let conn = self.conn()?;
        SessionRepo::delete(&conn, key)
    }

    fn list(&self, app_name: &str, user_id: &str) -> Result<Vec<SessionMeta>> {
        let conn = self.conn()?;
        Ok(SessionRepo::list(&conn, app_name, user_id)?
            .into_iter()
            .map(super::row_types::SessionRow::into_meta)
            .collect())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde_json::json;
    use strand_core::{InvocationId, SessionId};

    use super::*;
    use crate::types::{Content, Part, StateChange};

    fn meta(at: f64) -> SessionMeta {
        SessionMeta::new(SessionKey::new("app", "u", SessionId::new()), at)
    }

    #[test]
    fn events_round_trip_through_columns() {
        let backend = SqliteBackend::in_memory().unwrap();
        let m = meta(1.0);
        backend.create(&m, None).unwrap();

        let event = Event::new(InvocationId::new(), "model")
            .with_content(Content::new(
                "model",
                vec![
                    Part::text("looking"),
                    Part::FunctionCall {
                        id: "c1".into(),
                        name: "search".into(),
                        args: json!({"q": "rust"}),
                    },
                ],
            ))
            .with_state("k", json!({"nested": [1, 2]}))
            .with_state_removal("gone")
            .with_artifact("a.md", 3)
            .on_branch("branch-1")
            .final_response()
            .at(2.5);
        backend.append(&m.key, &event, None).unwrap();

        let snap = backend.snapshot(&m.key).unwrap().unwrap();
        let stored = &snap.events[0];
        assert_eq!(stored.id(), event.id());
        assert_eq!(stored.invocation_id(), event.invocation_id());
        assert_eq!(stored.timestamp(), 2.5);
        assert_eq!(stored.content(), event.content());
        assert_eq!(stored.actions(), event.actions());
        assert_eq!(stored.actions().state_delta["gone"], StateChange::Delete);
        assert_eq!(stored.branch(), Some("branch-1"));
        assert!(stored.is_final_response());
        assert_eq!(snap.meta.last_update_time, 2.5);
    }

    #[test]
    fn seed_event_is_first_in_log() {
        let backend = SqliteBackend::in_memory().unwrap();
        let m = meta(1.0);
        let seed = Event::new(InvocationId::new(), "system").with_state("a", json!(1));
        backend.create(&m, Some(&seed)).unwrap();
        let later = Event::new(InvocationId::new(), "user").at(seed.timestamp() + 1.0);
        backend.append(&m.key, &later, None).unwrap();

        let snap = backend.snapshot(&m.key).unwrap().unwrap();
        assert_eq!(snap.events.len(), 2);
        assert_eq!(snap.events[0].id(), seed.id());
    }

    #[test]
    fn duplicate_identity_is_already_exists() {
        let backend = SqliteBackend::in_memory().unwrap();
        let m = meta(1.0);
        backend.create(&m, None).unwrap();
        assert_matches!(
            backend.create(&m, None),
            Err(EventStoreError::AlreadyExists(_))
        );
    }

    #[test]
    fn tail_reads_last_timestamp_without_the_log() {
        let backend = SqliteBackend::in_memory().unwrap();
        let m = meta(1.0);
        backend.create(&m, None).unwrap();
        assert_eq!(backend.tail(&m.key).unwrap().unwrap().last_timestamp, None);

        let first = Event::new(InvocationId::new(), "user").at(2.0);
        let second = Event::new(InvocationId::new(), "user").at(2.0);
        backend.append(&m.key, &first, None).unwrap();
        backend.append(&m.key, &second, None).unwrap();

        let tail = backend.tail(&m.key).unwrap().unwrap();
        assert_eq!(tail.last_timestamp, Some(2.0));
        assert_eq!(tail.meta.last_update_time, 2.0);
        assert!(backend.contains_event(&m.key, second.id()).unwrap());
        assert!(!backend.contains_event(&m.key, &EventId::new()).unwrap());
        assert!(backend.tail(&meta(1.0).key).unwrap().is_none());
    }

    #[test]
    fn reinserted_event_id_is_duplicate() {
        let backend = SqliteBackend::in_memory().unwrap();
        let m = meta(1.0);
        backend.create(&m, None).unwrap();
        let event = Event::new(InvocationId::new(), "user").at(2.0);
        backend.append(&m.key, &event, None).unwrap();
        assert_matches!(
            backend.append(&m.key, &event, None),
            Err(EventStoreError::DuplicateEvent(_))
        );
    }

    #[test]
    fn delete_cascades_to_events() {
        let backend = SqliteBackend::in_memory().unwrap();
        let m = meta(1.0);
        backend.create(&m, None).unwrap();
        let event = Event::new(InvocationId::new(), "user").at(2.0);
        backend.append(&m.key, &event, None).unwrap();
        let session_key = {
            let conn = backend.conn().unwrap();
            SessionRepo::get(&conn, &m.key).unwrap().unwrap().session_key
        };

        assert!(backend.delete(&m.key).unwrap());
        assert!(backend.snapshot(&m.key).unwrap().is_none());
        let conn = backend.conn().unwrap();
        assert_eq!(EventRepo::count(&conn, session_key).unwrap(), 0);
    }

    #[test]
    fn pointer_persists_with_marker() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("s.db");
        let path = path.to_str().unwrap();
        let m = meta(1.0);
        let marker = Event::new(InvocationId::new(), "system").at(2.0);
        {
            let backend = SqliteBackend::open(path, &ConnectionConfig::default()).unwrap();
            backend.create(&m, None).unwrap();
            let pointer = BranchPointer {
                active_from: marker.id().clone(),
                branch: "branch-1".into(),
            };
            backend.append(&m.key, &marker, Some(&pointer)).unwrap();
        }

        let reopened = SqliteBackend::open(path, &ConnectionConfig::default()).unwrap();
        let snap = reopened.snapshot(&m.key).unwrap().unwrap();
        assert_eq!(snap.meta.active_from.as_ref(), Some(marker.id()));
        assert_eq!(snap.meta.branch.as_deref(), Some("branch-1"));
        assert_eq!(reopened.list("app", "u").unwrap().len(), 1);
    }
}
