//! Process-local backend.

use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use strand_core::EventId;

use super::{BranchPointer, LogTail, SessionSnapshot, StorageBackend};
use crate::errors::{EventStoreError, Result};
use crate::types::{Event, SessionKey, SessionMeta};

#[derive(Debug)]
struct SessionRecord {
    meta: SessionMeta,
    events: Arc<Vec<Event>>,
    ids: HashSet<EventId>,
}

/// Sessions held in a sharded map.
///
/// Each log is an `Arc<Vec<Event>>`: a snapshot is a reference-count bump,
/// and an append clones the vector only while some snapshot still holds the
/// previous version.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    sessions: DashMap<SessionKey, SessionRecord>,
}

impl MemoryBackend {
    /// Empty backend.
    pub fn new() -> Self {
        Self::default()
    }
}

impl StorageBackend for MemoryBackend {
    fn create(&self, meta: &SessionMeta, seed: Option<&Event>) -> Result<()> {
        match self.sessions.entry(meta.key.clone()) {
            Entry::Occupied(_) => Err(EventStoreError::AlreadyExists(meta.key.to_string())),
            Entry::Vacant(slot) => {
                let events: Vec<Event> = seed.into_iter().cloned().collect();
                let ids = events.iter().map(|e| e.id().clone()).collect();
                let _ = slot.insert(SessionRecord {
                    meta: meta.clone(),
                    events: Arc::new(events),
                    ids,
                });
                Ok(())
            }
        }
    }

    fn snapshot(&self, key: &SessionKey) -> Result<Option<SessionSnapshot>> {
        Ok(self.sessions.get(key).map(|record| SessionSnapshot {
            meta: record.meta.clone(),
            events: Arc::clone(&record.events),
        }))
    }

    fn tail(&self, key: &SessionKey) -> Result<Option<LogTail>> {
        Ok(self.sessions.get(key).map(|record| LogTail {
            meta: record.meta.clone(),
            last_timestamp: record.events.last().map(Event::timestamp),
        }))
    }

    fn contains_event(&self, key: &SessionKey, event_id: &EventId) -> Result<bool> {
        Ok(self
            .sessions
            .get(key)
            .is_some_and(|record| record.ids.contains(event_id)))
    }

    fn append(
        &self,
        key: &SessionKey,
        event: &Event,
        pointer: Option<&BranchPointer>,
    ) -> Result<()> {
        let mut record = self
            .sessions
            .get_mut(key)
            .ok_or_else(|| EventStoreError::SessionNotFound(key.to_string()))?;
        let _ = record.ids.insert(event.id().clone());
        Arc::make_mut(&mut record.events).push(event.clone());
        record.meta.last_update_time = event.timestamp();
        if let Some(pointer) = pointer {
            record.meta.active_from = Some(pointer.active_from.clone());
            record.meta.branch = Some(pointer.branch.clone());
        }
        Ok(())
    }

    fn delete(&self, key: &SessionKey) -> Result<bool> {
        Ok(self.sessions.remove(key).is_some())
    }

    fn list(&self, app_name: &str, user_id: &str) -> Result<Vec<SessionMeta>> {
        let mut metas: Vec<SessionMeta> = self
            .sessions
            .iter()
            .filter(|r| r.key().app_name == app_name && r.key().user_id == user_id)
            .map(|r| r.meta.clone())
            .collect();
        metas.sort_by(|a, b| {
            a.created_at
                .total_cmp(&b.created_at)
                .then_with(|| a.key.cmp(&b.key))
        });
        Ok(metas)
    }
}
