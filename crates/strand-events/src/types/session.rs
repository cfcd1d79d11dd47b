//! Session identity, stored metadata and the materialized read view.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use strand_core::{EventId, SessionId};

use super::event::Event;
use crate::projector::{self, ContentEntry};

/// Projected key-value state.
pub type State = BTreeMap<String, Value>;

/// Lookup key for a session: `(app_name, user_id, session_id)`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionKey {
    /// Application namespace.
    pub app_name: String,
    /// Owning user.
    pub user_id: String,
    /// Session id within the app/user pair.
    pub session_id: SessionId,
}

impl SessionKey {
    /// Build a key.
    pub fn new(app_name: impl Into<String>, user_id: impl Into<String>, session_id: SessionId) -> Self {
        Self {
            app_name: app_name.into(),
            user_id: user_id.into(),
            session_id,
        }
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.app_name, self.user_id, self.session_id)
    }
}

/// Session row as stored by a backend, without events.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionMeta {
    /// Identity.
    pub key: SessionKey,
    /// Latest rewind marker; `None` until the first rewind.
    pub active_from: Option<EventId>,
    /// Branch opened by the latest rewind; `None` is the main line.
    pub branch: Option<String>,
    /// Creation time, seconds.
    pub created_at: f64,
    /// Timestamp of the last appended event, or creation time.
    pub last_update_time: f64,
}

impl SessionMeta {
    pub(crate) fn new(key: SessionKey, now: f64) -> Self {
        Self {
            key,
            active_from: None,
            branch: None,
            created_at: now,
            last_update_time: now,
        }
    }
}

/// Materialized view of a session at one read.
///
/// `state` and `events` are derived from the physical log each time a view
/// is built; nothing here is written back.
#[derive(Clone, Debug)]
pub struct Session {
    /// Session id.
    pub id: SessionId,
    /// Application namespace.
    pub app_name: String,
    /// Owning user.
    pub user_id: String,
    /// Fold of the visible events' state deltas.
    pub state: State,
    /// Visible events in log order.
    pub events: Vec<Event>,
    /// Latest rewind marker, if any.
    pub active_from: Option<EventId>,
    /// Current branch label.
    pub branch: Option<String>,
    /// Timestamp of the last appended event.
    pub last_update_time: f64,
}

impl Session {
    /// Build the view from stored metadata and the physical log.
    pub fn materialize(meta: &SessionMeta, physical: &[Event]) -> Self {
        let events = projector::visible_events(physical);
        let state = projector::project_state(&events);
        Self {
            id: meta.key.session_id.clone(),
            app_name: meta.key.app_name.clone(),
            user_id: meta.key.user_id.clone(),
            state,
            events,
            active_from: meta.active_from.clone(),
            branch: meta.branch.clone(),
            last_update_time: meta.last_update_time,
        }
    }

    /// Lookup key.
    pub fn key(&self) -> SessionKey {
        SessionKey::new(self.app_name.clone(), self.user_id.clone(), self.id.clone())
    }

    /// Context-window content: compacted ranges replaced by their summaries.
    pub fn contents(&self) -> Vec<ContentEntry> {
        projector::project_contents(&self.events)
    }

    /// Latest version per artifact name.
    pub fn artifacts(&self) -> BTreeMap<String, i64> {
        projector::project_artifacts(&self.events)
    }
}
