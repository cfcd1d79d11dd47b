//! Raw row shapes for the `sessions` and `events` tables.
//!
//! Conversion to [`SessionMeta`] and [`Event`] happens here so repositories
//! only deal with column mapping.

use strand_core::{EventId, InvocationId, SessionId};

use crate::errors::Result;
use crate::types::{Event, SessionKey, SessionMeta};

/// Row from the `sessions` table.
#[derive(Clone, Debug)]
pub struct SessionRow {
    /// Internal row handle referenced by events.
    pub session_key: i64,
    /// Application namespace.
    pub app_name: String,
    /// Owning user.
    pub user_id: String,
    /// Session id.
    pub session_id: String,
    /// Active rewind marker.
    pub active_from_event_id: Option<String>,
    /// Current branch.
    pub branch: Option<String>,
    /// Creation time, seconds.
    pub created_at: f64,
    /// Last update time, seconds.
    pub updated_at: f64,
}

impl SessionRow {
    pub(crate) fn into_meta(self) -> SessionMeta {
        SessionMeta {
            key: SessionKey::new(
                self.app_name,
                self.user_id,
                SessionId::from_string(self.session_id),
            ),
            active_from: self.active_from_event_id.map(EventId::from_string),
            branch: self.branch,
            created_at: self.created_at,
            last_update_time: self.updated_at,
        }
    }
}

/// Row from the `events` table.
#[derive(Clone, Debug)]
pub struct EventRow {
    /// Event id.
    pub event_id: String,
    /// Commit order within the session.
    pub sequence: i64,
    /// Invocation id.
    pub invocation_id: String,
    /// Timestamp, seconds.
    pub timestamp: f64,
    /// Producer.
    pub author: String,
    /// Serialized [`Content`](crate::types::Content).
    pub content: String,
    /// Serialized [`EventActions`](crate::types::EventActions).
    pub actions: String,
    /// Branch label.
    pub branch: Option<String>,
    /// Terminal event of its invocation.
    pub is_final_response: bool,
}

impl EventRow {
    pub(crate) fn into_event(self) -> Result<Event> {
        Ok(Event::restore(
            EventId::from_string(self.event_id),
            InvocationId::from_string(self.invocation_id),
            self.author,
            self.timestamp,
            serde_json::from_str(&self.content)?,
            serde_json::from_str(&self.actions)?,
            self.branch,
            self.is_final_response,
        ))
    }
}
