//! Side effects attached to an event.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use strand_core::{EventId, InvocationId};

use super::content::Content;

/// A single state key change: set to a value, or delete the key.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", content = "value", rename_all = "snake_case")]
pub enum StateChange {
    /// Set the key to this value.
    Set(Value),
    /// Remove the key.
    Delete,
}

/// Summary installed over a contiguous range of visible events.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventCompaction {
    /// Timestamp of the first summarized event.
    pub start_timestamp: f64,
    /// Timestamp of the last summarized event.
    pub end_timestamp: f64,
    /// First summarized event.
    pub start_event_id: EventId,
    /// Last summarized event.
    pub end_event_id: EventId,
    /// Summary replayed in place of the range.
    pub compacted_content: Content,
}

/// Branch point recorded by a rewind.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewindMarker {
    /// Invocation the session was rewound to before.
    pub before_invocation_id: InvocationId,
    /// First physical event excluded by this rewind.
    pub cutoff_event_id: EventId,
    /// Branch label opened by this rewind.
    pub branch: String,
}

/// Side effects of an event. All fields may be empty.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventActions {
    /// State key changes; keys not present are untouched.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub state_delta: BTreeMap<String, StateChange>,
    /// Artifact name to version number.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub artifact_delta: BTreeMap<String, i64>,
    /// Present only on compaction events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compaction: Option<EventCompaction>,
    /// Present only on rewind marker events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rewind: Option<RewindMarker>,
}

impl EventActions {
    /// True when no field carries anything.
    pub fn is_empty(&self) -> bool {
        self.state_delta.is_empty()
            && self.artifact_delta.is_empty()
            && self.compaction.is_none()
            && self.rewind.is_none()
    }
}
