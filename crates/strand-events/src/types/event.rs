//! The [`Event`] record.
//!
//! Events are built once with the consuming builder methods below and never
//! mutated after they are appended. Equality and hashing use the id only.

use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use strand_core::{EventId, InvocationId, now_seconds};

use super::actions::{EventActions, EventCompaction, RewindMarker, StateChange};
use super::content::Content;

/// Author recorded on events the store itself produces.
pub const SYSTEM_AUTHOR: &str = "system";

/// One immutable occurrence in a conversation.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    id: EventId,
    invocation_id: InvocationId,
    author: String,
    timestamp: f64,
    #[serde(default)]
    content: Content,
    #[serde(default)]
    actions: EventActions,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    branch: Option<String>,
    #[serde(default)]
    is_final_response: bool,
}

impl Event {
    /// New event for `invocation_id` by `author`, stamped with the current time.
    pub fn new(invocation_id: InvocationId, author: impl Into<String>) -> Self {
        Self {
            id: EventId::new(),
            invocation_id,
            author: author.into(),
            timestamp: now_seconds(),
            content: Content::default(),
            actions: EventActions::default(),
            branch: None,
            is_final_response: false,
        }
    }

    /// Compaction event summarizing `[start, end]`.
    pub fn compaction(
        invocation_id: InvocationId,
        author: impl Into<String>,
        compaction: EventCompaction,
    ) -> Self {
        let mut event = Self::new(invocation_id, author);
        event.actions.compaction = Some(compaction);
        event
    }

    pub(crate) fn rewind_marker(marker: RewindMarker, timestamp: f64) -> Self {
        let branch = marker.branch.clone();
        let mut event = Self::new(InvocationId::new(), SYSTEM_AUTHOR).at(timestamp);
        event.actions.rewind = Some(marker);
        event.branch = Some(branch);
        event
    }

    pub(crate) fn seed(state: BTreeMap<String, Value>) -> Self {
        let mut event = Self::new(InvocationId::new(), SYSTEM_AUTHOR);
        event.actions.state_delta = state
            .into_iter()
            .map(|(k, v)| (k, StateChange::Set(v)))
            .collect();
        event
    }

    /// Rebuild a stored event. Only backends call this.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn restore(
        id: EventId,
        invocation_id: InvocationId,
        author: String,
        timestamp: f64,
        content: Content,
        actions: EventActions,
        branch: Option<String>,
        is_final_response: bool,
    ) -> Self {
        Self {
            id,
            invocation_id,
            author,
            timestamp,
            content,
            actions,
            branch,
            is_final_response,
        }
    }

    // ── Builders ────────────────────────────────────────────────────────

    /// Replace the content.
    #[must_use]
    pub fn with_content(mut self, content: Content) -> Self {
        self.content = content;
        self
    }

    /// Replace the content with a single text part.
    #[must_use]
    pub fn with_text(self, role: impl Into<String>, text: impl Into<String>) -> Self {
        self.with_content(Content::text(role, text))
    }

    /// Replace all actions.
    #[must_use]
    pub fn with_actions(mut self, actions: EventActions) -> Self {
        self.actions = actions;
        self
    }

    /// Set a state key.
    #[must_use]
    pub fn with_state(mut self, key: impl Into<String>, value: Value) -> Self {
        let _ = self
            .actions
            .state_delta
            .insert(key.into(), StateChange::Set(value));
        self
    }

    /// Delete a state key.
    #[must_use]
    pub fn with_state_removal(mut self, key: impl Into<String>) -> Self {
        let _ = self
            .actions
            .state_delta
            .insert(key.into(), StateChange::Delete);
        self
    }

    /// Record an artifact version.
    #[must_use]
    pub fn with_artifact(mut self, name: impl Into<String>, version: i64) -> Self {
        let _ = self.actions.artifact_delta.insert(name.into(), version);
        self
    }

    /// Place the event on a named branch.
    #[must_use]
    pub fn on_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = Some(branch.into());
        self
    }

    /// Mark as the terminal event of its invocation.
    #[must_use]
    pub fn final_response(mut self) -> Self {
        self.is_final_response = true;
        self
    }

    /// Override the timestamp (seconds).
    #[must_use]
    pub fn at(mut self, timestamp: f64) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub(crate) fn stamp_branch(&mut self, branch: Option<&str>) {
        if self.branch.is_none() {
            self.branch = branch.map(str::to_owned);
        }
    }

    // ── Accessors ───────────────────────────────────────────────────────

    /// Unique id.
    pub fn id(&self) -> &EventId {
        &self.id
    }

    /// Invocation this event belongs to.
    pub fn invocation_id(&self) -> &InvocationId {
        &self.invocation_id
    }

    /// Producer of the event.
    pub fn author(&self) -> &str {
        &self.author
    }

    /// Seconds since the Unix epoch.
    pub fn timestamp(&self) -> f64 {
        self.timestamp
    }

    /// Content parts (possibly empty).
    pub fn content(&self) -> &Content {
        &self.content
    }

    /// Side effects.
    pub fn actions(&self) -> &EventActions {
        &self.actions
    }

    /// Branch label; `None` is the main line.
    pub fn branch(&self) -> Option<&str> {
        self.branch.as_deref()
    }

    /// Whether this ends its invocation.
    pub fn is_final_response(&self) -> bool {
        self.is_final_response
    }

    /// Compaction descriptor, if this is a compaction event.
    pub fn compaction_info(&self) -> Option<&EventCompaction> {
        self.actions.compaction.as_ref()
    }

    /// Rewind marker, if this is a rewind event.
    pub fn rewind_info(&self) -> Option<&RewindMarker> {
        self.actions.rewind.as_ref()
    }

    /// Neither a compaction event nor a rewind marker.
    pub fn is_raw(&self) -> bool {
        self.actions.compaction.is_none() && self.actions.rewind.is_none()
    }
}

impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Event {}

impl Hash for Event {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}
