//! Rewind: hide an invocation and everything after it, without deleting.
//!
//! A rewind appends a marker event naming the first excluded event. The
//! projector drops that event and every later one from the visible slice,
//! so the physical log keeps the old branch for audit while reads and new
//! appends continue from the earlier point.

use std::sync::Arc;

use strand_core::{InvocationId, SessionId, now_seconds};
use tracing::info;

use super::SessionStore;
use crate::backend::BranchPointer;
use crate::errors::{EventStoreError, Result};
use crate::types::{Event, RewindMarker, Session, SessionKey};

/// Applies rewinds through a shared [`SessionStore`].
#[derive(Clone)]
pub struct RewindCoordinator {
    store: Arc<SessionStore>,
}

impl RewindCoordinator {
    /// Coordinator writing through `store`.
    pub fn new(store: Arc<SessionStore>) -> Self {
        Self { store }
    }

    /// Rewind the session to just before `before_invocation_id`.
    ///
    /// The target is the first raw event in the physical log carrying the
    /// invocation id; compaction events and earlier markers never match.
    /// Each rewind opens a new branch label (`branch-1`, `branch-2`, ...).
    pub async fn rewind(
        &self,
        app_name: &str,
        user_id: &str,
        session_id: &SessionId,
        before_invocation_id: &InvocationId,
    ) -> Result<Session> {
        let key = SessionKey::new(app_name, user_id, session_id.clone());
        let _guard = self.store.lock(&key).await;
        let snapshot = self.store.snapshot(&key)?;

        let cutoff = snapshot
            .events
            .iter()
            .find(|e| e.is_raw() && e.invocation_id() == before_invocation_id)
            .map(|e| e.id().clone())
            .ok_or_else(|| EventStoreError::InvalidRewindTarget(before_invocation_id.to_string()))?;

        let ordinal = snapshot
            .events
            .iter()
            .filter(|e| e.rewind_info().is_some())
            .count()
            + 1;
        let branch = format!("branch-{ordinal}");
        // The marker takes the tail timestamp so it never moves the append
        // floor forward.
        let timestamp = snapshot
            .events
            .last()
            .map_or_else(now_seconds, Event::timestamp);
        drop(snapshot);

        let marker = Event::rewind_marker(
            RewindMarker {
                before_invocation_id: before_invocation_id.clone(),
                cutoff_event_id: cutoff.clone(),
                branch: branch.clone(),
            },
            timestamp,
        );
        let pointer = BranchPointer {
            active_from: marker.id().clone(),
            branch,
        };
        info!(
            session = %key,
            invocation_id = %before_invocation_id,
            cutoff_event_id = %cutoff,
            branch = %pointer.branch,
            "session rewound"
        );
        self.store.commit(&key, marker, Some(&pointer))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
