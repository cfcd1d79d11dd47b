//! # strand-events
//!
//! Append-only session event log with derived state.
//!
//! - **Model** ([`types`]): immutable [`Event`]s carrying content and
//!   [`EventActions`] (state delta, artifact delta, compaction, rewind marker)
//! - **Projection** ([`projector`]): pure functions for visibility, state,
//!   context-window content and artifacts
//! - **Storage** ([`backend`], [`sqlite`]): in-memory and `SQLite` backends
//!   behind [`StorageBackend`]
//! - **Store** ([`store`]): [`SessionStore`] with per-session write locks,
//!   and [`RewindCoordinator`]
//!
//! State is never stored. Every read folds the visible events again, so a
//! compaction or rewind can only change state through what it makes visible.

#![deny(unsafe_code)]

pub mod backend;
pub mod errors;
pub mod projector;
pub mod sqlite;
pub mod store;
pub mod types;

pub use backend::{BranchPointer, LogTail, MemoryBackend, SessionSnapshot, StorageBackend};
pub use errors::{EventStoreError, Result};
pub use projector::{CompactionSpan, ContentEntry};
pub use sqlite::SqliteBackend;
pub use store::{RewindCoordinator, SessionStore};
pub use types::{
    Content, Event, EventActions, EventCompaction, Part, RewindMarker, Session, SessionKey,
    SessionMeta, State, StateChange,
};
