//! Session log data model.
//!
//! - [`Event`]: immutable record of one occurrence
//! - [`EventActions`]: state/artifact deltas plus compaction and rewind descriptors
//! - [`Content`] / [`Part`]: ordered event content
//! - [`SessionKey`], [`SessionMeta`], [`Session`]: identity, stored row, read view

pub mod actions;
pub mod content;
pub mod event;
pub mod session;

pub use actions::{EventActions, EventCompaction, RewindMarker, StateChange};
pub use content::{Content, Part};
pub use event::{Event, SYSTEM_AUTHOR};
pub use session::{Session, SessionKey, SessionMeta, State};
