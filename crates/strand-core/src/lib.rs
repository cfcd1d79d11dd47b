//! # strand-core
//!
//! Foundation types shared by every strand crate:
//!
//! - **Branded IDs**: [`EventId`], [`SessionId`], [`InvocationId`] as newtypes for type safety
//! - **Clock**: wall-clock seconds used for event timestamps
//! - **Logging**: `tracing` subscriber setup and an in-memory capture layer for tests

#![deny(unsafe_code)]

pub mod clock;
pub mod ids;
pub mod logging;

pub use clock::now_seconds;
pub use ids::{EventId, InvocationId, SessionId};
