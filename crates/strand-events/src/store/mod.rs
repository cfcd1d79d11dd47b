//! Session API: [`SessionStore`] for create/read/append/delete and
//! [`RewindCoordinator`] for rewinds, sharing one per-session lock table.

mod locks;
mod rewind;
mod session_store;

pub use rewind::RewindCoordinator;
pub use session_store::SessionStore;
