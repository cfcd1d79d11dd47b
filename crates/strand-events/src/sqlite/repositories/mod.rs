//! Stateless repositories. Every method takes `&Connection` and runs SQL;
//! transactions are opened by the caller.

pub mod event;
pub mod session;

pub use event::EventRepo;
pub use session::SessionRepo;
