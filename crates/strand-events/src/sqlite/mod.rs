//! `SQLite` backend for session logs.
//!
//! - **[`connection`]**: `r2d2` connection pool with WAL mode, foreign keys and
//!   cache pragmas applied to every connection.
//! - **[`migrations`]**: version-tracked schema, embedded at compile time.
//! - **[`row_types`]**: raw row structs and their conversion to domain types.
//! - **[`repositories`]**: stateless SQL, one struct per table.
//! - **[`SqliteBackend`]**: the [`StorageBackend`](crate::backend::StorageBackend)
//!   built from the pieces above.

mod backend;
pub mod connection;
pub mod migrations;
pub mod repositories;
pub mod row_types;

pub use backend::SqliteBackend;
pub use connection::{
    ConnectionConfig, ConnectionPool, PooledConnection, PragmaState, new_file, new_in_memory,
    verify_pragmas,
};
pub use migrations::{current_version, latest_version, run_migrations};
