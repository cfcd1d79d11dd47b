//! Shared fixtures for store integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use strand_events::sqlite::ConnectionConfig;
use strand_events::{SessionStore, SqliteBackend};
use tempfile::TempDir;

pub const APP: &str = "app";
pub const USER: &str = "user-1";

/// A store plus whatever keeps its storage alive.
pub struct Fixture {
    pub name: &'static str,
    pub store: Arc<SessionStore>,
    _dir: Option<TempDir>,
}

pub fn memory() -> Fixture {
    Fixture {
        name: "memory",
        store: Arc::new(SessionStore::in_memory()),
        _dir: None,
    }
}

pub fn sqlite() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sessions.db");
    let backend = SqliteBackend::open(path.to_str().unwrap(), &ConnectionConfig::default()).unwrap();
    Fixture {
        name: "sqlite",
        store: Arc::new(SessionStore::new(Arc::new(backend))),
        _dir: Some(dir),
    }
}

pub fn both() -> Vec<Fixture> {
    vec![memory(), sqlite()]
}
