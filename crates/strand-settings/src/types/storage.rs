//! Storage backend settings.

use serde::{Deserialize, Serialize};

/// Which backend holds the session logs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackendKind {
    /// Process-local, lost on restart.
    #[default]
    Memory,
    /// `SQLite` file with WAL journaling.
    Sqlite,
}

/// Storage settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StorageSettings {
    /// Backend selection.
    pub backend: StorageBackendKind,
    /// Database file for the `sqlite` backend.
    pub database_path: String,
    /// Maximum connection pool size.
    pub pool_size: u32,
    /// `SQLite` busy timeout in milliseconds.
    pub busy_timeout_ms: u32,
    /// `SQLite` page cache size in KiB.
    pub cache_size_kib: i64,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            backend: StorageBackendKind::Memory,
            database_path: "~/.strand/sessions.db".to_string(),
            pool_size: 16,
            busy_timeout_ms: 30_000,
            cache_size_kib: 8192,
        }
    }
}

impl StorageSettings {
    /// Database path with a leading `~/` expanded against `$HOME`.
    pub fn resolved_database_path(&self) -> String {
        match self.database_path.strip_prefix("~/") {
            Some(rest) => {
                let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
                format!("{home}/{rest}")
            }
            None => self.database_path.clone(),
        }
    }
}
