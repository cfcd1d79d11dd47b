//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase")]` for the JSON file
//! format. Each type implements [`Default`] with production default values,
//! and every section is `#[serde(default)]` so a partial file only needs the
//! keys it overrides.

mod compaction;
mod logging;
mod storage;

pub use compaction::*;
pub use logging::*;
pub use storage::*;

use serde::{Deserialize, Serialize};

/// Root settings type for a strand deployment.
///
/// # JSON Format
///
/// ```json
/// {
///   "storage": { "backend": "sqlite", "databasePath": "/var/lib/strand/sessions.db" },
///   "compaction": { "triggerEventCount": 80 },
///   "logging": { "level": "info" }
/// }
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StrandSettings {
    /// Settings schema version.
    pub version: String,
    /// Application name, used in log output.
    pub name: String,
    /// Where session logs are persisted.
    pub storage: StorageSettings,
    /// When and how history is summarized.
    pub compaction: CompactionSettings,
    /// Log level and format.
    pub logging: LoggingSettings,
}

impl Default for StrandSettings {
    fn default() -> Self {
        Self {
            version: "0.1.0".to_string(),
            name: "strand".to_string(),
            storage: StorageSettings::default(),
            compaction: CompactionSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}
