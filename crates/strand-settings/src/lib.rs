//! # strand-settings
//!
//! Layered configuration for strand session storage and compaction.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`StrandSettings::default()`]
//! 2. **User file**: `~/.strand/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `STRAND_*` overrides (highest priority)
//!
//! There is no global instance: callers load a [`StrandSettings`] and hand
//! its sections to `SessionStore::open` and `CompactionPolicy::from`.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_from_path, settings_path};
pub use types::*;

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_are_valid() {
        let settings = StrandSettings::default();
        assert_eq!(settings.name, "strand");
        assert_eq!(settings.storage.backend, StorageBackendKind::Memory);
        assert_eq!(settings.storage.pool_size, 16);
        assert_eq!(settings.compaction.trigger_event_count, 50);
        assert_eq!(settings.compaction.retain_recent_invocations, 1);
        assert_eq!(settings.compaction.summarizer_timeout_ms, 60_000);
        assert_eq!(settings.logging.level, "warn");
        loader::validate(&settings).unwrap();
    }

    #[test]
    fn settings_path_under_home() {
        assert!(settings_path().ends_with(".strand/settings.json"));
    }
}
