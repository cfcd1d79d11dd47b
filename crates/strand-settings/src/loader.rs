//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`StrandSettings::default()`]
//! 2. If `~/.strand/settings.json` exists, deep-merge user values over defaults
//! 3. Apply `STRAND_*` environment variable overrides (highest priority)
//! 4. Validate the result

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::{Result, SettingsError};
use crate::types::{StorageBackendKind, StrandSettings};

/// Resolve the path to the settings file (`~/.strand/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".strand").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<StrandSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults. Invalid JSON or a value that fails
/// validation is an error.
pub fn load_settings_from_path(path: &Path) -> Result<StrandSettings> {
    let mut settings = read_layered(path)?;
    apply_env_overrides(&mut settings);
    validate(&settings)?;
    Ok(settings)
}

fn read_layered(path: &Path) -> Result<StrandSettings> {
    let defaults = serde_json::to_value(StrandSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    Ok(serde_json::from_value(merged)?)
}

/// Recursive deep merge of two JSON values.
///
/// - Objects are merged recursively (source overrides target per-key)
/// - Arrays and primitives are replaced entirely by source
/// - Null values in source are skipped (preserving target)
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = match target_map.remove(&key) {
                    Some(target_val) => deep_merge(target_val, source_val),
                    None => source_val,
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Reject settings the storage and compaction layers cannot run with.
pub fn validate(settings: &StrandSettings) -> Result<()> {
    if settings.storage.pool_size == 0 {
        return Err(SettingsError::InvalidValue(
            "storage.poolSize must be at least 1".into(),
        ));
    }
    if settings.compaction.retain_recent_invocations == 0 {
        return Err(SettingsError::InvalidValue(
            "compaction.retainRecentInvocations must be at least 1".into(),
        ));
    }
    if settings.compaction.chars_per_token == 0 {
        return Err(SettingsError::InvalidValue(
            "compaction.charsPerToken must be at least 1".into(),
        ));
    }
    if settings.storage.backend == StorageBackendKind::Sqlite
        && settings.storage.database_path.trim().is_empty()
    {
        return Err(SettingsError::InvalidValue(
            "storage.databasePath is required for the sqlite backend".into(),
        ));
    }
    Ok(())
}

/// Apply `STRAND_*` process environment overrides to loaded settings.
///
/// Invalid values are logged and ignored, leaving the file/default value.
pub fn apply_env_overrides(settings: &mut StrandSettings) {
    apply_overrides_from(settings, |name| std::env::var(name).ok());
}

/// Apply overrides read through `lookup`, which maps a variable name to its
/// value. [`apply_env_overrides`] passes the process environment.
pub fn apply_overrides_from<F>(settings: &mut StrandSettings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let env = EnvReader { lookup };

    // ── Storage ─────────────────────────────────────────────────────
    if let Some(v) = env.parsed("STRAND_STORAGE_BACKEND", parse_backend) {
        settings.storage.backend = v;
    }
    if let Some(v) = env.string("STRAND_DB_PATH") {
        settings.storage.database_path = v;
    }
    if let Some(v) = env.parsed("STRAND_POOL_SIZE", |s| parse_u32_range(s, 1, 256)) {
        settings.storage.pool_size = v;
    }

    // ── Compaction ──────────────────────────────────────────────────
    if let Some(v) = env.parsed("STRAND_COMPACTION_ENABLED", parse_bool) {
        settings.compaction.enabled = v;
    }
    if let Some(v) = env.parsed("STRAND_COMPACTION_TRIGGER", |s| {
        parse_usize_range(s, 1, 1_000_000)
    }) {
        settings.compaction.trigger_event_count = v;
    }
    if let Some(v) = env.parsed("STRAND_SUMMARIZER_TIMEOUT_MS", |s| {
        parse_u64_range(s, 100, 3_600_000)
    }) {
        settings.compaction.summarizer_timeout_ms = v;
    }

    // ── Logging ─────────────────────────────────────────────────────
    if let Some(v) = env.string("STRAND_LOG_LEVEL") {
        settings.logging.level = v;
    }
}

// ── Pure parsing functions (testable without env vars) ──────────────────────

/// Parse a string as a boolean.
///
/// Accepts (case-insensitive): `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a backend name (`memory` or `sqlite`, case-insensitive).
pub fn parse_backend(val: &str) -> Option<StorageBackendKind> {
    match val.to_lowercase().as_str() {
        "memory" => Some(StorageBackendKind::Memory),
        "sqlite" => Some(StorageBackendKind::Sqlite),
        _ => None,
    }
}

/// Parse a string as a `u32` within a range.
pub fn parse_u32_range(val: &str, min: u32, max: u32) -> Option<u32> {
    let n: u32 = val.parse().ok()?;
    (min..=max).contains(&n).then_some(n)
}

/// Parse a string as a `u64` within a range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.parse().ok()?;
    (min..=max).contains(&n).then_some(n)
}

/// Parse a string as a `usize` within a range.
pub fn parse_usize_range(val: &str, min: usize, max: usize) -> Option<usize> {
    let n: usize = val.parse().ok()?;
    (min..=max).contains(&n).then_some(n)
}

struct EnvReader<F> {
    lookup: F,
}

impl<F> EnvReader<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn string(&self, name: &str) -> Option<String> {
        (self.lookup)(name).filter(|v| !v.is_empty())
    }

    fn parsed<T>(&self, name: &str, parse: impl Fn(&str) -> Option<T>) -> Option<T> {
        let val = self.string(name)?;
        let result = parse(&val);
        if result.is_none() {
            warn!(key = name, value = %val, "invalid env override, ignoring");
        }
        result
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
