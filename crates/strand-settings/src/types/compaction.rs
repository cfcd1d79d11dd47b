//! History compaction settings.

use serde::{Deserialize, Serialize};

/// Compaction trigger and summarizer settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompactionSettings {
    /// Whether the compaction manager runs at all.
    pub enabled: bool,
    /// Number of visible, not-yet-compacted events that triggers compaction.
    pub trigger_event_count: usize,
    /// Estimated token count of uncompacted content that triggers compaction.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_threshold: Option<usize>,
    /// Approximate characters per token for estimation.
    pub chars_per_token: usize,
    /// Most recent invocations never handed to the summarizer (minimum 1).
    pub retain_recent_invocations: usize,
    /// Upper bound on one summarizer call, in milliseconds.
    pub summarizer_timeout_ms: u64,
}

impl Default for CompactionSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            trigger_event_count: 50,
            token_threshold: None,
            chars_per_token: 4,
            retain_recent_invocations: 1,
            summarizer_timeout_ms: 60_000,
        }
    }
}
