//! Summarizer trait and the built-in implementations.
//!
//! A [`Summarizer`] turns a range of events into a single summary event, or
//! declines with `Ok(None)`. The compaction manager owns timeouts and
//! cancellation, so implementations just do the work.

use async_trait::async_trait;
use serde_json::Value;
use strand_core::InvocationId;
use strand_events::{Content, Event, Part};

use crate::constants::{COMPACTION_SUMMARY_PREFIX, COMPACTOR_AUTHOR, SUMMARY_REQUEST_LIMIT};

// =============================================================================
// Summarizer Trait
// =============================================================================

/// Produces a summary event for a range of events.
///
/// The returned event's content (or its compaction content, if it carries
/// one) becomes the compacted content; its author is recorded on the
/// compaction event. Ids and timestamps are assigned by the manager.
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Summarize `events`, or return `None` to leave them uncompacted.
    async fn maybe_summarize_events(
        &self,
        events: &[Event],
    ) -> Result<Option<Event>, SummarizerError>;
}

/// Errors that can occur during summarization.
#[derive(Debug, thiserror::Error)]
pub enum SummarizerError {
    /// The call exceeded the configured timeout.
    #[error("summarizer timed out after {timeout_ms}ms")]
    Timeout {
        /// Timeout in milliseconds.
        timeout_ms: u64,
    },

    /// The cancellation token fired while summarizing.
    #[error("summarization cancelled")]
    Cancelled,

    /// The underlying call failed.
    #[error("summarizer call failed: {message}")]
    CallFailed {
        /// Error message.
        message: String,
    },

    /// The summarizer's output could not be used.
    #[error("failed to parse summarizer response: {reason}")]
    ParseError {
        /// Why parsing failed.
        reason: String,
    },
}

// =============================================================================
// No-op
// =============================================================================

/// Never compacts.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopSummarizer;

#[async_trait]
impl Summarizer for NoopSummarizer {
    async fn maybe_summarize_events(
        &self,
        _events: &[Event],
    ) -> Result<Option<Event>, SummarizerError> {
        Ok(None)
    }
}

// =============================================================================
// Transcript Summarizer
// =============================================================================

/// Deterministic, model-free summarizer.
///
/// Lists the user's requests, the tools called and the paths they touched.
/// Useful as a fallback when a model-backed summarizer fails, and in tests.
#[derive(Clone, Copy, Debug, Default)]
pub struct TranscriptSummarizer;

impl TranscriptSummarizer {
    /// Build the narrative text for `events`.
    pub fn narrative(events: &[Event]) -> String {
        let mut requests = Vec::new();
        let mut tools: Vec<String> = Vec::new();
        let mut paths: Vec<String> = Vec::new();

        for event in events {
            let content = event.content();
            for part in &content.parts {
                match part {
                    Part::Text { text } if content.role == "user" => {
                        if !text.trim().is_empty() {
                            requests.push(truncate(text.trim(), SUMMARY_REQUEST_LIMIT));
                        }
                    }
                    Part::FunctionCall { name, args, .. } => {
                        if !tools.contains(name) {
                            tools.push(name.clone());
                        }
                        if let Some(path) = args
                            .get("file_path")
                            .or_else(|| args.get("path"))
                            .and_then(Value::as_str)
                        {
                            if !paths.iter().any(|p| p == path) {
                                paths.push(path.to_owned());
                            }
                        }
                    }
                    _ => {}
                }
            }
        }

        if requests.is_empty() && tools.is_empty() {
            return format!("({} events summarized)", events.len());
        }
        let mut parts = Vec::new();
        if !requests.is_empty() {
            parts.push(format!("The user made {} requests.", requests.len()));
            parts.push(format!("Key requests: {}", requests.join("; ")));
        }
        if !tools.is_empty() {
            parts.push(format!("Tools used: {}", tools.join(", ")));
        }
        if !paths.is_empty() {
            parts.push(format!("Files touched: {}", paths.join(", ")));
        }
        parts.join(" ")
    }
}

#[async_trait]
impl Summarizer for TranscriptSummarizer {
    async fn maybe_summarize_events(
        &self,
        events: &[Event],
    ) -> Result<Option<Event>, SummarizerError> {
        if events.is_empty() {
            return Ok(None);
        }
        let text = format!("{COMPACTION_SUMMARY_PREFIX}\n\n{}", Self::narrative(events));
        Ok(Some(
            Event::new(InvocationId::new(), COMPACTOR_AUTHOR).with_content(Content::text("model", text)),
        ))
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_owned();
    }
    let kept: String = s.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{kept}...")
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn user(text: &str) -> Event {
        Event::new(InvocationId::new(), "user").with_text("user", text)
    }

    fn call(name: &str, args: Value) -> Event {
        Event::new(InvocationId::new(), "agent").with_content(Content::new(
            "model",
            vec![Part::FunctionCall {
                id: "c1".into(),
                name: name.into(),
                args,
            }],
        ))
    }

    #[tokio::test]
    async fn noop_never_summarizes() {
        let result = NoopSummarizer
            .maybe_summarize_events(&[user("hello")])
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn transcript_summarizer_lists_requests_and_tools() {
        let events = vec![
            user("fix the parser"),
            call("read_file", json!({"path": "src/parser.rs"})),
            call("read_file", json!({"path": "src/parser.rs"})),
            user("now run the tests"),
        ];
        let summary = TranscriptSummarizer
            .maybe_summarize_events(&events)
            .await
            .unwrap()
            .unwrap();
        let text = summary.content().joined_text();
        assert!(text.starts_with(COMPACTION_SUMMARY_PREFIX));
        assert!(text.contains("The user made 2 requests."));
        assert!(text.contains("fix the parser; now run the tests"));
        assert!(text.contains("Tools used: read_file"));
        assert!(text.contains("Files touched: src/parser.rs"));
        assert_eq!(summary.author(), COMPACTOR_AUTHOR);
    }

    #[tokio::test]
    async fn transcript_summarizer_declines_empty_range() {
        assert!(TranscriptSummarizer
            .maybe_summarize_events(&[])
            .await
            .unwrap()
            .is_none());
    }

    #[test]
    fn narrative_for_action_only_events() {
        let events = vec![Event::new(InvocationId::new(), "agent").with_state("k", json!(1))];
        assert_eq!(TranscriptSummarizer::narrative(&events), "(1 events summarized)");
    }

    #[test]
    fn long_text_is_truncated_on_char_boundaries() {
        let long = "é".repeat(400);
        let out = truncate(&long, SUMMARY_REQUEST_LIMIT);
        assert_eq!(out.chars().count(), SUMMARY_REQUEST_LIMIT);
        assert!(out.ends_with("..."));
    }

    #[test]
    fn narrative_quotes_long_requests_truncated() {
        let long = "x".repeat(SUMMARY_REQUEST_LIMIT * 2);
        let narrative = TranscriptSummarizer::narrative(&[user(&long)]);
        assert!(narrative.contains(&format!("{}...", "x".repeat(SUMMARY_REQUEST_LIMIT - 3))));
        assert!(!narrative.contains(&long));
    }
}
