//! # strand-context
//!
//! History compaction for strand sessions.
//!
//! - [`Summarizer`]: pluggable capability turning a range of events into one
//!   summary event ([`NoopSummarizer`], [`TranscriptSummarizer`])
//! - [`compaction::plan`]: picks the range from a session's visible events
//! - [`CompactionManager`]: runs the summarizer with a timeout and a
//!   cancellation token, then installs the result through the store's normal
//!   append path
//!
//! The manager never holds a session lock while the summarizer runs. The
//! store re-checks the range at install time and rejects it if a rewind or
//! another compaction got there first.

#![deny(unsafe_code)]

pub mod compaction;
pub mod constants;
pub mod summarizer;

pub use compaction::{CompactionManager, CompactionOutcome, CompactionPlan, CompactionPolicy};
pub use summarizer::{NoopSummarizer, Summarizer, SummarizerError, TranscriptSummarizer};
