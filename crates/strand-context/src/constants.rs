//! Compaction constants.

/// Author recorded on compaction events when the summary names none.
pub const COMPACTOR_AUTHOR: &str = "compactor";

/// Prefix for summary text produced by the built-in summarizers.
pub const COMPACTION_SUMMARY_PREFIX: &str = "[Context from earlier in this conversation]";

/// Attempts at installing one summary before giving up on a timestamp race.
pub const MAX_INSTALL_ATTEMPTS: usize = 3;

/// Truncation limit for each request quoted in a transcript summary.
pub const SUMMARY_REQUEST_LIMIT: usize = 200;
