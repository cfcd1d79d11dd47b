//! Compaction planning and the [`CompactionManager`].
//!
//! One compaction cycle:
//!
//! 1. read the session and [`plan`] a range of visible, not-yet-compacted
//!    events that ends before the most recent invocations
//! 2. call the [`Summarizer`] outside any lock, bounded by a timeout and a
//!    cancellation token
//! 3. append the compaction event through [`SessionStore::append_event`],
//!    which re-validates the range under the session lock
//!
//! Nothing in a cycle returns a summarizer failure as an `Err`; failures and
//! conflicts are logged and reported as a [`CompactionOutcome`]. The next
//! trigger simply tries again.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use strand_core::{EventId, InvocationId};
use strand_events::projector;
use strand_events::{Event, EventCompaction, EventStoreError, SessionKey, SessionStore};
use strand_settings::CompactionSettings;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::constants::{COMPACTOR_AUTHOR, MAX_INSTALL_ATTEMPTS};
use crate::summarizer::{Summarizer, SummarizerError};

// =============================================================================
// Policy
// =============================================================================

/// When to compact and how much history to keep raw.
#[derive(Clone, Debug, PartialEq)]
pub struct CompactionPolicy {
    /// Master switch.
    pub enabled: bool,
    /// Uncompacted raw event count that triggers a cycle. `0` disables the
    /// count trigger.
    pub trigger_event_count: usize,
    /// Estimated uncompacted tokens that trigger a cycle.
    pub token_threshold: Option<usize>,
    /// Characters per token for [`estimate_tokens`].
    pub chars_per_token: usize,
    /// Most recent invocations left out of every range. Values below 1 are
    /// treated as 1.
    pub retain_recent_invocations: usize,
    /// Upper bound on one summarizer call.
    pub summarizer_timeout: Duration,
}

impl Default for CompactionPolicy {
    fn default() -> Self {
        Self::from(&CompactionSettings::default())
    }
}

impl From<&CompactionSettings> for CompactionPolicy {
    fn from(settings: &CompactionSettings) -> Self {
        Self {
            enabled: settings.enabled,
            trigger_event_count: settings.trigger_event_count,
            token_threshold: settings.token_threshold,
            chars_per_token: settings.chars_per_token,
            retain_recent_invocations: settings.retain_recent_invocations,
            summarizer_timeout: Duration::from_millis(settings.summarizer_timeout_ms),
        }
    }
}

/// Rough token count for the content of `events`.
pub fn estimate_tokens(events: &[&Event], chars_per_token: usize) -> usize {
    let chars: usize = events.iter().map(|e| e.content().char_len()).sum();
    chars.div_ceil(chars_per_token.max(1))
}

// =============================================================================
// Planning
// =============================================================================

/// A range selected for summarization.
#[derive(Clone, Debug)]
pub struct CompactionPlan {
    /// First event of the range (raw).
    pub start_event_id: EventId,
    /// Last event of the range (raw).
    pub end_event_id: EventId,
    /// Timestamp of the first event.
    pub start_timestamp: f64,
    /// Timestamp of the last event.
    pub end_timestamp: f64,
    /// Every visible event in the range, in log order.
    pub events: Vec<Event>,
}

/// Select the range to summarize from a session's visible events, or `None`
/// if the policy does not trigger.
///
/// Candidates are the raw events after the last active compaction. The range
/// runs from the first candidate up to the last candidate that comes before
/// every retained invocation.
pub fn plan(visible: &[Event], policy: &CompactionPolicy) -> Option<CompactionPlan> {
    if !policy.enabled {
        return None;
    }
    let prefix = projector::compacted_prefix_end(visible);
    let candidates: Vec<(usize, &Event)> = visible
        .iter()
        .enumerate()
        .skip(prefix)
        .filter(|(_, e)| e.is_raw())
        .collect();
    if candidates.is_empty() {
        return None;
    }

    let by_count = policy.trigger_event_count > 0 && candidates.len() >= policy.trigger_event_count;
    let by_tokens = policy.token_threshold.is_some_and(|threshold| {
        let events: Vec<&Event> = candidates.iter().map(|(_, e)| *e).collect();
        estimate_tokens(&events, policy.chars_per_token) >= threshold
    });
    if !by_count && !by_tokens {
        return None;
    }

    let boundary = retained_boundary(&candidates, policy.retain_recent_invocations.max(1));
    let in_range: Vec<(usize, &Event)> = candidates
        .into_iter()
        .take_while(|(index, _)| *index < boundary)
        .collect();
    let (&(start, first), &(end, last)) = (in_range.first()?, in_range.last()?);

    Some(CompactionPlan {
        start_event_id: first.id().clone(),
        end_event_id: last.id().clone(),
        start_timestamp: first.timestamp(),
        end_timestamp: last.timestamp(),
        events: visible[start..=end].to_vec(),
    })
}

/// Index of the earliest event belonging to one of the `retain` most recent
/// invocations.
fn retained_boundary(candidates: &[(usize, &Event)], retain: usize) -> usize {
    let mut retained: HashSet<&InvocationId> = HashSet::new();
    for (_, event) in candidates.iter().rev() {
        if retained.len() == retain && !retained.contains(event.invocation_id()) {
            break;
        }
        let _ = retained.insert(event.invocation_id());
    }
    candidates
        .iter()
        .filter(|(_, e)| retained.contains(e.invocation_id()))
        .map(|(index, _)| *index)
        .min()
        .unwrap_or(0)
}

// =============================================================================
// Manager
// =============================================================================

/// Result of one compaction cycle.
#[derive(Clone, Debug)]
pub enum CompactionOutcome {
    /// The policy did not trigger.
    NotNeeded,
    /// Compaction is disabled, or the summarizer declined.
    Skipped,
    /// The compaction event was appended.
    Installed(Event),
    /// The store rejected the range; the summary was discarded.
    Conflict(String),
    /// Summarization failed or timed out; retried on the next trigger.
    Failed(String),
    /// The cancellation token fired before install. The log is untouched.
    Cancelled,
}

/// Runs compaction cycles against a [`SessionStore`].
#[derive(Clone)]
pub struct CompactionManager {
    store: Arc<SessionStore>,
    summarizer: Arc<dyn Summarizer>,
    policy: CompactionPolicy,
}

impl CompactionManager {
    /// Manager over `store` using `summarizer`.
    pub fn new(
        store: Arc<SessionStore>,
        summarizer: Arc<dyn Summarizer>,
        policy: CompactionPolicy,
    ) -> Self {
        Self {
            store,
            summarizer,
            policy,
        }
    }

    /// Active policy.
    pub fn policy(&self) -> &CompactionPolicy {
        &self.policy
    }

    /// Run one cycle for `key`.
    ///
    /// Returns `Err` only for store failures (missing session, persistence).
    pub async fn maybe_compact(
        &self,
        key: &SessionKey,
        cancel: &CancellationToken,
    ) -> strand_events::Result<CompactionOutcome> {
        if !self.policy.enabled {
            debug!(session = %key, "compaction disabled");
            return Ok(CompactionOutcome::Skipped);
        }
        let session = self
            .store
            .get_session(&key.app_name, &key.user_id, &key.session_id)?;
        let Some(plan) = plan(&session.events, &self.policy) else {
            return Ok(CompactionOutcome::NotNeeded);
        };
        info!(
            session = %key,
            start_event_id = %plan.start_event_id,
            end_event_id = %plan.end_event_id,
            events = plan.events.len(),
            "compaction planned"
        );

        let summary = match self.summarize(&plan, cancel).await {
            Ok(Some(summary)) => summary,
            Ok(None) => {
                debug!(session = %key, "summarizer declined");
                return Ok(CompactionOutcome::Skipped);
            }
            Err(SummarizerError::Cancelled) => {
                info!(session = %key, "compaction cancelled");
                return Ok(CompactionOutcome::Cancelled);
            }
            Err(error) => {
                warn!(session = %key, %error, "summarization failed");
                return Ok(CompactionOutcome::Failed(error.to_string()));
            }
        };
        if cancel.is_cancelled() {
            info!(session = %key, "compaction cancelled");
            return Ok(CompactionOutcome::Cancelled);
        }

        self.install(key, &plan, &summary).await
    }

    /// Run one cycle on a background task, logging anything that goes wrong.
    pub fn spawn(&self, key: SessionKey, cancel: CancellationToken) -> JoinHandle<()> {
        let manager = self.clone();
        tokio::spawn(async move {
            match manager.maybe_compact(&key, &cancel).await {
                Ok(outcome) => debug!(session = %key, ?outcome, "compaction cycle finished"),
                Err(error) => warn!(session = %key, %error, "compaction cycle failed"),
            }
        })
    }

    async fn summarize(
        &self,
        plan: &CompactionPlan,
        cancel: &CancellationToken,
    ) -> Result<Option<Event>, SummarizerError> {
        let timeout = self.policy.summarizer_timeout;
        let call = self.summarizer.maybe_summarize_events(&plan.events);
        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(SummarizerError::Cancelled),
            result = tokio::time::timeout(timeout, call) => match result {
                Ok(result) => result,
                Err(_) => Err(SummarizerError::Timeout {
                    timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                }),
            },
        }
    }

    async fn install(
        &self,
        key: &SessionKey,
        plan: &CompactionPlan,
        summary: &Event,
    ) -> strand_events::Result<CompactionOutcome> {
        let compacted_content = summary
            .compaction_info()
            .map_or_else(|| summary.content().clone(), |c| c.compacted_content.clone());
        if compacted_content.is_empty() {
            let error = SummarizerError::ParseError {
                reason: "summary has no content".into(),
            };
            warn!(session = %key, %error, "summarization failed");
            return Ok(CompactionOutcome::Failed(error.to_string()));
        }
        let author = if summary.author().is_empty() {
            COMPACTOR_AUTHOR
        } else {
            summary.author()
        };

        for attempt in 1..=MAX_INSTALL_ATTEMPTS {
            // Stamped at the log tail, so installing never raises the
            // timestamp floor for callers' pending appends.
            let tail = self
                .store
                .last_timestamp(&key.app_name, &key.user_id, &key.session_id)?
                .unwrap_or(plan.end_timestamp);
            let event = Event::compaction(
                summary.invocation_id().clone(),
                author,
                EventCompaction {
                    start_timestamp: plan.start_timestamp,
                    end_timestamp: plan.end_timestamp,
                    start_event_id: plan.start_event_id.clone(),
                    end_event_id: plan.end_event_id.clone(),
                    compacted_content: compacted_content.clone(),
                },
            )
            .at(tail);
            let event_id = event.id().clone();

            match self
                .store
                .append_event(&key.app_name, &key.user_id, &key.session_id, event.clone())
                .await
            {
                Ok(_) => {
                    info!(session = %key, event_id = %event_id, "compaction installed");
                    return Ok(CompactionOutcome::Installed(event));
                }
                Err(EventStoreError::OutOfOrder { .. }) => {
                    debug!(session = %key, attempt, "log tail moved before install, retrying");
                }
                Err(EventStoreError::CompactionConflict(reason)) => {
                    warn!(session = %key, %reason, "discarding compaction");
                    return Ok(CompactionOutcome::Conflict(reason));
                }
                Err(error) => return Err(error),
            }
        }

        let reason = format!("install lost {MAX_INSTALL_ATTEMPTS} timestamp races");
        warn!(session = %key, %reason, "summarization failed");
        Ok(CompactionOutcome::Failed(reason))
    }
}

// =============================================================================
// Tests
// =============================================================================
