//! Pure projections over an ordered event log.
//!
//! Everything here is a function of its input slice. The store calls these on
//! every read, so derived values (visible events, state, content) are never
//! cached or stored.
//!
//! Visibility is computed in one pass over the physical log: each rewind
//! marker truncates the visible list back to the events that precede its
//! cutoff event, and markers themselves are never visible. Because markers
//! are ordinary log entries, any number of rewinds compose.

use std::collections::{BTreeMap, HashMap};

use strand_core::EventId;

use crate::types::{Content, Event, EventCompaction, State, StateChange};

/// One entry of the context-window replay.
#[derive(Clone, Debug, PartialEq)]
pub struct ContentEntry {
    /// Raw event id, or the compaction event id for a summary entry.
    pub event_id: EventId,
    /// Author of the raw event or the compaction event.
    pub author: String,
    /// Content to replay.
    pub content: Content,
    /// True when this entry stands in for a compacted range.
    pub compacted: bool,
}

/// An installed compaction resolved against a visible slice.
#[derive(Clone, Debug, PartialEq)]
pub struct CompactionSpan {
    /// Index of the first covered event in the visible slice.
    pub start: usize,
    /// Index of the last covered event in the visible slice (inclusive).
    pub end: usize,
    /// Index of the compaction event itself.
    pub event_index: usize,
}

/// Events visible after applying every rewind marker in the physical log.
pub fn visible_events(physical: &[Event]) -> Vec<Event> {
    let positions: HashMap<&EventId, usize> = physical
        .iter()
        .enumerate()
        .map(|(i, e)| (e.id(), i))
        .collect();

    let mut visible: Vec<(usize, &Event)> = Vec::with_capacity(physical.len());
    for (index, event) in physical.iter().enumerate() {
        match event.rewind_info() {
            Some(marker) => {
                if let Some(&cutoff) = positions.get(&marker.cutoff_event_id) {
                    visible.retain(|(i, _)| *i < cutoff);
                }
            }
            None => visible.push((index, event)),
        }
    }
    visible.into_iter().map(|(_, e)| e.clone()).collect()
}

/// Fold state deltas in order, starting from an empty map.
///
/// Raw events inside compacted ranges still contribute: compaction changes
/// what is replayed to a model, never what the state is.
pub fn project_state(events: &[Event]) -> State {
    let mut state = State::new();
    for event in events {
        apply_state_delta(&mut state, event);
    }
    state
}

/// Apply one event's state delta to `state`.
pub fn apply_state_delta(state: &mut State, event: &Event) {
    for (key, change) in &event.actions().state_delta {
        match change {
            StateChange::Set(value) => {
                let _ = state.insert(key.clone(), value.clone());
            }
            StateChange::Delete => {
                let _ = state.remove(key);
            }
        }
    }
}

/// Installed compactions whose whole range is present in `visible`, in log
/// order of the compaction events.
pub fn compaction_spans(visible: &[Event]) -> Vec<CompactionSpan> {
    let positions = index_by_id(visible);
    visible
        .iter()
        .enumerate()
        .filter_map(|(event_index, event)| {
            let info = event.compaction_info()?;
            let start = *positions.get(&info.start_event_id)?;
            let end = *positions.get(&info.end_event_id)?;
            (start <= end && end < event_index).then_some(CompactionSpan {
                start,
                end,
                event_index,
            })
        })
        .collect()
}

/// Index just past the last compacted event, or 0 when nothing is compacted.
pub fn compacted_prefix_end(visible: &[Event]) -> usize {
    compaction_spans(visible)
        .iter()
        .map(|s| s.end + 1)
        .max()
        .unwrap_or(0)
}

/// Why `compaction` cannot be installed on top of `visible`, if it cannot.
///
/// A new range must be bounded by visible raw events and must start after
/// every active compaction's range ends.
pub fn compaction_conflict(visible: &[Event], compaction: &EventCompaction) -> Option<String> {
    let positions = index_by_id(visible);
    let Some(&start) = positions.get(&compaction.start_event_id) else {
        return Some(format!(
            "start event {} is not visible",
            compaction.start_event_id
        ));
    };
    let Some(&end) = positions.get(&compaction.end_event_id) else {
        return Some(format!(
            "end event {} is not visible",
            compaction.end_event_id
        ));
    };
    if start > end {
        return Some(format!("range start {start} is after range end {end}"));
    }
    if !visible[start].is_raw() || !visible[end].is_raw() {
        return Some("range must start and end on raw events".into());
    }
    for span in compaction_spans(visible) {
        let existing = &visible[span.event_index];
        if span.end >= start {
            return Some(format!(
                "range overlaps active compaction {}",
                existing.id()
            ));
        }
        let ends_later = existing
            .compaction_info()
            .is_some_and(|c| c.end_timestamp > compaction.start_timestamp);
        if ends_later {
            return Some(format!(
                "active compaction {} ends after range start",
                existing.id()
            ));
        }
    }
    None
}

/// Content replay: compacted ranges are replaced by their summary at the
/// position of the range start; compaction events and events without content
/// are omitted.
pub fn project_contents(visible: &[Event]) -> Vec<ContentEntry> {
    let mut by_start: BTreeMap<usize, CompactionSpan> = BTreeMap::new();
    for span in compaction_spans(visible) {
        let _ = by_start.insert(span.start, span);
    }

    let mut out = Vec::new();
    let mut index = 0;
    while index < visible.len() {
        if let Some(span) = by_start.get(&index) {
            let summary = &visible[span.event_index];
            if let Some(info) = summary.compaction_info() {
                out.push(ContentEntry {
                    event_id: summary.id().clone(),
                    author: summary.author().to_owned(),
                    content: info.compacted_content.clone(),
                    compacted: true,
                });
            }
            index = span.end + 1;
            continue;
        }
        let event = &visible[index];
        if event.compaction_info().is_none() && !event.content().is_empty() {
            out.push(ContentEntry {
                event_id: event.id().clone(),
                author: event.author().to_owned(),
                content: event.content().clone(),
                compacted: false,
            });
        }
        index += 1;
    }
    out
}

/// Latest version per artifact name.
pub fn project_artifacts(events: &[Event]) -> BTreeMap<String, i64> {
    let mut artifacts = BTreeMap::new();
    for event in events {
        for (name, version) in &event.actions().artifact_delta {
            let _ = artifacts.insert(name.clone(), *version);
        }
    }
    artifacts
}

fn index_by_id(events: &[Event]) -> HashMap<&EventId, usize> {
    events.iter().enumerate().map(|(i, e)| (e.id(), i)).collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
