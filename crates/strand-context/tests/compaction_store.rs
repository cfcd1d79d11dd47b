//! Compaction cycles against a live store: non-overlap, state preservation,
//! and conflicts with rewinds that land while the summarizer runs.

#![allow(unused_results)]

use std::sync::Arc;

use assert_matches::assert_matches;
use async_trait::async_trait;
use serde_json::json;
use strand_context::{
    CompactionManager, CompactionOutcome, CompactionPolicy, Summarizer, SummarizerError,
    TranscriptSummarizer,
};
use strand_core::InvocationId;
use strand_core::logging::capture_logs;
use strand_events::{Event, RewindCoordinator, SessionKey, SessionStore, projector};
use strand_settings::{StorageBackendKind, StorageSettings};
use tokio_util::sync::CancellationToken;
use tracing::Level;

const APP: &str = "app";
const USER: &str = "user-1";

fn policy(trigger: usize) -> CompactionPolicy {
    CompactionPolicy {
        trigger_event_count: trigger,
        ..CompactionPolicy::default()
    }
}

/// Appends `turns` invocations (user request, model answer with a state
/// write) and returns their invocation ids.
async fn converse(store: &SessionStore, key: &SessionKey, turns: usize, from: usize) -> Vec<InvocationId> {
    let mut invocations = Vec::new();
    for turn in from..from + turns {
        let inv = InvocationId::new();
        store
            .append_event(
                APP,
                USER,
                &key.session_id,
                Event::new(inv.clone(), "user").with_text("user", format!("request {turn}")),
            )
            .await
            .unwrap();
        store
            .append_event(
                APP,
                USER,
                &key.session_id,
                Event::new(inv.clone(), "agent")
                    .with_text("model", format!("answer {turn}"))
                    .with_state("turn", json!(turn))
                    .with_state(format!("seen_{turn}"), json!(true)),
            )
            .await
            .unwrap();
        invocations.push(inv);
    }
    invocations
}

async fn new_session(store: &SessionStore) -> SessionKey {
    store
        .create_session(APP, USER, None, None)
        .await
        .unwrap()
        .key()
}

async fn two_cycles_never_overlap(store: Arc<SessionStore>) {
    let key = new_session(&store).await;
    let manager = CompactionManager::new(store.clone(), Arc::new(TranscriptSummarizer), policy(4));
    let cancel = CancellationToken::new();

    converse(&store, &key, 3, 0).await;
    let first = assert_matches!(
        manager.maybe_compact(&key, &cancel).await.unwrap(),
        CompactionOutcome::Installed(event) => event
    );
    converse(&store, &key, 4, 3).await;
    let second = assert_matches!(
        manager.maybe_compact(&key, &cancel).await.unwrap(),
        CompactionOutcome::Installed(event) => event
    );

    let first = first.compaction_info().unwrap().clone();
    let second = second.compaction_info().unwrap().clone();
    assert!(second.start_timestamp >= first.end_timestamp);

    let session = store.get_session(APP, USER, &key.session_id).unwrap();
    let spans = projector::compaction_spans(&session.events);
    assert_eq!(spans.len(), 2);
    assert!(spans[1].start > spans[0].end);

    // Two summaries followed by the retained last invocation.
    let contents = session.contents();
    assert_eq!(contents.iter().filter(|c| c.compacted).count(), 2);
    assert_eq!(contents.len(), 4);
}

#[tokio::test]
async fn compactions_do_not_overlap_in_memory() {
    two_cycles_never_overlap(Arc::new(SessionStore::in_memory())).await;
}

#[tokio::test]
async fn compactions_do_not_overlap_in_sqlite() {
    let dir = tempfile::tempdir().unwrap();
    let settings = StorageSettings {
        backend: StorageBackendKind::Sqlite,
        database_path: dir.path().join("sessions.db").to_string_lossy().into_owned(),
        ..StorageSettings::default()
    };
    two_cycles_never_overlap(Arc::new(SessionStore::open(&settings).unwrap())).await;
}

#[tokio::test]
async fn compaction_does_not_alter_state() {
    let store = Arc::new(SessionStore::in_memory());
    let key = new_session(&store).await;
    converse(&store, &key, 5, 0).await;
    let before = store.get_session(APP, USER, &key.session_id).unwrap();

    let manager = CompactionManager::new(store.clone(), Arc::new(TranscriptSummarizer), policy(2));
    assert_matches!(
        manager
            .maybe_compact(&key, &CancellationToken::new())
            .await
            .unwrap(),
        CompactionOutcome::Installed(_)
    );

    let after = store.get_session(APP, USER, &key.session_id).unwrap();
    assert_eq!(after.state, before.state);
    assert_eq!(after.state["turn"], json!(4));
    assert_eq!(after.events.len(), before.events.len() + 1);
}

/// Rewinds the session while it is being summarized.
struct RewindingSummarizer {
    rewind: RewindCoordinator,
    key: SessionKey,
    target: InvocationId,
}

#[async_trait]
impl Summarizer for RewindingSummarizer {
    async fn maybe_summarize_events(
        &self,
        events: &[Event],
    ) -> Result<Option<Event>, SummarizerError> {
        self.rewind
            .rewind(APP, USER, &self.key.session_id, &self.target)
            .await
            .map_err(|e| SummarizerError::CallFailed {
                message: e.to_string(),
            })?;
        TranscriptSummarizer.maybe_summarize_events(events).await
    }
}

#[tokio::test]
async fn rewind_during_summarization_discards_result() {
    let (logs, _guard) = capture_logs();
    let store = Arc::new(SessionStore::in_memory());
    let key = new_session(&store).await;
    let invocations = converse(&store, &key, 4, 0).await;

    let summarizer = RewindingSummarizer {
        rewind: RewindCoordinator::new(store.clone()),
        key: key.clone(),
        target: invocations[0].clone(),
    };
    let manager = CompactionManager::new(store.clone(), Arc::new(summarizer), policy(2));

    let outcome = manager
        .maybe_compact(&key, &CancellationToken::new())
        .await
        .unwrap();
    assert_matches!(outcome, CompactionOutcome::Conflict(reason) if reason.contains("not visible"));
    assert!(logs.has_event(Level::WARN, "discarding compaction"));

    let physical = store.physical_events(APP, USER, &key.session_id).unwrap();
    assert!(physical.iter().all(|e| e.compaction_info().is_none()));
    let session = store.get_session(APP, USER, &key.session_id).unwrap();
    assert!(session.events.is_empty());
    assert!(session.state.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn background_compaction_races_appends() {
    let store = Arc::new(SessionStore::in_memory());
    let key = new_session(&store).await;
    converse(&store, &key, 6, 0).await;

    let manager = CompactionManager::new(store.clone(), Arc::new(TranscriptSummarizer), policy(4));
    let background = manager.spawn(key.clone(), CancellationToken::new());
    converse(&store, &key, 6, 6).await;
    background.await.unwrap();

    let session = store.get_session(APP, USER, &key.session_id).unwrap();
    assert_eq!(session.state["turn"], json!(11));
    assert_eq!(session.events.iter().filter(|e| e.is_raw()).count(), 24);
    let compactions = session
        .events
        .iter()
        .filter(|e| e.compaction_info().is_some())
        .count();
    assert!(compactions <= 1);
    assert_eq!(store.lock_count(), 0);
}

#[tokio::test]
async fn event_built_before_install_appends_after_it() {
    let store = Arc::new(SessionStore::in_memory());
    let key = new_session(&store).await;
    converse(&store, &key, 3, 0).await;
    let pending = Event::new(InvocationId::new(), "user").with_text("user", "still typing");

    let manager = CompactionManager::new(store.clone(), Arc::new(TranscriptSummarizer), policy(4));
    assert_matches!(
        manager
            .maybe_compact(&key, &CancellationToken::new())
            .await
            .unwrap(),
        CompactionOutcome::Installed(_)
    );

    let session = store
        .append_event(APP, USER, &key.session_id, pending.clone())
        .await
        .unwrap();
    assert_eq!(session.events.last().map(Event::id), Some(pending.id()));
}

#[tokio::test]
async fn loaded_settings_configure_store_and_policy() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("sessions.db");
    let file = dir.path().join("settings.json");
    let body = json!({
        "storage": { "backend": "sqlite", "databasePath": db.to_string_lossy() },
        "compaction": { "triggerEventCount": 4, "summarizerTimeoutMs": 5000 }
    });
    std::fs::write(&file, body.to_string()).unwrap();

    let settings = strand_settings::load_settings_from_path(&file).unwrap();
    let store = Arc::new(SessionStore::open(&settings.storage).unwrap());
    let policy = CompactionPolicy::from(&settings.compaction);
    assert_eq!(policy.trigger_event_count, 4);

    let key = new_session(&store).await;
    converse(&store, &key, 3, 0).await;
    let manager = CompactionManager::new(store.clone(), Arc::new(TranscriptSummarizer), policy);
    assert_matches!(
        manager
            .maybe_compact(&key, &CancellationToken::new())
            .await
            .unwrap(),
        CompactionOutcome::Installed(_)
    );
    assert!(db.exists());
}
