//! Property tests for state projection.

use std::collections::BTreeMap;

use proptest::prelude::*;
use serde_json::json;
use strand_core::InvocationId;
use strand_events::projector::{project_state, visible_events};
use strand_events::{Event, SessionStore, State};

#[derive(Clone, Debug)]
enum Op {
    Set(u8, i64),
    Delete(u8),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0u8..6, any::<i64>()).prop_map(|(k, v)| Op::Set(k, v)),
        (0u8..6).prop_map(Op::Delete),
    ]
}

fn to_event(batch: &[Op], ts: f64) -> Event {
    let mut event = Event::new(InvocationId::new(), "user").at(ts);
    for op in batch {
        event = match op {
            Op::Set(k, v) => event.with_state(format!("k{k}"), json!(v)),
            Op::Delete(k) => event.with_state_removal(format!("k{k}")),
        };
    }
    event
}

fn reference_fold(events: &[Event]) -> State {
    let mut state = BTreeMap::new();
    for event in events {
        for (key, change) in &event.actions().state_delta {
            match change {
                strand_events::StateChange::Set(v) => {
                    let _ = state.insert(key.clone(), v.clone());
                }
                strand_events::StateChange::Delete => {
                    let _ = state.remove(key);
                }
            }
        }
    }
    state
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn projection_is_deterministic(batches in prop::collection::vec(prop::collection::vec(op(), 0..4), 0..20)) {
        let events: Vec<Event> = batches
            .iter()
            .enumerate()
            .map(|(i, b)| to_event(b, i as f64))
            .collect();

        let first = project_state(&events);
        let second = project_state(&events);
        prop_assert_eq!(&first, &second);
        prop_assert_eq!(&first, &reference_fold(&events));
        prop_assert_eq!(visible_events(&events).len(), events.len());
    }

    #[test]
    fn store_state_equals_fold_of_visible_events(batches in prop::collection::vec(prop::collection::vec(op(), 1..4), 1..12)) {
        let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
        rt.block_on(async {
            let store = SessionStore::in_memory();
            let id = store.create_session("app", "u", None, None).await.unwrap().id;
            for (i, batch) in batches.iter().enumerate() {
                let _ = store.append_event("app", "u", &id, to_event(batch, i as f64)).await.unwrap();
            }
            let session = store.get_session("app", "u", &id).unwrap();
            assert_eq!(session.state, reference_fold(&session.events));
            assert_eq!(session.state, store.get_session("app", "u", &id).unwrap().state);
        });
    }
}
