//! Session log behaviour against both storage backends.

mod common;

use std::collections::HashSet;

use assert_matches::assert_matches;
use common::{APP, USER, both};
use serde_json::json;
use strand_core::{InvocationId, now_seconds};
use strand_events::projector;
use strand_events::{Event, EventStoreError, RewindCoordinator, State};

#[tokio::test]
async fn timestamps_never_decrease_in_physical_log() {
    for fx in both() {
        let id = fx.store.create_session(APP, USER, None, None).await.unwrap().id;
        for ts in [1.0, 2.0, 1.5, 2.0, 0.5, 3.0] {
            let event = Event::new(InvocationId::new(), "user").at(ts);
            let _ = fx.store.append_event(APP, USER, &id, event).await;
        }
        let log = fx.store.physical_events(APP, USER, &id).unwrap();
        let stamps: Vec<f64> = log.iter().map(Event::timestamp).collect();
        assert_eq!(stamps, vec![1.0, 2.0, 2.0, 3.0], "{}", fx.name);
    }
}

#[tokio::test]
async fn out_of_order_rejection_leaves_log_unchanged() {
    for fx in both() {
        let id = fx.store.create_session(APP, USER, None, None).await.unwrap().id;
        let first = Event::new(InvocationId::new(), "user").with_state("k", json!(1)).at(5.0);
        fx.store.append_event(APP, USER, &id, first).await.unwrap();
        let before = fx.store.get_session(APP, USER, &id).unwrap();

        let late = Event::new(InvocationId::new(), "user").with_state("k", json!(2)).at(4.0);
        assert_matches!(
            fx.store.append_event(APP, USER, &id, late).await,
            Err(EventStoreError::OutOfOrder { .. }),
            "{}",
            fx.name
        );

        let after = fx.store.get_session(APP, USER, &id).unwrap();
        assert_eq!(after.events, before.events, "{}", fx.name);
        assert_eq!(after.state, before.state, "{}", fx.name);
        assert_eq!(fx.store.physical_events(APP, USER, &id).unwrap().len(), 1);
    }
}

#[tokio::test]
async fn rewind_branches_and_keeps_physical_history() {
    for fx in both() {
        let store = &fx.store;
        let rewinder = RewindCoordinator::new(store.clone());
        let id = store.create_session(APP, USER, None, None).await.unwrap().id;

        let inv_a = InvocationId::new();
        let inv_b = InvocationId::new();
        let a = Event::new(inv_a, "user").with_state("step", json!("a")).at(1.0);
        let b = Event::new(inv_b.clone(), "user").with_state("step", json!("b")).with_state("b_only", json!(true)).at(2.0);
        store.append_event(APP, USER, &id, a.clone()).await.unwrap();
        store.append_event(APP, USER, &id, b.clone()).await.unwrap();

        let rewound = rewinder.rewind(APP, USER, &id, &inv_b).await.unwrap();
        assert_eq!(rewound.state.get("step"), Some(&json!("a")), "{}", fx.name);
        assert!(!rewound.state.contains_key("b_only"));

        let c = Event::new(InvocationId::new(), "user").with_state("step", json!("c")).at(3.0);
        let session = store.append_event(APP, USER, &id, c.clone()).await.unwrap();

        let visible: Vec<_> = session.events.iter().map(|e| e.id().clone()).collect();
        assert_eq!(visible, vec![a.id().clone(), c.id().clone()], "{}", fx.name);
        assert_eq!(session.state.get("step"), Some(&json!("c")));
        assert_eq!(session.events[1].branch(), Some("branch-1"));

        let physical = store.physical_events(APP, USER, &id).unwrap();
        assert!(physical.iter().any(|e| e.id() == b.id()), "{}: B must stay on disk", fx.name);
        assert_eq!(physical.len(), 4);

        let reread = store.get_session(APP, USER, &id).unwrap();
        assert_eq!(reread.branch.as_deref(), Some("branch-1"));
        assert_eq!(reread.active_from.as_ref(), Some(physical[2].id()));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_appends_serialize() {
    for fx in both() {
        let id = fx.store.create_session(APP, USER, None, None).await.unwrap().id;
        let ts = now_seconds();

        let mut handles = Vec::with_capacity(100);
        for i in 0..100_u64 {
            let store = fx.store.clone();
            let id = id.clone();
            handles.push(tokio::spawn(async move {
                let event = Event::new(InvocationId::new(), "writer")
                    .with_state(format!("k{i}"), json!(i))
                    .with_state("last", json!(i))
                    .at(ts);
                store.append_event(APP, USER, &id, event).await
            }));
        }
        for result in futures::future::join_all(handles).await {
            let _ = result.unwrap().unwrap();
        }

        let physical = fx.store.physical_events(APP, USER, &id).unwrap();
        assert_eq!(physical.len(), 100, "{}", fx.name);
        let unique: HashSet<_> = physical.iter().map(|e| e.id().clone()).collect();
        assert_eq!(unique.len(), 100, "{}", fx.name);

        let session = fx.store.get_session(APP, USER, &id).unwrap();
        let mut sequential = State::new();
        for event in &physical {
            projector::apply_state_delta(&mut sequential, event);
        }
        assert_eq!(session.state, sequential, "{}", fx.name);
        assert_eq!(session.state.len(), 101);
        assert_eq!(fx.store.lock_count(), 0, "{}", fx.name);
    }
}

#[tokio::test]
async fn sessions_are_isolated_by_key() {
    for fx in both() {
        let id = fx.store.create_session(APP, USER, None, None).await.unwrap().id;
        let other_user = fx
            .store
            .create_session(APP, "user-2", Some(id.clone()), None)
            .await
            .unwrap();
        assert_eq!(other_user.id, id);

        let event = Event::new(InvocationId::new(), "user").with_state("who", json!("one"));
        fx.store.append_event(APP, USER, &id, event).await.unwrap();

        assert!(fx.store.get_session(APP, "user-2", &id).unwrap().state.is_empty());
        fx.store.delete_session(APP, USER, &id).await.unwrap();
        assert!(fx.store.get_session(APP, "user-2", &id).is_ok(), "{}", fx.name);
    }
}
