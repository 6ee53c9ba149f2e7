// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::event::{Event, EventKind};

use super::EventBus;

fn event(kind: EventKind, n: u64) -> Event {
    Event::new(kind, Some("s"), serde_json::json!({ "n": n }))
}

#[test]
fn history_is_bounded_and_ordered() {
    let bus = EventBus::new(3);
    for n in 0..5 {
        bus.publish_sync(event(EventKind::SpawnRequested, n));
    }
    let history = bus.history(10);
    assert_eq!(history.len(), 3);
    let ns: Vec<u64> =
        history.iter().map(|e| e.payload["n"].as_u64().unwrap_or(0)).collect();
    assert_eq!(ns, vec![2, 3, 4]);
}

#[test]
fn history_n_returns_tail() {
    let bus = EventBus::new(10);
    for n in 0..6 {
        bus.publish_sync(event(EventKind::PaneOpened, n));
    }
    let last_two = bus.history(2);
    assert_eq!(last_two.len(), 2);
    assert_eq!(last_two[1].payload["n"], 5);
}

#[tokio::test]
async fn sync_publish_delivers_in_subscribe_order() {
    let bus = EventBus::new(8);
    let order = Arc::new(Mutex::new(Vec::new()));

    for tag in ["first", "second", "third"] {
        let order = Arc::clone(&order);
        bus.subscribe_all(Arc::new(move |_e: &Event| {
            order.lock().push(tag);
        }));
    }

    bus.publish_sync(event(EventKind::AgentState, 1));
    assert_eq!(*order.lock(), vec!["first", "second", "third"]);
}

#[tokio::test]
async fn async_publish_preserves_per_subscriber_fifo() {
    let bus = EventBus::new(64);
    let mut sub = bus.subscribe();

    for n in 0..10 {
        bus.publish(event(EventKind::SpawnAdmitted, n)).await;
    }

    for expected in 0..10 {
        let got = sub.rx.recv().await.map(|e| e.payload["n"].as_u64());
        assert_eq!(got, Some(Some(expected)));
    }
}

#[tokio::test]
async fn unsubscribe_stops_delivery() {
    let bus = EventBus::new(8);
    let count = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&count);
    let id = bus.subscribe_all(Arc::new(move |_e: &Event| {
        counter.fetch_add(1, Ordering::SeqCst);
    }));

    bus.publish_sync(event(EventKind::PaneClosed, 1));
    bus.unsubscribe(id);
    bus.publish_sync(event(EventKind::PaneClosed, 2));

    assert_eq!(count.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn saturated_channel_subscriber_does_not_block_sync_path() {
    let bus = EventBus::new(8);
    // Subscribe but never drain.
    let _sub = bus.subscribe();
    // Far more events than the queue holds; must not deadlock.
    for n in 0..1000 {
        bus.publish_sync(event(EventKind::AgentState, n));
    }
    assert_eq!(bus.history(1).len(), 1);
}
