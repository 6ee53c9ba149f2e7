// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process pub/sub with bounded ring history.
//!
//! Delivery guarantees: `publish_sync` runs every handler on the caller's
//! thread in subscribe order; `publish` enqueues to each subscriber's
//! bounded queue, so per-subscriber order is preserved but cross-subscriber
//! order is not. A full subscriber queue blocks the async publisher, never
//! the synchronous path. The history lock is never held across dispatch.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::event::Event;

/// Synchronous event handler.
pub type Handler = Arc<dyn Fn(&Event) + Send + Sync>;

/// Queue depth for each subscriber channel.
const SUBSCRIBER_QUEUE: usize = 256;

struct Sub {
    id: u64,
    tx: mpsc::Sender<Event>,
    sync_handler: Option<Handler>,
}

struct BusState {
    history: VecDeque<Event>,
    capacity: usize,
    subs: Vec<Sub>,
    next_id: u64,
}

/// A channel subscription: events arrive in publish order for this
/// subscriber. Dropping the subscription detaches it.
pub struct Subscription {
    pub id: u64,
    pub rx: mpsc::Receiver<Event>,
}

/// The process-wide event bus. Owned by the runtime; clone the `Arc`.
pub struct EventBus {
    state: Mutex<BusState>,
}

impl EventBus {
    /// Create a bus with the given ring-history capacity.
    pub fn new(history_capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(BusState {
                history: VecDeque::with_capacity(history_capacity),
                capacity: history_capacity.max(1),
                subs: Vec::new(),
                next_id: 0,
            }),
        })
    }

    /// Subscribe with a channel. The receiver sees every event published
    /// after this call, in per-publisher FIFO order.
    pub fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_QUEUE);
        let mut state = self.state.lock();
        state.next_id += 1;
        let id = state.next_id;
        state.subs.push(Sub { id, tx, sync_handler: None });
        Subscription { id, rx }
    }

    /// Subscribe a handler that receives every event kind.
    ///
    /// The handler runs inline on `publish_sync` and on a dedicated
    /// forwarding task for async `publish`, so it observes a single ordered
    /// stream per publisher.
    pub fn subscribe_all(self: &Arc<Self>, handler: Handler) -> u64 {
        let (tx, mut rx) = mpsc::channel::<Event>(SUBSCRIBER_QUEUE);
        let task_handler = Arc::clone(&handler);
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                task_handler(&event);
            }
        });
        let mut state = self.state.lock();
        state.next_id += 1;
        let id = state.next_id;
        state.subs.push(Sub { id, tx, sync_handler: Some(handler) });
        id
    }

    /// Remove a subscriber. Safe to call with an unknown id.
    pub fn unsubscribe(&self, id: u64) {
        let mut state = self.state.lock();
        state.subs.retain(|s| s.id != id);
    }

    /// Publish on the caller's thread: record history, then deliver to every
    /// subscriber in subscribe order before returning.
    pub fn publish_sync(&self, event: Event) {
        let (handlers, txs) = {
            let mut state = self.state.lock();
            push_history(&mut state, event.clone());
            let handlers: Vec<Handler> =
                state.subs.iter().filter_map(|s| s.sync_handler.clone()).collect();
            let txs: Vec<mpsc::Sender<Event>> = state
                .subs
                .iter()
                .filter(|s| s.sync_handler.is_none())
                .map(|s| s.tx.clone())
                .collect();
            (handlers, txs)
        };
        for handler in handlers {
            handler(&event);
        }
        // Channel subscribers get a non-blocking enqueue: the sync path must
        // never stall on a slow consumer.
        for tx in txs {
            if tx.try_send(event.clone()).is_err() {
                tracing::warn!(kind = %event.kind, "dropping event for saturated subscriber");
            }
        }
    }

    /// Publish asynchronously: record history, then enqueue to every
    /// subscriber queue, awaiting capacity where a queue is full.
    pub async fn publish(&self, event: Event) {
        let txs: Vec<mpsc::Sender<Event>> = {
            let mut state = self.state.lock();
            push_history(&mut state, event.clone());
            state.subs.iter().map(|s| s.tx.clone()).collect()
        };
        for tx in txs {
            // A closed receiver just means the subscriber went away.
            let _ = tx.send(event.clone()).await;
        }
    }

    /// The last `n` events in publish order.
    pub fn history(&self, n: usize) -> Vec<Event> {
        let state = self.state.lock();
        let len = state.history.len();
        state.history.iter().skip(len.saturating_sub(n)).cloned().collect()
    }
}

fn push_history(state: &mut BusState, event: Event) {
    if state.history.len() == state.capacity {
        state.history.pop_front();
    }
    state.history.push_back(event);
}

#[cfg(test)]
#[path = "bus_tests.rs"]
mod tests;
