//! Event fan-out to SSE subscribers.
//!
//! Each subscriber owns a bounded FIFO channel of pre-serialised JSON
//! frames. Publishing serialises the event once, stamps the timestamp,
//! and delivers non-blockingly: a full buffer drops that event for that
//! subscriber only, so one slow reader never backpressures the agent
//! loop or its peers. Drops preserve order; subscribers may observe
//! gaps but never reordering.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::mpsc;

use crate::runtime::events::AgentEvent;

/// Per-subscriber buffer; tolerates transient TCP pauses at normal rates.
const SUBSCRIBER_BUFFER: usize = 100;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Broker
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct EventBroker {
    subscribers: RwLock<HashMap<u64, mpsc::Sender<String>>>,
    next_id: AtomicU64,
}

impl EventBroker {
    pub fn new() -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a new subscriber. Only events published after this call
    /// are delivered; there is no backlog replay.
    pub fn subscribe(self: &Arc<Self>) -> Subscription {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_BUFFER);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers.write().insert(id, tx);
        tracing::debug!(subscriber = id, "subscriber registered");
        Subscription {
            id,
            rx,
            broker: Arc::clone(self),
        }
    }

    /// Stamp, serialise once, and deliver to every live subscriber.
    pub fn publish(&self, event: AgentEvent) {
        #[derive(Serialize)]
        struct Envelope<'a> {
            #[serde(flatten)]
            event: &'a AgentEvent,
            timestamp: i64,
        }

        let frame = match serde_json::to_string(&Envelope {
            event: &event,
            timestamp: chrono::Utc::now().timestamp(),
        }) {
            Ok(f) => f,
            Err(e) => {
                tracing::error!(error = %e, "failed to serialise event");
                return;
            }
        };

        let subscribers = self.subscribers.read();
        for (id, tx) in subscribers.iter() {
            match tx.try_send(frame.clone()) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    tracing::warn!(subscriber = id, "subscriber buffer full, dropping event");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    // The Subscription was dropped; unsubscribe removes
                    // the entry shortly.
                }
            }
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    fn unsubscribe(&self, id: u64) {
        self.subscribers.write().remove(&id);
        tracing::debug!(subscriber = id, "subscriber removed");
    }
}

impl Default for EventBroker {
    fn default() -> Self {
        Self::new()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Subscription
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A live subscription; dropping it releases the registry entry.
pub struct Subscription {
    id: u64,
    rx: mpsc::Receiver<String>,
    broker: Arc<EventBroker>,
}

impl Subscription {
    /// Next frame, or `None` when the service shuts down.
    pub async fn recv(&mut self) -> Option<String> {
        self.rx.recv().await
    }

    /// Non-blocking variant used by tests.
    pub fn try_recv(&mut self) -> Option<String> {
        self.rx.try_recv().ok()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.broker.unsubscribe(self.id);
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
