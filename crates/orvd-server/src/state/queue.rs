//! Rendezvous queues for requests blocked on an operator decision.
//!
//! A vehicle request enqueues its id and awaits a oneshot; the operator
//! decision releases it. The waiting side owns a [`Ticket`]: dropping it
//! (timeout, or the connection going away) removes the id from the queue.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use orvd_core::models::Decision;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;

struct Pending {
    generation: u64,
    tx: oneshot::Sender<Decision>,
}

#[derive(Default)]
struct Inner {
    pending: DashMap<String, Pending>,
    generation: AtomicU64,
}

/// Ids blocked awaiting a decision.
#[derive(Clone, Default)]
pub struct DecisionQueue {
    inner: Arc<Inner>,
}

impl DecisionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `id`. Returns `None` when it is already queued.
    pub fn enqueue(&self, id: &str) -> Option<Ticket> {
        let generation = self.inner.generation.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        match self.inner.pending.entry(id.to_string()) {
            Entry::Occupied(_) => None,
            Entry::Vacant(slot) => {
                slot.insert(Pending { generation, tx });
                Some(Ticket {
                    queue: self.clone(),
                    id: id.to_string(),
                    generation,
                    rx: Some(rx),
                })
            }
        }
    }

    /// Wake the request waiting on `id`. Returns false when `id` is not queued.
    pub fn release(&self, id: &str, decision: Decision) -> bool {
        match self.inner.pending.remove(id) {
            Some((_, pending)) => {
                // The waiter may have just timed out; the decision is already applied.
                let _ = pending.tx.send(decision);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.inner.pending.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.inner.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.pending.is_empty()
    }
}

/// Membership of one id in a [`DecisionQueue`].
pub struct Ticket {
    queue: DecisionQueue,
    id: String,
    generation: u64,
    rx: Option<oneshot::Receiver<Decision>>,
}

impl Ticket {
    /// Wait for the decision. Timeout or a vanished sender resolves as `Reject`.
    pub async fn wait(mut self, timeout: Duration) -> Decision {
        let Some(rx) = self.rx.take() else {
            return Decision::Reject;
        };
        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(decision)) => decision,
            Ok(Err(_)) => Decision::Reject,
            Err(_) => {
                tracing::warn!("Decision for {} timed out after {:?}", self.id, timeout);
                Decision::Reject
            }
        }
    }
}

impl Drop for Ticket {
    fn drop(&mut self) {
        let generation = self.generation;
        self.queue
            .inner
            .pending
            .remove_if(&self.id, |_, pending| pending.generation == generation);
    }
}
