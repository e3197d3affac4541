//! Topic-based publish/subscribe transport.
//!
//! The relay publishes signed notifications to vehicles and receives vehicle
//! traffic through a [`PubSub`] implementation. [`LocalBroker`] keeps it in
//! process; WebSocket clients attach through the bridge in `api::ws`.

pub mod broker;
pub mod inbound;
pub mod outbound;
pub mod router;
pub mod topics;

pub use broker::LocalBroker;
pub use router::TopicRouter;

use orvd_core::topic::{TopicError, TopicPattern};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// One message on a topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Publication {
    pub topic: String,
    pub payload: String,
}

pub trait PubSub: Send + Sync {
    fn publish(&self, topic: &str, payload: String);

    /// Subscribe to topics matching `pattern` (`{name}` placeholders, `+` and `#` allowed).
    fn subscribe(&self, pattern: &str) -> Result<Subscription, TopicError>;
}

/// A filtered view of the broker stream.
pub struct Subscription {
    rx: broadcast::Receiver<Publication>,
    patterns: Vec<TopicPattern>,
}

impl Subscription {
    pub(crate) fn new(rx: broadcast::Receiver<Publication>, pattern: TopicPattern) -> Self {
        Self {
            rx,
            patterns: vec![pattern],
        }
    }

    /// Widen the subscription with another pattern.
    pub fn add(&mut self, pattern: &str) -> Result<(), TopicError> {
        let pattern = TopicPattern::compile(pattern)?;
        if !self.patterns.contains(&pattern) {
            self.patterns.push(pattern);
        }
        Ok(())
    }

    pub fn matches(&self, topic: &str) -> bool {
        self.patterns.iter().any(|p| p.matches(topic).is_some())
    }

    /// Next matching publication, or `None` once the broker is gone.
    pub async fn recv(&mut self) -> Option<Publication> {
        loop {
            match self.rx.recv().await {
                Ok(publication) if self.matches(&publication.topic) => return Some(publication),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!("Subscriber lagged, {} messages dropped", skipped);
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
