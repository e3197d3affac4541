//! In-process broker over a tokio broadcast channel.

use orvd_core::topic::{TopicError, TopicPattern};
use tokio::sync::broadcast;

use super::{Publication, PubSub, Subscription};

const CHANNEL_CAPACITY: usize = 1024;

#[derive(Clone)]
pub struct LocalBroker {
    tx: broadcast::Sender<Publication>,
}

impl Default for LocalBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalBroker {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl PubSub for LocalBroker {
    fn publish(&self, topic: &str, payload: String) {
        tracing::debug!("Publish {} ({} bytes)", topic, payload.len());
        // No subscribers is not an error; the message is simply not delivered.
        let _ = self.tx.send(Publication {
            topic: topic.to_string(),
            payload,
        });
    }

    fn subscribe(&self, pattern: &str) -> Result<Subscription, TopicError> {
        let pattern = TopicPattern::compile(pattern)?;
        Ok(Subscription::new(self.tx.subscribe(), pattern))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscriber_sees_matching_topics_only() {
        let broker = LocalBroker::new();
        let mut sub = broker.subscribe("ping/{id}").unwrap();
        sub.add("api/forbidden_zones").unwrap();

        broker.publish("api/flight_status/V1", "$Flight 1".into());
        broker.publish("ping/V1", "$Delay 1".into());
        broker.publish("api/forbidden_zones", "$ForbiddenZones 0".into());

        assert_eq!(sub.recv().await.unwrap().topic, "ping/V1");
        assert_eq!(sub.recv().await.unwrap().topic, "api/forbidden_zones");
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_fine() {
        let broker = LocalBroker::new();
        broker.publish("ping/V1", "$Delay 1".into());
        assert_eq!(broker.subscriber_count(), 0);
        assert!(broker.subscribe("a/#/b").is_err());
    }
}
