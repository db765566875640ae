//! Publish/subscribe event fanout (§4.H).
//!
//! Events are opaque strings. Delivery is best-effort and non-blocking: a
//! subscriber that falls behind loses the events it missed rather than
//! stalling the publisher, which is exactly `tokio::sync::broadcast`'s
//! lagged-receiver behavior.

use tokio::sync::broadcast;

const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

pub struct EventHub {
    sender: broadcast::Sender<String>,
}

impl EventHub {
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event. Returns the number of subscribers it was handed to;
    /// zero subscribers is not an error.
    pub fn publish(&self, event: impl Into<String>) -> usize {
        self.sender.send(event.into()).unwrap_or(0)
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.sender.subscribe()
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscriber_receives_published_event() {
        let hub = EventHub::new();
        let mut rx = hub.subscribe();
        hub.publish("entity.spawned");
        assert_eq!(rx.recv().await.unwrap(), "entity.spawned");
    }

    #[tokio::test]
    async fn publish_with_no_subscribers_does_not_error() {
        let hub = EventHub::new();
        assert_eq!(hub.publish("noop"), 0);
    }

    #[tokio::test]
    async fn slow_subscriber_lags_instead_of_stalling_publisher() {
        let hub = EventHub::with_capacity(2);
        let mut rx = hub.subscribe();
        hub.publish("a");
        hub.publish("b");
        hub.publish("c");
        assert!(matches!(rx.recv().await, Err(broadcast::error::RecvError::Lagged(_))));
    }
}
