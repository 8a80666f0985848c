use std::{fmt, sync::Arc};

use dashmap::DashMap;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

/// Handle returned by [`BroadcastHub::subscribe`] and used to unsubscribe later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

/// Reason a subscriber could not take an event.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    /// The connection behind the subscriber is gone.
    #[error("subscriber disconnected")]
    Disconnected,
    /// The subscriber's buffer is full.
    #[error("subscriber buffer full")]
    Backpressure,
}

type Callback<E> = Arc<dyn Fn(&E) -> Result<(), DeliveryError> + Send + Sync>;

/// Fan-out registry of subscriber callbacks for one event topic.
pub struct BroadcastHub<E> {
    topic: &'static str,
    subscribers: DashMap<SubscriptionId, Callback<E>>,
}

impl<E> BroadcastHub<E> {
    /// Create an empty hub; `topic` only appears in logs.
    pub fn new(topic: &'static str) -> Self {
        Self {
            topic,
            subscribers: DashMap::new(),
        }
    }

    /// Name of the topic served by this hub.
    pub fn topic(&self) -> &'static str {
        self.topic
    }

    /// Register a delivery callback and return its handle.
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&E) -> Result<(), DeliveryError> + Send + Sync + 'static,
    {
        let id = SubscriptionId::new();
        self.subscribers.insert(id, Arc::new(callback));
        debug!(topic = self.topic, subscription = %id, "subscriber added");
        id
    }

    /// Remove a subscriber. Unknown or already removed handles are ignored.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        if self.subscribers.remove(&id).is_some() {
            debug!(topic = self.topic, subscription = %id, "subscriber removed");
        }
    }

    /// Number of live subscribers.
    pub fn count(&self) -> usize {
        self.subscribers.len()
    }

    /// Deliver `event` to every subscriber, dropping the ones that fail.
    pub fn broadcast(&self, event: &E) {
        // Callbacks run outside the map shards so they may touch the hub themselves.
        let targets: Vec<(SubscriptionId, Callback<E>)> = self
            .subscribers
            .iter()
            .map(|entry| (*entry.key(), Arc::clone(entry.value())))
            .collect();

        for (id, callback) in targets {
            if let Err(err) = callback(event) {
                warn!(
                    topic = self.topic,
                    subscription = %id,
                    error = %err,
                    "dropping dead subscriber"
                );
                self.subscribers.remove(&id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    fn recorder(hub: &BroadcastHub<String>) -> (SubscriptionId, Arc<Mutex<Vec<String>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let id = hub.subscribe(move |event: &String| {
            sink.lock().unwrap().push(event.clone());
            Ok(())
        });
        (id, seen)
    }

    #[test]
    fn broadcast_reaches_every_subscriber() {
        let hub = BroadcastHub::new("test");
        let (_, first) = recorder(&hub);
        let (_, second) = recorder(&hub);

        hub.broadcast(&"hello".to_string());

        assert_eq!(*first.lock().unwrap(), vec!["hello".to_string()]);
        assert_eq!(*second.lock().unwrap(), vec!["hello".to_string()]);
        assert_eq!(hub.count(), 2);
    }

    #[test]
    fn failing_subscriber_is_removed_without_blocking_others() {
        let hub = BroadcastHub::new("test");
        let (_, first) = recorder(&hub);
        hub.subscribe(|_: &String| Err(DeliveryError::Disconnected));
        let (_, third) = recorder(&hub);
        let (_, fourth) = recorder(&hub);
        assert_eq!(hub.count(), 4);

        hub.broadcast(&"one".to_string());
        hub.broadcast(&"two".to_string());

        for seen in [first, third, fourth] {
            assert_eq!(*seen.lock().unwrap(), vec!["one".to_string(), "two".to_string()]);
        }
        assert_eq!(hub.count(), 3);
    }

    #[test]
    fn unsubscribe_is_idempotent() {
        let hub = BroadcastHub::new("test");
        let (gone, gone_seen) = recorder(&hub);
        let (_, kept) = recorder(&hub);

        hub.unsubscribe(gone);
        hub.unsubscribe(gone);
        let stranger = BroadcastHub::<String>::new("other").subscribe(|_| Ok(()));
        hub.unsubscribe(stranger);

        hub.broadcast(&"after".to_string());
        assert!(gone_seen.lock().unwrap().is_empty());
        assert_eq!(*kept.lock().unwrap(), vec!["after".to_string()]);
        assert_eq!(hub.count(), 1);
    }

    #[test]
    fn callback_may_unsubscribe_during_broadcast() {
        let hub = Arc::new(BroadcastHub::<String>::new("test"));
        let slot: Arc<Mutex<Option<SubscriptionId>>> = Arc::new(Mutex::new(None));

        let weak = Arc::downgrade(&hub);
        let own = Arc::clone(&slot);
        let id = hub.subscribe(move |_| {
            if let (Some(hub), Some(id)) = (weak.upgrade(), *own.lock().unwrap()) {
                hub.unsubscribe(id);
            }
            Ok(())
        });
        *slot.lock().unwrap() = Some(id);

        hub.broadcast(&"once".to_string());
        assert_eq!(hub.count(), 0);
    }
}
