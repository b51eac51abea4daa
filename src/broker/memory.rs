//! In-process broker backed by tokio broadcast channels

use super::{BrokerError, MessageBroker, Subscription};
use std::collections::HashMap;
use std::sync::{Mutex, RwLock};
use tokio::sync::broadcast;

/// Default per-channel buffer before slow subscribers start lagging
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Broker living inside the server process
pub struct InMemoryBroker {
    capacity: usize,
    values: RwLock<HashMap<String, String>>,
    channels: Mutex<HashMap<String, broadcast::Sender<String>>>,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a broker whose channels buffer `capacity` messages per subscriber
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            values: RwLock::new(HashMap::new()),
            channels: Mutex::new(HashMap::new()),
        }
    }

    /// Number of cached keys
    pub fn key_count(&self) -> usize {
        self.values.read().map(|v| v.len()).unwrap_or(0)
    }
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageBroker for InMemoryBroker {
    fn set(&self, key: &str, value: &str) -> Result<(), BrokerError> {
        let mut values = self.values.write().map_err(|_| BrokerError::Poisoned("values"))?;
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<String>, BrokerError> {
        let values = self.values.read().map_err(|_| BrokerError::Poisoned("values"))?;
        Ok(values.get(key).cloned())
    }

    fn del(&self, key: &str) -> Result<bool, BrokerError> {
        let mut values = self.values.write().map_err(|_| BrokerError::Poisoned("values"))?;
        Ok(values.remove(key).is_some())
    }

    fn publish(&self, channel: &str, payload: &str) -> Result<usize, BrokerError> {
        let mut channels = self
            .channels
            .lock()
            .map_err(|_| BrokerError::Poisoned("channels"))?;

        let sent = match channels.get(channel) {
            Some(tx) => tx.send(payload.to_string()),
            None => return Ok(0),
        };

        match sent {
            Ok(receivers) => Ok(receivers),
            Err(_) => {
                // Every subscriber went away
                channels.remove(channel);
                Ok(0)
            }
        }
    }

    fn subscribe(&self, channel: &str) -> Result<Subscription, BrokerError> {
        let mut channels = self
            .channels
            .lock()
            .map_err(|_| BrokerError::Poisoned("channels"))?;

        let rx = match channels.get(channel) {
            Some(tx) => tx.subscribe(),
            None => {
                let (tx, rx) = broadcast::channel(self.capacity);
                channels.insert(channel.to_string(), tx);
                rx
            }
        };

        Ok(Subscription::new(channel.to_string(), rx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_set_get_del() {
        let broker = InMemoryBroker::new();
        assert_eq!(broker.get("abcsize").unwrap(), None);

        broker.set("abcsize", "800,600").unwrap();
        assert_eq!(broker.get("abcsize").unwrap().as_deref(), Some("800,600"));

        broker.set("abcsize", "1024,768").unwrap();
        assert_eq!(broker.get("abcsize").unwrap().as_deref(), Some("1024,768"));
        assert_eq!(broker.key_count(), 1);

        assert!(broker.del("abcsize").unwrap());
        assert!(!broker.del("abcsize").unwrap());
        assert_eq!(broker.key_count(), 0);
    }

    #[test]
    fn test_publish_without_subscriber_is_lost() {
        let broker = InMemoryBroker::new();
        assert_eq!(broker.publish("ljob", "early").unwrap(), 0);

        let mut sub = broker.subscribe("ljob").unwrap();
        assert_eq!(sub.try_next(), None);

        assert_eq!(broker.publish("ljob", "late").unwrap(), 1);
        assert_eq!(sub.try_next().as_deref(), Some("late"));
    }

    #[test]
    fn test_publish_reaches_all_subscribers_in_order() {
        let broker = InMemoryBroker::new();
        let mut a = broker.subscribe("ljob").unwrap();
        let mut b = broker.subscribe("ljob").unwrap();

        assert_eq!(broker.publish("ljob", "one").unwrap(), 2);
        assert_eq!(broker.publish("ljob", "two").unwrap(), 2);

        assert_eq!(a.try_next().as_deref(), Some("one"));
        assert_eq!(a.try_next().as_deref(), Some("two"));
        assert_eq!(b.try_next().as_deref(), Some("one"));
        assert_eq!(b.try_next().as_deref(), Some("two"));
        assert_eq!(a.channel(), "ljob");
    }

    #[test]
    fn test_channels_are_isolated() {
        let broker = InMemoryBroker::new();
        let mut mine = broker.subscribe("la").unwrap();
        let _other = broker.subscribe("lb").unwrap();

        broker.publish("lb", "not for me").unwrap();
        assert_eq!(mine.try_next(), None);
    }

    #[test]
    fn test_dropped_subscribers_are_pruned() {
        let broker = InMemoryBroker::new();
        let sub = broker.subscribe("ljob").unwrap();
        drop(sub);
        assert_eq!(broker.publish("ljob", "nobody").unwrap(), 0);
        assert_eq!(broker.publish("ljob", "still nobody").unwrap(), 0);
    }

    #[test]
    fn test_lagging_subscriber_skips_oldest() {
        let broker = InMemoryBroker::with_capacity(2);
        let mut sub = broker.subscribe("ljob").unwrap();
        for i in 0..5 {
            broker.publish("ljob", &i.to_string()).unwrap();
        }
        assert_eq!(sub.try_next().as_deref(), Some("3"));
        assert_eq!(sub.try_next().as_deref(), Some("4"));
        assert_eq!(sub.try_next(), None);
    }

    #[tokio::test]
    async fn test_async_next_receives_published() {
        let broker = std::sync::Arc::new(InMemoryBroker::new());
        let mut sub = broker.subscribe("ljob").unwrap();

        let publisher = broker.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            publisher.publish("ljob", "hello").unwrap();
        });

        let msg = tokio::time::timeout(Duration::from_secs(2), sub.next())
            .await
            .expect("timed out");
        assert_eq!(msg.as_deref(), Some("hello"));
    }
}
