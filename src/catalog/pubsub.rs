//! In-process publish/subscribe channel keyed by topic name.
//!
//! Every subscriber owns its own unbounded queue, so each one observes every
//! payload published after it registered, exactly once and in publish order.
//! There is no replay buffer: a late subscriber never sees earlier payloads.
//!
//! [`PubSub::subscribe`] returns a [`Subscription`] handle that is also a
//! [`Stream`]. Dropping the handle unregisters its queue.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};

use futures::Stream;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, trace};

struct SubscriberSlot<T> {
    id: u64,
    tx: mpsc::UnboundedSender<T>,
}

/// Topic name -> active subscriber queues.
pub struct PubSub<T> {
    topics: Mutex<HashMap<String, Vec<SubscriberSlot<T>>>>,
    next_id: AtomicU64,
}

impl<T: Clone + Send + 'static> PubSub<T> {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            topics: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        })
    }

    /// Register a new queue on `topic`. Payloads published before this call
    /// are not delivered.
    pub fn subscribe(self: &Arc<Self>, topic: &str) -> Subscription<T> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();

        let mut topics = self.topics.lock();
        let slots = topics.entry(topic.to_string()).or_default();
        slots.push(SubscriberSlot { id, tx });
        debug!(topic, subscriber = id, subscribers = slots.len(), "Subscriber registered");

        Subscription {
            id,
            topic: topic.to_string(),
            rx,
            broker: Arc::downgrade(self),
        }
    }

    /// Push `payload` to every queue registered on `topic` and return how many
    /// subscribers received it. Queues whose receiver is gone are pruned.
    pub fn publish(&self, topic: &str, payload: T) -> usize {
        let mut topics = self.topics.lock();
        let Some(slots) = topics.get_mut(topic) else {
            trace!(topic, "Publish with no subscribers");
            return 0;
        };

        slots.retain(|slot| slot.tx.send(payload.clone()).is_ok());
        let delivered = slots.len();
        if slots.is_empty() {
            topics.remove(topic);
        }
        trace!(topic, delivered, "Published");
        delivered
    }

    /// Number of queues currently registered on `topic`.
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.topics.lock().get(topic).map_or(0, Vec::len)
    }

    /// Drop every registered queue. Open [`Subscription`]s end after yielding
    /// what was already queued; later `subscribe` calls work as usual.
    pub fn close(&self) -> usize {
        let closed: usize = self.topics.lock().drain().map(|(_, slots)| slots.len()).sum();
        debug!(closed, "All subscribers closed");
        closed
    }

    fn unsubscribe(&self, topic: &str, id: u64) {
        let mut topics = self.topics.lock();
        if let Some(slots) = topics.get_mut(topic) {
            slots.retain(|slot| slot.id != id);
            if slots.is_empty() {
                topics.remove(topic);
            }
        }
        debug!(topic, subscriber = id, "Subscriber removed");
    }
}

/// Handle for one registered queue. Yields payloads until dropped.
pub struct Subscription<T: Clone + Send + 'static> {
    id: u64,
    topic: String,
    rx: mpsc::UnboundedReceiver<T>,
    broker: Weak<PubSub<T>>,
}

impl<T: Clone + Send + 'static> Subscription<T> {
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Stop receiving. Equivalent to dropping the handle.
    pub fn cancel(self) {}
}

impl<T: Clone + Send + 'static> Stream for Subscription<T> {
    type Item = T;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        self.get_mut().rx.poll_recv(cx)
    }
}

impl<T: Clone + Send + 'static> Drop for Subscription<T> {
    fn drop(&mut self) {
        if let Some(broker) = self.broker.upgrade() {
            broker.unsubscribe(&self.topic, self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use tokio_test::{assert_pending, assert_ready_eq};

    #[tokio::test]
    async fn test_every_subscriber_receives_in_order() {
        let bus = PubSub::<u32>::new();
        let mut a = bus.subscribe("numbers");
        let mut b = bus.subscribe("numbers");

        assert_eq!(bus.publish("numbers", 1), 2);
        assert_eq!(bus.publish("numbers", 2), 2);

        assert_eq!(a.next().await, Some(1));
        assert_eq!(a.next().await, Some(2));
        assert_eq!(b.next().await, Some(1));
        assert_eq!(b.next().await, Some(2));
    }

    #[test]
    fn test_late_subscriber_gets_no_replay() {
        let bus = PubSub::<u32>::new();
        assert_eq!(bus.publish("numbers", 1), 0);

        let mut sub = tokio_test::task::spawn(bus.subscribe("numbers"));
        assert_pending!(sub.poll_next());

        bus.publish("numbers", 2);
        assert!(sub.is_woken());
        assert_ready_eq!(sub.poll_next(), Some(2));
    }

    #[test]
    fn test_topics_are_isolated() {
        let bus = PubSub::<&'static str>::new();
        let mut other = tokio_test::task::spawn(bus.subscribe("other"));
        let mut books = tokio_test::task::spawn(bus.subscribe("books"));

        bus.publish("books", "dune");

        assert_ready_eq!(books.poll_next(), Some("dune"));
        assert_pending!(other.poll_next());
    }

    #[test]
    fn test_drop_unregisters() {
        let bus = PubSub::<u32>::new();
        let first = bus.subscribe("numbers");
        let second = bus.subscribe("numbers");
        assert_eq!(bus.subscriber_count("numbers"), 2);

        drop(first);
        assert_eq!(bus.subscriber_count("numbers"), 1);

        second.cancel();
        assert_eq!(bus.subscriber_count("numbers"), 0);
        assert_eq!(bus.publish("numbers", 7), 0);
    }

    #[test]
    fn test_close_ends_open_subscriptions() {
        let bus = PubSub::<u32>::new();
        let mut first = tokio_test::task::spawn(bus.subscribe("numbers"));
        let mut second = tokio_test::task::spawn(bus.subscribe("other"));
        bus.publish("numbers", 1);

        assert_eq!(bus.close(), 2);
        assert_eq!(bus.subscriber_count("numbers"), 0);
        assert_ready_eq!(first.poll_next(), Some(1));
        assert_ready_eq!(first.poll_next(), None);
        assert_ready_eq!(second.poll_next(), None);

        let mut fresh = tokio_test::task::spawn(bus.subscribe("numbers"));
        assert_eq!(bus.publish("numbers", 2), 1);
        assert_ready_eq!(fresh.poll_next(), Some(2));
    }

    #[test]
    fn test_subscription_outliving_broker_ends() {
        let bus = PubSub::<u32>::new();
        let sub = bus.subscribe("numbers");
        assert_eq!(sub.topic(), "numbers");
        drop(bus);

        let mut sub = tokio_test::task::spawn(sub);
        assert_ready_eq!(sub.poll_next(), None);
    }
}
