//! In-process broker test double
//!
//! Routes published payloads to [`MemoryLink`] subscribers by exact topic
//! match. Neither binary wires it in; unit tests use it in place of a real
//! MQTT broker to simulate link drops and an unreachable broker.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;
use tracing::debug;

use crate::codec;
use crate::error::{LinkError, PublishError};
use crate::transport::{CommandPublisher, LinkEvent, PublishAck, SubscriberLink};

type EventSender = mpsc::UnboundedSender<Result<LinkEvent, LinkError>>;
type EventReceiver = mpsc::UnboundedReceiver<Result<LinkEvent, LinkError>>;

/// Number of published messages kept for inspection; older ones are dropped
pub const PUBLISHED_HISTORY: usize = 256;

/// A connected in-process client
struct ClientEntry {
    topics: HashSet<String>,
    events: EventSender,
}

struct BrokerState {
    clients: HashMap<u64, ClientEntry>,
    next_client_id: u64,
    reachable: bool,
    published: VecDeque<(String, Bytes)>,
}

/// Cheaply cloneable handle to an in-process broker
#[derive(Clone)]
pub struct MemoryBroker {
    state: Arc<Mutex<BrokerState>>,
}

impl Default for MemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBroker {
    /// Create a new, reachable broker with no clients
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(BrokerState {
                clients: HashMap::new(),
                next_client_id: 0,
                reachable: true,
                published: VecDeque::new(),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BrokerState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Open a subscriber link. The link reports `Connected` as its first event.
    pub fn connect(&self) -> MemoryLink {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let mut state = self.lock();

        let id = state.next_client_id;
        state.next_client_id += 1;

        let first = if state.reachable {
            Ok(LinkEvent::Connected)
        } else {
            Err(LinkError::Unreachable("memory broker offline".into()))
        };
        let _ = events_tx.send(first);

        state.clients.insert(
            id,
            ClientEntry {
                topics: HashSet::new(),
                events: events_tx,
            },
        );

        MemoryLink {
            id,
            broker: self.clone(),
            events: events_rx,
        }
    }

    /// Make publishes fail (or succeed again)
    pub fn set_reachable(&self, reachable: bool) {
        self.lock().reachable = reachable;
    }

    /// Drop every client's link and reconnect it with a clean session.
    ///
    /// Each client sees `Err(ConnectionLost)` followed by `Connected`, and
    /// loses its subscriptions until it re-subscribes.
    pub fn drop_connections(&self) {
        let mut state = self.lock();
        for (id, client) in state.clients.iter_mut() {
            debug!("Memory broker dropping client {}", id);
            client.topics.clear();
            let _ = client
                .events
                .send(Err(LinkError::ConnectionLost("dropped by broker".into())));
            let _ = client.events.send(Ok(LinkEvent::Connected));
        }
    }

    /// Deliver `payload` to every client subscribed to exactly `topic`.
    /// Returns the number of clients it was delivered to.
    pub fn publish_message(&self, topic: &str, payload: Bytes) -> usize {
        let mut state = self.lock();
        if state.published.len() == PUBLISHED_HISTORY {
            state.published.pop_front();
        }
        state.published.push_back((topic.to_string(), payload.clone()));

        let mut delivered = 0;
        for client in state.clients.values() {
            if client.topics.contains(topic) {
                let event = LinkEvent::Message {
                    topic: topic.to_string(),
                    payload: payload.clone(),
                };
                if client.events.send(Ok(event)).is_ok() {
                    delivered += 1;
                }
            }
        }
        delivered
    }

    /// The last [`PUBLISHED_HISTORY`] messages accepted by the broker, in
    /// publish order
    pub fn published(&self) -> Vec<(String, Bytes)> {
        self.lock().published.iter().cloned().collect()
    }

    /// Number of clients currently subscribed to `topic`
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.lock()
            .clients
            .values()
            .filter(|c| c.topics.contains(topic))
            .count()
    }

    fn subscribe(&self, id: u64, topic: &str) -> Result<(), LinkError> {
        let mut state = self.lock();
        match state.clients.get_mut(&id) {
            Some(client) => {
                client.topics.insert(topic.to_string());
                Ok(())
            }
            None => Err(LinkError::Closed),
        }
    }

    fn remove_client(&self, id: u64) {
        self.lock().clients.remove(&id);
    }
}

#[async_trait]
impl CommandPublisher for MemoryBroker {
    async fn publish(&self, topic: &str, command: &str) -> Result<PublishAck, PublishError> {
        if !self.lock().reachable {
            return Err(PublishError::Unreachable("memory broker offline".into()));
        }

        let delivered = self.publish_message(topic, codec::encode(command));
        debug!("Memory broker: {} -> {} subscriber(s)", topic, delivered);

        Ok(PublishAck {
            topic: topic.to_string(),
            payload: command.to_string(),
        })
    }
}

/// Subscriber side of a [`MemoryBroker`] connection
pub struct MemoryLink {
    id: u64,
    broker: MemoryBroker,
    events: EventReceiver,
}

#[async_trait]
impl SubscriberLink for MemoryLink {
    async fn subscribe(&mut self, topic: &str) -> Result<(), LinkError> {
        self.broker.subscribe(self.id, topic)
    }

    async fn next_event(&mut self) -> Result<LinkEvent, LinkError> {
        match self.events.recv().await {
            Some(event) => event,
            None => Err(LinkError::Closed),
        }
    }

    async fn disconnect(&mut self) -> Result<(), LinkError> {
        self.broker.remove_client(self.id);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

impl Drop for MemoryLink {
    fn drop(&mut self) {
        self.broker.remove_client(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_reports_connected() {
        let broker = MemoryBroker::new();
        let mut link = broker.connect();
        assert_eq!(link.next_event().await, Ok(LinkEvent::Connected));
    }

    #[tokio::test]
    async fn test_publish_reaches_exact_topic_only() {
        let broker = MemoryBroker::new();
        let mut link = broker.connect();
        link.next_event().await.unwrap();
        link.subscribe("robots/test").await.unwrap();

        assert_eq!(broker.publish_message("robots/other", codec::encode("left")), 0);
        let ack = broker.publish("robots/test", "forward").await.unwrap();
        assert_eq!(ack.topic, "robots/test");
        assert_eq!(ack.payload, "forward");

        assert_eq!(
            link.next_event().await,
            Ok(LinkEvent::Message {
                topic: "robots/test".into(),
                payload: Bytes::from_static(b"forward"),
            })
        );
        assert_eq!(broker.published().len(), 2);
    }

    #[tokio::test]
    async fn test_publish_delivers_exactly_once() {
        let broker = MemoryBroker::new();
        let mut link = broker.connect();
        link.next_event().await.unwrap();
        link.subscribe("robots/test").await.unwrap();

        broker.publish("robots/test", "forward").await.unwrap();

        let published = broker.published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].0, "robots/test");
        assert_eq!(published[0].1.as_ref(), b"forward");

        link.next_event().await.unwrap();
        assert!(link.events.try_recv().is_err());
    }

    #[test]
    fn test_published_log_is_bounded() {
        let broker = MemoryBroker::new();
        for i in 0..PUBLISHED_HISTORY + 4 {
            broker.publish_message("robots/test", Bytes::from(i.to_string()));
        }

        let published = broker.published();
        assert_eq!(published.len(), PUBLISHED_HISTORY);
        assert_eq!(published[0].1.as_ref(), b"4");
        assert_eq!(
            published[PUBLISHED_HISTORY - 1].1,
            Bytes::from((PUBLISHED_HISTORY + 3).to_string())
        );
    }

    #[tokio::test]
    async fn test_drop_clears_subscriptions() {
        let broker = MemoryBroker::new();
        let mut link = broker.connect();
        link.next_event().await.unwrap();
        link.subscribe("robots/test").await.unwrap();
        assert_eq!(broker.subscriber_count("robots/test"), 1);

        broker.drop_connections();
        assert_eq!(broker.subscriber_count("robots/test"), 0);

        assert!(matches!(
            link.next_event().await,
            Err(LinkError::ConnectionLost(_))
        ));
        assert_eq!(link.next_event().await, Ok(LinkEvent::Connected));
    }

    #[tokio::test]
    async fn test_unreachable_broker() {
        let broker = MemoryBroker::new();
        broker.set_reachable(false);

        let result = broker.publish("robots/test", "stop").await;
        assert!(matches!(result, Err(PublishError::Unreachable(_))));
        assert!(broker.published().is_empty());

        let mut link = broker.connect();
        assert!(matches!(
            link.next_event().await,
            Err(LinkError::Unreachable(_))
        ));
    }

    #[tokio::test]
    async fn test_disconnect_removes_client() {
        let broker = MemoryBroker::new();
        let mut link = broker.connect();
        link.subscribe("robots/test").await.unwrap();
        link.disconnect().await.unwrap();

        assert_eq!(broker.subscriber_count("robots/test"), 0);
        assert_eq!(link.subscribe("robots/test").await, Err(LinkError::Closed));
    }
}
