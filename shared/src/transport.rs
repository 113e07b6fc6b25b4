//! Transport trait abstraction for pluggable broker backends

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::{LinkError, PublishError};

/// Something the subscriber link observed on the broker connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// Broker accepted the (re-)connection; subscriptions must be re-issued
    Connected,
    /// A message arrived on a subscribed topic
    Message { topic: String, payload: Bytes },
}

/// A long-lived subscriber connection to a broker.
///
/// Implementations reconnect on their own when polled again after an error,
/// and report each successful (re-)connection as [`LinkEvent::Connected`].
#[async_trait]
pub trait SubscriberLink: Send + 'static {
    /// Issue a subscription for `topic`
    async fn subscribe(&mut self, topic: &str) -> Result<(), LinkError>;

    /// Wait for the next event on the link
    async fn next_event(&mut self) -> Result<LinkEvent, LinkError>;

    /// Close the link gracefully
    async fn disconnect(&mut self) -> Result<(), LinkError>;

    /// Human-readable name for this link
    fn name(&self) -> &'static str;
}

/// What the broker accepted from a publish call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishAck {
    pub topic: String,
    pub payload: String,
}

/// One-shot publisher of command strings
#[async_trait]
pub trait CommandPublisher: Send + Sync {
    /// Publish `command` verbatim on `topic`
    async fn publish(&self, topic: &str, command: &str) -> Result<PublishAck, PublishError>;
}
