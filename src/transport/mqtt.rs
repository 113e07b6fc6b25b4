//! MQTT subscriber link backed by rumqttc

use crate::config::MqttConfig;
use async_trait::async_trait;
use robot_shared::{LinkError, LinkEvent, SubscriberLink};
use rumqttc::{AsyncClient, ConnectionError, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS};
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, trace};

/// Capacity of the client -> event loop request channel
const REQUEST_CAPACITY: usize = 10;

/// How long a graceful disconnect may take before it is abandoned
const DISCONNECT_GRACE: Duration = Duration::from_secs(2);

/// Subscriber link to an MQTT broker.
///
/// The rumqttc event loop reconnects by itself the next time it is polled
/// after an error, so `next_event` can simply be called again.
pub struct MqttLink {
    client: AsyncClient,
    eventloop: EventLoop,
    connected: bool,
}

impl MqttLink {
    /// Create a link; nothing touches the network until the first poll
    pub fn new(config: &MqttConfig) -> Self {
        let mut options = MqttOptions::new(&config.client_id, &config.host, config.port);
        options.set_keep_alive(config.keep_alive());
        options.set_clean_session(true);

        let (client, eventloop) = AsyncClient::new(options, REQUEST_CAPACITY);

        Self {
            client,
            eventloop,
            connected: false,
        }
    }

    /// Sort a client error into unreachable vs. dropped
    fn classify(&mut self, e: ConnectionError) -> LinkError {
        if std::mem::take(&mut self.connected) {
            LinkError::ConnectionLost(e.to_string())
        } else {
            LinkError::Unreachable(e.to_string())
        }
    }
}

#[async_trait]
impl SubscriberLink for MqttLink {
    async fn subscribe(&mut self, topic: &str) -> Result<(), LinkError> {
        self.client
            .subscribe(topic, QoS::AtMostOnce)
            .await
            .map_err(|e| LinkError::Subscribe {
                topic: topic.to_string(),
                reason: e.to_string(),
            })
    }

    async fn next_event(&mut self) -> Result<LinkEvent, LinkError> {
        loop {
            match self.eventloop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                    debug!("MQTT ConnAck: code={:?}", ack.code);
                    self.connected = true;
                    return Ok(LinkEvent::Connected);
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    return Ok(LinkEvent::Message {
                        topic: publish.topic,
                        payload: publish.payload,
                    });
                }
                Ok(other) => {
                    trace!("MQTT event: {:?}", other);
                }
                Err(e) => return Err(self.classify(e)),
            }
        }
    }

    async fn disconnect(&mut self) -> Result<(), LinkError> {
        if !self.connected {
            return Ok(());
        }

        self.client
            .disconnect()
            .await
            .map_err(|e| LinkError::ConnectionLost(e.to_string()))?;

        // The disconnect request only goes out when the event loop is polled
        let drain = async {
            loop {
                match self.eventloop.poll().await {
                    Ok(Event::Outgoing(Outgoing::Disconnect)) => return Ok(()),
                    Ok(_) => continue,
                    Err(e) => return Err(LinkError::ConnectionLost(e.to_string())),
                }
            }
        };

        let result = timeout(DISCONNECT_GRACE, drain)
            .await
            .map_err(|_| LinkError::ConnectionLost("disconnect timed out".into()))?;
        self.connected = false;
        result
    }

    fn name(&self) -> &'static str {
        "mqtt"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::loopback;
    use bytes::Bytes;
    use tokio::time::sleep;

    const TOPIC: &str = "robots/test";

    fn loopback_config(port: u16, client_id: &str) -> MqttConfig {
        MqttConfig {
            host: "127.0.0.1".into(),
            port,
            topic: TOPIC.into(),
            client_id: client_id.into(),
            keep_alive_secs: 5,
        }
    }

    #[tokio::test]
    async fn test_unreachable_broker_reports_unreachable() {
        // Port 1 on loopback is never an MQTT broker
        let config = MqttConfig {
            host: "127.0.0.1".into(),
            port: 1,
            ..Default::default()
        };
        let mut link = MqttLink::new(&config);
        assert_eq!(link.name(), "mqtt");

        let result = link.next_event().await;
        assert!(matches!(result, Err(LinkError::Unreachable(_))));
    }

    #[tokio::test]
    async fn test_disconnect_before_connect_is_noop() {
        let mut link = MqttLink::new(&MqttConfig::default());
        assert_eq!(link.disconnect().await, Ok(()));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_connack_and_publish_become_link_events() {
        const PORT: u16 = 18851;
        loopback::start(PORT).await;

        let mut link = MqttLink::new(&loopback_config(PORT, "robot-link-test"));
        let event = timeout(Duration::from_secs(5), link.next_event()).await.unwrap();
        assert_eq!(event, Ok(LinkEvent::Connected));
        link.subscribe(TOPIC).await.unwrap();

        // Publish once the subscription has been polled out to the broker
        tokio::spawn(async {
            sleep(Duration::from_millis(300)).await;
            loopback::publish_once(PORT, "robot-link-test-publisher", "robots/other", "left").await;
            loopback::publish_once(PORT, "robot-link-test-publisher", TOPIC, "forward").await;
        });

        let event = timeout(Duration::from_secs(5), link.next_event()).await.unwrap();
        assert_eq!(
            event,
            Ok(LinkEvent::Message {
                topic: TOPIC.into(),
                payload: Bytes::from_static(b"forward"),
            })
        );

        assert_eq!(link.disconnect().await, Ok(()));
        assert!(!link.connected);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_session_takeover_reports_connection_lost() {
        const PORT: u16 = 18852;
        loopback::start(PORT).await;

        let mut link = MqttLink::new(&loopback_config(PORT, "robot-takeover-link"));
        let event = timeout(Duration::from_secs(5), link.next_event()).await.unwrap();
        assert_eq!(event, Ok(LinkEvent::Connected));

        // A second client with the same id makes the broker drop this one
        tokio::spawn(async {
            loopback::publish_once(PORT, "robot-takeover-link", "robots/other", "noop").await;
        });

        let event = timeout(Duration::from_secs(5), link.next_event()).await.unwrap();
        assert!(matches!(event, Err(LinkError::ConnectionLost(_))));

        // Polling again reconnects
        let event = timeout(Duration::from_secs(5), link.next_event()).await.unwrap();
        assert_eq!(event, Ok(LinkEvent::Connected));
    }
}
