//! One-shot MQTT publisher

use crate::config::MqttConfig;
use async_trait::async_trait;
use robot_shared::{codec, CommandPublisher, PublishAck, PublishError};
use rumqttc::{AsyncClient, ConnectionError, Event, MqttOptions, Outgoing, QoS};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::timeout;
use tracing::debug;

/// Keep-alive for the short-lived publish connections
const KEEP_ALIVE: Duration = Duration::from_secs(5);

/// Publishes each command over its own connect/publish/disconnect cycle
pub struct MqttPublisher {
    host: String,
    port: u16,
    client_id_prefix: String,
    publish_timeout: Duration,
    sequence: AtomicU64,
}

impl MqttPublisher {
    /// Create a new publisher
    pub fn new(config: &MqttConfig, publish_timeout: Duration) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
            client_id_prefix: config.client_id_prefix.clone(),
            publish_timeout,
            sequence: AtomicU64::new(0),
        }
    }

    /// Get a client id unique to this process and request
    fn next_client_id(&self) -> String {
        let seq = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        format!("{}-{}-{}", self.client_id_prefix, std::process::id(), seq)
    }
}

/// Map a client error onto the publish error taxonomy
fn publish_error(e: ConnectionError) -> PublishError {
    match e {
        ConnectionError::ConnectionRefused(code) => {
            PublishError::Rejected(format!("connection refused: {:?}", code))
        }
        other => PublishError::Unreachable(other.to_string()),
    }
}

#[async_trait]
impl CommandPublisher for MqttPublisher {
    async fn publish(&self, topic: &str, command: &str) -> Result<PublishAck, PublishError> {
        let client_id = self.next_client_id();
        let mut options = MqttOptions::new(client_id.as_str(), self.host.as_str(), self.port);
        options.set_keep_alive(KEEP_ALIVE);

        let (client, mut eventloop) = AsyncClient::new(options, 10);

        // Both requests are queued; the event loop sends them after ConnAck
        client
            .publish(topic, QoS::AtMostOnce, false, codec::encode(command).to_vec())
            .await
            .map_err(|e| PublishError::Rejected(e.to_string()))?;
        client
            .disconnect()
            .await
            .map_err(|e| PublishError::Rejected(e.to_string()))?;

        let deliver = async {
            let mut published = false;
            loop {
                match eventloop.poll().await {
                    Ok(Event::Outgoing(Outgoing::Publish(_))) => published = true,
                    Ok(Event::Outgoing(Outgoing::Disconnect)) => return Ok(published),
                    Ok(_) => {}
                    Err(e) => return Err(publish_error(e)),
                }
            }
        };

        let published = timeout(self.publish_timeout, deliver)
            .await
            .map_err(|_| PublishError::Timeout(self.publish_timeout))??;

        if !published {
            return Err(PublishError::Rejected(
                "client disconnected before publishing".into(),
            ));
        }

        debug!("[{}] published {:?} to {}", client_id, command, topic);
        Ok(PublishAck {
            topic: topic.to_string(),
            payload: command.to_string(),
        })
    }
}
