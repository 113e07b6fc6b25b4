//! Robot Bridge Shared Types
//!
//! This crate provides the command vocabulary, payload codec, link state
//! machine and transport traits shared by the robot (subscriber) and the
//! web server (publisher).

pub mod broker;
pub mod codec;
pub mod command;
pub mod error;
pub mod state_machine;
pub mod transport;

use serde::Deserialize;

// Re-export commonly used types at crate root
pub use broker::{MemoryBroker, MemoryLink};
pub use command::Command;
pub use error::{BindingError, DecodeError, LinkError, PayloadError, PublishError, UnknownCommand};
pub use transport::{CommandPublisher, LinkEvent, PublishAck, SubscriberLink};

/// Channel defaults shared by both processes
pub mod defaults {
    /// Prefix for per-robot topics
    pub const TOPIC_PREFIX: &str = "robots";

    /// Name of the robot shipped in the default configuration
    pub const ROBOT_NAME: &str = "clarissa";

    /// Default topic both sides bind to
    pub const TOPIC: &str = "robots/clarissa";

    /// Standard unencrypted MQTT port
    pub const MQTT_PORT: u16 = 1883;

    /// Motor speed used for every recognised motion command
    pub const FULL_SPEED: f32 = 1.0;
}

/// Build the topic a named robot listens on: `robots/<name>`
pub fn robot_topic(name: &str) -> String {
    format!("{}/{}", defaults::TOPIC_PREFIX, name)
}

/// Broker address and topic that publisher and subscriber agree on out-of-band
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChannelBinding {
    pub host: String,
    pub port: u16,
    pub topic: String,
}

impl ChannelBinding {
    pub fn new(host: impl Into<String>, port: u16, topic: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            topic: topic.into(),
        }
    }

    /// Check the binding is usable on this side of the channel.
    ///
    /// Wildcards are refused: the publisher cannot publish to a filter and the
    /// subscriber must receive exactly the topic the publisher writes.
    pub fn validate(&self) -> Result<(), BindingError> {
        if self.host.trim().is_empty() {
            return Err(BindingError::EmptyHost);
        }
        if self.port == 0 {
            return Err(BindingError::InvalidPort);
        }
        if self.topic.is_empty() {
            return Err(BindingError::EmptyTopic);
        }
        if self.topic.contains(['+', '#']) {
            return Err(BindingError::WildcardTopic(self.topic.clone()));
        }
        Ok(())
    }
}

impl std::fmt::Display for ChannelBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{} [{}]", self.host, self.port, self.topic)
    }
}
