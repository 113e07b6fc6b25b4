//! Web server configuration
//!
//! Read from `.env` and `WEB_SERVER__*` environment variables, e.g.
//! `WEB_SERVER__BIND=0.0.0.0:5000` or `WEB_SERVER__ACK_MODE=truthful`.

use crate::http::AckMode;
use robot_shared::{defaults, BindingError, ChannelBinding};
use serde::Deserialize;
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading failed: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid channel binding: {0}")]
    Binding(#[from] BindingError),

    #[error("Invalid bind address: {0}")]
    BindAddress(String),

    #[error("Publish timeout must be greater than zero")]
    PublishTimeout,
}

/// Broker the publisher writes to
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    pub host: String,
    pub port: u16,
    pub topic: String,
    /// Prefix for the per-request client ids
    pub client_id_prefix: String,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: defaults::MQTT_PORT,
            topic: defaults::TOPIC.into(),
            client_id_prefix: "web-server".into(),
        }
    }
}

impl MqttConfig {
    pub fn binding(&self) -> ChannelBinding {
        ChannelBinding::new(&self.host, self.port, &self.topic)
    }
}

/// Root configuration for the web server
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub mqtt: MqttConfig,
    pub publish_timeout_ms: u64,
    pub ack_mode: AckMode,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:5000".into(),
            mqtt: MqttConfig::default(),
            publish_timeout_ms: 5000,
            ack_mode: AckMode::default(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from `.env` and `WEB_SERVER__*` environment variables
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_environment(Self::environment())
    }

    /// `WEB_SERVER__MQTT__HOST` -> `mqtt.host`
    fn environment() -> config::Environment {
        config::Environment::with_prefix("WEB_SERVER")
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true)
    }

    fn from_environment(env: config::Environment) -> Result<Self, ConfigError> {
        let config = config::Config::builder()
            .add_source(env)
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.mqtt.binding().validate()?;
        self.socket_addr()?;
        if self.publish_timeout_ms == 0 {
            return Err(ConfigError::PublishTimeout);
        }
        Ok(())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.bind
            .parse()
            .map_err(|_| ConfigError::BindAddress(self.bind.clone()))
    }

    pub fn publish_timeout(&self) -> Duration {
        Duration::from_millis(self.publish_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.mqtt.host, "localhost");
        assert_eq!(config.mqtt.topic, "robots/clarissa");
        assert_eq!(config.ack_mode, AckMode::Optimistic);
        assert_eq!(config.socket_addr().unwrap().port(), 5000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate() {
        let mut config = ServerConfig::default();
        config.bind = "not an address".into();
        assert!(matches!(config.validate(), Err(ConfigError::BindAddress(_))));

        let mut config = ServerConfig::default();
        config.publish_timeout_ms = 0;
        assert!(matches!(config.validate(), Err(ConfigError::PublishTimeout)));

        let mut config = ServerConfig::default();
        config.mqtt.topic = "robots/#".into();
        assert!(matches!(config.validate(), Err(ConfigError::Binding(_))));
    }

    #[test]
    fn test_deserialize_ack_mode() {
        let config: ServerConfig = config::Config::builder()
            .set_override("ack_mode", "truthful")
            .unwrap()
            .set_override("mqtt.host", "broker.local")
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.ack_mode, AckMode::Truthful);
        assert_eq!(config.mqtt.host, "broker.local");
        assert_eq!(config.mqtt.port, 1883);
    }

    fn environment(vars: &[(&str, &str)]) -> config::Environment {
        let source: config::Map<String, String> = vars
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        ServerConfig::environment().source(Some(source))
    }

    #[test]
    fn test_load_maps_prefixed_environment() {
        let config = ServerConfig::from_environment(environment(&[
            ("WEB_SERVER__BIND", "127.0.0.1:8080"),
            ("WEB_SERVER__ACK_MODE", "truthful"),
            ("WEB_SERVER__PUBLISH_TIMEOUT_MS", "750"),
            ("WEB_SERVER__MQTT__HOST", "broker.local"),
            ("WEB_SERVER__MQTT__TOPIC", "robots/test"),
            ("WEB_SERVER__MQTT__CLIENT_ID_PREFIX", "control"),
            ("ROBOT__MQTT__PORT", "1999"),
        ]))
        .unwrap();

        assert_eq!(config.socket_addr().unwrap(), "127.0.0.1:8080".parse().unwrap());
        assert_eq!(config.ack_mode, AckMode::Truthful);
        assert_eq!(config.publish_timeout(), Duration::from_millis(750));
        assert_eq!(config.mqtt.host, "broker.local");
        assert_eq!(config.mqtt.topic, "robots/test");
        assert_eq!(config.mqtt.client_id_prefix, "control");
        assert_eq!(config.mqtt.port, defaults::MQTT_PORT);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_rejects_unknown_ack_mode() {
        let result = ServerConfig::from_environment(environment(&[(
            "WEB_SERVER__ACK_MODE",
            "sometimes",
        )]));
        assert!(matches!(result, Err(ConfigError::Load(_))));
    }
}

