//! Robot configuration
//!
//! Loaded once at startup from the environment with the `ROBOT` prefix and
//! `__` as the nesting separator, after reading `.env` if present:
//!
//! - `ROBOT__MQTT__HOST=web-server`
//! - `ROBOT__MQTT__TOPIC=robots/clarissa`
//! - `ROBOT__ACTUATOR=simulated`
//! - `ROBOT__MOTORS__LEFT_FORWARD=19`
//! - `ROBOT__MOTORS__CHIP_BASE=512`

use crate::actuator::MotorPins;
use crate::connection::ConnectionConfig;
use robot_shared::{defaults, BindingError, ChannelBinding};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading failed: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid channel binding: {0}")]
    Binding(#[from] BindingError),

    #[error("Invalid keep-alive: {0}s (minimum 5s)")]
    KeepAlive(u64),
}

/// Which actuator backend drives the motors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActuatorKind {
    /// Motor driver on Linux sysfs GPIO
    #[default]
    Gpio,
    /// In-memory robot that only records calls
    Simulated,
}

/// Broker connection settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    pub host: String,
    pub port: u16,
    pub topic: String,
    pub client_id: String,
    pub keep_alive_secs: u64,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: "web-server".into(),
            port: defaults::MQTT_PORT,
            topic: defaults::TOPIC.into(),
            client_id: format!("robot-{}", defaults::ROBOT_NAME),
            keep_alive_secs: 60,
        }
    }
}

impl MqttConfig {
    /// The broker/topic pair this robot is bound to
    pub fn binding(&self) -> ChannelBinding {
        ChannelBinding::new(&self.host, self.port, &self.topic)
    }

    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }
}

/// Root configuration for the robot process
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub mqtt: MqttConfig,
    /// Pause between a lost link and the next connect attempt
    pub reconnect_delay_ms: u64,
    pub actuator: ActuatorKind,
    pub motors: MotorPins,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            mqtt: MqttConfig::default(),
            reconnect_delay_ms: 1000,
            actuator: ActuatorKind::default(),
            motors: MotorPins::default(),
        }
    }
}

impl BridgeConfig {
    /// Load configuration from `.env` and `ROBOT__*` environment variables
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_environment(Self::environment())
    }

    /// `ROBOT__MQTT__HOST` -> `mqtt.host`
    fn environment() -> config::Environment {
        config::Environment::with_prefix("ROBOT")
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
        // rumqttc panics on very short keep-alives
        if self.mqtt.keep_alive_secs < 5 {
            return Err(ConfigError::KeepAlive(self.mqtt.keep_alive_secs));
        }
        Ok(())
    }

    /// Settings for the connection manager
    pub fn connection(&self) -> ConnectionConfig {
        ConnectionConfig {
            topic: self.mqtt.topic.clone(),
            reconnect_delay: Duration::from_millis(self.reconnect_delay_ms),
        }
    }
}
