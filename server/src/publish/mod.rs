//! Command publishing to the broker
//!
//! Every publish opens its own short-lived connection, so concurrent HTTP
//! requests never share client state.

mod mqtt;

pub use mqtt::MqttPublisher;
