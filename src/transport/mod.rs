mod mqtt;

#[cfg(test)]
pub(crate) mod loopback;

pub use mqtt::MqttLink;
