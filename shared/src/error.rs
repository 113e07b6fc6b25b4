//! Error taxonomy for the command bridge

use std::time::Duration;
use thiserror::Error;

/// Payload bytes are not valid UTF-8 text
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Payload is not valid UTF-8 (valid up to byte {valid_up_to})")]
pub struct DecodeError {
    pub valid_up_to: usize,
}

impl From<std::str::Utf8Error> for DecodeError {
    fn from(e: std::str::Utf8Error) -> Self {
        Self {
            valid_up_to: e.valid_up_to(),
        }
    }
}

/// Payload is valid text but outside the command vocabulary
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown command: {0:?}")]
pub struct UnknownCommand(pub String);

/// Anything that stops a payload from becoming a [`crate::Command`]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PayloadError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Unknown(#[from] UnknownCommand),
}

/// Broker connection failures seen by the subscriber side
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LinkError {
    #[error("Broker unreachable: {0}")]
    Unreachable(String),

    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    #[error("Subscribe to {topic} failed: {reason}")]
    Subscribe { topic: String, reason: String },

    #[error("Link closed")]
    Closed,
}

/// Failures of a single publish attempt
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PublishError {
    #[error("Broker unreachable: {0}")]
    Unreachable(String),

    #[error("Broker rejected publish: {0}")]
    Rejected(String),

    #[error("Publish timed out after {0:?}")]
    Timeout(Duration),
}

/// Invalid channel binding configuration
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BindingError {
    #[error("Broker host must not be empty")]
    EmptyHost,

    #[error("Broker port must not be 0")]
    InvalidPort,

    #[error("Topic must not be empty")]
    EmptyTopic,

    #[error("Topic must not contain wildcards: {0}")]
    WildcardTopic(String),
}
