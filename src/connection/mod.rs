//! Connection management for the command subscription
//!
//! This module handles:
//! - Keeping a broker link alive across drops
//! - Re-issuing the topic subscription after every (re-)connect
//! - Tracking the link state machine
//! - Turning link activity into a stream of connection events

mod manager;

pub use manager::{
    ConnectionConfig, ConnectionEvent, ConnectionManager, InboundMessage, ShutdownHandle,
};
