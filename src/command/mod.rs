//! Command dispatch for the robot
//!
//! This module handles:
//! - Checking the message topic against the bound topic
//! - Decoding and parsing the payload into a command
//! - Driving the actuator
//! - Counting dispatch outcomes

mod dispatcher;

pub use dispatcher::{CommandDispatcher, DispatchOutcome};
