//! Command dispatcher - decodes incoming payloads and drives the actuator

use crate::actuator::{Actuator, Motion};
use robot_shared::{codec, defaults, Command, DecodeError, PayloadError, UnknownCommand};
use tracing::{error, info, warn};

/// Result of dispatching one message
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    /// Recognised command applied to the actuator
    Actuated(Command),
    /// Valid text outside the vocabulary; nothing was actuated
    Unknown(UnknownCommand),
    /// Payload was not UTF-8; nothing was actuated
    Malformed(DecodeError),
    /// Message arrived on a topic other than the bound one
    ForeignTopic(String),
    /// Actuator call returned an error
    Failed { command: Command, message: String },
}

/// Running totals of dispatch outcomes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub actuated: u64,
    pub unknown: u64,
    pub malformed: u64,
    pub foreign_topic: u64,
    pub failed: u64,
}

impl DispatchStats {
    /// Total number of messages seen
    pub fn total(&self) -> u64 {
        self.actuated + self.unknown + self.malformed + self.foreign_topic + self.failed
    }
}

impl std::fmt::Display for DispatchStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "actuated={} unknown={} malformed={} foreign_topic={} failed={}",
            self.actuated, self.unknown, self.malformed, self.foreign_topic, self.failed
        )
    }
}

/// Maps payloads on the bound topic to actuator calls.
///
/// Dispatch is synchronous: each call finishes before the next message is
/// looked at. There is no queue, so the latest command overwrites whatever
/// motion was in effect.
pub struct CommandDispatcher {
    topic: String,
    actuator: Box<dyn Actuator>,
    stats: DispatchStats,
}

impl CommandDispatcher {
    /// Create a new dispatcher for messages on `topic`
    pub fn new(actuator: Box<dyn Actuator>, topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            actuator,
            stats: DispatchStats::default(),
        }
    }

    /// Dispatch one inbound message
    pub fn dispatch(&mut self, topic: &str, payload: &[u8]) -> DispatchOutcome {
        if topic != self.topic {
            warn!("Dropping message on foreign topic {}", topic);
            self.stats.foreign_topic += 1;
            return DispatchOutcome::ForeignTopic(topic.to_string());
        }

        let command = match codec::decode_command(payload) {
            Ok(command) => command,
            Err(PayloadError::Decode(e)) => {
                warn!("Dropping malformed payload on {}: {}", topic, e);
                self.stats.malformed += 1;
                return DispatchOutcome::Malformed(e);
            }
            Err(PayloadError::Unknown(e)) => {
                warn!("Ignoring {}", e);
                self.stats.unknown += 1;
                return DispatchOutcome::Unknown(e);
            }
        };

        match self.apply(command) {
            Ok(()) => {
                self.stats.actuated += 1;
                DispatchOutcome::Actuated(command)
            }
            Err(e) => {
                error!("Actuator failed on {}: {:#}", command, e);
                self.stats.failed += 1;
                DispatchOutcome::Failed {
                    command,
                    message: e.to_string(),
                }
            }
        }
    }

    /// Apply a recognised command to the actuator
    pub fn apply(&mut self, command: Command) -> anyhow::Result<()> {
        match command {
            Command::Forward => self.actuator.forward(defaults::FULL_SPEED),
            Command::Backward => self.actuator.backward(defaults::FULL_SPEED),
            Command::Left => self.actuator.left(defaults::FULL_SPEED),
            Command::Right => self.actuator.right(defaults::FULL_SPEED),
            Command::Stop => self.actuator.stop(),
        }
    }

    /// Stop the motors, e.g. on shutdown
    pub fn halt(&mut self) -> anyhow::Result<()> {
        info!("Halting {} actuator", self.actuator.name());
        self.actuator.stop()
    }

    /// Current motion of the actuator
    pub fn motion(&self) -> Motion {
        self.actuator.motion()
    }

    pub fn stats(&self) -> DispatchStats {
        self.stats
    }
}
