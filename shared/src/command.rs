//! Robot command vocabulary
//!
//! Commands travel as bare, case-sensitive strings. Parsing is an exact
//! match; there is no trimming or case folding.

use crate::error::UnknownCommand;
use std::str::FromStr;

/// A recognised motion command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Forward,
    Backward,
    Left,
    Right,
    Stop,
}

impl Command {
    /// Every recognised command, in wire order
    pub const ALL: [Command; 5] = [
        Command::Forward,
        Command::Backward,
        Command::Left,
        Command::Right,
        Command::Stop,
    ];

    /// Parse a payload string into a command
    pub fn parse(text: &str) -> Result<Self, UnknownCommand> {
        match text {
            "forward" => Ok(Command::Forward),
            "backward" => Ok(Command::Backward),
            "left" => Ok(Command::Left),
            "right" => Ok(Command::Right),
            "stop" => Ok(Command::Stop),
            other => Err(UnknownCommand(other.to_string())),
        }
    }

    /// Wire representation of this command
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::Forward => "forward",
            Command::Backward => "backward",
            Command::Left => "left",
            Command::Right => "right",
            Command::Stop => "stop",
        }
    }

    /// Whether this command sets the robot in motion
    pub fn is_motion(&self) -> bool {
        !matches!(self, Command::Stop)
    }
}

impl FromStr for Command {
    type Err = UnknownCommand;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Command::parse(s)
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
