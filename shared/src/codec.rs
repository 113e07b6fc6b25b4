//! Plain-text payload codec
//!
//! A message on the command topic is just the command text:
//! ```text
//! [ N bytes: UTF-8 command string, no framing, no metadata ]
//! ```
//!
//! Decoding happens in two steps so that the two failure kinds stay
//! distinguishable: bytes -> text ([`DecodeError`]) and text -> command
//! ([`crate::UnknownCommand`]).

use bytes::Bytes;

use crate::command::Command;
use crate::error::{DecodeError, PayloadError};

/// Encode a command string as a message payload.
///
/// No validation against the vocabulary happens here; the publisher forwards
/// whatever it was asked to send.
pub fn encode(command: &str) -> Bytes {
    Bytes::copy_from_slice(command.as_bytes())
}

/// Decode a payload into text
pub fn decode_text(payload: &[u8]) -> Result<&str, DecodeError> {
    Ok(std::str::from_utf8(payload)?)
}

/// Decode a payload into a recognised command
pub fn decode_command(payload: &[u8]) -> Result<Command, PayloadError> {
    let text = decode_text(payload)?;
    Ok(Command::parse(text)?)
}
