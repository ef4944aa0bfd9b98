//! Wire protocol between the traced process and its observer.
//!
//! Uses bincode with an explicit config so publisher and subscriber always use the
//! same encoding (fixint for lengths and enum tags). Every message therefore starts
//! with a 4-byte little-endian kind tag, which lets the decoder tell an unknown kind
//! apart from a damaged body before handing the payload to serde.
//!
//! Trailing bytes are rejected: a frame that decodes with bytes left over means the
//! two sides disagree about the layout, and continuing would desynchronize the
//! call/return nesting of everything that follows.

use crate::types::events::{Call, Event, Return};
use crate::utils::bytes_to_hex;
use bincode::Options;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Protocol version, carried by every sync probe
pub const PROTOCOL_VERSION: u32 = 1;

/// Size of the kind tag prefix
pub const KIND_TAG_LEN: usize = 4;

/// Bytes of a rejected payload included in decode diagnostics
const PREVIEW_LEN: usize = 16;

/// Single bincode config for the wire format.
fn wire_bincode() -> impl bincode::config::Options {
    bincode::config::DefaultOptions::new()
        .with_fixint_encoding()
        .with_little_endian()
        .reject_trailing_bytes()
}

/// Message kinds, numbered by their wire tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Sync = 0,
    Start = 1,
    Call = 2,
    Return = 3,
    Stop = 4,
    Shutdown = 5,
}

impl MessageKind {
    pub fn from_tag(tag: u32) -> Option<Self> {
        match tag {
            0 => Some(MessageKind::Sync),
            1 => Some(MessageKind::Start),
            2 => Some(MessageKind::Call),
            3 => Some(MessageKind::Return),
            4 => Some(MessageKind::Stop),
            5 => Some(MessageKind::Shutdown),
            _ => None,
        }
    }

    pub fn tag(self) -> u32 {
        self as u32
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MessageKind::Sync => "sync",
            MessageKind::Start => "start",
            MessageKind::Call => "call",
            MessageKind::Return => "return",
            MessageKind::Stop => "stop",
            MessageKind::Shutdown => "shutdown",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
#[error("failed to encode {kind} message: {source}")]
pub struct EncodeError {
    pub kind: MessageKind,
    #[source]
    pub source: bincode::Error,
}

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("message of {len} bytes is too short for a kind tag (bytes: {preview})")]
    Truncated { len: usize, preview: String },

    #[error("unknown message kind {tag} (bytes: {preview})")]
    UnknownKind { tag: u32, preview: String },

    #[error("malformed {kind} message: {reason} (bytes: {preview})")]
    Malformed {
        kind: MessageKind,
        reason: String,
        preview: String,
    },

    #[error("received {0} message while waiting for the sync probe")]
    UnexpectedDuringSync(MessageKind),

    #[error("{0} message is a control message, not a trace event")]
    NotAnEvent(MessageKind),
}

/// Wire message: trace events plus the control messages of a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Message {
    /// Handshake probe, published until the observer confirms it is receiving
    Sync { version: u32 },

    /// Opens a trace window; the sink should start writing to `output_target`
    Start { output_target: String },

    Call(Call),

    Return(Return),

    /// Closes the current trace window
    Stop,

    /// End of session; the observer loop exits after this
    Shutdown,
}

impl Message {
    /// Handshake probe for the current protocol version
    pub fn sync() -> Self {
        Message::Sync {
            version: PROTOCOL_VERSION,
        }
    }

    pub fn kind(&self) -> MessageKind {
        match self {
            Message::Sync { .. } => MessageKind::Sync,
            Message::Start { .. } => MessageKind::Start,
            Message::Call(_) => MessageKind::Call,
            Message::Return(_) => MessageKind::Return,
            Message::Stop => MessageKind::Stop,
            Message::Shutdown => MessageKind::Shutdown,
        }
    }

    /// Serialize message to bytes (bincode, fixint encoding).
    pub fn to_bytes(&self) -> Result<Vec<u8>, EncodeError> {
        wire_bincode().serialize(self).map_err(|source| EncodeError {
            kind: self.kind(),
            source,
        })
    }

    /// Deserialize message from bytes, classifying the failure.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
        let preview = || bytes_to_hex(&bytes[..bytes.len().min(PREVIEW_LEN)]);

        let Some(tag_bytes) = bytes.get(..KIND_TAG_LEN) else {
            return Err(DecodeError::Truncated {
                len: bytes.len(),
                preview: preview(),
            });
        };
        let mut tag = [0u8; KIND_TAG_LEN];
        tag.copy_from_slice(tag_bytes);
        let tag = u32::from_le_bytes(tag);

        let kind = MessageKind::from_tag(tag).ok_or_else(|| DecodeError::UnknownKind {
            tag,
            preview: preview(),
        })?;

        wire_bincode()
            .deserialize::<Self>(bytes)
            .map_err(|e| DecodeError::Malformed {
                kind,
                reason: e.to_string(),
                preview: preview(),
            })
    }
}

impl From<Event> for Message {
    fn from(event: Event) -> Self {
        match event {
            Event::Call(c) => Message::Call(c),
            Event::Return(r) => Message::Return(r),
        }
    }
}

impl TryFrom<Message> for Event {
    type Error = DecodeError;

    fn try_from(message: Message) -> Result<Self, Self::Error> {
        match message {
            Message::Call(c) => Ok(Event::Call(c)),
            Message::Return(r) => Ok(Event::Return(r)),
            other => Err(DecodeError::NotAnEvent(other.kind())),
        }
    }
}

/// Encode a single trace event
pub fn encode(event: &Event) -> Result<Vec<u8>, EncodeError> {
    Message::from(event.clone()).to_bytes()
}

/// Decode a single trace event; control messages are rejected
pub fn decode(bytes: &[u8]) -> Result<Event, DecodeError> {
    Message::from_bytes(bytes)?.try_into()
}
