//! Error taxonomy shared by the packet grammar and the session client.
//!
//! Decode failures are always scoped to a single line: [`AprsError::Format`] and
//! [`AprsError::Range`] never mean the connection is unusable. Only
//! [`AprsError::Connection`] is fatal to a session.

use crate::packet_type::PacketType;
use crate::timestamp::TimestampFormat;

pub type Result<T, E = AprsError> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum AprsError {
    /// Malformed timestamp, position, payload or packet line
    #[error(transparent)]
    Format(#[from] FormatError),

    /// Timestamp disambiguation could not place the reading in any candidate year
    #[error("timestamp {input:?} is not a plausible date within {attempts} years of the reference time")]
    Range { input: String, attempts: u32 },

    /// Encoding into a timestamp format that has no wire representation
    #[error("encoding to {0} is not supported")]
    Unsupported(TimestampFormat),

    /// Transport-level failure surfaced from the receive loop
    #[error("connection error: {0}")]
    Connection(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormatError {
    #[error("invalid timestamp {0:?}")]
    Timestamp(String),

    #[error("invalid position {0:?}")]
    Position(String),

    #[error("invalid grid locator {0:?}")]
    Locator(String),

    #[error("invalid {packet_type:?} payload {payload:?}: {reason}")]
    Payload {
        packet_type: PacketType,
        payload: String,
        reason: String,
    },

    #[error("invalid packet line {0:?}")]
    Packet(String),
}

impl AprsError {
    pub fn is_format(&self) -> bool {
        matches!(self, AprsError::Format(_))
    }

    /// Re-scope a sub-codec failure to the payload it occurred in.
    /// Range and connection errors pass through unchanged.
    pub(crate) fn in_payload(self, packet_type: PacketType, payload: &str) -> Self {
        match self {
            AprsError::Format(FormatError::Payload { .. }) => self,
            AprsError::Format(inner) => AprsError::Format(FormatError::Payload {
                packet_type,
                payload: payload.to_string(),
                reason: inner.to_string(),
            }),
            other => other,
        }
    }
}

/// Shorthand for a payload-level format error
pub(crate) fn payload_error(packet_type: PacketType, payload: &str, reason: &str) -> AprsError {
    AprsError::Format(FormatError::Payload {
        packet_type,
        payload: payload.to_string(),
        reason: reason.to_string(),
    })
}
