//! Session state and the events a session publishes to its observers.
//!
//! Observers are called synchronously from the receive loop, in the order events occur.
//! [`ChannelObserver`] turns those calls into [`SessionEvent`]s on a `flume` channel for
//! consumers that want to process them on their own task.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::trace;

use crate::error::AprsError;
use crate::packet::Packet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConnectionState {
    NotConnected,
    Connected,
    LoggedIn,
    /// Terminal: a new client is needed to reconnect
    Disconnected,
}

impl ConnectionState {
    /// Numeric value exported on the `aprs.connection.state` gauge
    pub fn as_gauge(self) -> f64 {
        match self {
            ConnectionState::NotConnected => 0.0,
            ConnectionState::Connected => 1.0,
            ConnectionState::LoggedIn => 2.0,
            ConnectionState::Disconnected => 3.0,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::NotConnected => "not connected",
            ConnectionState::Connected => "connected",
            ConnectionState::LoggedIn => "logged in",
            ConnectionState::Disconnected => "disconnected",
        };
        write!(f, "{}", name)
    }
}

/// Snapshot of a session's connection
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConnectionStatus {
    pub state: ConnectionState,
    /// Server name echoed in the login response
    pub connected_server: Option<String>,
    pub changed_at: DateTime<Utc>,
}

impl Default for ConnectionStatus {
    fn default() -> Self {
        Self {
            state: ConnectionState::NotConnected,
            connected_server: None,
            changed_at: Utc::now(),
        }
    }
}

/// Receives session events. Every method defaults to doing nothing.
pub trait SessionObserver: Send + Sync {
    /// Every non-empty line, before classification
    fn on_raw_line(&self, _line: &str) {}

    fn on_packet(&self, _packet: &Packet) {}

    fn on_state_change(&self, _state: ConnectionState) {}

    /// A packet line that failed to decode; the session carries on
    fn on_decode_error(&self, _line: &str, _error: &AprsError) {}
}

#[derive(Debug, Clone)]
pub enum SessionEvent {
    RawLine(String),
    Packet(Box<Packet>),
    StateChanged(ConnectionState),
    DecodeError { line: String, error: String },
}

/// Forwards session events over an unbounded channel
pub struct ChannelObserver {
    tx: flume::Sender<SessionEvent>,
}

impl ChannelObserver {
    pub fn new() -> (Self, flume::Receiver<SessionEvent>) {
        let (tx, rx) = flume::unbounded();
        (Self { tx }, rx)
    }

    fn forward(&self, event: SessionEvent) {
        if self.tx.send(event).is_err() {
            trace!("Session event receiver dropped");
        }
    }
}

impl SessionObserver for ChannelObserver {
    fn on_raw_line(&self, line: &str) {
        self.forward(SessionEvent::RawLine(line.to_string()));
    }

    fn on_packet(&self, packet: &Packet) {
        self.forward(SessionEvent::Packet(Box::new(packet.clone())));
    }

    fn on_state_change(&self, state: ConnectionState) {
        self.forward(SessionEvent::StateChanged(state));
    }

    fn on_decode_error(&self, line: &str, error: &AprsError) {
        self.forward(SessionEvent::DecodeError {
            line: line.to_string(),
            error: error.to_string(),
        });
    }
}
