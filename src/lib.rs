//! APRS-IS client library.
//!
//! Decodes and encodes the APRS information-field grammar (timestamps, positions, grid
//! locators, weather, status, messages, objects and items) and drives an APRS-IS session:
//! login, periodic re-login, receive loop and dispatch of decoded packets to observers.

pub mod aprs_client;
pub mod aprs_filters;
pub mod client_config;
pub mod connection_status;
pub mod error;
pub mod info_field;
pub mod log_format;
pub mod metrics;
pub mod packet;
pub mod packet_type;
pub mod passcode;
pub mod position;
pub mod timestamp;
pub mod transport;
pub mod weather;

pub use aprs_client::{AprsClient, AprsClientConfig, AprsClientConfigBuilder};
pub use connection_status::{ConnectionState, SessionObserver};
pub use error::{AprsError, FormatError, Result};
pub use info_field::InformationField;
pub use packet::Packet;
pub use packet_type::PacketType;
pub use position::Position;
pub use timestamp::{Timestamp, TimestampFormat};
pub use transport::{TcpTransport, Transport};
