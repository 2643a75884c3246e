//! # serialws-core
//!
//! Foundation types shared by every serialws crate:
//!
//! - **Hex codec**: [`encoding::bytes_to_hex`] / [`encoding::hex_to_bytes`]
//! - **Ports**: [`PortInfo`] snapshots produced by enumeration
//! - **Events**: [`SerialEvent`], the unsolicited serial → client stream
//! - **Commands**: [`Command`] parsed from inbound client messages
//! - **Envelopes**: [`ResultEnvelope`] and [`ErrorEnvelope`] written back to clients
//! - **Errors**: [`CodecError`], [`CommandError`]

#![deny(unsafe_code)]

pub mod command;
pub mod encoding;
pub mod envelope;
pub mod errors;
pub mod events;
pub mod ids;
pub mod ports;

pub use command::{Command, DEFAULT_BAUD_RATE};
pub use envelope::{CommandResult, ErrorEnvelope, ResultEnvelope};
pub use errors::{CodecError, CommandError};
pub use events::SerialEvent;
pub use ids::ConnectionId;
pub use ports::PortInfo;
