use serde::{Deserialize, Serialize};

use crate::ports::PortInfo;

/// Unsolicited notifications emitted by the serial session.
///
/// Serialized as the outbound event envelope: `{"type": <kind>, "data": <payload>}`
/// where the payload is a hex string for `data`, a `{msg}` object for status
/// and error events, and a `PortInfo` array for `ports`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "kebab-case")]
pub enum SerialEvent {
    /// Bytes read from the device, hex-encoded.
    Data(String),
    /// The device finished opening.
    OpenSuccess {
        /// Status text naming the path and baud rate.
        msg: String,
    },
    /// The asynchronous open request failed.
    OpenError {
        /// Error detail.
        msg: String,
    },
    /// A runtime error reported by the transport.
    Error {
        /// Error detail.
        msg: String,
    },
    /// The device closed.
    Close {
        /// Status text.
        msg: String,
    },
    /// Result of a port enumeration.
    Ports(Vec<PortInfo>),
    /// A write to the device failed.
    SendError {
        /// Error detail.
        msg: String,
    },
}

impl SerialEvent {
    /// Wire name of the event kind.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Data(_) => "data",
            Self::OpenSuccess { .. } => "open-success",
            Self::OpenError { .. } => "open-error",
            Self::Error { .. } => "error",
            Self::Close { .. } => "close",
            Self::Ports(_) => "ports",
            Self::SendError { .. } => "send-error",
        }
    }

    /// Serialize to the outbound JSON text.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
