//! Inbound client commands.
//!
//! Client messages are JSON objects keyed by `action`:
//!
//! ```json
//! {"action": "open", "path": "COM3", "baudRate": 115200}
//! {"action": "send", "data": "48656C6C6F"}
//! {"action": "close"}
//! {"action": "ports"}
//! ```

use serde::Deserialize;
use serde_json::Value;

use crate::errors::CommandError;

/// Baud rate used when an `open` command omits `baudRate`.
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// A parsed client command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// Open a serial port. `baud_rate` is `None` when the client omitted it.
    Open {
        /// Device path.
        path: String,
        /// Requested baud rate.
        baud_rate: Option<u32>,
    },
    /// Write a hex payload to the open port.
    Send {
        /// Hex text, decoded by the session.
        data: String,
    },
    /// Close the open port.
    Close,
    /// Enumerate available ports.
    Ports,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OpenParams {
    path: String,
    #[serde(default)]
    baud_rate: Option<u32>,
}

#[derive(Deserialize)]
struct SendParams {
    data: String,
}

impl Command {
    /// Extract the `action` string of a raw message, if it has one.
    pub fn action_of(value: &Value) -> Option<&str> {
        value.get("action").and_then(Value::as_str)
    }

    /// Parse an already-decoded JSON message.
    pub fn from_value(value: Value) -> Result<Self, CommandError> {
        let action = Self::action_of(&value)
            .ok_or(CommandError::MissingAction)?
            .to_owned();

        match action.as_str() {
            "open" => {
                let params: OpenParams = params_for(&action, value)?;
                Ok(Self::Open {
                    path: params.path,
                    baud_rate: params.baud_rate,
                })
            }
            "send" => {
                let params: SendParams = params_for(&action, value)?;
                Ok(Self::Send { data: params.data })
            }
            "close" => Ok(Self::Close),
            "ports" => Ok(Self::Ports),
            _ => Err(CommandError::UnknownAction(action)),
        }
    }

    /// Wire name of the command's action.
    pub fn action(&self) -> &'static str {
        match self {
            Self::Open { .. } => "open",
            Self::Send { .. } => "send",
            Self::Close => "close",
            Self::Ports => "ports",
        }
    }
}

fn params_for<T: for<'de> Deserialize<'de>>(action: &str, value: Value) -> Result<T, CommandError> {
    serde_json::from_value(value).map_err(|e| CommandError::InvalidParams {
        action: action.to_owned(),
        reason: e.to_string(),
    })
}
