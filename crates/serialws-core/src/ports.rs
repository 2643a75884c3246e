use serde::{Deserialize, Serialize};

/// Snapshot of one enumerable serial device.
///
/// Produced fresh on each enumeration; optional fields are empty strings
/// rather than `null` on the wire.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortInfo {
    /// Device node or port name, unique per enumeration (e.g. `/dev/ttyUSB0`, `COM3`).
    pub path: String,
    /// Human-readable name.
    pub name: String,
    /// Manufacturer string reported by the device.
    pub manufacturer: String,
    /// Device serial number.
    pub serial_number: String,
}

impl PortInfo {
    /// A port known only by its path.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// Build from optional descriptive fields, substituting empty strings.
    pub fn from_parts(
        path: impl Into<String>,
        name: Option<String>,
        manufacturer: Option<String>,
        serial_number: Option<String>,
    ) -> Self {
        Self {
            path: path.into(),
            name: name.unwrap_or_default(),
            manufacturer: manufacturer.unwrap_or_default(),
            serial_number: serial_number.unwrap_or_default(),
        }
    }
}
