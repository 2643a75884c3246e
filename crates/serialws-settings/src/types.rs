//! Settings type definitions.
//!
//! Field names are camelCase on disk. Every section is `#[serde(default)]`,
//! so a settings file only needs the values it changes.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::SettingsError;

/// Root settings type.
///
/// ```json
/// {
///   "server": { "port": 9000 },
///   "bridge": { "delivery": "broadcast" },
///   "logging": { "format": "json" }
/// }
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SerialWsSettings {
    /// Listener settings.
    pub server: ServerSettings,
    /// Per-connection bridge behaviour.
    pub bridge: BridgeSettings,
    /// Serial session defaults.
    pub serial: SerialSettings,
    /// Log output.
    pub logging: LoggingSettings,
}

/// Listener and WebSocket settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Listen port. `0` picks an ephemeral port.
    pub port: u16,
    /// Seconds between server pings.
    pub heartbeat_interval_secs: u64,
    /// Seconds of client silence before the connection is dropped.
    pub heartbeat_timeout_secs: u64,
    /// Largest inbound WebSocket message accepted, in bytes.
    pub max_message_bytes: usize,
    /// Outbound queue depth per client.
    pub send_queue_capacity: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 9988,
            heartbeat_interval_secs: 30,
            heartbeat_timeout_secs: 90,
            max_message_bytes: 1024 * 1024,
            send_queue_capacity: 256,
        }
    }
}

impl ServerSettings {
    /// `host:port` string for binding.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Who receives serial events.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventDelivery {
    /// Only the most recently connected client.
    #[default]
    Latest,
    /// Every connected client.
    Broadcast,
}

/// When a disconnecting client closes the serial port.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DisconnectPolicy {
    /// Every disconnect closes the port.
    #[default]
    Always,
    /// Only the last remaining client's disconnect closes the port.
    LastClient,
}

/// Bridge behaviour.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BridgeSettings {
    /// Event delivery policy.
    pub delivery: EventDelivery,
    /// Disconnect policy.
    pub disconnect: DisconnectPolicy,
}

/// Serial session defaults.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SerialSettings {
    /// Baud rate used when `open` omits one.
    pub default_baud_rate: u32,
    /// Reader poll interval in milliseconds.
    pub read_timeout_ms: u64,
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            default_baud_rate: 9600,
            read_timeout_ms: 10,
        }
    }
}

impl SerialSettings {
    /// Reader poll interval.
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

/// Log line format.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable multi-line output.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

/// Log output settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default filter directive; `RUST_LOG` takes precedence.
    pub level: String,
    /// Output format.
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

macro_rules! keyword_enum {
    ($ty:ident, $what:literal, { $($name:literal => $variant:ident),+ $(,)? }) => {
        impl $ty {
            /// Configuration keyword.
            pub fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $name,)+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = SettingsError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($name => Ok(Self::$variant),)+
                    other => Err(SettingsError::InvalidValue(format!(
                        concat!("unknown ", $what, " {:?}"),
                        other
                    ))),
                }
            }
        }
    };
}

keyword_enum!(EventDelivery, "event delivery", {
    "latest" => Latest,
    "broadcast" => Broadcast,
});

keyword_enum!(DisconnectPolicy, "disconnect policy", {
    "always" => Always,
    "last-client" => LastClient,
});

keyword_enum!(LogFormat, "log format", {
    "pretty" => Pretty,
    "json" => Json,
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let settings = SerialWsSettings::default();
        assert_eq!(settings.server.host, "0.0.0.0");
        assert_eq!(settings.server.port, 9988);
        assert_eq!(settings.server.heartbeat_interval_secs, 30);
        assert_eq!(settings.server.heartbeat_timeout_secs, 90);
        assert_eq!(settings.server.max_message_bytes, 1_048_576);
        assert_eq!(settings.server.send_queue_capacity, 256);
        assert_eq!(settings.bridge.delivery, EventDelivery::Latest);
        assert_eq!(settings.bridge.disconnect, DisconnectPolicy::Always);
        assert_eq!(settings.serial.default_baud_rate, 9600);
        assert_eq!(settings.serial.read_timeout(), Duration::from_millis(10));
        assert_eq!(settings.logging.level, "info");
        assert_eq!(settings.logging.format, LogFormat::Pretty);
    }

    #[test]
    fn bind_address() {
        assert_eq!(ServerSettings::default().bind_address(), "0.0.0.0:9988");
    }

    #[test]
    fn serializes_camel_case_and_kebab_keywords() {
        let mut settings = SerialWsSettings::default();
        settings.bridge.disconnect = DisconnectPolicy::LastClient;
        let json = serde_json::to_value(&settings).unwrap();
        assert_eq!(json["server"]["heartbeatIntervalSecs"], 30);
        assert_eq!(json["serial"]["defaultBaudRate"], 9600);
        assert_eq!(json["bridge"]["disconnect"], "last-client");
        assert_eq!(json["logging"]["format"], "pretty");
    }

    #[test]
    fn partial_json_fills_defaults() {
        let settings: SerialWsSettings =
            serde_json::from_str(r#"{"bridge": {"delivery": "broadcast"}}"#).unwrap();
        assert_eq!(settings.bridge.delivery, EventDelivery::Broadcast);
        assert_eq!(settings.bridge.disconnect, DisconnectPolicy::Always);
        assert_eq!(settings.server.port, 9988);
    }

    #[test]
    fn keywords_parse_case_insensitively() {
        assert_eq!("Broadcast".parse::<EventDelivery>().unwrap(), EventDelivery::Broadcast);
        assert_eq!(
            "last-client".parse::<DisconnectPolicy>().unwrap(),
            DisconnectPolicy::LastClient
        );
        assert_eq!(" JSON ".parse::<LogFormat>().unwrap(), LogFormat::Json);
    }

    #[test]
    fn unknown_keyword_is_invalid_value() {
        let err = "xml".parse::<LogFormat>().unwrap_err();
        assert_eq!(err.to_string(), "invalid settings value: unknown log format \"xml\"");
        assert!("everyone".parse::<EventDelivery>().is_err());
    }

    #[test]
    fn keyword_display_round_trips() {
        for policy in [DisconnectPolicy::Always, DisconnectPolicy::LastClient] {
            assert_eq!(policy.to_string().parse::<DisconnectPolicy>().unwrap(), policy);
        }
    }
}
