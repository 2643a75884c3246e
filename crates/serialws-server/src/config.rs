//! Server configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serialws_settings::{DisconnectPolicy, EventDelivery, SerialWsSettings};

/// Configuration for the bridge server.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind.
    pub host: String,
    /// Port to bind (`0` for auto-assign).
    pub port: u16,
    /// Seconds between server pings.
    pub heartbeat_interval_secs: u64,
    /// Seconds of silence after which a client is dropped.
    pub heartbeat_timeout_secs: u64,
    /// Max inbound WebSocket message size in bytes.
    pub max_message_size: usize,
    /// Outbound queue depth per client.
    pub send_queue_capacity: usize,
    /// Who receives serial events.
    pub delivery: EventDelivery,
    /// When a disconnect closes the serial port.
    pub disconnect: DisconnectPolicy,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::from_settings(&SerialWsSettings::default())
    }
}

impl ServerConfig {
    /// Take the server and bridge sections of loaded settings.
    pub fn from_settings(settings: &SerialWsSettings) -> Self {
        Self {
            host: settings.server.host.clone(),
            port: settings.server.port,
            heartbeat_interval_secs: settings.server.heartbeat_interval_secs,
            heartbeat_timeout_secs: settings.server.heartbeat_timeout_secs,
            max_message_size: settings.server.max_message_bytes,
            send_queue_capacity: settings.server.send_queue_capacity,
            delivery: settings.bridge.delivery,
            disconnect: settings.bridge.disconnect,
        }
    }

    /// `host:port` to bind.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Ping interval, at least one second.
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs.max(1))
    }

    /// Liveness timeout, never shorter than the ping interval.
    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_secs(self.heartbeat_timeout_secs).max(self.heartbeat_interval())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.host, "0.0.0.0");
        assert_eq!(cfg.port, 9988);
        assert_eq!(cfg.bind_address(), "0.0.0.0:9988");
        assert_eq!(cfg.heartbeat_interval(), Duration::from_secs(30));
        assert_eq!(cfg.heartbeat_timeout(), Duration::from_secs(90));
        assert_eq!(cfg.max_message_size, 1024 * 1024);
        assert_eq!(cfg.send_queue_capacity, 256);
        assert_eq!(cfg.delivery, EventDelivery::Latest);
        assert_eq!(cfg.disconnect, DisconnectPolicy::Always);
    }

    #[test]
    fn from_settings_copies_bridge_policies() {
        let mut settings = SerialWsSettings::default();
        settings.server.port = 0;
        settings.bridge.delivery = EventDelivery::Broadcast;
        settings.bridge.disconnect = DisconnectPolicy::LastClient;
        let cfg = ServerConfig::from_settings(&settings);
        assert_eq!(cfg.port, 0);
        assert_eq!(cfg.delivery, EventDelivery::Broadcast);
        assert_eq!(cfg.disconnect, DisconnectPolicy::LastClient);
    }

    #[test]
    fn heartbeat_durations_are_clamped() {
        let cfg = ServerConfig {
            heartbeat_interval_secs: 0,
            heartbeat_timeout_secs: 0,
            ..ServerConfig::default()
        };
        assert_eq!(cfg.heartbeat_interval(), Duration::from_secs(1));
        assert_eq!(cfg.heartbeat_timeout(), Duration::from_secs(1));
    }
}
