//! Capability traits the session drives.
//!
//! A transport opens links and enumerates devices. Each open link reports
//! what happens to it through an [`EventSender`] handed over at open time:
//!
//! 1. `Opened` exactly once, before any `Data`
//! 2. `Data` / `Error` in the order they occur on the device
//! 3. `Closed` last; nothing is sent after it
//!
//! Dropping the sender without `Closed` is treated as `Closed`.

use std::sync::Arc;

use async_trait::async_trait;
use serialws_core::PortInfo;
use tokio::sync::mpsc;

use crate::error::TransportError;

/// Where a link pushes its events.
pub type EventSender = mpsc::UnboundedSender<TransportEvent>;

/// Parameters of an open request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OpenRequest {
    /// Device path.
    pub path: String,
    /// Baud rate.
    pub baud_rate: u32,
}

/// Lifecycle and data notifications from one open link.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransportEvent {
    /// The device is open and ready.
    Opened,
    /// Raw bytes read from the device.
    Data(Vec<u8>),
    /// A runtime error; the link may still be usable.
    Error(String),
    /// The link is gone.
    Closed,
}

/// Opens serial links and enumerates devices.
#[async_trait]
pub trait SerialTransport: Send + Sync {
    /// Open `request.path`. Failure here is an open failure, distinct from
    /// later runtime errors reported as [`TransportEvent::Error`].
    async fn open(
        &self,
        request: &OpenRequest,
        events: EventSender,
    ) -> Result<Arc<dyn SerialLink>, TransportError>;

    /// Enumerate the devices currently available.
    async fn list(&self) -> Result<Vec<PortInfo>, TransportError>;
}

/// One open serial connection.
#[async_trait]
pub trait SerialLink: Send + Sync {
    /// Write the whole payload to the device.
    async fn write(&self, bytes: Vec<u8>) -> Result<(), TransportError>;

    /// Request close. Completion is signalled by [`TransportEvent::Closed`].
    async fn close(&self) -> Result<(), TransportError>;
}
