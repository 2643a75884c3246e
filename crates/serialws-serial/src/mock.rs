//! Scriptable in-memory transport.
//!
//! Lets tests (here and in downstream crates) drive the session without
//! hardware: inject inbound bytes, runtime errors and closures, force
//! failures, and inspect what was written.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serialws_core::PortInfo;

use crate::error::TransportError;
use crate::transport::{EventSender, OpenRequest, SerialLink, SerialTransport, TransportEvent};

#[derive(Default)]
struct MockState {
    ports: Vec<PortInfo>,
    open_error: Option<String>,
    write_error: Option<String>,
    list_error: Option<String>,
    close_error: Option<String>,
    defer_open: bool,
    events: Option<EventSender>,
    writes: Vec<Vec<u8>>,
    open_requests: Vec<OpenRequest>,
}

/// In-memory [`SerialTransport`]. Clones share state.
#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl std::fmt::Debug for MockTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("MockTransport")
            .field("ports", &state.ports.len())
            .field("linked", &state.events.is_some())
            .field("writes", &state.writes.len())
            .finish_non_exhaustive()
    }
}

impl MockTransport {
    /// A transport with no ports that opens and writes successfully.
    pub fn new() -> Self {
        Self::default()
    }

    /// Ports returned by subsequent enumerations.
    pub fn set_ports(&self, ports: Vec<PortInfo>) {
        self.state.lock().ports = ports;
    }

    /// Make subsequent opens fail with `msg`.
    pub fn fail_open(&self, msg: impl Into<String>) {
        self.state.lock().open_error = Some(msg.into());
    }

    /// Make subsequent writes fail with `msg`.
    pub fn fail_writes(&self, msg: impl Into<String>) {
        self.state.lock().write_error = Some(msg.into());
    }

    /// Make subsequent enumerations fail with `msg`.
    pub fn fail_list(&self, msg: impl Into<String>) {
        self.state.lock().list_error = Some(msg.into());
    }

    /// Make subsequent close requests fail with `msg`.
    pub fn fail_close(&self, msg: impl Into<String>) {
        self.state.lock().close_error = Some(msg.into());
    }

    /// Remove every injected failure.
    pub fn clear_failures(&self) {
        let mut state = self.state.lock();
        state.open_error = None;
        state.write_error = None;
        state.list_error = None;
        state.close_error = None;
    }

    /// Hold back `Opened` on the next open until [`signal_opened`](Self::signal_opened).
    pub fn defer_open(&self) {
        self.state.lock().defer_open = true;
    }

    /// Report `Opened` for a deferred open. `false` if no link exists yet.
    pub fn signal_opened(&self) -> bool {
        self.push(TransportEvent::Opened)
    }

    /// Deliver inbound bytes on the open link.
    pub fn push_data(&self, bytes: &[u8]) -> bool {
        self.push(TransportEvent::Data(bytes.to_vec()))
    }

    /// Report a runtime error on the open link.
    pub fn push_error(&self, msg: impl Into<String>) -> bool {
        self.push(TransportEvent::Error(msg.into()))
    }

    /// Close the link from the device side (unplug, remote hangup).
    pub fn push_closed(&self) -> bool {
        let Some(events) = self.state.lock().events.take() else {
            return false;
        };
        events.send(TransportEvent::Closed).is_ok()
    }

    /// Every payload written so far, in order.
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.state.lock().writes.clone()
    }

    /// Every open request received so far, in order.
    pub fn open_requests(&self) -> Vec<OpenRequest> {
        self.state.lock().open_requests.clone()
    }

    fn push(&self, event: TransportEvent) -> bool {
        self.state
            .lock()
            .events
            .as_ref()
            .is_some_and(|events| events.send(event).is_ok())
    }
}

#[async_trait]
impl SerialTransport for MockTransport {
    async fn open(
        &self,
        request: &OpenRequest,
        events: EventSender,
    ) -> Result<Arc<dyn SerialLink>, TransportError> {
        let mut state = self.state.lock();
        state.open_requests.push(request.clone());
        if let Some(msg) = &state.open_error {
            return Err(TransportError::Device(msg.clone()));
        }
        if std::mem::take(&mut state.defer_open) {
            state.events = Some(events);
        } else {
            let _ = events.send(TransportEvent::Opened);
            state.events = Some(events);
        }
        Ok(Arc::new(MockLink {
            state: Arc::clone(&self.state),
        }))
    }

    async fn list(&self) -> Result<Vec<PortInfo>, TransportError> {
        let state = self.state.lock();
        match &state.list_error {
            Some(msg) => Err(TransportError::Device(msg.clone())),
            None => Ok(state.ports.clone()),
        }
    }
}

struct MockLink {
    state: Arc<Mutex<MockState>>,
}

#[async_trait]
impl SerialLink for MockLink {
    async fn write(&self, bytes: Vec<u8>) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        if let Some(msg) = &state.write_error {
            return Err(TransportError::Device(msg.clone()));
        }
        state.writes.push(bytes);
        Ok(())
    }

    async fn close(&self) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        if let Some(msg) = &state.close_error {
            return Err(TransportError::Device(msg.clone()));
        }
        if let Some(events) = state.events.take() {
            let _ = events.send(TransportEvent::Closed);
        }
        Ok(())
    }
}
