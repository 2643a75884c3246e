//! `SerialSession`: owns the one serial link of the process.
//!
//! Operations validate their precondition synchronously and return a
//! [`Submission`]; the physical work runs on spawned tasks and its outcome is
//! reported through the registered event sink.
//!
//! Each open link is driven by a single task that owns the link's event
//! receiver, so events reach the sink in the order the transport produced them.

use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serialws_core::encoding::{bytes_to_hex, hex_to_bytes};
use serialws_core::{SerialEvent, DEFAULT_BAUD_RATE};
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

use crate::completion::{Completion, Notifier, Submission};
use crate::transport::{OpenRequest, SerialLink, SerialTransport, TransportEvent};

const MSG_OPENING: &str = "opening...";
const MSG_CLOSING: &str = "closing...";
const MSG_SENT: &str = "sent";
const MSG_NOT_OPEN: &str = "serial port is not open";
const MSG_CLOSED: &str = "serial port closed";

/// Receives every event the session emits.
pub type EventSink = Arc<dyn Fn(SerialEvent) + Send + Sync>;

/// Lifecycle phase of the session's serial link.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PortPhase {
    /// No link.
    Closed,
    /// Open submitted, waiting for the transport.
    Opening,
    /// Link ready for writes.
    Open,
    /// Close submitted, waiting for the transport.
    Closing,
}

impl PortPhase {
    /// Lowercase name, as reported by the health endpoint.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Opening => "opening",
            Self::Open => "open",
            Self::Closing => "closing",
        }
    }
}

impl fmt::Display for PortPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

struct SessionState {
    phase: PortPhase,
    link: Option<Arc<dyn SerialLink>>,
    open_waiter: Option<Notifier>,
    close_waiters: Vec<Notifier>,
}

impl SessionState {
    fn closed() -> Self {
        Self {
            phase: PortPhase::Closed,
            link: None,
            open_waiter: None,
            close_waiters: Vec::new(),
        }
    }

    /// Reset to `Closed`, returning every pending waiter.
    fn reset(&mut self) -> Vec<Notifier> {
        self.phase = PortPhase::Closed;
        self.link = None;
        let mut waiters: Vec<Notifier> = self.close_waiters.drain(..).collect();
        waiters.extend(self.open_waiter.take());
        waiters
    }
}

struct SessionInner {
    transport: Arc<dyn SerialTransport>,
    default_baud_rate: u32,
    state: Mutex<SessionState>,
    sink: RwLock<Option<EventSink>>,
}

impl SessionInner {
    fn emit(&self, event: SerialEvent) {
        let sink = self.sink.read().clone();
        match sink {
            Some(sink) => sink(event),
            None => trace!(event_type = event.event_type(), "no event sink, dropping event"),
        }
    }

    /// Apply one transport event. Returns `false` once the link is gone.
    fn on_transport_event(&self, request: &OpenRequest, event: TransportEvent) -> bool {
        match event {
            TransportEvent::Opened => {
                let waiter = {
                    let mut state = self.state.lock();
                    if state.phase == PortPhase::Opening {
                        state.phase = PortPhase::Open;
                    }
                    state.open_waiter.take()
                };
                info!(path = %request.path, baud_rate = request.baud_rate, "serial port open");
                self.emit(SerialEvent::OpenSuccess {
                    msg: format!("serial port opened: {} @ {}", request.path, request.baud_rate),
                });
                notify_all(waiter);
                true
            }
            TransportEvent::Data(bytes) => {
                debug!(path = %request.path, bytes = bytes.len(), "serial data received");
                self.emit(SerialEvent::Data(bytes_to_hex(&bytes)));
                true
            }
            TransportEvent::Error(msg) => {
                warn!(path = %request.path, error = %msg, "serial transport error");
                self.emit(SerialEvent::Error { msg });
                true
            }
            TransportEvent::Closed => {
                self.on_closed(request);
                false
            }
        }
    }

    fn on_closed(&self, request: &OpenRequest) {
        let waiters = self.state.lock().reset();
        info!(path = %request.path, "serial port closed");
        self.emit(SerialEvent::Close {
            msg: MSG_CLOSED.into(),
        });
        notify_all(waiters);
    }
}

fn notify_all(waiters: impl IntoIterator<Item = Notifier>) {
    for waiter in waiters {
        waiter.notify();
    }
}

/// Handle to the process's serial session. Clones share the same session.
#[derive(Clone)]
pub struct SerialSession {
    inner: Arc<SessionInner>,
}

impl fmt::Debug for SerialSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SerialSession")
            .field("phase", &self.phase())
            .field("default_baud_rate", &self.inner.default_baud_rate)
            .finish_non_exhaustive()
    }
}

impl SerialSession {
    /// Create a closed session over `transport`, defaulting to 9600 baud.
    pub fn new(transport: Arc<dyn SerialTransport>) -> Self {
        Self::with_default_baud_rate(transport, DEFAULT_BAUD_RATE)
    }

    /// Create a closed session with a custom default baud rate.
    pub fn with_default_baud_rate(transport: Arc<dyn SerialTransport>, baud_rate: u32) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                transport,
                default_baud_rate: baud_rate,
                state: Mutex::new(SessionState::closed()),
                sink: RwLock::new(None),
            }),
        }
    }

    /// Register the event sink, replacing (and discarding) any previous one.
    ///
    /// Events emitted while no sink is registered are dropped.
    pub fn on_event<F>(&self, sink: F)
    where
        F: Fn(SerialEvent) + Send + Sync + 'static,
    {
        *self.inner.sink.write() = Some(Arc::new(sink));
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> PortPhase {
        self.inner.state.lock().phase
    }

    /// Whether the link is open for writes.
    pub fn is_open(&self) -> bool {
        self.phase() == PortPhase::Open
    }

    /// Baud rate used when `open` is called without one.
    pub fn default_baud_rate(&self) -> u32 {
        self.inner.default_baud_rate
    }

    /// Submit an open of `path`.
    ///
    /// Rejected without side effects unless the session is `Closed`. The
    /// receipt says "opening..."; the outcome arrives later as `open-success`
    /// or `open-error`.
    pub fn open(&self, path: impl Into<String>, baud_rate: Option<u32>) -> Submission {
        let request = OpenRequest {
            path: path.into(),
            baud_rate: baud_rate.unwrap_or(self.inner.default_baud_rate),
        };

        let (completion, notifier) = Completion::pending();
        {
            let mut state = self.inner.state.lock();
            match state.phase {
                PortPhase::Closed => {}
                PortPhase::Open => return Submission::rejected("serial port is already open"),
                busy => return Submission::rejected(format!("serial port is busy ({busy})")),
            }
            state.phase = PortPhase::Opening;
            state.open_waiter = Some(notifier);
        }

        info!(path = %request.path, baud_rate = request.baud_rate, "opening serial port");
        let _ = tokio::spawn(drive_link(Arc::clone(&self.inner), request));
        Submission::accepted(MSG_OPENING, completion)
    }

    /// Submit a close of the open link.
    ///
    /// Rejected unless `Open`. The `close` event arrives once the transport
    /// reports the link gone.
    pub fn close(&self) -> Submission {
        let (completion, notifier) = Completion::pending();
        let link = {
            let mut state = self.inner.state.lock();
            let link = match (state.phase, state.link.clone()) {
                (PortPhase::Open, Some(link)) => link,
                _ => return Submission::rejected(MSG_NOT_OPEN),
            };
            state.phase = PortPhase::Closing;
            state.close_waiters.push(notifier);
            link
        };

        info!("closing serial port");
        let inner = Arc::clone(&self.inner);
        let _ = tokio::spawn(async move {
            if let Err(err) = link.close().await {
                warn!(error = %err, "serial close failed");
                let waiters: Vec<Notifier> = {
                    let mut state = inner.state.lock();
                    if state.phase == PortPhase::Closing {
                        state.phase = PortPhase::Open;
                    }
                    state.close_waiters.drain(..).collect()
                };
                inner.emit(SerialEvent::Error {
                    msg: format!("failed to close serial port: {err}"),
                });
                notify_all(waiters);
            }
        });
        Submission::accepted(MSG_CLOSING, completion)
    }

    /// Decode `hex` and submit it as a write.
    ///
    /// Rejected unless `Open`, and rejected before any write when `hex` is
    /// malformed. Write failures surface only as `send-error` events.
    pub fn send(&self, hex: &str) -> Submission {
        let link = {
            let state = self.inner.state.lock();
            match (state.phase, state.link.clone()) {
                (PortPhase::Open, Some(link)) => link,
                _ => return Submission::rejected(MSG_NOT_OPEN),
            }
        };

        let bytes = match hex_to_bytes(hex) {
            Ok(bytes) => bytes,
            Err(err) => return Submission::rejected(err.to_string()),
        };

        debug!(bytes = bytes.len(), "writing to serial port");
        let (completion, notifier) = Completion::pending();
        let inner = Arc::clone(&self.inner);
        let _ = tokio::spawn(async move {
            if let Err(err) = link.write(bytes).await {
                warn!(error = %err, "serial write failed");
                inner.emit(SerialEvent::SendError {
                    msg: format!("send failed: {err}"),
                });
            }
            notifier.notify();
        });
        Submission::accepted(MSG_SENT, completion)
    }

    /// Enumerate ports and emit one `ports` event with the result.
    ///
    /// There is no synchronous receipt. An enumeration failure is emitted as
    /// an `error` event instead.
    pub fn list_ports(&self) -> Completion {
        let (completion, notifier) = Completion::pending();
        let inner = Arc::clone(&self.inner);
        let _ = tokio::spawn(async move {
            match inner.transport.list().await {
                Ok(ports) => {
                    debug!(count = ports.len(), "serial ports enumerated");
                    inner.emit(SerialEvent::Ports(ports));
                }
                Err(err) => {
                    warn!(error = %err, "serial port enumeration failed");
                    inner.emit(SerialEvent::Error {
                        msg: format!("failed to list serial ports: {err}"),
                    });
                }
            }
            notifier.notify();
        });
        completion
    }

    /// Close the link if one is open and wait for it to go away.
    ///
    /// A close already in flight is waited on rather than submitted again.
    pub async fn shutdown(&self) {
        let in_flight = {
            let mut state = self.inner.state.lock();
            if state.phase == PortPhase::Closing {
                let (completion, notifier) = Completion::pending();
                state.close_waiters.push(notifier);
                Some(completion)
            } else {
                None
            }
        };

        if let Some(completion) = in_flight {
            debug!("waiting for in-flight serial close");
            completion.settled().await;
            return;
        }

        let submission = self.close();
        if submission.result.success {
            let _ = submission.settled().await;
        }
    }
}

/// Open the link and pump its events until it closes.
async fn drive_link(inner: Arc<SessionInner>, request: OpenRequest) {
    let (events_tx, mut events_rx) = mpsc::unbounded_channel();

    let link = match inner.transport.open(&request, events_tx).await {
        Ok(link) => link,
        Err(err) => {
            warn!(path = %request.path, error = %err, "serial open failed");
            let waiters = inner.state.lock().reset();
            inner.emit(SerialEvent::OpenError {
                msg: format!("failed to open serial port: {err}"),
            });
            notify_all(waiters);
            return;
        }
    };

    inner.state.lock().link = Some(link);

    while let Some(event) = events_rx.recv().await {
        if !inner.on_transport_event(&request, event) {
            return;
        }
    }

    debug!(path = %request.path, "transport dropped its event channel");
    inner.on_closed(&request);
}
