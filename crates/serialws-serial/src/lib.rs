//! # serialws-serial
//!
//! Serial port lifecycle for the bridge.
//!
//! - [`SerialTransport`] / [`SerialLink`]: the capability the session drives
//! - [`SerialSession`]: the `Closed → Opening → Open → Closing` state machine,
//!   hex encoding at the boundary, and the single event sink
//! - [`HardwareTransport`]: `serialport`-backed implementation
//! - [`mock::MockTransport`]: scriptable in-memory transport for tests

#![deny(unsafe_code)]

pub mod completion;
pub mod error;
pub mod hardware;
pub mod session;
pub mod transport;

pub mod mock;

pub use completion::{Completion, Submission};
pub use error::TransportError;
pub use hardware::HardwareTransport;
pub use session::{EventSink, PortPhase, SerialSession};
pub use transport::{EventSender, OpenRequest, SerialLink, SerialTransport, TransportEvent};
