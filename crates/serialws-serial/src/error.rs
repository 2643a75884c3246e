use thiserror::Error;

/// Failures reported by a serial transport.
///
/// The display text is what clients see inside `open-error`, `send-error`
/// and `error` events, so variants print the underlying message verbatim.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Error from the `serialport` crate (open, enumerate, configure).
    #[error("{0}")]
    Serial(#[from] serialport::Error),
    /// I/O error while reading or writing the device.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// Device-level failure described by the transport.
    #[error("{0}")]
    Device(String),
    /// A blocking worker panicked or was cancelled.
    #[error("transport task failed: {0}")]
    Task(String),
}

impl From<tokio::task::JoinError> for TransportError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Task(err.to_string())
    }
}
