//! Stopping the listener and its WebSocket sessions together.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// How long the listener gets to drain when no timeout is given.
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// One token shared by the listener and every session it spawns.
///
/// Cancelling it makes axum stop accepting and each session send a Close
/// frame to its client.
#[derive(Debug, Default)]
pub struct ShutdownCoordinator {
    token: CancellationToken,
}

impl ShutdownCoordinator {
    /// Fresh, uncancelled coordinator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Token for the listener or a session to watch.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Cancel the token and wait for `listener` to exit.
    ///
    /// Returns `false` if it was still running after `timeout`; it is aborted
    /// in that case.
    pub async fn stop(&self, mut listener: JoinHandle<()>, timeout: Option<Duration>) -> bool {
        let timeout = timeout.unwrap_or(DEFAULT_DRAIN_TIMEOUT);
        self.token.cancel();
        debug!(timeout_ms = timeout.as_millis(), "draining listener");

        match tokio::time::timeout(timeout, &mut listener).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                warn!(error = %e, "listener task failed");
                true
            }
            Err(_) => {
                warn!(?timeout, "listener did not drain in time, aborting");
                listener.abort();
                false
            }
        }
    }
}
