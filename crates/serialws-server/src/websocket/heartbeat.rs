//! Liveness monitoring for one connection.

use std::sync::Arc;
use std::time::Duration;

use tokio::time;
use tokio_util::sync::CancellationToken;

use super::connection::ClientConnection;

/// Outcome of the heartbeat loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeartbeatResult {
    /// The client stayed silent past the timeout.
    TimedOut,
    /// The heartbeat was cancelled externally.
    Cancelled,
}

/// Watch `connection` until it goes silent or `cancel` fires.
///
/// Every `interval` the alive flag is read and reset. After
/// `timeout / interval` consecutive silent ticks (at least one) the
/// connection is reported dead.
pub async fn run_heartbeat(
    connection: Arc<ClientConnection>,
    interval: Duration,
    timeout: Duration,
    cancel: CancellationToken,
) -> HeartbeatResult {
    let mut check_interval = time::interval(interval);
    // The first tick fires immediately.
    let _ = check_interval.tick().await;

    let interval_ms = interval.as_millis().max(1);
    let max_missed = u32::try_from(timeout.as_millis() / interval_ms)
        .unwrap_or(u32::MAX)
        .max(1);
    let mut missed: u32 = 0;

    loop {
        tokio::select! {
            _ = check_interval.tick() => {
                if connection.check_alive() {
                    missed = 0;
                } else {
                    missed += 1;
                    if missed >= max_missed {
                        return HeartbeatResult::TimedOut;
                    }
                }
            }
            () = cancel.cancelled() => {
                return HeartbeatResult::Cancelled;
            }
        }
    }
}
