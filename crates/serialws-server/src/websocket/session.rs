//! WebSocket session lifecycle: one connected client from upgrade through
//! disconnect.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::bridge::Bridge;
use super::heartbeat::{run_heartbeat, HeartbeatResult};

/// Heartbeat timing for one session.
#[derive(Clone, Copy, Debug)]
pub struct HeartbeatConfig {
    /// Interval between server pings.
    pub interval: Duration,
    /// Silence after which the client is dropped.
    pub timeout: Duration,
}

/// Run a WebSocket session for a connected client.
///
/// 1. Forwards queued replies and events to the socket, pinging periodically
/// 2. Hands inbound text to the bridge
/// 3. Drops the client on heartbeat timeout, outbound overflow or server shutdown
/// 4. Applies the bridge's disconnect policy on the way out
#[instrument(skip_all, fields(client_id = %bridge.connection().id))]
pub async fn run_ws_session(
    ws: WebSocket,
    bridge: Bridge,
    mut send_rx: mpsc::Receiver<Arc<String>>,
    heartbeat: HeartbeatConfig,
    shutdown: CancellationToken,
) {
    let (mut ws_tx, mut ws_rx) = ws.split();
    let connection = Arc::clone(bridge.connection());
    let session_cancel = shutdown.child_token();

    let writer_cancel = session_cancel.clone();
    let mut outbound = tokio::spawn(async move {
        let mut ping_interval = tokio::time::interval(heartbeat.interval);
        // Skip the immediate first tick
        let _ = ping_interval.tick().await;

        loop {
            tokio::select! {
                msg = send_rx.recv() => {
                    let Some(text) = msg else { break };
                    if ws_tx.send(Message::Text(String::clone(&text).into())).await.is_err() {
                        break;
                    }
                }
                _ = ping_interval.tick() => {
                    if ws_tx.send(Message::Ping(Vec::new().into())).await.is_err() {
                        break;
                    }
                }
                () = writer_cancel.cancelled() => {
                    let _ = ws_tx.send(Message::Close(None)).await;
                    break;
                }
            }
        }
    });

    let mut liveness = tokio::spawn(run_heartbeat(
        Arc::clone(&connection),
        heartbeat.interval,
        heartbeat.timeout,
        session_cancel.clone(),
    ));

    loop {
        tokio::select! {
            frame = ws_rx.next() => {
                let Some(frame) = frame else { break };
                let msg = match frame {
                    Ok(msg) => msg,
                    Err(e) => {
                        bridge.on_transport_error(&e.to_string());
                        break;
                    }
                };
                connection.mark_alive();

                match msg {
                    Message::Text(text) => bridge.handle_and_reply(text.as_str()),
                    Message::Binary(data) => bridge.handle_binary(&data),
                    Message::Close(_) => {
                        debug!("client sent close frame");
                        break;
                    }
                    Message::Ping(_) | Message::Pong(_) => {}
                }
            }
            result = &mut liveness => {
                if matches!(result, Ok(HeartbeatResult::TimedOut)) {
                    warn!(
                        silent_for = ?connection.last_seen_elapsed(),
                        "client unresponsive, disconnecting"
                    );
                }
                break;
            }
            _ = &mut outbound => break,
            () = connection.failed() => {
                warn!(dropped = connection.drop_count(), "client fell behind, disconnecting");
                break;
            }
            () = shutdown.cancelled() => {
                info!("server shutting down, closing client");
                break;
            }
        }
    }

    session_cancel.cancel();
    if !outbound.is_finished()
        && tokio::time::timeout(Duration::from_secs(1), &mut outbound)
            .await
            .is_err()
    {
        outbound.abort();
    }
    liveness.abort();

    info!(
        age_secs = connection.age().as_secs(),
        dropped = connection.drop_count(),
        overflowed = connection.has_failed(),
        "websocket session ended"
    );
    bridge.on_disconnect();
}
