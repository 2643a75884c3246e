//! WebSocket client connection state.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serialws_core::ConnectionId;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// One connected WebSocket client.
///
/// Outbound text goes through a bounded queue drained by the socket's writer
/// task, so sending never blocks the caller. A client that lets the queue
/// fill up is marked failed rather than silently losing messages; its
/// session disconnects it.
#[derive(Debug)]
pub struct ClientConnection {
    /// Unique connection ID.
    pub id: ConnectionId,
    tx: mpsc::Sender<Arc<String>>,
    /// When this connection was established.
    pub connected_at: Instant,
    is_alive: AtomicBool,
    last_seen: Mutex<Instant>,
    dropped_messages: AtomicU64,
    failed: CancellationToken,
}

impl ClientConnection {
    /// Create a connection writing into `tx`.
    pub fn new(id: ConnectionId, tx: mpsc::Sender<Arc<String>>) -> Self {
        let now = Instant::now();
        Self {
            id,
            tx,
            connected_at: now,
            is_alive: AtomicBool::new(true),
            last_seen: Mutex::new(now),
            dropped_messages: AtomicU64::new(0),
            failed: CancellationToken::new(),
        }
    }

    /// Queue a text message.
    ///
    /// Returns `false` if the queue is full or closed, and counts the drop.
    /// A full queue also marks the connection failed.
    pub fn send(&self, message: Arc<String>) -> bool {
        match self.tx.try_send(message) {
            Ok(()) => true,
            Err(err) => {
                let _ = self.dropped_messages.fetch_add(1, Ordering::Relaxed);
                if matches!(err, TrySendError::Full(_)) && !self.failed.is_cancelled() {
                    warn!(
                        client_id = %self.id,
                        capacity = self.tx.max_capacity(),
                        "outbound queue full, dropping client"
                    );
                    self.failed.cancel();
                }
                false
            }
        }
    }

    /// Queue an owned string.
    pub fn send_text(&self, text: String) -> bool {
        self.send(Arc::new(text))
    }

    /// Whether the outbound queue overflowed.
    pub fn has_failed(&self) -> bool {
        self.failed.is_cancelled()
    }

    /// Resolves once the outbound queue has overflowed.
    pub async fn failed(&self) {
        self.failed.cancelled().await;
    }

    /// Total messages dropped for this connection.
    pub fn drop_count(&self) -> u64 {
        self.dropped_messages.load(Ordering::Relaxed)
    }

    /// Record activity from the client (pong or any frame).
    pub fn mark_alive(&self) {
        self.is_alive.store(true, Ordering::Relaxed);
        *self.last_seen.lock() = Instant::now();
    }

    /// Time since the last recorded activity.
    pub fn last_seen_elapsed(&self) -> Duration {
        self.last_seen.lock().elapsed()
    }

    /// Read and reset the alive flag.
    ///
    /// Returns `true` if the client showed activity since the last check.
    pub fn check_alive(&self) -> bool {
        self.is_alive.swap(false, Ordering::Relaxed)
    }

    /// Connection age.
    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_connection(capacity: usize) -> (ClientConnection, mpsc::Receiver<Arc<String>>) {
        let (tx, rx) = mpsc::channel(capacity);
        (ClientConnection::new(ConnectionId::from_raw("conn_1"), tx), rx)
    }

    #[tokio::test]
    async fn send_preserves_order() {
        let (conn, mut rx) = make_connection(8);
        for i in 0..3 {
            assert!(conn.send_text(format!("msg_{i}")));
        }
        for i in 0..3 {
            assert_eq!(*rx.recv().await.unwrap(), format!("msg_{i}"));
        }
    }

    #[tokio::test]
    async fn full_queue_marks_connection_failed() {
        let (conn, _rx) = make_connection(1);
        assert!(conn.send_text("a".into()));
        assert!(!conn.has_failed());

        assert!(!conn.send_text("b".into()));
        assert!(!conn.send_text("c".into()));
        assert_eq!(conn.drop_count(), 2);
        assert!(conn.has_failed());
        tokio::time::timeout(Duration::from_secs(1), conn.failed())
            .await
            .unwrap();
    }

    #[test]
    fn closed_queue_drops_without_failing() {
        let (conn, rx) = make_connection(4);
        drop(rx);
        assert!(!conn.send_text("late".into()));
        assert_eq!(conn.drop_count(), 1);
        assert!(!conn.has_failed());
    }

    #[test]
    fn alive_flag_resets_on_check() {
        let (conn, _rx) = make_connection(1);
        assert!(conn.check_alive());
        assert!(!conn.check_alive());
        conn.mark_alive();
        assert!(conn.check_alive());
        assert!(conn.last_seen_elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn age_increases() {
        let (conn, _rx) = make_connection(1);
        let before = conn.age();
        std::thread::sleep(Duration::from_millis(5));
        assert!(conn.age() > before);
    }
}
