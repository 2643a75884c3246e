//! Registry of connected clients and fan-out to all of them.

use std::sync::Arc;

use dashmap::DashMap;
use serialws_core::ConnectionId;
use tracing::{debug, warn};

use super::connection::ClientConnection;

/// Live connections indexed by id.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: DashMap<ConnectionId, Arc<ClientConnection>>,
}

impl ConnectionRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection.
    pub fn add(&self, connection: Arc<ClientConnection>) {
        let _ = self.connections.insert(connection.id.clone(), connection);
    }

    /// Remove a connection. Returns how many remain.
    pub fn remove(&self, id: &ConnectionId) -> usize {
        let _ = self.connections.remove(id);
        self.connections.len()
    }

    /// Number of live connections.
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Queue `message` on every connection. Returns how many accepted it.
    pub fn broadcast(&self, message: &Arc<String>) -> usize {
        let mut delivered = 0;
        for entry in &self.connections {
            if entry.value().send(Arc::clone(message)) {
                delivered += 1;
            } else {
                warn!(client_id = %entry.key(), "failed to queue broadcast message");
            }
        }
        debug!(recipients = delivered, "broadcast to all clients");
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn make_connection(id: &str) -> (Arc<ClientConnection>, mpsc::Receiver<Arc<String>>) {
        let (tx, rx) = mpsc::channel(8);
        (
            Arc::new(ClientConnection::new(ConnectionId::from_raw(id), tx)),
            rx,
        )
    }

    #[test]
    fn add_and_remove_report_counts() {
        let registry = ConnectionRegistry::new();
        let (a, _ra) = make_connection("conn_a");
        let (b, _rb) = make_connection("conn_b");
        registry.add(a);
        registry.add(b);
        assert_eq!(registry.connection_count(), 2);

        assert_eq!(registry.remove(&ConnectionId::from_raw("conn_a")), 1);
        assert_eq!(registry.remove(&ConnectionId::from_raw("conn_a")), 1);
        assert_eq!(registry.remove(&ConnectionId::from_raw("conn_b")), 0);
        assert_eq!(registry.connection_count(), 0);
    }

    #[tokio::test]
    async fn broadcast_reaches_every_connection() {
        let registry = ConnectionRegistry::new();
        let (a, mut ra) = make_connection("conn_a");
        let (b, mut rb) = make_connection("conn_b");
        registry.add(a);
        registry.add(b);

        let delivered = registry.broadcast(&Arc::new("hello".into()));
        assert_eq!(delivered, 2);
        assert_eq!(*ra.recv().await.unwrap(), "hello");
        assert_eq!(*rb.recv().await.unwrap(), "hello");
    }

    #[test]
    fn broadcast_skips_closed_connections() {
        let registry = ConnectionRegistry::new();
        let (a, ra) = make_connection("conn_a");
        let (b, _rb) = make_connection("conn_b");
        registry.add(a);
        registry.add(b);
        drop(ra);
        assert_eq!(registry.broadcast(&Arc::new("x".into())), 1);
    }
}
