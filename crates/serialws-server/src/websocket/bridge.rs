//! Per-connection bridge between one WebSocket client and the serial session.
//!
//! Inbound text is parsed as a command and dispatched to the session; every
//! command gets exactly one `result` envelope back. Malformed JSON gets an
//! `error` envelope instead and is never dispatched.

use std::sync::{Arc, Weak};

use serde_json::Value;
use serialws_core::{Command, CommandError, CommandResult, ErrorEnvelope, ResultEnvelope, SerialEvent};
use serialws_serial::SerialSession;
use serialws_settings::{DisconnectPolicy, EventDelivery};
use tracing::{debug, info, warn};

use super::connection::ClientConnection;
use super::registry::ConnectionRegistry;

/// Fixed receipt for `ports`; the list itself arrives as a `ports` event.
const PORTS_ACCEPTED: &str = "request accepted";

/// Reply to one inbound message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Reply {
    /// The message was a command.
    Result(ResultEnvelope),
    /// The message was not valid JSON.
    Error(ErrorEnvelope),
}

impl Reply {
    /// Serialize to the outbound JSON text.
    pub fn to_json(&self) -> serde_json::Result<String> {
        match self {
            Self::Result(env) => env.to_json(),
            Self::Error(env) => env.to_json(),
        }
    }
}

/// Serialize an event and queue it on `connection`.
fn forward_event(connection: &ClientConnection, event: &SerialEvent) {
    match event.to_json() {
        Ok(json) => {
            if !connection.send_text(json) {
                debug!(client_id = %connection.id, event_type = event.event_type(), "event not queued");
            }
        }
        Err(e) => warn!(event_type = event.event_type(), error = %e, "failed to serialize event"),
    }
}

/// Route every session event to all registered connections.
///
/// Installed once at server start under [`EventDelivery::Broadcast`].
pub fn install_broadcast_sink(session: &SerialSession, registry: &Arc<ConnectionRegistry>) {
    let registry = Arc::downgrade(registry);
    session.on_event(move |event| {
        let Some(registry) = registry.upgrade() else {
            return;
        };
        match event.to_json() {
            Ok(json) => {
                let _ = registry.broadcast(&Arc::new(json));
            }
            Err(e) => warn!(event_type = event.event_type(), error = %e, "failed to serialize event"),
        }
    });
}

/// Bridge for one accepted connection.
#[derive(Debug)]
pub struct Bridge {
    connection: Arc<ClientConnection>,
    session: SerialSession,
    registry: Arc<ConnectionRegistry>,
    disconnect: DisconnectPolicy,
}

impl Bridge {
    /// Register `connection` and, under [`EventDelivery::Latest`], make it
    /// the session's event sink, displacing any previous client.
    pub fn attach(
        connection: Arc<ClientConnection>,
        session: SerialSession,
        registry: Arc<ConnectionRegistry>,
        delivery: EventDelivery,
        disconnect: DisconnectPolicy,
    ) -> Self {
        registry.add(Arc::clone(&connection));

        if delivery == EventDelivery::Latest {
            let target: Weak<ClientConnection> = Arc::downgrade(&connection);
            session.on_event(move |event| {
                if let Some(connection) = target.upgrade() {
                    forward_event(&connection, &event);
                }
            });
        }

        info!(client_id = %connection.id, ?delivery, "client attached");
        Self {
            connection,
            session,
            registry,
            disconnect,
        }
    }

    /// The connection this bridge serves.
    pub fn connection(&self) -> &Arc<ClientConnection> {
        &self.connection
    }

    /// Handle one inbound text message.
    pub fn handle_text(&self, text: &str) -> Reply {
        match serde_json::from_str::<Value>(text) {
            Ok(value) => Reply::Result(self.dispatch(value)),
            Err(e) => {
                warn!(client_id = %self.connection.id, error = %e, "invalid JSON received");
                Reply::Error(ErrorEnvelope::new(e.to_string()))
            }
        }
    }

    /// Handle one inbound text message and queue the reply.
    pub fn handle_and_reply(&self, text: &str) {
        self.queue(&self.handle_text(text));
    }

    /// Handle one inbound binary frame. A UTF-8 payload is handled as text;
    /// anything else gets an `error` envelope.
    pub fn handle_binary(&self, data: &[u8]) {
        match std::str::from_utf8(data) {
            Ok(text) => self.handle_and_reply(text),
            Err(e) => {
                warn!(client_id = %self.connection.id, len = data.len(), error = %e, "non-UTF-8 binary frame");
                self.queue(&Reply::Error(ErrorEnvelope::new(e.to_string())));
            }
        }
    }

    fn queue(&self, reply: &Reply) {
        match reply.to_json() {
            Ok(json) => {
                if !self.connection.send_text(json) {
                    debug!(client_id = %self.connection.id, "reply not queued");
                }
            }
            Err(e) => warn!(error = %e, "failed to serialize reply"),
        }
    }

    /// Dispatch a decoded message to the session.
    pub fn dispatch(&self, value: Value) -> ResultEnvelope {
        let action = Command::action_of(&value).map(str::to_owned);

        let result = match Command::from_value(value) {
            Ok(command) => {
                debug!(client_id = %self.connection.id, action = command.action(), "dispatching command");
                self.execute(command)
            }
            Err(err) => {
                match &err {
                    CommandError::MissingAction | CommandError::UnknownAction(_) => {
                        warn!(client_id = %self.connection.id, action = ?action, "unknown action");
                    }
                    CommandError::InvalidParams { .. } => {
                        warn!(client_id = %self.connection.id, error = %err, "invalid command parameters");
                    }
                }
                CommandResult::rejected(err.to_string())
            }
        };

        ResultEnvelope::new(action, result)
    }

    fn execute(&self, command: Command) -> CommandResult {
        match command {
            Command::Open { path, baud_rate } => self.session.open(path, baud_rate).result,
            Command::Send { data } => self.session.send(&data).result,
            Command::Close => self.session.close().result,
            Command::Ports => {
                drop(self.session.list_ports());
                CommandResult::rejected(PORTS_ACCEPTED)
            }
        }
    }

    /// Report a connection-level failure to the client.
    pub fn on_transport_error(&self, error: &str) {
        warn!(client_id = %self.connection.id, error, "connection error");
        self.queue(&Reply::Error(ErrorEnvelope::new(error)));
    }

    /// Deregister the connection and apply the disconnect policy.
    pub fn on_disconnect(self) {
        let remaining = self.registry.remove(&self.connection.id);
        let close = match self.disconnect {
            DisconnectPolicy::Always => true,
            DisconnectPolicy::LastClient => remaining == 0,
        };

        info!(
            client_id = %self.connection.id,
            remaining,
            close_serial = close,
            "client disconnected"
        );

        if close {
            let receipt = self.session.close().result;
            debug!(success = receipt.success, msg = %receipt.msg, "serial close on disconnect");
        }
    }
}
