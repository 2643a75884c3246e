//! Axum HTTP + WebSocket listener.
//!
//! `GET /health` reports liveness. Every other path accepts a WebSocket
//! upgrade; a plain HTTP request there gets the readiness text.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::{WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use axum::Router;
use serialws_core::ConnectionId;
use serialws_serial::SerialSession;
use serialws_settings::EventDelivery;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

use crate::config::ServerConfig;
use crate::health::{self, HealthResponse};
use crate::shutdown::ShutdownCoordinator;
use crate::websocket::bridge::{install_broadcast_sink, Bridge};
use crate::websocket::connection::ClientConnection;
use crate::websocket::registry::ConnectionRegistry;
use crate::websocket::session::{run_ws_session, HeartbeatConfig};

/// Body of the plain-HTTP readiness probe.
pub const READINESS_TEXT: &str = "WS Serial Server Running";

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// The process's serial session.
    pub session: SerialSession,
    /// Connected clients.
    pub registry: Arc<ConnectionRegistry>,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Shutdown coordinator.
    pub shutdown: Arc<ShutdownCoordinator>,
    /// When the server started.
    pub start_time: Instant,
}

impl AppState {
    /// Fresh state around `session`.
    ///
    /// Under [`EventDelivery::Broadcast`] this installs the fan-out sink on
    /// the session.
    pub fn new(config: ServerConfig, session: SerialSession) -> Self {
        let registry = Arc::new(ConnectionRegistry::new());
        if config.delivery == EventDelivery::Broadcast {
            install_broadcast_sink(&session, &registry);
        }
        Self {
            session,
            registry,
            config: Arc::new(config),
            shutdown: Arc::new(ShutdownCoordinator::new()),
            start_time: Instant::now(),
        }
    }
}

/// Build the Axum router with all routes.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .fallback(ws_or_readiness)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Bind the listener and serve until shut down.
pub async fn start(
    config: ServerConfig,
    session: SerialSession,
) -> Result<ServerHandle, std::io::Error> {
    let addr = config.bind_address();
    let state = AppState::new(config, session);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let local_addr = listener.local_addr()?;
    info!(
        %local_addr,
        delivery = %state.config.delivery,
        disconnect = %state.config.disconnect,
        "serial websocket server started"
    );

    let shutdown = Arc::clone(&state.shutdown);
    let token = shutdown.token();
    let registry = Arc::clone(&state.registry);
    let router = build_router(state);

    let server = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router)
            .with_graceful_shutdown(token.cancelled_owned())
            .await
        {
            tracing::error!(error = %e, "server error");
        }
    });

    Ok(ServerHandle {
        local_addr,
        registry,
        shutdown,
        server,
    })
}

/// Handle returned by [`start`]; keeps the listener task alive.
pub struct ServerHandle {
    local_addr: SocketAddr,
    registry: Arc<ConnectionRegistry>,
    shutdown: Arc<ShutdownCoordinator>,
    server: JoinHandle<()>,
}

impl ServerHandle {
    /// Bound address.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Bound port.
    pub fn port(&self) -> u16 {
        self.local_addr.port()
    }

    /// Number of connected clients.
    pub fn connection_count(&self) -> usize {
        self.registry.connection_count()
    }

    /// Stop accepting, close every client and wait for the listener to finish.
    pub async fn shutdown(self, timeout: Option<Duration>) {
        let drained = self.shutdown.stop(self.server, timeout).await;
        info!(drained, "server stopped");
    }
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(health::health_check(
        state.start_time,
        state.registry.connection_count(),
        state.session.phase(),
    ))
}

/// Any other path: WebSocket upgrade, or readiness text for plain HTTP.
async fn ws_or_readiness(
    State(state): State<AppState>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    match ws {
        Ok(ws) => {
            let max = state.config.max_message_size;
            ws.max_message_size(max)
                .max_frame_size(max)
                .on_upgrade(move |socket| handle_socket(socket, state))
        }
        Err(rejection) => {
            debug!(%rejection, "plain HTTP request");
            READINESS_TEXT.into_response()
        }
    }
}

/// Attach a bridge to a freshly upgraded socket and run it to completion.
async fn handle_socket(socket: WebSocket, state: AppState) {
    let id = ConnectionId::new();
    let (tx, rx) = mpsc::channel(state.config.send_queue_capacity.max(1));
    let connection = Arc::new(ClientConnection::new(id, tx));

    let bridge = Bridge::attach(
        connection,
        state.session.clone(),
        Arc::clone(&state.registry),
        state.config.delivery,
        state.config.disconnect,
    );

    let heartbeat = HeartbeatConfig {
        interval: state.config.heartbeat_interval(),
        timeout: state.config.heartbeat_timeout(),
    };
    run_ws_session(socket, bridge, rx, heartbeat, state.shutdown.token()).await;
}
