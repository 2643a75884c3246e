//! # serialws-server
//!
//! Axum HTTP + `WebSocket` listener for the serial bridge.
//!
//! - `GET /health`: liveness, connection count and serial phase
//! - Any other path: `WebSocket` upgrade, or readiness text for plain HTTP
//! - One [`Bridge`] per connection: JSON command dispatch and result envelopes
//! - Serial events routed to the newest client or broadcast to all
//! - Heartbeat pings and graceful shutdown via `CancellationToken`

#![deny(unsafe_code)]

pub mod config;
pub mod health;
pub mod server;
pub mod shutdown;
pub mod websocket;

pub use config::ServerConfig;
pub use server::{build_router, start, AppState, ServerHandle, READINESS_TEXT};
pub use shutdown::ShutdownCoordinator;
pub use websocket::bridge::{Bridge, Reply};
