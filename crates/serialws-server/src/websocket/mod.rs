//! WebSocket connection management, heartbeat, command dispatch and event fan-out.

pub mod bridge;
pub mod connection;
pub mod heartbeat;
pub mod registry;
pub mod session;
