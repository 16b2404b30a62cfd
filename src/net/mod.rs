//! Network transport
//!
//! - `channel`: non-blocking outbound path used by the capture callback
//! - `connection`: per-socket control and frame routing
//! - `server`/`handlers`: axum WebSocket endpoint and HTTP API
//! - `client`: tungstenite client for dialing a server

pub mod channel;
#[cfg(feature = "client")]
pub mod client;
pub mod connection;
#[cfg(feature = "server")]
pub mod handlers;
#[cfg(feature = "server")]
pub mod server;

pub use channel::{DuplexChannel, Outbound, WsChannel};
pub use connection::{ConnectionHandler, DeviceSelection, Inbound};
