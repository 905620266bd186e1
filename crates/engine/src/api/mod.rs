//! Transport layer: connection registry, HTTP routes, WebSocket handling

pub mod connections;
pub mod handlers;
pub mod http;
pub mod websocket;

pub use connections::{ConnectionInfo, ConnectionManager};
