//! Browser WebSocket transport for the stream client.

pub mod browser_transport;

pub use browser_transport::*;
