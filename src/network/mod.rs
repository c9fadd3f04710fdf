//! Network layer: WebSocket gateway and per-connection tasks.

pub mod connection;
pub mod gateway;

pub use connection::Connection;
pub use gateway::Gateway;
