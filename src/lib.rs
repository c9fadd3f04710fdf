//! roomcast - room-based real-time messaging relay.
//!
//! Clients connect over WebSocket with a bearer token, join rooms, exchange
//! text messages and typing/presence signals. Message history is persisted to
//! SQLite and re-served over a small HTTP API.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod http;
pub mod network;
pub mod proto;
pub mod state;
