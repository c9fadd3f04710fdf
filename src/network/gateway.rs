//! Gateway - WebSocket listener that accepts incoming connections.
//!
//! The Gateway binds the listener socket and spawns one Connection task per
//! incoming client. Origin checks and session-token extraction happen in the
//! handshake callback, before the connection task starts.

use crate::network::Connection;
use crate::state::Relay;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_tungstenite::accept_hdr_async;
use tracing::{error, info, instrument, warn};

/// Accepts incoming WebSocket connections and spawns handlers.
pub struct Gateway {
    listener: TcpListener,
    allow_origins: Vec<String>,
    relay: Arc<Relay>,
}

impl Gateway {
    /// Bind the gateway to the specified address.
    pub async fn bind(
        addr: SocketAddr,
        allow_origins: Vec<String>,
        relay: Arc<Relay>,
    ) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        info!(%addr, "WebSocket listener bound");
        Ok(Self {
            listener,
            allow_origins,
            relay,
        })
    }

    /// Run the gateway, accepting connections forever.
    #[instrument(skip(self), name = "gateway")]
    pub async fn run(self) -> anyhow::Result<()> {
        loop {
            match self.listener.accept().await {
                Ok((stream, addr)) => {
                    let relay = Arc::clone(&self.relay);
                    let allowed = self.allow_origins.clone();
                    let conn_id = relay.next_conn_id();

                    tokio::spawn(async move {
                        let mut token: Option<String> = None;
                        let callback =
                            |req: &http::Request<()>, response: http::Response<()>| {
                                token = req.uri().query().and_then(token_from_query);

                                // Empty allow list means all origins are accepted.
                                if allowed.is_empty() {
                                    return Ok(response);
                                }
                                if let Some(origin) = req
                                    .headers()
                                    .get("Origin")
                                    .and_then(|o| o.to_str().ok())
                                {
                                    if allowed.iter().any(|a| a == origin || a == "*") {
                                        return Ok(response);
                                    }
                                    warn!(%addr, %origin, "WebSocket origin rejected");
                                }
                                Err(http::Response::builder()
                                    .status(http::StatusCode::FORBIDDEN)
                                    .body(Some("origin not allowed".to_string()))
                                    .unwrap())
                            };

                        match accept_hdr_async(stream, callback).await {
                            Ok(ws_stream) => {
                                let connection = Connection::new(conn_id.clone(), addr, relay);
                                if let Err(e) = connection.run(ws_stream, token).await {
                                    error!(%conn_id, %addr, error = %e, "connection error");
                                }
                            }
                            Err(e) => {
                                warn!(%addr, error = %e, "WebSocket handshake failed");
                            }
                        }
                    });
                }
                Err(e) => {
                    error!(error = %e, "failed to accept connection");
                }
            }
        }
    }
}

/// Pull the `token` parameter out of the handshake query string.
fn token_from_query(query: &str) -> Option<String> {
    query.split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        (key == "token" && !value.is_empty()).then(|| value.to_string())
    })
}
