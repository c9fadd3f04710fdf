//! One task per client connection.
//!
//! The task verifies the session token, registers the connection with the
//! shared managers, runs the event loop until either side closes, and then
//! tears everything down. Teardown always runs, whatever caused the exit.

mod event_loop;
pub mod lifecycle;

pub use lifecycle::teardown;

use crate::state::{ConnId, Relay, Session};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, info};

pub struct Connection {
    conn_id: ConnId,
    addr: SocketAddr,
    relay: Arc<Relay>,
}

impl Connection {
    pub fn new(conn_id: ConnId, addr: SocketAddr, relay: Arc<Relay>) -> Self {
        Self {
            conn_id,
            addr,
            relay,
        }
    }

    /// Drive the connection to completion. A missing or invalid token closes
    /// the socket without any protocol output.
    pub async fn run(
        self,
        mut ws: WebSocketStream<TcpStream>,
        token: Option<String>,
    ) -> anyhow::Result<()> {
        let Some(token) = token else {
            debug!(addr = %self.addr, "connection without session token, closing");
            let _ = ws.close(None).await;
            return Ok(());
        };

        let identity = match self.relay.verifier.verify(&token).await {
            Ok(identity) => identity,
            Err(e) => {
                info!(conn_id = %self.conn_id, addr = %self.addr, error = %e,
                      "session verification failed, closing");
                let _ = ws.close(None).await;
                return Ok(());
            }
        };
        info!(conn_id = %self.conn_id, user_id = %identity.id, addr = %self.addr,
              "session established");

        let (tx, mut outgoing_rx) = mpsc::channel(self.relay.limits.outbound_queue);
        let transition = self
            .relay
            .connections
            .register(&identity.id, &self.conn_id, tx);
        self.relay
            .presence
            .connected(&self.relay.connections, &identity, transition)
            .await;

        let mut session = Session::new(self.conn_id.clone(), identity);
        event_loop::run(&self.relay, &mut session, &mut ws, &mut outgoing_rx).await;
        let _ = ws.close(None).await;

        lifecycle::teardown(&self.relay, &mut session).await;
        info!(conn_id = %session.conn_id, user_id = %session.identity.id, "connection closed");
        Ok(())
    }
}
