//! Connection event loop: pumps outbound frames and inbound client events.

use crate::handlers;
use crate::proto::Frame;
use crate::state::{Relay, Session};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};

/// Run until the client disconnects, the transport fails, or the registry
/// drops this connection's sender (a scheduled close).
pub(super) async fn run(
    relay: &Arc<Relay>,
    session: &mut Session,
    ws: &mut WebSocketStream<TcpStream>,
    outgoing_rx: &mut mpsc::Receiver<Frame>,
) {
    loop {
        tokio::select! {
            outgoing = outgoing_rx.recv() => match outgoing {
                Some(frame) => {
                    if let Err(e) = ws.send(Message::Text(frame.to_string())).await {
                        debug!(conn_id = %session.conn_id, error = %e, "websocket send failed");
                        break;
                    }
                }
                // All senders gone: the registry scheduled this close.
                None => break,
            },
            incoming = ws.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    if let Err(e) = handlers::dispatch(relay, session, &text).await {
                        warn!(conn_id = %session.conn_id, code = e.error_code(), "event rejected");
                        if let Some(reply) = e.to_client_reply() {
                            relay.connections.try_send(&session.conn_id, &reply.encode());
                        }
                    }
                }
                Some(Ok(Message::Ping(data))) => {
                    let _ = ws.send(Message::Pong(data)).await;
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!(conn_id = %session.conn_id, error = %e, "websocket read error");
                    break;
                }
            },
        }
    }
}
