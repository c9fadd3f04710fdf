//! Integration test common infrastructure.
//!
//! Drives the relay in-process: a `TestConn` performs the same registration,
//! dispatch, and teardown steps as a real connection task, with the outbound
//! queue inspected directly instead of a WebSocket.

use async_trait::async_trait;
use roomcast::auth::{AuthError, SessionVerifier, UserIdentity};
use roomcast::config::LimitsConfig;
use roomcast::db::Database;
use roomcast::error::HandlerResult;
use roomcast::handlers;
use roomcast::network::connection::teardown;
use roomcast::proto::Frame;
use roomcast::state::{Relay, Session};
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Verifier that accepts tokens of the form `user-id` and derives an email
/// from them; the literal token `invalid` is rejected. Keeps tests
/// independent of the auth provider.
pub struct StaticVerifier;

#[async_trait]
impl SessionVerifier for StaticVerifier {
    async fn verify(&self, token: &str) -> Result<UserIdentity, AuthError> {
        if token.is_empty() || token == "invalid" {
            return Err(AuthError::InvalidToken);
        }
        Ok(UserIdentity {
            id: token.to_string(),
            email: format!("{token}@test.example"),
            name: None,
        })
    }
}

/// Fresh relay backed by a private in-memory database.
pub async fn test_relay() -> Arc<Relay> {
    let db = Database::new(":memory:").await.expect("in-memory database");
    Arc::new(Relay::new(db, Arc::new(StaticVerifier), LimitsConfig::default()))
}

/// One simulated client connection.
pub struct TestConn {
    relay: Arc<Relay>,
    pub session: Session,
    rx: mpsc::Receiver<Frame>,
}

#[allow(dead_code)]
impl TestConn {
    /// Register a connection for `user_id`, mirroring the connection task:
    /// verify, register, apply the presence transition.
    pub async fn connect(relay: &Arc<Relay>, user_id: &str) -> Self {
        let identity = relay.verifier.verify(user_id).await.expect("verify token");
        let conn_id = relay.next_conn_id();
        let (tx, rx) = mpsc::channel(relay.limits.outbound_queue);
        let transition = relay.connections.register(&identity.id, &conn_id, tx);
        relay
            .presence
            .connected(&relay.connections, &identity, transition)
            .await;
        Self {
            relay: Arc::clone(relay),
            session: Session::new(conn_id, identity),
            rx,
        }
    }

    /// Dispatch one raw inbound frame as this connection.
    pub async fn send_raw(&mut self, raw: &str) -> HandlerResult {
        handlers::dispatch(&self.relay, &mut self.session, raw).await
    }

    /// Dispatch a well-formed event frame.
    pub async fn send(&mut self, kind: &str, payload: Value) -> HandlerResult {
        let raw = json!({ "type": kind, "payload": payload }).to_string();
        self.send_raw(&raw).await
    }

    /// Next queued outbound event, parsed. Panics when the queue is empty.
    pub fn recv(&mut self) -> Value {
        let frame = self.rx.try_recv().expect("expected a queued event");
        serde_json::from_str(&frame).expect("outbound frame is JSON")
    }

    /// Next queued outbound event, if any.
    pub fn try_recv(&mut self) -> Option<Value> {
        self.rx
            .try_recv()
            .ok()
            .map(|frame| serde_json::from_str(&frame).expect("outbound frame is JSON"))
    }

    /// Discard everything queued so far.
    pub fn drain(&mut self) {
        while self.rx.try_recv().is_ok() {}
    }

    /// Tear the connection down the way the connection task does on exit.
    pub async fn disconnect(mut self) {
        teardown(&self.relay, &mut self.session).await;
    }
}

/// Event type of an outbound frame.
#[allow(dead_code)]
pub fn kind(event: &Value) -> &str {
    event["type"].as_str().expect("event has a type")
}
