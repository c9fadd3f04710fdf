//! End-to-end tests over a real WebSocket gateway: handshake auth, the
//! origin allow-list, and client-visible ERROR frames.
//!
//! Each test binds the gateway on its own fixed port against a fresh
//! in-memory relay and drives it with a tokio-tungstenite client.

mod common;

use common::test_relay;
use futures_util::{SinkExt, StreamExt};
use roomcast::network::Gateway;
use roomcast::state::Relay;
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

type ClientWs = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn spawn_gateway(port: u16, allow_origins: Vec<String>, relay: Arc<Relay>) -> String {
    let addr: SocketAddr = ([127, 0, 0, 1], port).into();
    let gateway = Gateway::bind(addr, allow_origins, relay)
        .await
        .expect("bind gateway");
    tokio::spawn(async move {
        let _ = gateway.run().await;
    });
    format!("ws://{addr}")
}

/// Next text frame from the server, parsed.
async fn recv_json(ws: &mut ClientWs) -> Value {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("stream ended")
            .expect("websocket error");
        match msg {
            Message::Text(text) => return serde_json::from_str(&text).expect("frame is JSON"),
            Message::Ping(_) | Message::Pong(_) => continue,
            other => panic!("unexpected frame: {other:?}"),
        }
    }
}

/// Assert the server closes the connection without sending any event first.
async fn assert_closed_silently(mut ws: ClientWs) {
    loop {
        match tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for close")
        {
            Some(Ok(Message::Close(_))) | None => break,
            Some(Ok(Message::Text(text))) => panic!("unexpected frame before close: {text}"),
            Some(Ok(_)) => continue,
            Some(Err(_)) => break,
        }
    }
}

#[tokio::test]
async fn test_missing_token_closes_without_output() {
    let relay = test_relay().await;
    let base = spawn_gateway(18090, Vec::new(), relay).await;

    let (ws, _) = connect_async(base.as_str()).await.expect("handshake");
    assert_closed_silently(ws).await;
}

#[tokio::test]
async fn test_invalid_token_closes_without_output() {
    let relay = test_relay().await;
    let base = spawn_gateway(18091, Vec::new(), Arc::clone(&relay)).await;

    let (ws, _) = connect_async(format!("{base}/?token=invalid"))
        .await
        .expect("handshake");
    assert_closed_silently(ws).await;
    assert_eq!(relay.connections.online_users(), 0);
}

#[tokio::test]
async fn test_valid_token_establishes_session() {
    let relay = test_relay().await;
    let base = spawn_gateway(18092, Vec::new(), Arc::clone(&relay)).await;

    let (mut ws, _) = connect_async(format!("{base}/?token=alice"))
        .await
        .expect("handshake");

    // Registration broadcasts the user's own online transition first.
    let status = recv_json(&mut ws).await;
    assert_eq!(status["type"], "USER_STATUS");
    assert_eq!(status["payload"]["userId"], "alice");
    assert_eq!(status["payload"]["status"], "online");
    assert!(relay.connections.is_online("alice"));

    ws.send(Message::Text(
        json!({ "type": "PING", "payload": {} }).to_string(),
    ))
    .await
    .expect("send ping");
    let pong = recv_json(&mut ws).await;
    assert_eq!(pong["type"], "PONG");
    assert!(pong["meta"]["timestamp"].is_i64());
}

#[tokio::test]
async fn test_error_frames_over_the_wire() {
    let relay = test_relay().await;
    let base = spawn_gateway(18093, Vec::new(), relay).await;

    let (mut ws, _) = connect_async(format!("{base}/?token=alice"))
        .await
        .expect("handshake");
    // Skip the user's own online broadcast.
    let _ = recv_json(&mut ws).await;

    ws.send(Message::Text("{not json".to_string()))
        .await
        .expect("send garbage");
    let err = recv_json(&mut ws).await;
    assert_eq!(err["type"], "ERROR");
    assert_eq!(err["payload"]["message"], "Invalid JSON message");

    ws.send(Message::Text(
        json!({ "type": "TELEPORT", "payload": {} }).to_string(),
    ))
    .await
    .expect("send unknown type");
    let err = recv_json(&mut ws).await;
    assert_eq!(err["type"], "ERROR");
    assert_eq!(err["payload"]["message"], "Unknown event type");

    // Neither error closed the connection.
    ws.send(Message::Text(
        json!({ "type": "PING", "payload": {} }).to_string(),
    ))
    .await
    .expect("send ping");
    assert_eq!(recv_json(&mut ws).await["type"], "PONG");
}

#[tokio::test]
async fn test_origin_allow_list() {
    let relay = test_relay().await;
    let base = spawn_gateway(
        18094,
        vec!["https://app.example.net".to_string()],
        relay,
    )
    .await;

    // A disallowed origin is rejected during the handshake.
    let mut req = format!("{base}/?token=alice")
        .into_client_request()
        .expect("request");
    req.headers_mut().insert(
        "Origin",
        "https://evil.example.net".parse().expect("header value"),
    );
    let err = connect_async(req).await.expect_err("handshake must fail");
    match err {
        tokio_tungstenite::tungstenite::Error::Http(response) => {
            assert_eq!(response.status(), 403);
        }
        other => panic!("unexpected handshake error: {other}"),
    }

    // The listed origin connects and gets a working session.
    let mut req = format!("{base}/?token=alice")
        .into_client_request()
        .expect("request");
    req.headers_mut().insert(
        "Origin",
        "https://app.example.net".parse().expect("header value"),
    );
    let (mut ws, _) = connect_async(req).await.expect("allowed handshake");
    let status = recv_json(&mut ws).await;
    assert_eq!(status["type"], "USER_STATUS");
    assert_eq!(status["payload"]["status"], "online");
}
