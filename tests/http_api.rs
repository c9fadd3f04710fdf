//! Integration tests for the HTTP API.
//!
//! Each test spawns the API server on its own fixed port against a fresh
//! in-memory relay and drives it with a real HTTP client.

mod common;

use common::{TestConn, test_relay};
use roomcast::db::NewMessage;
use roomcast::state::Relay;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

async fn spawn_api(port: u16, relay: Arc<Relay>) -> String {
    let addr: SocketAddr = ([127, 0, 0, 1], port).into();
    tokio::spawn(async move {
        roomcast::http::run(addr, relay).await;
    });
    // Wait for the listener to come up.
    for _ in 0..50 {
        if tokio::net::TcpStream::connect(addr).await.is_ok() {
            return format!("http://{addr}");
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("API server did not start on {addr}");
}

#[tokio::test]
async fn test_health_reports_live_state() {
    let relay = test_relay().await;
    let base = spawn_api(18080, Arc::clone(&relay)).await;

    let mut alice = TestConn::connect(&relay, "alice").await;
    alice
        .send("JOIN_ROOM", serde_json::json!({ "roomId": "r1" }))
        .await
        .expect("join");

    let body: serde_json::Value = reqwest::get(format!("{base}/health"))
        .await
        .expect("health request")
        .json()
        .await
        .expect("health body");
    assert_eq!(body["status"], "ok");
    assert_eq!(body["onlineUsers"], 1);
    assert_eq!(body["activeRooms"], 1);
    assert!(body["uptime"].is_u64());
    // Epoch milliseconds, same clock shape as frame metadata.
    assert!(body["timestamp"].is_i64());
}

#[tokio::test]
async fn test_room_management_and_listing() {
    let relay = test_relay().await;
    let base = spawn_api(18081, Arc::clone(&relay)).await;
    let client = reqwest::Client::new();

    // Users exist once they have connected.
    let alice = TestConn::connect(&relay, "alice").await;
    let bob = TestConn::connect(&relay, "bob").await;

    let created: serde_json::Value = client
        .post(format!("{base}/api/rooms/create"))
        .json(&serde_json::json!({ "name": "general", "userId": "alice" }))
        .send()
        .await
        .expect("create")
        .json()
        .await
        .expect("create body");
    let room_id = created["roomId"].as_str().expect("room id").to_string();

    // Invite bob; inviting twice conflicts.
    let resp = client
        .post(format!("{base}/api/rooms/invite"))
        .json(&serde_json::json!({ "roomId": room_id, "userId": "bob" }))
        .send()
        .await
        .expect("invite");
    assert!(resp.status().is_success());
    let resp = client
        .post(format!("{base}/api/rooms/invite"))
        .json(&serde_json::json!({ "roomId": room_id, "userId": "bob" }))
        .send()
        .await
        .expect("invite again");
    assert_eq!(resp.status(), reqwest::StatusCode::CONFLICT);

    // Joining a missing room is a 404.
    let resp = client
        .post(format!("{base}/api/rooms/join"))
        .json(&serde_json::json!({ "roomId": "nope", "userId": "bob" }))
        .send()
        .await
        .expect("join missing");
    assert_eq!(resp.status(), reqwest::StatusCode::NOT_FOUND);

    let rooms: serde_json::Value = client
        .get(format!("{base}/api/rooms"))
        .query(&[("userId", "bob")])
        .send()
        .await
        .expect("list")
        .json()
        .await
        .expect("list body");
    assert_eq!(rooms.as_array().expect("array").len(), 1);
    assert_eq!(rooms[0]["id"], room_id);
    assert_eq!(rooms[0]["type"], "group");

    alice.disconnect().await;
    bob.disconnect().await;
}

#[tokio::test]
async fn test_history_endpoint_clamps_and_paginates() {
    let relay = test_relay().await;
    let base = spawn_api(18082, Arc::clone(&relay)).await;
    let room_id = relay
        .db
        .rooms()
        .create_group("archive", "alice")
        .await
        .expect("create room");

    let start = chrono::Utc::now() - chrono::Duration::minutes(5);
    for i in 0..60 {
        relay
            .db
            .messages()
            .insert(&NewMessage {
                id: format!("m{i:02}"),
                room_id: room_id.clone(),
                sender_id: "alice".to_string(),
                content: format!("message {i}"),
                created_at: start + chrono::Duration::seconds(i),
            })
            .await
            .expect("insert");
    }

    // Default page size.
    let page: serde_json::Value = reqwest::get(format!("{base}/api/messages/{room_id}"))
        .await
        .expect("history")
        .json()
        .await
        .expect("history body");
    let page = page.as_array().expect("array");
    assert_eq!(page.len(), 50);
    assert_eq!(page[0]["id"], "m10");
    assert_eq!(page[49]["id"], "m59");

    // An oversized limit is clamped to the configured maximum, which still
    // covers all 60 messages here.
    let all: serde_json::Value =
        reqwest::get(format!("{base}/api/messages/{room_id}?limit=100000"))
            .await
            .expect("history")
            .json()
            .await
            .expect("history body");
    assert_eq!(all.as_array().expect("array").len(), 60);

    // Cursor pagination. The client must encode the cursor (RFC 3339 carries
    // a `+` that would otherwise decode as a space).
    let before = page[0]["created_at"].as_str().expect("cursor");
    let rest: serde_json::Value = reqwest::Client::new()
        .get(format!("{base}/api/messages/{room_id}"))
        .query(&[("before", before)])
        .send()
        .await
        .expect("history")
        .json()
        .await
        .expect("history body");
    let rest = rest.as_array().expect("array");
    assert_eq!(rest.len(), 10);
    assert_eq!(rest[0]["id"], "m00");

    // A malformed cursor is rejected.
    let resp = reqwest::get(format!("{base}/api/messages/{room_id}?before=yesterday"))
        .await
        .expect("history");
    assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_user_search_and_contacts_flow() {
    let relay = test_relay().await;
    let base = spawn_api(18083, Arc::clone(&relay)).await;
    let client = reqwest::Client::new();

    let alice = TestConn::connect(&relay, "alice").await;
    let bob = TestConn::connect(&relay, "bob").await;

    let found: serde_json::Value = client
        .get(format!("{base}/api/users/search"))
        .query(&[("email", "ali")])
        .send()
        .await
        .expect("search")
        .json()
        .await
        .expect("search body");
    assert_eq!(found.as_array().expect("array").len(), 1);
    assert_eq!(found[0]["id"], "alice");

    // alice requests bob by email, bob sees it pending and accepts.
    let resp = client
        .post(format!("{base}/api/contacts/request"))
        .json(&serde_json::json!({ "userId": "alice", "contactEmail": "bob@test.example" }))
        .send()
        .await
        .expect("request");
    assert!(resp.status().is_success());

    let pending: serde_json::Value = client
        .get(format!("{base}/api/contacts/requests"))
        .query(&[("userId", "bob")])
        .send()
        .await
        .expect("pending")
        .json()
        .await
        .expect("pending body");
    assert_eq!(pending.as_array().expect("array").len(), 1);
    let request_id = pending[0]["requestId"].as_i64().expect("request id");

    let resp = client
        .post(format!("{base}/api/contacts/accept"))
        .json(&serde_json::json!({ "requestId": request_id, "userId": "bob" }))
        .send()
        .await
        .expect("accept");
    assert!(resp.status().is_success());

    // Both sides now list each other.
    for (user, other) in [("alice", "bob"), ("bob", "alice")] {
        let contacts: serde_json::Value = client
            .get(format!("{base}/api/contacts"))
            .query(&[("userId", user)])
            .send()
            .await
            .expect("contacts")
            .json()
            .await
            .expect("contacts body");
        assert_eq!(contacts.as_array().expect("array").len(), 1);
        assert_eq!(contacts[0]["id"], other);
    }

    // A duplicate request in either direction conflicts.
    let resp = client
        .post(format!("{base}/api/contacts/request"))
        .json(&serde_json::json!({ "userId": "bob", "contactEmail": "alice@test.example" }))
        .send()
        .await
        .expect("duplicate request");
    assert_eq!(resp.status(), reqwest::StatusCode::CONFLICT);

    alice.disconnect().await;
    bob.disconnect().await;
}
