//! HTTP API server.
//!
//! Runs on a separate tokio task beside the WebSocket gateway and serves the
//! read/manage surface: health, user search, room listing and management,
//! message history, and contacts. All state comes from the shared [`Relay`].

use crate::db::DbError;
use crate::proto::MessageEvent;
use crate::state::Relay;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::warn;

/// API error: status code plus a client-visible message.
struct ApiError(StatusCode, String);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.0, Json(json!({ "error": self.1 }))).into_response()
    }
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::RoomNotFound(_) | DbError::UserNotFound(_) | DbError::RequestNotFound => {
                ApiError(StatusCode::NOT_FOUND, err.to_string())
            }
            DbError::AlreadyMember | DbError::ContactExists => {
                ApiError(StatusCode::CONFLICT, err.to_string())
            }
            DbError::NotAMember => ApiError(StatusCode::FORBIDDEN, err.to_string()),
            other => {
                warn!(error = %other, "HTTP handler database error");
                ApiError(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal error".to_string(),
                )
            }
        }
    }
}

fn bad_request(message: &str) -> ApiError {
    ApiError(StatusCode::BAD_REQUEST, message.to_string())
}

#[derive(Serialize)]
struct UserJson {
    id: String,
    email: String,
    name: Option<String>,
    status: String,
}

#[derive(Serialize)]
struct RoomJson {
    id: String,
    name: Option<String>,
    #[serde(rename = "type")]
    kind: String,
    #[serde(rename = "updatedAt")]
    updated_at: String,
    #[serde(rename = "unreadCount")]
    unread_count: i64,
    #[serde(rename = "lastMessageAt")]
    last_message_at: Option<String>,
    #[serde(rename = "dmUserId")]
    dm_user_id: Option<String>,
    #[serde(rename = "dmEmail")]
    dm_email: Option<String>,
    #[serde(rename = "dmName")]
    dm_name: Option<String>,
}

/// Build the API router.
pub fn router(relay: Arc<Relay>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/users/search", get(search_users))
        .route("/api/rooms", get(list_rooms))
        .route("/api/rooms/create", post(create_room))
        .route("/api/rooms/dm", post(create_dm))
        .route("/api/rooms/join", post(join_room))
        .route("/api/rooms/invite", post(invite_user))
        .route("/api/rooms/update", post(update_room))
        .route("/api/messages/:room_id", get(history))
        .route("/api/contacts", get(list_contacts))
        .route("/api/contacts/requests", get(pending_contacts))
        .route("/api/contacts/request", post(request_contact))
        .route("/api/contacts/accept", post(accept_contact))
        .route("/api/contacts/reject", post(reject_contact))
        .with_state(relay)
}

/// Run the HTTP API server. Long-running; spawn in the background.
pub async fn run(addr: SocketAddr, relay: Arc<Relay>) {
    let app = router(relay);
    tracing::info!(%addr, "HTTP API listening");

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(%addr, error = %e, "failed to bind HTTP API");
            return;
        }
    };

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!(error = %e, "HTTP API server error");
    }
}

async fn health(State(relay): State<Arc<Relay>>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "timestamp": Utc::now().timestamp_millis(),
        "uptime": relay.uptime_secs(),
        "onlineUsers": relay.connections.online_users(),
        "activeRooms": relay.rooms.active_rooms(),
    }))
}

#[derive(Deserialize)]
struct SearchParams {
    email: String,
}

async fn search_users(
    State(relay): State<Arc<Relay>>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<UserJson>>, ApiError> {
    let fragment = params.email.trim();
    if fragment.is_empty() {
        return Err(bad_request("email is required"));
    }
    let users = relay.db.users().search_by_email(fragment, 10).await?;
    Ok(Json(
        users
            .into_iter()
            .map(|u| UserJson {
                id: u.id,
                email: u.email,
                name: u.name,
                status: u.status,
            })
            .collect(),
    ))
}

#[derive(Deserialize)]
struct UserIdParams {
    #[serde(rename = "userId")]
    user_id: String,
}

async fn list_rooms(
    State(relay): State<Arc<Relay>>,
    Query(params): Query<UserIdParams>,
) -> Result<Json<Vec<RoomJson>>, ApiError> {
    let rooms = relay.db.rooms().rooms_for_user(&params.user_id).await?;
    Ok(Json(
        rooms
            .into_iter()
            .map(|r| RoomJson {
                id: r.id,
                name: r.name,
                kind: r.kind,
                updated_at: r.updated_at.to_rfc3339(),
                unread_count: r.unread_count,
                last_message_at: r.last_message_at.map(|t| t.to_rfc3339()),
                dm_user_id: r.dm_user_id,
                dm_email: r.dm_email,
                dm_name: r.dm_name,
            })
            .collect(),
    ))
}

#[derive(Deserialize)]
struct CreateRoomBody {
    name: String,
    #[serde(rename = "userId")]
    user_id: String,
}

async fn create_room(
    State(relay): State<Arc<Relay>>,
    Json(body): Json<CreateRoomBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let name = body.name.trim();
    if name.is_empty() {
        return Err(bad_request("name is required"));
    }
    let room_id = relay.db.rooms().create_group(name, &body.user_id).await?;
    Ok(Json(json!({ "roomId": room_id })))
}

#[derive(Deserialize)]
struct CreateDmBody {
    #[serde(rename = "userId")]
    user_id: String,
    #[serde(rename = "otherUserId")]
    other_user_id: String,
}

async fn create_dm(
    State(relay): State<Arc<Relay>>,
    Json(body): Json<CreateDmBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if body.user_id == body.other_user_id {
        return Err(bad_request("cannot open a DM with yourself"));
    }
    let (room_id, created) = relay
        .db
        .rooms()
        .find_or_create_dm(&body.user_id, &body.other_user_id)
        .await?;
    Ok(Json(json!({ "roomId": room_id, "created": created })))
}

#[derive(Deserialize)]
struct RoomMemberBody {
    #[serde(rename = "roomId")]
    room_id: String,
    #[serde(rename = "userId")]
    user_id: String,
}

async fn join_room(
    State(relay): State<Arc<Relay>>,
    Json(body): Json<RoomMemberBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    relay.db.rooms().join(&body.room_id, &body.user_id).await?;
    Ok(Json(json!({ "joined": true })))
}

#[derive(Deserialize)]
struct InviteBody {
    #[serde(rename = "roomId")]
    room_id: String,
    #[serde(rename = "userId")]
    user_id: String,
    #[serde(rename = "invitedBy", default)]
    invited_by: Option<String>,
}

async fn invite_user(
    State(relay): State<Arc<Relay>>,
    Json(body): Json<InviteBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    relay
        .db
        .rooms()
        .invite(&body.room_id, &body.user_id)
        .await?;
    tracing::debug!(
        room = %body.room_id,
        user_id = %body.user_id,
        invited_by = body.invited_by.as_deref().unwrap_or("unknown"),
        "user invited to room"
    );
    Ok(Json(json!({ "invited": true })))
}

#[derive(Deserialize)]
struct UpdateRoomBody {
    #[serde(rename = "roomId")]
    room_id: String,
    name: String,
    #[serde(rename = "userId")]
    user_id: String,
}

async fn update_room(
    State(relay): State<Arc<Relay>>,
    Json(body): Json<UpdateRoomBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let name = body.name.trim();
    if name.is_empty() {
        return Err(bad_request("name is required"));
    }
    relay
        .db
        .rooms()
        .rename(&body.room_id, name, &body.user_id)
        .await?;
    Ok(Json(json!({ "updated": true })))
}

#[derive(Deserialize)]
struct HistoryParams {
    limit: Option<u32>,
    before: Option<String>,
}

async fn history(
    State(relay): State<Arc<Relay>>,
    Path(room_id): Path<String>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<Vec<MessageEvent>>, ApiError> {
    let limits = &relay.limits;
    let limit = params
        .limit
        .unwrap_or(limits.history_page_size)
        .min(limits.history_page_max);

    let before: Option<DateTime<Utc>> = match params.before.as_deref() {
        Some(raw) => Some(
            DateTime::parse_from_rfc3339(raw)
                .map(|t| t.with_timezone(&Utc))
                .map_err(|_| bad_request("before must be an RFC 3339 timestamp"))?,
        ),
        None => None,
    };

    let records = relay
        .db
        .messages()
        .history(&room_id, i64::from(limit), before)
        .await?;
    Ok(Json(records.into_iter().map(|r| r.into_event()).collect()))
}

async fn list_contacts(
    State(relay): State<Arc<Relay>>,
    Query(params): Query<UserIdParams>,
) -> Result<Json<Vec<UserJson>>, ApiError> {
    let contacts = relay.db.contacts().accepted_for(&params.user_id).await?;
    Ok(Json(
        contacts
            .into_iter()
            .map(|c| UserJson {
                id: c.id,
                email: c.email,
                name: c.name,
                status: c.status,
            })
            .collect(),
    ))
}

async fn pending_contacts(
    State(relay): State<Arc<Relay>>,
    Query(params): Query<UserIdParams>,
) -> Result<Json<Vec<serde_json::Value>>, ApiError> {
    let pending = relay.db.contacts().pending_for(&params.user_id).await?;
    Ok(Json(
        pending
            .into_iter()
            .map(|p| {
                json!({
                    "requestId": p.id,
                    "fromUserId": p.user_id,
                    "email": p.email,
                    "name": p.name,
                })
            })
            .collect(),
    ))
}

#[derive(Deserialize)]
struct ContactRequestBody {
    #[serde(rename = "userId")]
    user_id: String,
    #[serde(rename = "contactEmail")]
    contact_email: String,
}

async fn request_contact(
    State(relay): State<Arc<Relay>>,
    Json(body): Json<ContactRequestBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let contact = relay
        .db
        .users()
        .find_by_email(&body.contact_email)
        .await?
        .ok_or_else(|| DbError::UserNotFound(body.contact_email.clone()))?;
    if contact.id == body.user_id {
        return Err(bad_request("cannot add yourself as a contact"));
    }
    relay
        .db
        .contacts()
        .request(&body.user_id, &contact.id)
        .await?;
    Ok(Json(json!({ "requested": true })))
}

#[derive(Deserialize)]
struct ContactDecisionBody {
    #[serde(rename = "requestId")]
    request_id: i64,
    #[serde(rename = "userId")]
    user_id: String,
}

async fn accept_contact(
    State(relay): State<Arc<Relay>>,
    Json(body): Json<ContactDecisionBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    relay
        .db
        .contacts()
        .accept(body.request_id, &body.user_id)
        .await?;
    Ok(Json(json!({ "accepted": true })))
}

async fn reject_contact(
    State(relay): State<Arc<Relay>>,
    Json(body): Json<ContactDecisionBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    relay
        .db
        .contacts()
        .reject(body.request_id, &body.user_id)
        .await?;
    Ok(Json(json!({ "rejected": true })))
}
