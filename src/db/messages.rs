//! Message repository: durable message log and read receipts.

use super::DbError;
use crate::proto::MessageEvent;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

/// A message about to be persisted.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub id: String,
    pub room_id: String,
    pub sender_id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// A stored message joined with its sender's identity.
#[derive(Debug, Clone)]
pub struct MessageRecord {
    pub id: String,
    pub room_id: String,
    pub sender_id: String,
    pub sender_email: Option<String>,
    pub sender_name: Option<String>,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl MessageRecord {
    /// Normalize into the wire shape shared with live broadcasts.
    pub fn into_event(self) -> MessageEvent {
        MessageEvent::new(
            self.id,
            self.room_id,
            self.sender_id,
            self.sender_email,
            self.sender_name,
            self.content,
            self.created_at,
        )
    }
}

/// Repository for message operations.
pub struct MessageRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> MessageRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Single durable insert. Callers on the relay path swallow the error;
    /// see the room-message handler.
    pub async fn insert(&self, message: &NewMessage) -> Result<(), DbError> {
        sqlx::query(
            r#"
            INSERT INTO messages (id, room_id, sender_id, content, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&message.id)
        .bind(&message.room_id)
        .bind(&message.sender_id)
        .bind(&message.content)
        .bind(message.created_at)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Fetch one page of history: the `limit` newest messages older than
    /// `before` (when given), returned oldest-first. The pagination cursor is
    /// the `created_at` of the oldest message the caller has already seen.
    pub async fn history(
        &self,
        room_id: &str,
        limit: i64,
        before: Option<DateTime<Utc>>,
    ) -> Result<Vec<MessageRecord>, DbError> {
        type Row = (
            String,
            String,
            Option<String>,
            Option<String>,
            String,
            DateTime<Utc>,
        );

        let rows = if let Some(before) = before {
            sqlx::query_as::<_, Row>(
                r#"
                SELECT m.id, m.sender_id, u.email, u.name, m.content, m.created_at
                FROM messages m
                LEFT JOIN users u ON m.sender_id = u.id
                WHERE m.room_id = ? AND m.deleted = 0 AND m.created_at < ?
                ORDER BY m.created_at DESC
                LIMIT ?
                "#,
            )
            .bind(room_id)
            .bind(before)
            .bind(limit)
            .fetch_all(self.pool)
            .await?
        } else {
            sqlx::query_as::<_, Row>(
                r#"
                SELECT m.id, m.sender_id, u.email, u.name, m.content, m.created_at
                FROM messages m
                LEFT JOIN users u ON m.sender_id = u.id
                WHERE m.room_id = ? AND m.deleted = 0
                ORDER BY m.created_at DESC
                LIMIT ?
                "#,
            )
            .bind(room_id)
            .bind(limit)
            .fetch_all(self.pool)
            .await?
        };

        // Newest-first from the query; callers want oldest-first.
        let mut records: Vec<MessageRecord> = rows
            .into_iter()
            .map(
                |(id, sender_id, sender_email, sender_name, content, created_at)| MessageRecord {
                    id,
                    room_id: room_id.to_string(),
                    sender_id,
                    sender_email,
                    sender_name,
                    content,
                    created_at,
                },
            )
            .collect();
        records.reverse();
        Ok(records)
    }

    /// Record a read receipt. Duplicate (message, user) pairs are ignored.
    /// Returns whether a new receipt was stored.
    pub async fn insert_receipt(&self, message_id: &str, user_id: &str) -> Result<bool, DbError> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO message_receipts (message_id, user_id, read_at) VALUES (?, ?, ?)",
        )
        .bind(message_id)
        .bind(user_id)
        .bind(Utc::now())
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Number of stored receipts for a message.
    pub async fn receipt_count(&self, message_id: &str) -> Result<i64, DbError> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM message_receipts WHERE message_id = ?")
                .bind(message_id)
                .fetch_one(self.pool)
                .await?;
        Ok(count)
    }

    /// Number of stored messages in a room (deleted excluded).
    pub async fn count_for_room(&self, room_id: &str) -> Result<i64, DbError> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM messages WHERE room_id = ? AND deleted = 0")
                .bind(room_id)
                .fetch_one(self.pool)
                .await?;
        Ok(count)
    }
}
