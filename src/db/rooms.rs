//! Room repository: rooms, membership, and last-read markers.

use super::DbError;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

/// A room as listed for one user, with activity-derived fields.
#[derive(Debug, Clone)]
pub struct RoomSummary {
    pub id: String,
    pub name: Option<String>,
    pub kind: String,
    pub updated_at: DateTime<Utc>,
    /// Messages newer than this user's last-read marker, soft-deleted excluded.
    pub unread_count: i64,
    pub last_message_at: Option<DateTime<Utc>>,
    /// The other member, for DM rooms.
    pub dm_user_id: Option<String>,
    pub dm_email: Option<String>,
    pub dm_name: Option<String>,
}

/// Repository for room operations.
pub struct RoomRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> RoomRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Whether the room exists at all. Membership is transient; existence is not.
    pub async fn exists(&self, room_id: &str) -> Result<bool, DbError> {
        let row: Option<(String,)> = sqlx::query_as("SELECT id FROM rooms WHERE id = ?")
            .bind(room_id)
            .fetch_optional(self.pool)
            .await?;
        Ok(row.is_some())
    }

    pub async fn is_member(&self, room_id: &str, user_id: &str) -> Result<bool, DbError> {
        let row: Option<(i64,)> = sqlx::query_as(
            "SELECT 1 FROM room_members WHERE room_id = ? AND user_id = ?",
        )
        .bind(room_id)
        .bind(user_id)
        .fetch_optional(self.pool)
        .await?;
        Ok(row.is_some())
    }

    /// Create a group room and enroll the creator, transactionally.
    pub async fn create_group(&self, name: &str, created_by: &str) -> Result<String, DbError> {
        let room_id = Uuid::new_v4().to_string();
        let now = Utc::now();

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO rooms (id, name, type, created_by, created_at, updated_at)
            VALUES (?, ?, 'group', ?, ?, ?)
            "#,
        )
        .bind(&room_id)
        .bind(name)
        .bind(created_by)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO room_members (room_id, user_id, joined_at, last_read_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&room_id)
        .bind(created_by)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(room_id)
    }

    /// Find the DM room between two users, or create it. Returns the room id
    /// and whether it was newly created.
    pub async fn find_or_create_dm(
        &self,
        user_id: &str,
        other_user_id: &str,
    ) -> Result<(String, bool), DbError> {
        let existing: Option<(String,)> = sqlx::query_as(
            r#"
            SELECT r.id
            FROM rooms r
            JOIN room_members rm1 ON r.id = rm1.room_id
            JOIN room_members rm2 ON r.id = rm2.room_id
            WHERE r.type = 'dm'
              AND rm1.user_id = ?
              AND rm2.user_id = ?
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .bind(other_user_id)
        .fetch_optional(self.pool)
        .await?;

        if let Some((room_id,)) = existing {
            return Ok((room_id, false));
        }

        let room_id = Uuid::new_v4().to_string();
        let now = Utc::now();

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO rooms (id, type, created_by, created_at, updated_at) VALUES (?, 'dm', ?, ?, ?)",
        )
        .bind(&room_id)
        .bind(user_id)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO room_members (room_id, user_id, joined_at, last_read_at) VALUES (?, ?, ?, ?), (?, ?, ?, ?)",
        )
        .bind(&room_id)
        .bind(user_id)
        .bind(now)
        .bind(now)
        .bind(&room_id)
        .bind(other_user_id)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok((room_id, true))
    }

    /// Enroll a user in an existing room. Idempotent.
    pub async fn join(&self, room_id: &str, user_id: &str) -> Result<(), DbError> {
        if !self.exists(room_id).await? {
            return Err(DbError::RoomNotFound(room_id.to_string()));
        }
        let now = Utc::now();
        sqlx::query(
            "INSERT OR IGNORE INTO room_members (room_id, user_id, joined_at, last_read_at) VALUES (?, ?, ?, ?)",
        )
        .bind(room_id)
        .bind(user_id)
        .bind(now)
        .bind(now)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Add another user to a room. Fails when already a member.
    pub async fn invite(&self, room_id: &str, user_id: &str) -> Result<(), DbError> {
        if !self.exists(room_id).await? {
            return Err(DbError::RoomNotFound(room_id.to_string()));
        }
        if self.is_member(room_id, user_id).await? {
            return Err(DbError::AlreadyMember);
        }
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO room_members (room_id, user_id, joined_at, last_read_at) VALUES (?, ?, ?, ?)",
        )
        .bind(room_id)
        .bind(user_id)
        .bind(now)
        .bind(now)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Rename a room. Only members may rename.
    pub async fn rename(&self, room_id: &str, name: &str, user_id: &str) -> Result<(), DbError> {
        if !self.is_member(room_id, user_id).await? {
            return Err(DbError::NotAMember);
        }
        sqlx::query("UPDATE rooms SET name = ?, updated_at = ? WHERE id = ?")
            .bind(name)
            .bind(Utc::now())
            .bind(room_id)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    /// Stamp the room's updated_at. Called after a message lands.
    pub async fn touch(&self, room_id: &str) -> Result<(), DbError> {
        sqlx::query("UPDATE rooms SET updated_at = ? WHERE id = ?")
            .bind(Utc::now())
            .bind(room_id)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    /// Move the (room, user) last-read marker to now.
    pub async fn mark_read(&self, room_id: &str, user_id: &str) -> Result<(), DbError> {
        sqlx::query(
            "UPDATE room_members SET last_read_at = ? WHERE room_id = ? AND user_id = ?",
        )
        .bind(Utc::now())
        .bind(room_id)
        .bind(user_id)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// List a user's rooms with unread counts and latest activity. Rooms with
    /// no messages sort last. The partner join is restricted to DM rooms so a
    /// group room is always a single row.
    pub async fn rooms_for_user(&self, user_id: &str) -> Result<Vec<RoomSummary>, DbError> {
        type Row = (
            String,
            Option<String>,
            String,
            DateTime<Utc>,
            i64,
            Option<DateTime<Utc>>,
            Option<String>,
            Option<String>,
            Option<String>,
        );
        let rows = sqlx::query_as::<_, Row>(
            r#"
            SELECT
                r.id,
                r.name,
                r.type,
                r.updated_at,
                COUNT(m.id) FILTER (
                    WHERE m.created_at > rm.last_read_at AND m.deleted = 0
                ) AS unread_count,
                MAX(m.created_at) AS last_message_at,
                u2.id AS dm_user_id,
                u2.email AS dm_email,
                u2.name AS dm_name
            FROM rooms r
            JOIN room_members rm ON r.id = rm.room_id
            LEFT JOIN messages m ON r.id = m.room_id
            LEFT JOIN room_members rm2
                ON r.id = rm2.room_id AND rm2.user_id != ?1 AND r.type = 'dm'
            LEFT JOIN users u2 ON u2.id = rm2.user_id
            WHERE rm.user_id = ?1
            GROUP BY r.id, r.name, r.type, r.updated_at, rm.last_read_at,
                     u2.id, u2.email, u2.name
            ORDER BY last_message_at DESC NULLS LAST
            "#,
        )
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(
                |(id, name, kind, updated_at, unread_count, last_message_at, dm_user_id, dm_email, dm_name)| {
                    RoomSummary {
                        id,
                        name,
                        kind,
                        updated_at,
                        unread_count,
                        last_message_at,
                        dm_user_id,
                        dm_email,
                        dm_name,
                    }
                },
            )
            .collect())
    }
}
