//! User repository: identity mirror and presence status.

use super::DbError;
use crate::proto::PresenceStatus;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

/// A stored user row.
#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
    pub status: String,
    pub last_seen: DateTime<Utc>,
}

/// Repository for user operations.
pub struct UserRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> UserRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Upsert the user row on connect: refresh identity, mark online.
    ///
    /// A missing name never overwrites a previously stored one.
    pub async fn upsert_presence(
        &self,
        id: &str,
        email: &str,
        name: Option<&str>,
        status: PresenceStatus,
    ) -> Result<(), DbError> {
        sqlx::query(
            r#"
            INSERT INTO users (id, email, name, status, last_seen)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT (id) DO UPDATE SET
                email = excluded.email,
                name = COALESCE(excluded.name, users.name),
                status = excluded.status,
                last_seen = excluded.last_seen
            "#,
        )
        .bind(id)
        .bind(email)
        .bind(name)
        .bind(status.as_str())
        .bind(Utc::now())
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Mark a user offline and stamp last_seen.
    pub async fn set_offline(&self, id: &str) -> Result<(), DbError> {
        sqlx::query("UPDATE users SET status = 'offline', last_seen = ? WHERE id = ?")
            .bind(Utc::now())
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    /// Find a user by exact email.
    pub async fn find_by_email(&self, email: &str) -> Result<Option<UserRow>, DbError> {
        let row = sqlx::query_as::<_, (String, String, Option<String>, String, DateTime<Utc>)>(
            "SELECT id, email, name, status, last_seen FROM users WHERE email = ?",
        )
        .bind(email)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(|(id, email, name, status, last_seen)| UserRow {
            id,
            email,
            name,
            status,
            last_seen,
        }))
    }

    /// Case-insensitive substring search over emails.
    pub async fn search_by_email(&self, fragment: &str, limit: i64) -> Result<Vec<UserRow>, DbError> {
        let pattern = format!("%{}%", fragment);
        let rows = sqlx::query_as::<_, (String, String, Option<String>, String, DateTime<Utc>)>(
            r#"
            SELECT id, email, name, status, last_seen
            FROM users
            WHERE email LIKE ?
            ORDER BY email
            LIMIT ?
            "#,
        )
        .bind(pattern)
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id, email, name, status, last_seen)| UserRow {
                id,
                email,
                name,
                status,
                last_seen,
            })
            .collect())
    }

    /// Point-in-time stored status, used by tests and the HTTP API.
    pub async fn status(&self, id: &str) -> Result<Option<String>, DbError> {
        let status: Option<(String,)> =
            sqlx::query_as("SELECT status FROM users WHERE id = ?")
                .bind(id)
                .fetch_optional(self.pool)
                .await?;
        Ok(status.map(|(s,)| s))
    }
}
