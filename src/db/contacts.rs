//! Contact repository: contact requests and the accepted-contacts list.

use super::DbError;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

/// A pending contact request as shown to its recipient.
#[derive(Debug, Clone)]
pub struct ContactRequest {
    pub id: i64,
    pub user_id: String,
    pub contact_id: String,
    pub status: String,
    pub email: String,
    pub name: Option<String>,
}

/// An accepted contact.
#[derive(Debug, Clone)]
pub struct ContactRow {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
    pub status: String,
    pub last_seen: DateTime<Utc>,
}

/// Repository for contact operations.
pub struct ContactRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> ContactRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a pending request from `user_id` towards `contact_id`.
    /// Fails when a row already links the pair in either direction.
    pub async fn request(&self, user_id: &str, contact_id: &str) -> Result<(), DbError> {
        let existing: Option<(i64,)> = sqlx::query_as(
            r#"
            SELECT id FROM contacts
            WHERE (user_id = ?1 AND contact_id = ?2)
               OR (user_id = ?2 AND contact_id = ?1)
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .bind(contact_id)
        .fetch_optional(self.pool)
        .await?;

        if existing.is_some() {
            return Err(DbError::ContactExists);
        }

        sqlx::query(
            "INSERT INTO contacts (user_id, contact_id, status, created_at) VALUES (?, ?, 'pending', ?)",
        )
        .bind(user_id)
        .bind(contact_id)
        .bind(Utc::now())
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Pending requests addressed to `user_id`, newest first.
    pub async fn pending_for(&self, user_id: &str) -> Result<Vec<ContactRequest>, DbError> {
        let rows = sqlx::query_as::<_, (i64, String, String, String, String, Option<String>)>(
            r#"
            SELECT c.id, c.user_id, c.contact_id, c.status, u.email, u.name
            FROM contacts c
            JOIN users u ON c.user_id = u.id
            WHERE c.contact_id = ? AND c.status = 'pending'
            ORDER BY c.created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id, user_id, contact_id, status, email, name)| ContactRequest {
                id,
                user_id,
                contact_id,
                status,
                email,
                name,
            })
            .collect())
    }

    /// Accept a pending request addressed to `user_id` and create the reverse
    /// row, transactionally.
    pub async fn accept(&self, request_id: i64, user_id: &str) -> Result<(), DbError> {
        let mut tx = self.pool.begin().await?;

        let request: Option<(String, String)> = sqlx::query_as(
            r#"
            SELECT user_id, contact_id FROM contacts
            WHERE id = ? AND contact_id = ? AND status = 'pending'
            LIMIT 1
            "#,
        )
        .bind(request_id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some((from_user, to_user)) = request else {
            return Err(DbError::RequestNotFound);
        };

        sqlx::query("UPDATE contacts SET status = 'accepted' WHERE id = ?")
            .bind(request_id)
            .execute(&mut *tx)
            .await?;

        let reverse_exists: Option<(i64,)> = sqlx::query_as(
            "SELECT id FROM contacts WHERE user_id = ? AND contact_id = ? LIMIT 1",
        )
        .bind(&to_user)
        .bind(&from_user)
        .fetch_optional(&mut *tx)
        .await?;

        if reverse_exists.is_none() {
            sqlx::query(
                "INSERT INTO contacts (user_id, contact_id, status, created_at) VALUES (?, ?, 'accepted', ?)",
            )
            .bind(&to_user)
            .bind(&from_user)
            .bind(Utc::now())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Drop a pending request addressed to `user_id`.
    pub async fn reject(&self, request_id: i64, user_id: &str) -> Result<(), DbError> {
        let result = sqlx::query(
            "DELETE FROM contacts WHERE id = ? AND contact_id = ? AND status = 'pending'",
        )
        .bind(request_id)
        .bind(user_id)
        .execute(self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::RequestNotFound);
        }
        Ok(())
    }

    /// Accepted contacts of `user_id`, online first then by recency.
    pub async fn accepted_for(&self, user_id: &str) -> Result<Vec<ContactRow>, DbError> {
        let rows = sqlx::query_as::<_, (String, String, Option<String>, String, DateTime<Utc>)>(
            r#"
            SELECT DISTINCT u.id, u.email, u.name, u.status, u.last_seen
            FROM users u
            JOIN contacts c ON (u.id = c.contact_id OR u.id = c.user_id)
            WHERE (c.user_id = ?1 OR c.contact_id = ?1)
              AND c.status = 'accepted'
              AND u.id != ?1
            ORDER BY u.status DESC, u.last_seen DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id, email, name, status, last_seen)| ContactRow {
                id,
                email,
                name,
                status,
                last_seen,
            })
            .collect())
    }
}
