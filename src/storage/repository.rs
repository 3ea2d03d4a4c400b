use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::{PointEvent, PointLedger, UserId, UserRecord};

use super::MIGRATION_001_USERS;

/// Result of a write that the store may refuse without it being a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Written,
    /// The record changed (or vanished) since it was read; nothing was written.
    Stale,
    /// Another user already holds the email address; nothing was written.
    DuplicateEmail,
}

/// Repository for persisting and querying user documents.
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

const USER_COLUMNS: &str = "id, name, email, password_hash, is_admin, points, points_array, version, created_at, updated_at";

impl Repository {
    /// Create a new repository with the given SQLite connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to a SQLite database at the given URL.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = SqlitePool::connect(database_url)
            .await
            .context("Failed to connect to database")?;
        Ok(Self::new(pool))
    }

    /// Create the schema if it does not exist yet.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(MIGRATION_001_USERS)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 001")?;
        Ok(())
    }

    /// Initialize a new database (connect + migrate).
    pub async fn init(database_url: &str) -> Result<Self> {
        let repo = Self::connect(database_url).await?;
        repo.migrate().await?;
        Ok(repo)
    }

    /// Insert a new user document.
    pub async fn create_user(&self, user: &UserRecord) -> Result<WriteOutcome> {
        let points_json = serde_json::to_string(user.points_array())?;

        let result = sqlx::query(
            r#"
            INSERT INTO users (id, name, email, password_hash, is_admin, points, points_array, version, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(user.id.to_string())
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.is_admin)
        .bind(user.points())
        .bind(&points_json)
        .bind(user.version)
        .bind(user.created_at.to_rfc3339())
        .bind(user.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(WriteOutcome::Written),
            Err(e) if is_unique_violation(&e) => Ok(WriteOutcome::DuplicateEmail),
            Err(e) => Err(e).context("Failed to create user"),
        }
    }

    /// Get a user by ID.
    pub async fn find_by_id(&self, id: UserId) -> Result<Option<UserRecord>> {
        debug!(%id, "loading user");
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch user")?;

        row.as_ref().map(Self::row_to_user).transpose()
    }

    /// Get a user by email address.
    pub async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?"))
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch user by email")?;

        row.as_ref().map(Self::row_to_user).transpose()
    }

    /// List users in insertion order, skipping `offset` and returning at most `limit`.
    pub async fn list_users(&self, offset: i64, limit: i64) -> Result<Vec<UserRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY rowid LIMIT ? OFFSET ?"
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list users")?;

        rows.iter().map(Self::row_to_user).collect()
    }

    /// Count all users.
    pub async fn count_users(&self) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) as count FROM users")
            .fetch_one(&self.pool)
            .await
            .context("Failed to count users")?;
        Ok(row.get("count"))
    }

    /// Persist the whole document if nobody else saved it since it was read.
    ///
    /// The write is conditional on `user.version`; on success the in-memory
    /// version is bumped to match the stored one.
    pub async fn save_user(&self, user: &mut UserRecord) -> Result<WriteOutcome> {
        let points_json = serde_json::to_string(user.points_array())?;

        let result = sqlx::query(
            r#"
            UPDATE users
            SET name = ?, email = ?, password_hash = ?, is_admin = ?, points = ?, points_array = ?,
                version = version + 1, updated_at = ?
            WHERE id = ? AND version = ?
            "#,
        )
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.is_admin)
        .bind(user.points())
        .bind(&points_json)
        .bind(user.updated_at.to_rfc3339())
        .bind(user.id.to_string())
        .bind(user.version)
        .execute(&self.pool)
        .await;

        match result {
            Ok(done) if done.rows_affected() == 0 => Ok(WriteOutcome::Stale),
            Ok(_) => {
                user.version += 1;
                Ok(WriteOutcome::Written)
            }
            Err(e) if is_unique_violation(&e) => Ok(WriteOutcome::DuplicateEmail),
            Err(e) => Err(e).context("Failed to save user"),
        }
    }

    /// Delete a user and its ledger. Returns false if there was no such user.
    pub async fn delete_user(&self, id: UserId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .context("Failed to delete user")?;
        Ok(result.rows_affected() > 0)
    }

    fn row_to_user(row: &sqlx::sqlite::SqliteRow) -> Result<UserRecord> {
        let id_str: String = row.get("id");
        let id = Uuid::parse_str(&id_str).context("Invalid user ID")?;
        let points_json: String = row.get("points_array");
        let stored_points: i64 = row.get("points");
        let created_at_str: String = row.get("created_at");
        let updated_at_str: String = row.get("updated_at");

        let events: Vec<PointEvent> =
            serde_json::from_str(&points_json).context("Invalid points_array JSON")?;
        let ledger = PointLedger::from_events(events)
            .with_context(|| format!("Invalid points ledger for user {}", id))?;

        if ledger.total() != stored_points {
            warn!(
                %id,
                stored = stored_points,
                computed = ledger.total(),
                "stored points total diverged from ledger, using ledger sum"
            );
        }

        Ok(UserRecord {
            id,
            name: row.get("name"),
            email: row.get("email"),
            password_hash: row.get("password_hash"),
            is_admin: row.get::<i32, _>("is_admin") != 0,
            ledger,
            version: row.get("version"),
            created_at: parse_timestamp(&created_at_str).context("Invalid created_at timestamp")?,
            updated_at: parse_timestamp(&updated_at_str).context("Invalid updated_at timestamp")?,
        })
    }
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(s).map(|dt| dt.with_timezone(&Utc))
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}
