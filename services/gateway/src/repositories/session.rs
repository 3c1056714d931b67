//! Session store backed by the `sessions` table
//!
//! Tokens are opaque random identifiers. Expired rows are evicted lazily
//! the first time they are read; there is no background sweep.

use chrono::{DateTime, Duration, Utc};
use common::error::{DatabaseError, DatabaseResult};
use sqlx::SqlitePool;
use tracing::info;
use uuid::Uuid;

use crate::models::Session;

/// Lifetime of a session, shared with the `Max-Age` of the session cookie
pub const SESSION_TTL_SECS: i64 = 24 * 60 * 60;

/// Session repository
#[derive(Clone)]
pub struct SessionRepository {
    pool: SqlitePool,
}

impl SessionRepository {
    /// Create a new session repository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Issue a new session for `username` and return its token
    pub async fn create_session(&self, username: &str) -> DatabaseResult<String> {
        self.create_session_at(username, Utc::now()).await
    }

    pub async fn create_session_at(
        &self,
        username: &str,
        now: DateTime<Utc>,
    ) -> DatabaseResult<String> {
        let session = Session {
            token: Uuid::new_v4().to_string(),
            username: username.to_string(),
            expire_at: (now + Duration::seconds(SESSION_TTL_SECS)).timestamp_millis(),
        };

        sqlx::query("INSERT INTO sessions (token, username, expire_at) VALUES (?, ?, ?)")
            .bind(&session.token)
            .bind(&session.username)
            .bind(session.expire_at)
            .execute(&self.pool)
            .await
            .map_err(|e| DatabaseError::from_insert(e, "session token"))?;

        info!("Created session for user: {}", username);
        Ok(session.token)
    }

    /// Resolve a token to its username, evicting it when expired
    pub async fn resolve_user(&self, token: &str) -> DatabaseResult<Option<String>> {
        self.resolve_user_at(token, Utc::now()).await
    }

    pub async fn resolve_user_at(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> DatabaseResult<Option<String>> {
        let session = sqlx::query_as::<_, Session>(
            "SELECT token, username, expire_at FROM sessions WHERE token = ?",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::Query)?;

        let Some(session) = session else {
            return Ok(None);
        };

        if !session.is_live_at(now) {
            info!("Evicting expired session for user: {}", session.username);
            self.revoke(token).await?;
            return Ok(None);
        }

        Ok(Some(session.username))
    }

    /// Delete a session; unknown tokens are not an error
    pub async fn revoke(&self, token: &str) -> DatabaseResult<()> {
        sqlx::query("DELETE FROM sessions WHERE token = ?")
            .bind(token)
            .execute(&self.pool)
            .await
            .map_err(DatabaseError::Query)?;

        Ok(())
    }
}
