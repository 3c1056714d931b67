//! Session model and related functionality

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Session entity
///
/// `expire_at` is stored as Unix epoch milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Session {
    pub token: String,
    pub username: String,
    pub expire_at: i64,
}

impl Session {
    /// A session is live strictly before its expiry instant
    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        now.timestamp_millis() < self.expire_at
    }
}
