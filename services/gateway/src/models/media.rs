//! Media index models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One image relayed to the channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct MediaRecord {
    /// Durable fetch URL, the only externally exposed identifier
    pub url: String,
    pub file_id: String,
    /// Needed to retract the message from the channel later
    pub message_id: i64,
    /// Creation time in Unix epoch milliseconds
    pub timestamp: i64,
}

impl MediaRecord {
    pub fn new(url: String, file_id: String, message_id: i64, created_at: DateTime<Utc>) -> Self {
        Self {
            url,
            file_id,
            message_id,
            timestamp: created_at.timestamp_millis(),
        }
    }
}

/// One page of the gallery, newest first
#[derive(Debug, Clone, Serialize)]
pub struct GalleryPage {
    pub items: Vec<MediaRecord>,
    pub page: u32,
    pub total_pages: u32,
    pub total: i64,
}

impl GalleryPage {
    pub fn has_previous(&self) -> bool {
        self.page > 1
    }

    pub fn has_next(&self) -> bool {
        self.page < self.total_pages
    }
}

/// Number of pages needed for `total` rows
pub fn page_count(total: i64, page_size: u32) -> u32 {
    if total <= 0 || page_size == 0 {
        return 0;
    }
    let size = i64::from(page_size);
    ((total + size - 1) / size) as u32
}
