//! Media index repository

use common::error::{DatabaseError, DatabaseResult};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use crate::models::MediaRecord;

/// URLs bound per statement, well below SQLite's host parameter limit
const URL_BATCH_SIZE: usize = 500;

fn push_url_list<'a>(builder: &mut QueryBuilder<'a, Sqlite>, urls: &'a [String]) {
    let mut separated = builder.separated(", ");
    for url in urls {
        separated.push_bind(url.as_str());
    }
    separated.push_unseparated(")");
}

/// Media repository for database operations
#[derive(Clone)]
pub struct MediaRepository {
    pool: SqlitePool,
}

impl MediaRepository {
    /// Create a new media repository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Index a relayed image
    ///
    /// An existing row with the same URL is never overwritten; the insert
    /// fails with [`DatabaseError::Conflict`] instead.
    pub async fn insert(&self, record: &MediaRecord) -> DatabaseResult<()> {
        sqlx::query("INSERT INTO media (url, file_id, message_id, timestamp) VALUES (?, ?, ?, ?)")
            .bind(&record.url)
            .bind(&record.file_id)
            .bind(record.message_id)
            .bind(record.timestamp)
            .execute(&self.pool)
            .await
            .map_err(|e| DatabaseError::from_insert(e, &record.url))?;

        Ok(())
    }

    /// Find the indexed rows among `urls`; unknown URLs are skipped
    pub async fn find_by_urls(&self, urls: &[String]) -> DatabaseResult<Vec<MediaRecord>> {
        let mut records = Vec::new();

        for chunk in urls.chunks(URL_BATCH_SIZE) {
            let mut builder = QueryBuilder::<Sqlite>::new(
                "SELECT url, file_id, message_id, timestamp FROM media WHERE url IN (",
            );
            push_url_list(&mut builder, chunk);

            let rows = builder
                .build_query_as::<MediaRecord>()
                .fetch_all(&self.pool)
                .await
                .map_err(DatabaseError::Query)?;
            records.extend(rows);
        }

        Ok(records)
    }

    /// Delete every row whose URL is in `urls` within one transaction
    pub async fn delete_by_urls(&self, urls: &[String]) -> DatabaseResult<u64> {
        if urls.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await.map_err(DatabaseError::Query)?;
        let mut removed = 0;

        for chunk in urls.chunks(URL_BATCH_SIZE) {
            let mut builder = QueryBuilder::<Sqlite>::new("DELETE FROM media WHERE url IN (");
            push_url_list(&mut builder, chunk);

            let result = builder
                .build()
                .execute(&mut *tx)
                .await
                .map_err(DatabaseError::Query)?;
            removed += result.rows_affected();
        }

        tx.commit().await.map_err(DatabaseError::Query)?;
        Ok(removed)
    }

    /// Count indexed images
    pub async fn count(&self) -> DatabaseResult<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM media")
            .fetch_one(&self.pool)
            .await
            .map_err(DatabaseError::Query)
    }

    /// Get one page of images, newest first
    ///
    /// `page` is 1-based; values below 1 are treated as 1.
    pub async fn list_page(&self, page: u32, page_size: u32) -> DatabaseResult<Vec<MediaRecord>> {
        let page = page.max(1);
        let offset = i64::from(page - 1) * i64::from(page_size);

        sqlx::query_as::<_, MediaRecord>(
            r#"
            SELECT url, file_id, message_id, timestamp
            FROM media
            ORDER BY timestamp DESC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(i64::from(page_size))
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::Query)
    }
}
