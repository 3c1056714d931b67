//! Media relay: sends content to the channel and keeps the media index in step
//!
//! The send path uploads, resolves a durable URL and indexes it. The delete
//! path retracts remote messages and then drops the matching index rows.

use std::collections::BTreeSet;

use chrono::Utc;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::{
    error::{GatewayError, GatewayResult},
    models::MediaRecord,
    repositories::MediaRepository,
    telegram::{PhotoUpload, TelegramClient},
};

/// Acknowledgement returned for text-only sends
pub const TEXT_SENT_ACK: &str = "Text message sent";

/// Content submitted from the send panel
#[derive(Debug, Clone, Default)]
pub struct SendRequest {
    pub photo: Option<PhotoUpload>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SendOutcome {
    /// An image was sent; `url` is its durable fetch URL
    Photo { url: String },
    Text,
}

impl SendOutcome {
    /// Value reported back to the client under `data`
    pub fn data(&self) -> &str {
        match self {
            SendOutcome::Photo { url } => url,
            SendOutcome::Text => TEXT_SENT_ACK,
        }
    }
}

/// What a batch delete touched
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeleteSummary {
    /// Requested URLs present in the index
    pub matched: usize,
    /// Remote retractions that failed; their rows are removed anyway
    pub remote_failed: usize,
    /// Index rows removed
    pub removed: u64,
}

#[derive(Clone)]
pub struct MediaRelay {
    telegram: TelegramClient,
    media: MediaRepository,
}

impl MediaRelay {
    pub fn new(telegram: TelegramClient, media: MediaRepository) -> Self {
        Self { telegram, media }
    }

    /// Send an image, a text message, or both (the text becomes the caption)
    pub async fn send(&self, request: SendRequest) -> GatewayResult<SendOutcome> {
        let message = request.message.filter(|m| !m.is_empty());
        let photo = request.photo.filter(|p| !p.bytes.is_empty());

        match (photo, message) {
            (Some(photo), message) => self.send_photo(photo, message.as_deref()).await,
            (None, Some(text)) => {
                let message_id = self.telegram.send_message(&text).await?;
                info!("Sent text message {}", message_id);
                Ok(SendOutcome::Text)
            }
            (None, None) => Err(GatewayError::BadRequest(
                "No content: provide a file or a message".to_string(),
            )),
        }
    }

    async fn send_photo(
        &self,
        photo: PhotoUpload,
        message: Option<&str>,
    ) -> GatewayResult<SendOutcome> {
        let caption = caption_for(message, &photo.file_name);
        let sent = self.telegram.send_photo(photo, &caption).await?;
        let url = self.telegram.get_file_url(&sent.file_id).await?;

        let record = MediaRecord::new(url.clone(), sent.file_id, sent.message_id, Utc::now());
        // The message is already in the channel; an index failure must not undo that
        match self.media.insert(&record).await {
            Ok(()) => info!("Indexed message {} as {}", record.message_id, url),
            Err(e) => error!("Failed to index message {}: {}", record.message_id, e),
        }

        Ok(SendOutcome::Photo { url })
    }

    /// Retract the messages behind `urls` and drop their index rows
    ///
    /// Unknown URLs are ignored. Remote failures are logged and counted but
    /// never stop the local cleanup; storage failures abort the operation.
    pub async fn delete(&self, urls: BTreeSet<String>) -> GatewayResult<DeleteSummary> {
        if urls.is_empty() {
            return Err(GatewayError::BadRequest("No URLs given".to_string()));
        }

        let urls: Vec<String> = urls.into_iter().collect();
        let records = self.media.find_by_urls(&urls).await?;

        let mut tasks = JoinSet::new();
        for record in &records {
            let telegram = self.telegram.clone();
            let message_id = record.message_id;
            tasks.spawn(async move { (message_id, telegram.delete_message(message_id).await) });
        }

        let mut remote_failed = 0;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((message_id, Ok(()))) => info!("Deleted remote message {}", message_id),
                Ok((message_id, Err(e))) => {
                    warn!("Failed to delete remote message {}: {}", message_id, e);
                    remote_failed += 1;
                }
                Err(e) => {
                    warn!("Remote delete task did not complete: {}", e);
                    remote_failed += 1;
                }
            }
        }

        let matched: Vec<String> = records.into_iter().map(|r| r.url).collect();
        let removed = self.media.delete_by_urls(&matched).await?;

        info!(
            "Batch delete: {} requested, {} matched, {} removed, {} remote failures",
            urls.len(),
            matched.len(),
            removed,
            remote_failed
        );

        Ok(DeleteSummary {
            matched: matched.len(),
            remote_failed,
            removed,
        })
    }
}

/// Caption sent with an image: the message when given, otherwise the file name
pub fn caption_for(message: Option<&str>, file_name: &str) -> String {
    match message {
        Some(text) if !text.is_empty() => text.to_string(),
        _ => file_name.to_string(),
    }
}

/// Parse a delete request body: a non-empty JSON array of URL strings
pub fn parse_url_set(body: &[u8]) -> GatewayResult<BTreeSet<String>> {
    let urls: Vec<String> = serde_json::from_slice(body)
        .map_err(|_| GatewayError::BadRequest("Invalid data: expected an array of URLs".to_string()))?;

    if urls.is_empty() {
        return Err(GatewayError::BadRequest("Invalid data: no URLs given".to_string()));
    }

    Ok(urls.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TelegramSettings;
    use common::database::{init_memory_pool, migrate};
    use sqlx::SqlitePool;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{body_partial_json, body_string_contains, method, path},
    };

    async fn relay(server: &MockServer) -> (MediaRelay, MediaRepository, SqlitePool) {
        let pool = init_memory_pool().await.unwrap();
        migrate(&pool).await.unwrap();
        let media = MediaRepository::new(pool.clone());
        let telegram = TelegramClient::new(
            reqwest::Client::new(),
            TelegramSettings {
                bot_token: "TOKEN".to_string(),
                chat_id: "-100".to_string(),
                api_base: server.uri(),
            },
        );
        (MediaRelay::new(telegram, media.clone()), media, pool)
    }

    fn photo(name: &str) -> PhotoUpload {
        PhotoUpload {
            file_name: name.to_string(),
            content_type: Some("image/png".to_string()),
            bytes: b"fake-png-bytes".to_vec(),
        }
    }

    fn record(url: &str, message_id: i64) -> MediaRecord {
        MediaRecord {
            url: url.to_string(),
            file_id: format!("file-{}", message_id),
            message_id,
            timestamp: message_id,
        }
    }

    async fn mount_photo_flow(server: &MockServer, caption: &str) {
        Mock::given(method("POST"))
            .and(path("/botTOKEN/sendPhoto"))
            .and(body_string_contains(format!("name=\"caption\"\r\n\r\n{}", caption)))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "ok": true,
                "result": {
                    "message_id": 99,
                    "photo": [
                        {"file_id": "thumb", "width": 90, "height": 90},
                        {"file_id": "full", "width": 800, "height": 800}
                    ]
                }
            })))
            .expect(1)
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/botTOKEN/getFile"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "ok": true,
                "result": {"file_id": "full", "file_path": "photos/file_9.png"}
            })))
            .expect(1)
            .mount(server)
            .await;
    }

    async fn mount_delete(server: &MockServer, message_id: i64, ok: bool) {
        let body = if ok {
            serde_json::json!({"ok": true, "result": true})
        } else {
            serde_json::json!({"ok": false, "description": "Bad Request: message can't be deleted"})
        };
        Mock::given(method("POST"))
            .and(path("/botTOKEN/deleteMessage"))
            .and(body_partial_json(serde_json::json!({"message_id": message_id})))
            .respond_with(ResponseTemplate::new(if ok { 200 } else { 400 }).set_body_json(body))
            .expect(1)
            .mount(server)
            .await;
    }

    #[test]
    fn test_caption_falls_back_to_file_name() {
        assert_eq!(caption_for(None, "cat.png"), "cat.png");
        assert_eq!(caption_for(Some(""), "cat.png"), "cat.png");
        assert_eq!(caption_for(Some("look"), "cat.png"), "look");
    }

    #[test]
    fn test_parse_url_set() {
        let urls = parse_url_set(br#"["b", "a", "b"]"#).unwrap();
        assert_eq!(urls.into_iter().collect::<Vec<_>>(), vec!["a", "b"]);

        assert!(parse_url_set(b"[]").is_err());
        assert!(parse_url_set(br#"{"urls": ["a"]}"#).is_err());
        assert!(parse_url_set(b"[1, 2]").is_err());
        assert!(parse_url_set(b"not json").is_err());
    }

    #[tokio::test]
    async fn test_send_photo_without_caption_indexes_url() {
        let server = MockServer::start().await;
        mount_photo_flow(&server, "cat.png").await;
        let (relay, media, _) = relay(&server).await;

        let outcome = relay
            .send(SendRequest {
                photo: Some(photo("cat.png")),
                message: None,
            })
            .await
            .unwrap();

        let expected = format!("{}/file/botTOKEN/photos/file_9.png", server.uri());
        assert_eq!(outcome, SendOutcome::Photo { url: expected.clone() });

        let rows = media.find_by_urls(&[expected.clone()]).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].file_id, "full");
        assert_eq!(rows[0].message_id, 99);
    }

    #[tokio::test]
    async fn test_index_failure_does_not_fail_send() {
        let server = MockServer::start().await;
        mount_photo_flow(&server, "hello").await;
        let (relay, _, pool) = relay(&server).await;
        sqlx::query("DROP TABLE media").execute(&pool).await.unwrap();

        let outcome = relay
            .send(SendRequest {
                photo: Some(photo("cat.png")),
                message: Some("hello".to_string()),
            })
            .await
            .unwrap();

        assert!(matches!(outcome, SendOutcome::Photo { .. }));
    }

    #[tokio::test]
    async fn test_text_only_is_not_indexed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/botTOKEN/sendMessage"))
            .and(body_partial_json(serde_json::json!({"text": "hi", "parse_mode": "HTML"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "ok": true,
                "result": {"message_id": 5}
            })))
            .expect(1)
            .mount(&server)
            .await;
        let (relay, media, _) = relay(&server).await;

        let outcome = relay
            .send(SendRequest {
                photo: None,
                message: Some("hi".to_string()),
            })
            .await
            .unwrap();

        assert_eq!(outcome.data(), TEXT_SENT_ACK);
        assert_eq!(media.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_empty_send_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(wiremock::matchers::any())
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;
        let (relay, _, _) = relay(&server).await;

        let empty_file = PhotoUpload {
            bytes: Vec::new(),
            ..photo("")
        };
        let err = relay
            .send(SendRequest {
                photo: Some(empty_file),
                message: Some(String::new()),
            })
            .await
            .unwrap_err();

        assert!(matches!(err, GatewayError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_channel_failure_is_upstream_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/botTOKEN/sendPhoto"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "ok": false,
                "description": "Bad Request: PHOTO_INVALID_DIMENSIONS"
            })))
            .mount(&server)
            .await;
        let (relay, media, _) = relay(&server).await;

        let err = relay
            .send(SendRequest {
                photo: Some(photo("cat.png")),
                message: None,
            })
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "Bad Request: PHOTO_INVALID_DIMENSIONS");
        assert_eq!(media.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_delete_ignores_unknown_urls() {
        let server = MockServer::start().await;
        mount_delete(&server, 1, true).await;
        let (relay, media, _) = relay(&server).await;
        media.insert(&record("https://t/a", 1)).await.unwrap();
        media.insert(&record("https://t/c", 3)).await.unwrap();

        let urls = ["https://t/a", "https://t/b"].map(String::from).into();
        let summary = relay.delete(urls).await.unwrap();

        assert_eq!(
            summary,
            DeleteSummary {
                matched: 1,
                remote_failed: 0,
                removed: 1
            }
        );
        assert!(media.find_by_urls(&["https://t/a".to_string()]).await.unwrap().is_empty());
        assert_eq!(media.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_remote_failure_still_removes_rows() {
        let server = MockServer::start().await;
        mount_delete(&server, 1, true).await;
        mount_delete(&server, 2, false).await;
        mount_delete(&server, 3, true).await;
        let (relay, media, _) = relay(&server).await;
        for (url, id) in [("https://t/a", 1), ("https://t/b", 2), ("https://t/c", 3)] {
            media.insert(&record(url, id)).await.unwrap();
        }

        let urls = ["https://t/a", "https://t/b", "https://t/c"]
            .map(String::from)
            .into();
        let summary = relay.delete(urls).await.unwrap();

        assert_eq!(summary.matched, 3);
        assert_eq!(summary.remote_failed, 1);
        assert_eq!(summary.removed, 3);
        assert_eq!(media.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_delete_empty_set_is_rejected() {
        let server = MockServer::start().await;
        let (relay, _, pool) = relay(&server).await;
        // Storage is never touched for an empty request
        pool.close().await;

        let err = relay.delete(BTreeSet::new()).await.unwrap_err();
        assert!(matches!(err, GatewayError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_delete_storage_failure_is_reported() {
        let server = MockServer::start().await;
        let (relay, _, pool) = relay(&server).await;
        sqlx::query("DROP TABLE media").execute(&pool).await.unwrap();

        let err = relay
            .delete(BTreeSet::from(["https://t/a".to_string()]))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Database(_)));
    }
}
