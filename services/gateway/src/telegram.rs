//! Telegram Bot API client
//!
//! Covers the four calls the relay needs: `sendPhoto`, `getFile`,
//! `sendMessage` and `deleteMessage`. Every call is attempted once.

use reqwest::{Client, multipart};
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::json;
use tracing::error;

use crate::{
    config::TelegramSettings,
    error::{GatewayError, GatewayResult},
};

/// Envelope shared by every Bot API reply
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    description: Option<String>,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct Message {
    message_id: i64,
    #[serde(default)]
    photo: Vec<PhotoSize>,
}

/// One stored resolution of an uploaded photo
#[derive(Debug, Clone, Deserialize)]
pub struct PhotoSize {
    pub file_id: String,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
}

#[derive(Debug, Deserialize)]
struct File {
    file_path: Option<String>,
}

/// An image to send to the channel
#[derive(Debug, Clone)]
pub struct PhotoUpload {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// Result of a successful `sendPhoto`
#[derive(Debug, Clone, PartialEq)]
pub struct SentPhoto {
    pub message_id: i64,
    /// Identifier of the highest-resolution representation
    pub file_id: String,
}

/// Client bound to one bot and one chat
#[derive(Clone)]
pub struct TelegramClient {
    http: Client,
    settings: TelegramSettings,
}

impl TelegramClient {
    pub fn new(http: Client, settings: TelegramSettings) -> Self {
        Self { http, settings }
    }

    fn method_url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{}",
            self.settings.api_base, self.settings.bot_token, method
        )
    }

    /// Upload an image with a caption
    pub async fn send_photo(&self, photo: PhotoUpload, caption: &str) -> GatewayResult<SentPhoto> {
        let mut part = multipart::Part::bytes(photo.bytes).file_name(photo.file_name);
        if let Some(mime) = photo.content_type.as_deref() {
            part = part
                .mime_str(mime)
                .map_err(|e| GatewayError::BadRequest(format!("Invalid content type: {}", e)))?;
        }

        let form = multipart::Form::new()
            .text("chat_id", self.settings.chat_id.clone())
            .text("caption", caption.to_string())
            .text("parse_mode", "HTML")
            .part("photo", part);

        let request = self.http.post(self.method_url("sendPhoto")).multipart(form);
        let message: Message = call(request, "sendPhoto").await?;

        let largest = largest_photo(&message.photo).ok_or_else(|| {
            GatewayError::Upstream("Telegram returned no photo sizes".to_string())
        })?;

        Ok(SentPhoto {
            message_id: message.message_id,
            file_id: largest.file_id.clone(),
        })
    }

    /// Resolve a file identifier into a directly fetchable URL
    pub async fn get_file_url(&self, file_id: &str) -> GatewayResult<String> {
        let request = self
            .http
            .get(self.method_url("getFile"))
            .query(&[("file_id", file_id)]);
        let file: File = call(request, "getFile").await?;

        let path = file
            .file_path
            .ok_or_else(|| GatewayError::Upstream("Telegram returned no file path".to_string()))?;

        Ok(format!(
            "{}/file/bot{}/{}",
            self.settings.api_base, self.settings.bot_token, path
        ))
    }

    /// Send a plain text message
    pub async fn send_message(&self, text: &str) -> GatewayResult<i64> {
        let request = self.http.post(self.method_url("sendMessage")).json(&json!({
            "chat_id": self.settings.chat_id,
            "text": text,
            "parse_mode": "HTML",
        }));
        let message: Message = call(request, "sendMessage").await?;

        Ok(message.message_id)
    }

    /// Retract a message from the chat
    pub async fn delete_message(&self, message_id: i64) -> GatewayResult<()> {
        let request = self.http.post(self.method_url("deleteMessage")).json(&json!({
            "chat_id": self.settings.chat_id,
            "message_id": message_id,
        }));
        let _: bool = call(request, "deleteMessage").await?;

        Ok(())
    }
}

/// Pick the representation with the most pixels, preferring later entries on ties
pub fn largest_photo(sizes: &[PhotoSize]) -> Option<&PhotoSize> {
    sizes
        .iter()
        .max_by_key(|size| u64::from(size.width) * u64::from(size.height))
}

async fn call<T: DeserializeOwned>(request: reqwest::RequestBuilder, method: &str) -> GatewayResult<T> {
    let response = request.send().await.map_err(|e| {
        error!("Telegram {} request failed: {}", method, e);
        GatewayError::Upstream(format!("Telegram {} request failed", method))
    })?;

    let status = response.status();
    // Error replies still carry a JSON envelope with a description
    let body: Option<ApiResponse<T>> = response.json().await.ok();

    match body {
        Some(ApiResponse {
            ok: true,
            result: Some(result),
            ..
        }) if status.is_success() => Ok(result),
        Some(ApiResponse { description, .. }) => {
            let description =
                description.unwrap_or_else(|| format!("Telegram {} error ({})", method, status));
            error!("Telegram {} failed: {}", method, description);
            Err(GatewayError::Upstream(description))
        }
        None => {
            error!("Telegram {} returned an unreadable reply ({})", method, status);
            Err(GatewayError::Upstream(format!(
                "Telegram {} error ({})",
                method, status
            )))
        }
    }
}
