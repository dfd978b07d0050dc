//! Telegram channel: webhook envelope parsing and Bot API calls
//! (sendMessage, sendPhoto, getFile, setWebhook).

use crate::channels::inbound::{CommandKind, InboundUpdate};
use crate::channels::registry::ChannelHandle;
use crate::services::Capability;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

const TELEGRAM_API_BASE: &str = "https://api.telegram.org";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Telegram update payload (webhook POST body).
#[derive(Debug, Deserialize)]
pub struct TelegramUpdate {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<TelegramMessage>,
}

#[derive(Debug, Deserialize)]
pub struct TelegramMessage {
    pub chat: TelegramChat,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub caption: Option<String>,
    /// Photo sizes, smallest first; the last entry is the largest rendition.
    #[serde(default)]
    pub photo: Option<Vec<TelegramPhotoSize>>,
}

#[derive(Debug, Deserialize)]
pub struct TelegramChat {
    pub id: i64,
}

#[derive(Debug, Deserialize)]
pub struct TelegramPhotoSize {
    pub file_id: String,
    #[serde(default)]
    pub file_size: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct GetFileResponse {
    ok: bool,
    #[serde(default)]
    result: Option<TelegramFile>,
}

#[derive(Debug, Deserialize)]
struct TelegramFile {
    #[serde(default)]
    file_path: Option<String>,
}

/// Telegram channel connector: parses webhook updates and sends replies via the Bot API.
pub struct TelegramChannel {
    id: String,
    token: Option<String>,
    base_url: String,
    client: reqwest::Client,
}

impl TelegramChannel {
    pub fn new(token: Option<String>, base_url: Option<String>) -> Self {
        let base_url = base_url
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or_else(|| TELEGRAM_API_BASE.to_string());
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("failed to build HTTP client");
        Self {
            id: "telegram".to_string(),
            token,
            base_url,
            client,
        }
    }

    fn token(&self) -> Result<&str, String> {
        self.token
            .as_deref()
            .ok_or_else(|| "telegram bot token not configured".to_string())
    }

    fn method_url(&self, method: &str) -> Result<String, String> {
        Ok(format!("{}/bot{}/{}", self.base_url, self.token()?, method))
    }

    /// Normalize a webhook update into an [`InboundUpdate`].
    /// Photo updates download the largest rendition's bytes via getFile.
    /// Returns Ok(None) for updates the relay does not handle (joins, stickers, ...).
    pub async fn normalize_update(
        &self,
        update: TelegramUpdate,
    ) -> Result<Option<InboundUpdate>, String> {
        let Some(msg) = update.message else {
            return Ok(None);
        };
        let chat_id = msg.chat.id.to_string();

        // Largest rendition is last.
        let photo_id = msg
            .photo
            .as_ref()
            .and_then(|p| p.last())
            .map(|p| p.file_id.clone());
        if let Some(file_id) = photo_id {
            let image = self.download_photo(&file_id).await?;
            return Ok(Some(InboundUpdate::Image {
                chat_id,
                image,
                caption: msg.caption,
            }));
        }

        let Some(text) = msg.text else {
            return Ok(None);
        };
        if let Some(command) = CommandKind::parse(&text) {
            return Ok(Some(InboundUpdate::Command { chat_id, command }));
        }
        Ok(Some(InboundUpdate::Text { chat_id, text }))
    }

    /// Resolve a file_id to bytes: getFile for the server path, then download it.
    async fn download_photo(&self, file_id: &str) -> Result<Vec<u8>, String> {
        let url = format!("{}?file_id={}", self.method_url("getFile")?, file_id);
        let res = self.client.get(&url).send().await.map_err(|e| e.to_string())?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(format!("getFile failed: {} {}", status, body));
        }
        let data: GetFileResponse = res.json().await.map_err(|e| e.to_string())?;
        let file_path = data
            .result
            .filter(|_| data.ok)
            .and_then(|f| f.file_path)
            .ok_or("getFile returned no file path")?;

        let download_url = format!("{}/file/bot{}/{}", self.base_url, self.token()?, file_path);
        let res = self
            .client
            .get(&download_url)
            .send()
            .await
            .map_err(|e| e.to_string())?;
        if !res.status().is_success() {
            return Err(format!("file download failed: {}", res.status()));
        }
        let bytes = res.bytes().await.map_err(|e| e.to_string())?;
        Ok(bytes.to_vec())
    }

    /// Send a text message to a chat via sendMessage.
    pub async fn send_message(&self, chat_id: &str, text: &str) -> Result<(), String> {
        let url = self.method_url("sendMessage")?;
        let body = serde_json::json!({ "chat_id": chat_id, "text": text });
        let res = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| e.to_string())?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(format!("sendMessage failed: {} {}", status, body));
        }
        Ok(())
    }

    /// Send a photo with a caption via sendPhoto (multipart upload).
    pub async fn send_photo(&self, chat_id: &str, image: &[u8], caption: &str) -> Result<(), String> {
        let url = self.method_url("sendPhoto")?;
        let part = reqwest::multipart::Part::bytes(image.to_vec())
            .file_name("image.png")
            .mime_str("image/png")
            .map_err(|e| e.to_string())?;
        let form = reqwest::multipart::Form::new()
            .text("chat_id", chat_id.to_string())
            .text("caption", caption.to_string())
            .part("photo", part);
        let res = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| e.to_string())?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(format!("sendPhoto failed: {} {}", status, body));
        }
        Ok(())
    }

    /// Set webhook URL (and optional secret). Telegram POSTs updates to the URL.
    pub async fn set_webhook(&self, url: &str, secret: Option<&str>) -> Result<(), String> {
        let api_url = self.method_url("setWebhook")?;
        let mut body = serde_json::json!({ "url": url });
        if let Some(s) = secret {
            body["secret_token"] = serde_json::Value::String(s.to_string());
        }
        let res = self
            .client
            .post(&api_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| e.to_string())?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(format!("setWebhook failed: {} {}", status, body));
        }
        Ok(())
    }

    /// Remove the webhook registration.
    pub async fn delete_webhook(&self) -> Result<(), String> {
        let url = self.method_url("deleteWebhook")?;
        let res = self
            .client
            .post(&url)
            .send()
            .await
            .map_err(|e| e.to_string())?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(format!("deleteWebhook failed: {} {}", status, body));
        }
        Ok(())
    }
}

impl Capability for TelegramChannel {
    fn service_name(&self) -> &'static str {
        "telegram"
    }

    fn available(&self) -> bool {
        self.token.is_some()
    }
}

#[async_trait]
impl ChannelHandle for TelegramChannel {
    fn id(&self) -> &str {
        &self.id
    }

    async fn send_text(&self, conversation_id: &str, text: &str) -> Result<(), String> {
        TelegramChannel::send_message(self, conversation_id, text).await
    }

    async fn send_photo(&self, conversation_id: &str, image: &[u8], caption: &str) -> Result<(), String> {
        TelegramChannel::send_photo(self, conversation_id, image, caption).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_text_update() {
        let json = r#"{"update_id": 7, "message": {"chat": {"id": 42}, "text": "hello"}}"#;
        let update: TelegramUpdate = serde_json::from_str(json).expect("parse update");
        assert_eq!(update.update_id, 7);
        let msg = update.message.expect("message");
        assert_eq!(msg.chat.id, 42);
        assert_eq!(msg.text.as_deref(), Some("hello"));
        assert!(msg.photo.is_none());
    }

    #[test]
    fn parses_photo_update_with_caption() {
        let json = r#"{
            "update_id": 8,
            "message": {
                "chat": {"id": 42},
                "caption": "Remove Background please",
                "photo": [
                    {"file_id": "small", "file_size": 100},
                    {"file_id": "large", "file_size": 5000}
                ]
            }
        }"#;
        let update: TelegramUpdate = serde_json::from_str(json).expect("parse update");
        let msg = update.message.expect("message");
        let photos = msg.photo.expect("photo sizes");
        assert_eq!(photos.last().map(|p| p.file_id.as_str()), Some("large"));
        assert_eq!(msg.caption.as_deref(), Some("Remove Background please"));
    }

    #[tokio::test]
    async fn normalize_ignores_non_message_updates() {
        let channel = TelegramChannel::new(Some("token".to_string()), None);
        let update: TelegramUpdate = serde_json::from_str(r#"{"update_id": 1}"#).expect("parse");
        let normalized = channel.normalize_update(update).await.expect("normalize");
        assert!(normalized.is_none());
    }

    #[tokio::test]
    async fn normalize_maps_commands_and_text() {
        let channel = TelegramChannel::new(Some("token".to_string()), None);

        let update: TelegramUpdate = serde_json::from_str(
            r#"{"update_id": 2, "message": {"chat": {"id": 1}, "text": "/start"}}"#,
        )
        .expect("parse");
        match channel.normalize_update(update).await.expect("normalize") {
            Some(InboundUpdate::Command { chat_id, command }) => {
                assert_eq!(chat_id, "1");
                assert_eq!(command, CommandKind::Start);
            }
            other => panic!("expected command update, got {:?}", other),
        }

        let update: TelegramUpdate = serde_json::from_str(
            r#"{"update_id": 3, "message": {"chat": {"id": 1}, "text": "hi there"}}"#,
        )
        .expect("parse");
        match channel.normalize_update(update).await.expect("normalize") {
            Some(InboundUpdate::Text { text, .. }) => assert_eq!(text, "hi there"),
            other => panic!("expected text update, got {:?}", other),
        }
    }
}
