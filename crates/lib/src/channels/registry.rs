//! Channel registry: register and lookup channels by id.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Handle to a running channel (send replies to a conversation).
#[async_trait]
pub trait ChannelHandle: Send + Sync {
    /// Channel id (e.g. "telegram").
    fn id(&self) -> &str;
    /// Send a text message to a conversation (e.g. Telegram chat_id).
    async fn send_text(&self, conversation_id: &str, text: &str) -> Result<(), String>;
    /// Send a photo with caption. Default returns error for text-only channels.
    async fn send_photo(
        &self,
        _conversation_id: &str,
        _image: &[u8],
        _caption: &str,
    ) -> Result<(), String> {
        Err("photo send not implemented".to_string())
    }
}

/// Registry of channel ids to handles. Shared across the gateway.
pub struct ChannelRegistry {
    inner: Arc<RwLock<HashMap<String, Arc<dyn ChannelHandle>>>>,
}

impl Default for ChannelRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn register(&self, id: String, handle: Arc<dyn ChannelHandle>) {
        self.inner.write().await.insert(id, handle);
    }

    pub async fn get(&self, id: &str) -> Option<Arc<dyn ChannelHandle>> {
        let g = self.inner.read().await;
        g.get(id).cloned()
    }

    pub async fn ids(&self) -> Vec<String> {
        let g = self.inner.read().await;
        g.keys().cloned().collect()
    }
}
