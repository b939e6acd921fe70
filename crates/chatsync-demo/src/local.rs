use async_trait::async_trait;

use chatsync_sdk::{ApiError, MessageApi};
use chatsync_store::MemoryStore;
use chatsync_types::{ChatMessage, ChatRoom};

/// Sends straight into the in-memory store, standing in for the backend API.
pub struct LocalSender {
    store: MemoryStore,
}

impl LocalSender {
    pub fn new(store: MemoryStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl MessageApi for LocalSender {
    async fn send_message(
        &self,
        room: &ChatRoom,
        message: &ChatMessage,
    ) -> Result<ChatMessage, ApiError> {
        let collection = format!("chat-rooms/{}/messages", room.id);
        let stored = self
            .store
            .append_message(&collection, serde_json::to_value(message)?)
            .map_err(|e| ApiError::Rejected(e.to_string()))?;
        Ok(serde_json::from_value(stored)?)
    }
}
