use async_trait::async_trait;

use chatsync_types::{ChatMessage, ChatRoom};

use crate::error::ApiError;

/// Outbound path for chat messages.
///
/// Sending goes through the backend API rather than the realtime source so
/// the server can moderate and stamp the message before it is published.
#[async_trait]
pub trait MessageApi: Send + Sync {
    /// Send `message` to `room` and return the message as persisted.
    async fn send_message(
        &self,
        room: &ChatRoom,
        message: &ChatMessage,
    ) -> Result<ChatMessage, ApiError>;
}
