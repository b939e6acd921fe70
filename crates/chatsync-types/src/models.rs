use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Authenticated site the SDK is bound to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Site {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

/// Authenticated end user. Supplied by the host application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalUser {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SignUpSettings {
    #[serde(default)]
    pub suggest: bool,
    #[serde(default, rename = "type")]
    pub kind: String,
}

/// Configuration document of a chat room.
///
/// Pushed by the realtime source whenever the room settings change. A new
/// snapshot always replaces the previous one; absent fields fall back to
/// their defaults rather than keeping stale values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ChatRoom {
    #[serde(rename = "_id")]
    pub id: String,
    pub slug: String,
    pub name: String,
    pub site_id: Option<String>,
    pub allow_send_gifs: bool,
    pub allow_share_urls: bool,
    pub chat_auto_open: bool,
    pub chat_closed_is_enabled: bool,
    pub chat_pre_moderation_is_enabled: bool,
    pub chat_preview_enabled: bool,
    pub chat_request_moderator_is_enabled: bool,
    pub reactions_enabled: bool,
    pub show_online_users_number: bool,
    pub sign_up_required: bool,
    pub sign_up_settings: Option<SignUpSettings>,
    pub standalone: bool,
    pub lang: Option<String>,
    pub language: Option<String>,
    pub presence_id: Option<String>,
    pub created_at: Option<i64>,
}

impl ChatRoom {
    /// Minimal descriptor used to bind a channel before the full
    /// configuration document has been received.
    pub fn descriptor(id: impl Into<String>, slug: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            slug: slug.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageSender {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, rename = "photoURL", skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
}

/// A chat message as stored in a room's message collection.
///
/// `created_at` (epoch milliseconds) is assigned by the store and is the
/// ordering key for pagination. Outgoing envelopes leave it and `key` unset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default)]
    pub message: MessageContent,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publisher_id: Option<String>,
    #[serde(default)]
    pub sender: MessageSender,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_message: Option<String>,
}

impl ChatMessage {
    pub fn text(&self) -> Option<&str> {
        self.message.text.as_deref()
    }

    /// `created_at` as a UTC timestamp, if set and in range.
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.created_at.and_then(DateTime::from_timestamp_millis)
    }

    /// True if both messages carry a key and the keys are equal.
    pub fn same_key(&self, other: &ChatMessage) -> bool {
        matches!((&self.key, &other.key), (Some(a), Some(b)) if a == b)
    }
}

/// A reaction to an item (usually a chat message). Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerReaction {
    pub item_type: String,
    pub item_id: String,
    pub chat_room_id: String,
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publisher_id: Option<String>,
    pub reaction: String,
}

/// Private conversation between a fixed set of members.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GroupChannel {
    #[serde(rename = "_id")]
    pub id: String,
    pub members: Vec<String>,
    pub created_at: Option<i64>,
    pub last_message: Option<ChatMessage>,
}
