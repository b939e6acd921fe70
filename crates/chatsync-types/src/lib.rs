//! Shared data model for chatsync: room configuration, messages, reactions
//! and live change events. Everything here maps one-to-one onto the
//! camelCase JSON documents held by the realtime source.

pub mod events;
pub mod models;

pub use events::{ChangeKind, MessageChange};
pub use models::{
    ChatMessage, ChatRoom, ExternalUser, GroupChannel, MessageContent, MessageSender,
    ServerReaction, SignUpSettings, Site,
};
