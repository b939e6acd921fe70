use serde::{Deserialize, Serialize};

use crate::models::ChatMessage;

/// What happened to a document, as reported by a per-item listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Added,
    Modified,
    Removed,
}

/// A single live update on a message collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageChange {
    pub kind: ChangeKind,
    pub message: ChatMessage,
}

impl MessageChange {
    pub fn new(kind: ChangeKind, message: ChatMessage) -> Self {
        Self { kind, message }
    }

    pub fn key(&self) -> Option<&str> {
        self.message.key.as_deref()
    }
}
