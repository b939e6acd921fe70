//! Store-side types. Distinct from chatsync-types: the store only knows
//! collections of JSON documents, not chat semantics.

use anyhow::{Result, bail};
use serde_json::Value;

use chatsync_types::ChangeKind;

/// A write that listeners get told about.
#[derive(Debug, Clone)]
pub struct StoreChange {
    pub collection: String,
    pub id: String,
    pub kind: ChangeKind,
    /// Document content after the write; the last content for removals.
    pub data: Value,
}

/// `collection/id` split of a document path such as
/// `chat-rooms/r1/messages/m1`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentPath {
    pub collection: String,
    pub id: String,
}

impl DocumentPath {
    pub fn parse(path: &str) -> Result<Self> {
        let segments = segments(path)?;
        if segments.len() % 2 != 0 {
            bail!("'{}' is a collection path, not a document path", path);
        }

        let (collection, id) = path
            .trim_matches('/')
            .rsplit_once('/')
            .ok_or_else(|| anyhow::anyhow!("Invalid document path '{}'", path))?;

        Ok(Self {
            collection: collection.to_string(),
            id: id.to_string(),
        })
    }

    pub fn join(collection: &str, id: &str) -> String {
        format!("{}/{}", collection.trim_matches('/'), id)
    }
}

/// Check that `path` names a collection (odd number of segments) and return
/// it normalized.
pub fn collection_path(path: &str) -> Result<String> {
    let segments = segments(path)?;
    if segments.len() % 2 == 0 {
        bail!("'{}' is a document path, not a collection path", path);
    }
    Ok(segments.join("/"))
}

fn segments(path: &str) -> Result<Vec<&str>> {
    let segments: Vec<&str> = path.trim_matches('/').split('/').collect();
    if segments.iter().any(|s| s.is_empty()) {
        bail!("Invalid path '{}'", path);
    }
    Ok(segments)
}
