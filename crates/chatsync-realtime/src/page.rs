//! Page boundary arithmetic.
//!
//! The store answers history queries newest-first; pages handed to callers
//! are oldest-first. A "previous" query is anchored on the oldest message the
//! caller already has, and since the cursor is inclusive that message comes
//! back with the page and has to be cut out again.

use serde_json::Value;
use tracing::warn;

use chatsync_types::ChatMessage;

/// Field every message collection is ordered and paginated by.
pub const CREATED_AT: &str = "createdAt";

/// Decode a one-shot query result. A single malformed record fails the page.
pub fn decode_page(records: Vec<Value>) -> Result<Vec<ChatMessage>, serde_json::Error> {
    records.into_iter().map(serde_json::from_value).collect()
}

/// Decode a listener snapshot, skipping records that don't parse.
pub fn decode_snapshot<T: serde::de::DeserializeOwned>(records: Vec<Value>) -> Vec<T> {
    records
        .into_iter()
        .filter_map(|record| match serde_json::from_value(record) {
            Ok(item) => Some(item),
            Err(e) => {
                warn!("Skipping malformed record in snapshot: {}", e);
                None
            }
        })
        .collect()
}

/// Turn a newest-first page into the oldest-first order callers see.
pub fn ascending(mut newest_first: Vec<ChatMessage>) -> Vec<ChatMessage> {
    newest_first.reverse();
    newest_first
}

/// Limit to request for a previous page: one extra slot for the anchor,
/// which the inclusive cursor matches again.
pub fn previous_page_limit(limit: Option<u32>) -> Option<u32> {
    limit.map(|l| l.saturating_add(1))
}

/// Remove the anchor from an ascending previous page and cap it at `limit`.
///
/// The anchor is matched by key. An anchor without a key can only be
/// recognised by position, so the newest element is dropped instead. When
/// more than `limit` messages remain (the anchor was not in the result), the
/// oldest extras go so the page stays adjacent to the anchor.
pub fn trim_previous_page(page: &mut Vec<ChatMessage>, anchor: &ChatMessage, limit: Option<u32>) {
    if anchor.key.is_some() {
        page.retain(|m| !m.same_key(anchor));
    } else {
        page.pop();
    }

    if let Some(limit) = limit {
        let limit = limit as usize;
        if page.len() > limit {
            let excess = page.len() - limit;
            page.drain(..excess);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(key: &str, created_at: i64) -> ChatMessage {
        ChatMessage {
            key: Some(key.to_string()),
            created_at: Some(created_at),
            ..Default::default()
        }
    }

    fn keys(page: &[ChatMessage]) -> Vec<&str> {
        page.iter().filter_map(|m| m.key.as_deref()).collect()
    }

    #[test]
    fn ascending_reverses_store_order() {
        let page = ascending(vec![
            msg("t5", 5),
            msg("t4", 4),
            msg("t3", 3),
            msg("t2", 2),
            msg("t1", 1),
        ]);
        assert_eq!(keys(&page), ["t1", "t2", "t3", "t4", "t5"]);
    }

    #[test]
    fn previous_limit_reserves_anchor_slot() {
        assert_eq!(previous_page_limit(Some(3)), Some(4));
        assert_eq!(previous_page_limit(None), None);
        assert_eq!(previous_page_limit(Some(u32::MAX)), Some(u32::MAX));
    }

    #[test]
    fn trim_removes_anchor_at_the_end() {
        let anchor = msg("a", 10);
        let mut page = ascending(vec![msg("a", 10), msg("b", 9), msg("c", 8), msg("d", 7)]);

        trim_previous_page(&mut page, &anchor, Some(3));
        assert_eq!(keys(&page), ["d", "c", "b"]);
    }

    #[test]
    fn trim_caps_page_when_anchor_is_missing() {
        // Anchor was deleted between loads; all four results are older.
        let anchor = msg("gone", 10);
        let mut page = ascending(vec![msg("b", 9), msg("c", 8), msg("d", 7), msg("e", 6)]);

        trim_previous_page(&mut page, &anchor, Some(3));
        assert_eq!(keys(&page), ["d", "c", "b"]);
    }

    #[test]
    fn trim_without_anchor_key_pops_newest() {
        let anchor = ChatMessage { created_at: Some(10), ..Default::default() };
        let mut page = vec![msg("c", 8), msg("b", 9), anchor.clone()];

        trim_previous_page(&mut page, &anchor, None);
        assert_eq!(keys(&page), ["c", "b"]);
    }

    #[test]
    fn trim_of_lone_anchor_is_empty() {
        let anchor = msg("a", 1);
        let mut page = vec![msg("a", 1)];

        trim_previous_page(&mut page, &anchor, Some(5));
        assert!(page.is_empty());
    }

    #[test]
    fn malformed_snapshot_records_are_skipped() {
        let records = vec![
            serde_json::json!({ "key": "ok", "createdAt": 1 }),
            serde_json::json!({ "key": 42 }),
        ];
        let decoded: Vec<ChatMessage> = decode_snapshot(records);
        assert_eq!(keys(&decoded), ["ok"]);
    }

    #[test]
    fn malformed_page_record_fails_the_page() {
        let records = vec![serde_json::json!({ "createdAt": "yesterday" })];
        assert!(decode_page(records).is_err());
    }
}
