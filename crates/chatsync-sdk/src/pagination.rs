//! Page cache behind a channel's history loads.
//!
//! Loads and live changes race: a fetch can be in flight while a listener
//! task pushes a change. The cache carries a version that every commit and
//! every live change that alters the cached page bumps. A load remembers the
//! version it started from and only commits when nothing was written in
//! between; otherwise its page is handed back to the caller and the cache
//! keeps the newer state.

use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::debug;

use chatsync_realtime::{RealtimeApi, RealtimeError};
use chatsync_types::{ChangeKind, ChatMessage, MessageChange};

/// The last page of messages a channel loaded, oldest first.
#[derive(Debug, Clone, Default)]
pub struct PageCache {
    messages: Vec<ChatMessage>,
    version: u64,
    /// Whether `messages` ends at the newest message of the channel
    at_tail: bool,
    /// Page size of the last load; live additions past it push out the
    /// oldest messages
    capacity: Option<usize>,
}

impl PageCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn is_tail(&self) -> bool {
        self.at_tail
    }

    /// Oldest cached message; previous pages are fetched relative to it.
    pub fn anchor(&self) -> Option<&ChatMessage> {
        self.messages.first()
    }

    /// Replace the cached page with `page`, loaded with `limit`, if the cache
    /// is still at version `seen`. Returns whether the page was stored.
    pub fn commit(
        &mut self,
        seen: u64,
        page: Vec<ChatMessage>,
        at_tail: bool,
        limit: Option<u32>,
    ) -> bool {
        if self.version != seen {
            return false;
        }
        self.messages = page;
        self.at_tail = at_tail;
        self.capacity = limit.map(|l| l as usize);
        self.version += 1;
        true
    }

    /// Fold a live change into the cached page. Returns whether the page
    /// changed; only then is the version bumped.
    pub fn apply_change(&mut self, change: &MessageChange) -> bool {
        let message = &change.message;
        let changed = match change.kind {
            ChangeKind::Added => {
                let seen = self.messages.iter().any(|m| m.same_key(message));
                if self.at_tail && !seen {
                    let at = self
                        .messages
                        .partition_point(|m| m.created_at <= message.created_at);
                    self.messages.insert(at, message.clone());
                    self.enforce_capacity();
                    true
                } else {
                    false
                }
            }
            ChangeKind::Modified => {
                match self.messages.iter_mut().find(|m| m.same_key(message)) {
                    Some(slot) => {
                        *slot = message.clone();
                        true
                    }
                    None => false,
                }
            }
            ChangeKind::Removed => {
                let before = self.messages.len();
                self.messages.retain(|m| !m.same_key(message));
                self.messages.len() != before
            }
        };
        if changed {
            self.version += 1;
        }
        changed
    }

    fn enforce_capacity(&mut self) {
        if let Some(capacity) = self.capacity {
            if self.messages.len() > capacity {
                let excess = self.messages.len() - capacity;
                self.messages.drain(..excess);
            }
        }
    }
}

/// Loads history pages for one channel and keeps the [`PageCache`].
#[derive(Debug, Default)]
pub struct MessagePager {
    cache: Mutex<PageCache>,
}

impl MessagePager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Newest `limit` messages, oldest first. Becomes the cached page.
    pub async fn load_recent(
        &self,
        api: &RealtimeApi,
        limit: Option<u32>,
    ) -> Result<Vec<ChatMessage>, RealtimeError> {
        let seen = self.cache().version();
        let page = api.fetch_recent(limit).await?;
        self.store(seen, &page, true, limit);
        Ok(page)
    }

    /// Up to `limit` messages before the oldest cached one, oldest first.
    /// With nothing cached there is no anchor and the page is empty.
    pub async fn load_previous(
        &self,
        api: &RealtimeApi,
        limit: Option<u32>,
    ) -> Result<Vec<ChatMessage>, RealtimeError> {
        let (seen, anchor) = {
            let cache = self.cache();
            (cache.version(), cache.anchor().cloned())
        };
        let Some(anchor) = anchor else {
            debug!("No cached messages to page back from");
            return Ok(Vec::new());
        };

        let page = api.fetch_previous(&anchor, limit).await?;
        self.store(seen, &page, false, limit);
        Ok(page)
    }

    pub fn apply_change(&self, change: &MessageChange) -> bool {
        self.cache().apply_change(change)
    }

    /// Copy of the cached page.
    pub fn messages(&self) -> Vec<ChatMessage> {
        self.cache().messages().to_vec()
    }

    pub fn version(&self) -> u64 {
        self.cache().version()
    }

    fn store(&self, seen: u64, page: &[ChatMessage], at_tail: bool, limit: Option<u32>) {
        let mut cache = self.cache();
        if !cache.commit(seen, page.to_vec(), at_tail, limit) {
            debug!(
                "Discarding stale page of {} message(s): cache moved from version {} to {}",
                page.len(),
                seen,
                cache.version()
            );
        }
    }

    fn cache(&self) -> MutexGuard<'_, PageCache> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
