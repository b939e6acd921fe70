use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use chatsync_types::{
    ChatMessage, ChatRoom, ExternalUser, GroupChannel, MessageChange, ServerReaction,
};

use crate::error::{RealtimeError, SourceError};
use crate::page::{self, CREATED_AT};
use crate::registry::{SubscriptionPurpose, SubscriptionRegistry};
use crate::source::{CollectionQuery, DocumentChange, RealtimeSource};
use crate::subscription::Subscription;

pub const CHAT_ROOMS_PATH: &str = "chat-rooms";
pub const GROUP_CHANNELS_PATH: &str = "group-channels";
pub const REACTIONS_PATH: &str = "reactions";

/// Which conversation an adapter is bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelScope {
    ChatRoom(String),
    GroupChannel(String),
}

impl ChannelScope {
    pub fn id(&self) -> &str {
        match self {
            Self::ChatRoom(id) | Self::GroupChannel(id) => id,
        }
    }

    /// Path of the configuration document.
    pub fn document_path(&self) -> String {
        match self {
            Self::ChatRoom(id) => format!("{}/{}", CHAT_ROOMS_PATH, id),
            Self::GroupChannel(id) => format!("{}/{}", GROUP_CHANNELS_PATH, id),
        }
    }

    pub fn messages_path(&self) -> String {
        format!("{}/messages", self.document_path())
    }
}

/// Realtime operations for a single channel.
///
/// Every listener opened through the adapter is recorded in its registry,
/// so [`unsubscribe_all`](Self::unsubscribe_all) detaches all of them.
pub struct RealtimeApi {
    source: Arc<dyn RealtimeSource>,
    scope: ChannelScope,
    registry: SubscriptionRegistry,
}

impl RealtimeApi {
    pub fn new(source: Arc<dyn RealtimeSource>, scope: ChannelScope) -> Self {
        Self {
            source,
            scope,
            registry: SubscriptionRegistry::new(),
        }
    }

    pub fn for_chat_room(source: Arc<dyn RealtimeSource>, room_id: impl Into<String>) -> Self {
        Self::new(source, ChannelScope::ChatRoom(room_id.into()))
    }

    pub fn for_group_channel(
        source: Arc<dyn RealtimeSource>,
        channel_id: impl Into<String>,
    ) -> Self {
        Self::new(source, ChannelScope::GroupChannel(channel_id.into()))
    }

    pub fn scope(&self) -> &ChannelScope {
        &self.scope
    }

    pub fn registry(&self) -> &SubscriptionRegistry {
        &self.registry
    }

    // -- History --

    /// Up to `limit` newest messages, oldest first.
    pub async fn fetch_recent(
        &self,
        limit: Option<u32>,
    ) -> Result<Vec<ChatMessage>, RealtimeError> {
        self.fetch_recent_since(limit, None).await
    }

    /// Like [`fetch_recent`](Self::fetch_recent), ignoring messages older
    /// than `last_cleared` (epoch millis) when set.
    pub async fn fetch_recent_since(
        &self,
        limit: Option<u32>,
        last_cleared: Option<i64>,
    ) -> Result<Vec<ChatMessage>, RealtimeError> {
        let mut query = CollectionQuery::new(self.scope.messages_path())
            .order_by(CREATED_AT, true)
            .limit(limit);
        if let Some(ts) = last_cleared {
            query = query.end_at(ts);
        }

        let newest_first = self.fetch_messages(&query).await?;
        debug!(
            "Fetched {} recent message(s) from {}",
            newest_first.len(),
            query.path
        );
        Ok(page::ascending(newest_first))
    }

    /// Up to `limit` messages older than `before`, oldest first. `before`
    /// itself is never part of the result.
    pub async fn fetch_previous(
        &self,
        before: &ChatMessage,
        limit: Option<u32>,
    ) -> Result<Vec<ChatMessage>, RealtimeError> {
        self.fetch_previous_since(before, limit, None).await
    }

    pub async fn fetch_previous_since(
        &self,
        before: &ChatMessage,
        limit: Option<u32>,
        last_cleared: Option<i64>,
    ) -> Result<Vec<ChatMessage>, RealtimeError> {
        let cursor = before.created_at.ok_or_else(|| {
            RealtimeError::Fetch(SourceError::InvalidQuery(
                "cursor message has no createdAt".into(),
            ))
        })?;

        let mut query = CollectionQuery::new(self.scope.messages_path())
            .order_by(CREATED_AT, true)
            .limit(page::previous_page_limit(limit))
            .start_at(cursor);
        if let Some(ts) = last_cleared {
            query = query.end_at(ts);
        }

        let mut messages = page::ascending(self.fetch_messages(&query).await?);
        page::trim_previous_page(&mut messages, before, limit);

        debug!(
            "Fetched {} message(s) before {} from {}",
            messages.len(),
            cursor,
            query.path
        );
        Ok(messages)
    }

    async fn fetch_messages(
        &self,
        query: &CollectionQuery,
    ) -> Result<Vec<ChatMessage>, RealtimeError> {
        let records = self
            .source
            .fetch_collection(query)
            .await
            .map_err(RealtimeError::Fetch)?;

        page::decode_page(records).map_err(|e| RealtimeError::Fetch(e.into()))
    }

    // -- Listeners --

    /// Continuous listen on the newest `limit` messages. The callback gets
    /// the whole current set, oldest first, on every change.
    pub fn listen_to_messages<F>(
        &self,
        callback: F,
        limit: Option<u32>,
    ) -> Result<Subscription, RealtimeError>
    where
        F: Fn(Vec<ChatMessage>) + Send + Sync + 'static,
    {
        let query = CollectionQuery::new(self.scope.messages_path())
            .order_by(CREATED_AT, true)
            .limit(limit);

        let subscription = self
            .source
            .listen_collection(
                query,
                Box::new(move |records: Vec<Value>| {
                    let newest_first: Vec<ChatMessage> = page::decode_snapshot(records);
                    callback(page::ascending(newest_first));
                }),
            )
            .map_err(RealtimeError::ListenSetup)?;

        Ok(self.track(SubscriptionPurpose::Messages, subscription))
    }

    /// Continuous listen on the channel's configuration document.
    pub fn listen_to_config_changes<F>(&self, callback: F) -> Result<Subscription, RealtimeError>
    where
        F: Fn(ChatRoom) + Send + Sync + 'static,
    {
        let path = self.scope.document_path();
        let subscription = self
            .source
            .listen_document(
                &path,
                Box::new(move |data: Value| match serde_json::from_value::<ChatRoom>(data) {
                    Ok(room) => callback(room),
                    Err(e) => warn!("Ignoring malformed chat room document: {}", e),
                }),
            )
            .map_err(RealtimeError::ListenSetup)?;

        info!("Watching config changes on {}", path);
        Ok(self.track(SubscriptionPurpose::ConfigChanges, subscription))
    }

    /// Continuous per-item listen on the message collection.
    pub fn listen_to_new_message<F>(&self, callback: F) -> Result<Subscription, RealtimeError>
    where
        F: Fn(MessageChange) + Send + Sync + 'static,
    {
        let query = CollectionQuery::new(self.scope.messages_path());
        let subscription = self
            .source
            .listen_collection_items(
                query,
                Box::new(move |change: DocumentChange| {
                    match serde_json::from_value::<ChatMessage>(change.data) {
                        Ok(message) => callback(MessageChange::new(change.kind, message)),
                        Err(e) => warn!("Ignoring malformed {:?} message: {}", change.kind, e),
                    }
                }),
            )
            .map_err(RealtimeError::ListenSetup)?;

        info!("Watching new messages on {}", self.scope.messages_path());
        Ok(self.track(SubscriptionPurpose::NewMessages, subscription))
    }

    /// Reactions `user` made in this channel.
    pub fn listen_to_user_reactions<F>(
        &self,
        user: &ExternalUser,
        callback: F,
    ) -> Result<Subscription, RealtimeError>
    where
        F: Fn(Vec<ServerReaction>) + Send + Sync + 'static,
    {
        let query = CollectionQuery::new(REACTIONS_PATH)
            .where_eq("userId", user.id.as_str())
            .where_eq("chatRoomId", self.scope.id());

        let subscription = self
            .source
            .listen_collection(
                query,
                Box::new(move |records: Vec<Value>| callback(page::decode_snapshot(records))),
            )
            .map_err(RealtimeError::ListenSetup)?;

        Ok(self.track(SubscriptionPurpose::UserReactions, subscription))
    }

    /// Group channels `user` is a member of.
    pub fn listen_to_user_group_channels<F>(
        &self,
        user: &ExternalUser,
        callback: F,
    ) -> Result<Subscription, RealtimeError>
    where
        F: Fn(Vec<GroupChannel>) + Send + Sync + 'static,
    {
        let query = CollectionQuery::new(GROUP_CHANNELS_PATH)
            .where_array_contains("members", user.id.as_str());

        let subscription = self
            .source
            .listen_collection(
                query,
                Box::new(move |records: Vec<Value>| callback(page::decode_snapshot(records))),
            )
            .map_err(RealtimeError::ListenSetup)?;

        Ok(self.track(SubscriptionPurpose::GroupChannels, subscription))
    }

    // -- Writes --

    pub async fn send_reaction(
        &self,
        reaction: &ServerReaction,
    ) -> Result<ServerReaction, RealtimeError> {
        let item =
            serde_json::to_value(reaction).map_err(|e| RealtimeError::ReactionSend(e.into()))?;

        let stored = self
            .source
            .add_item(REACTIONS_PATH, item)
            .await
            .map_err(RealtimeError::ReactionSend)?;

        serde_json::from_value(stored).map_err(|e| RealtimeError::ReactionSend(e.into()))
    }

    /// Detach every listener opened through this adapter.
    pub fn unsubscribe_all(&self) -> usize {
        self.registry.unsubscribe_all()
    }

    fn track(&self, purpose: SubscriptionPurpose, subscription: Subscription) -> Subscription {
        self.registry.register(purpose, &subscription);
        subscription
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::error::Error as _;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use serde_json::json;

    use chatsync_types::ChangeKind;

    use crate::source::{ChangeCallback, DocumentCallback, FilterOp, SnapshotCallback};

    /// Scripted source: fetches pop canned answers, listeners keep their
    /// callbacks so the test can push.
    #[derive(Default)]
    struct FakeSource {
        answers: Mutex<VecDeque<Result<Vec<Value>, SourceError>>>,
        queries: Mutex<Vec<CollectionQuery>>,
        snapshots: Mutex<Vec<(CollectionQuery, SnapshotCallback)>>,
        documents: Mutex<Vec<(String, DocumentCallback)>>,
        items: Mutex<Vec<ChangeCallback>>,
        detached: Arc<AtomicUsize>,
        fail_listen: bool,
        fail_add: bool,
    }

    impl FakeSource {
        fn answer(&self, records: Vec<Value>) {
            self.answers.lock().unwrap().push_back(Ok(records));
        }

        fn handle(&self) -> Subscription {
            let detached = self.detached.clone();
            Subscription::new(move || {
                detached.fetch_add(1, Ordering::SeqCst);
            })
        }

        fn last_query(&self) -> CollectionQuery {
            self.queries.lock().unwrap().last().cloned().unwrap()
        }
    }

    #[async_trait]
    impl RealtimeSource for FakeSource {
        async fn fetch_collection(
            &self,
            query: &CollectionQuery,
        ) -> Result<Vec<Value>, SourceError> {
            self.queries.lock().unwrap().push(query.clone());
            self.answers
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(Vec::new()))
        }

        async fn add_item(&self, _collection: &str, item: Value) -> Result<Value, SourceError> {
            if self.fail_add {
                return Err(SourceError::Transport("cannot set this doc".into()));
            }
            Ok(item)
        }

        fn listen_collection(
            &self,
            query: CollectionQuery,
            on_snapshot: SnapshotCallback,
        ) -> Result<Subscription, SourceError> {
            if self.fail_listen {
                return Err(SourceError::NoRuntime);
            }
            self.snapshots.lock().unwrap().push((query, on_snapshot));
            Ok(self.handle())
        }

        fn listen_document(
            &self,
            path: &str,
            on_change: DocumentCallback,
        ) -> Result<Subscription, SourceError> {
            if self.fail_listen {
                return Err(SourceError::NoRuntime);
            }
            self.documents.lock().unwrap().push((path.to_string(), on_change));
            Ok(self.handle())
        }

        fn listen_collection_items(
            &self,
            _query: CollectionQuery,
            on_change: ChangeCallback,
        ) -> Result<Subscription, SourceError> {
            if self.fail_listen {
                return Err(SourceError::NoRuntime);
            }
            self.items.lock().unwrap().push(on_change);
            Ok(self.handle())
        }
    }

    fn record(key: &str, created_at: i64) -> Value {
        json!({
            "createdAt": created_at,
            "key": key,
            "message": { "text": "testing" },
            "publisherId": "site-id",
            "sender": { "displayName": "Test User", "photoURL": "http://example.com" },
        })
    }

    fn keys(messages: &[ChatMessage]) -> Vec<String> {
        messages.iter().filter_map(|m| m.key.clone()).collect()
    }

    fn api(source: &Arc<FakeSource>) -> RealtimeApi {
        RealtimeApi::for_chat_room(source.clone(), "my-channel")
    }

    #[tokio::test]
    async fn fetch_recent_returns_oldest_first() {
        let source = Arc::new(FakeSource::default());
        source.answer((1..=5).rev().map(|t| record(&format!("t{}", t), t)).collect());

        let messages = api(&source).fetch_recent(Some(5)).await.unwrap();

        assert_eq!(keys(&messages), ["t1", "t2", "t3", "t4", "t5"]);
        let query = source.last_query();
        assert_eq!(query.path, "chat-rooms/my-channel/messages");
        assert_eq!(query.limit, Some(5));
        assert!(query.order_by[0].desc);
        assert!(query.start_at.is_none());
    }

    #[tokio::test]
    async fn fetch_previous_drops_the_cursor_message() {
        let source = Arc::new(FakeSource::default());
        let anchor: ChatMessage = serde_json::from_value(record("fake-key", 100)).unwrap();
        source.answer(vec![
            record("fake-key", 100),
            record("fake-key-1", 99),
            record("fake-key-2", 98),
            record("fake-key-3", 97),
        ]);

        let messages = api(&source).fetch_previous(&anchor, Some(3)).await.unwrap();

        assert_eq!(keys(&messages), ["fake-key-3", "fake-key-2", "fake-key-1"]);
        let query = source.last_query();
        assert_eq!(query.limit, Some(4));
        assert_eq!(query.start_at, Some(json!(100)));
    }

    #[tokio::test]
    async fn fetch_previous_honours_last_cleared() {
        let source = Arc::new(FakeSource::default());
        let anchor: ChatMessage = serde_json::from_value(record("a", 50)).unwrap();

        let api = RealtimeApi::for_group_channel(source.clone(), "group-1");
        api.fetch_previous_since(&anchor, Some(10), Some(20)).await.unwrap();

        let query = source.last_query();
        assert_eq!(query.path, "group-channels/group-1/messages");
        assert_eq!(query.end_at, Some(json!(20)));
    }

    #[tokio::test]
    async fn fetch_previous_without_cursor_timestamp_fails() {
        let source = Arc::new(FakeSource::default());
        let anchor = ChatMessage { key: Some("x".into()), ..Default::default() };

        let err = api(&source).fetch_previous(&anchor, Some(3)).await.unwrap_err();
        assert!(matches!(err, RealtimeError::Fetch(SourceError::InvalidQuery(_))));
        assert!(source.queries.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn fetch_error_keeps_its_cause() {
        let source = Arc::new(FakeSource::default());
        source
            .answers
            .lock()
            .unwrap()
            .push_back(Err(SourceError::Transport("deadline exceeded".into())));

        let err = api(&source).fetch_recent(Some(10)).await.unwrap_err();

        assert_eq!(err.to_string(), "failed to fetch documents");
        assert!(err.source().unwrap().to_string().contains("deadline exceeded"));
    }

    #[tokio::test]
    async fn malformed_record_fails_fetch() {
        let source = Arc::new(FakeSource::default());
        source.answer(vec![json!({ "createdAt": "not-a-number" })]);

        let err = api(&source).fetch_recent(None).await.unwrap_err();
        assert!(matches!(err.cause(), SourceError::Decode(_)));
    }

    #[test]
    fn listen_to_messages_delivers_full_set() {
        let source = Arc::new(FakeSource::default());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();

        api(&source)
            .listen_to_messages(move |messages| sink.lock().unwrap().push(messages.len()), Some(20))
            .unwrap();

        let snapshots = source.snapshots.lock().unwrap();
        let (query, callback) = &snapshots[0];
        assert_eq!(query.limit, Some(20));
        callback((0..20).map(|i| record(&format!("k{}", i), i)).collect());

        assert_eq!(*seen.lock().unwrap(), vec![20]);
    }

    #[test]
    fn config_listener_decodes_room() {
        let source = Arc::new(FakeSource::default());
        let seen = Arc::new(Mutex::new(None));
        let sink = seen.clone();

        api(&source)
            .listen_to_config_changes(move |room| *sink.lock().unwrap() = Some(room))
            .unwrap();

        let documents = source.documents.lock().unwrap();
        assert_eq!(documents[0].0, "chat-rooms/my-channel");
        (documents[0].1)(json!({ "_id": "new-chatroom", "slug": "crsl", "signUpRequired": true }));

        let room = seen.lock().unwrap().clone().unwrap();
        assert_eq!(room.id, "new-chatroom");
        assert!(room.sign_up_required);
    }

    #[test]
    fn new_message_listener_tags_changes() {
        let source = Arc::new(FakeSource::default());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();

        api(&source)
            .listen_to_new_message(move |change| sink.lock().unwrap().push(change))
            .unwrap();

        let items = source.items.lock().unwrap();
        items[0](DocumentChange { kind: ChangeKind::Added, data: record("fake-key", 1) });
        items[0](DocumentChange { kind: ChangeKind::Modified, data: json!({ "key": 7 }) });

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].kind, ChangeKind::Added);
        assert_eq!(seen[0].key(), Some("fake-key"));
    }

    #[test]
    fn user_reactions_are_filtered_by_user_and_room() {
        let source = Arc::new(FakeSource::default());
        let user = ExternalUser { id: "fake-user".into(), name: "Fake User".into(), image: None };
        let count = Arc::new(AtomicUsize::new(0));
        let sink = count.clone();

        api(&source)
            .listen_to_user_reactions(&user, move |reactions| {
                sink.store(reactions.len(), Ordering::SeqCst);
            })
            .unwrap();

        let snapshots = source.snapshots.lock().unwrap();
        let (query, callback) = &snapshots[0];
        assert_eq!(query.path, "reactions");
        assert_eq!(query.filters.len(), 2);
        assert_eq!(query.filters[0].value, json!("fake-user"));
        assert_eq!(query.filters[1].value, json!("my-channel"));

        let reaction = json!({
            "itemType": "chatMessage",
            "reaction": "love",
            "publisherId": "fake-site-id",
            "itemId": "fake-message-key",
            "chatRoomId": "my-channel",
            "userId": "fake-user",
        });
        callback(vec![reaction; 20]);
        assert_eq!(count.load(Ordering::SeqCst), 20);
    }

    #[test]
    fn group_channels_use_array_contains() {
        let source = Arc::new(FakeSource::default());
        let user = ExternalUser { id: "u1".into(), name: "U".into(), image: None };

        api(&source).listen_to_user_group_channels(&user, |_| {}).unwrap();

        let snapshots = source.snapshots.lock().unwrap();
        assert_eq!(snapshots[0].0.path, "group-channels");
        assert_eq!(snapshots[0].0.filters[0].op, FilterOp::ArrayContains);
    }

    #[test]
    fn listen_setup_failure_is_immediate() {
        let source = Arc::new(FakeSource { fail_listen: true, ..Default::default() });

        let err = api(&source).listen_to_new_message(|_| {}).unwrap_err();
        assert!(matches!(err, RealtimeError::ListenSetup(SourceError::NoRuntime)));
    }

    #[tokio::test]
    async fn reaction_failure_is_generic_but_keeps_cause() {
        let source = Arc::new(FakeSource { fail_add: true, ..Default::default() });
        let reaction = ServerReaction {
            item_type: "chatMessage".into(),
            item_id: "fake-message-key".into(),
            chat_room_id: "my-channel".into(),
            user_id: "fake-user-uid".into(),
            publisher_id: Some("fake-site-id".into()),
            reaction: "love".into(),
        };

        let err = api(&source).send_reaction(&reaction).await.unwrap_err();
        assert_eq!(err.to_string(), "failed");
        assert!(err.source().unwrap().to_string().contains("cannot set this doc"));
    }

    #[test]
    fn unsubscribe_all_detaches_each_listener_once() {
        let source = Arc::new(FakeSource::default());
        let api = api(&source);
        let user = ExternalUser { id: "u1".into(), name: "U".into(), image: None };

        api.listen_to_config_changes(|_| {}).unwrap();
        api.listen_to_new_message(|_| {}).unwrap();
        let reactions = api.listen_to_user_reactions(&user, |_| {}).unwrap();
        reactions.unsubscribe();

        assert_eq!(api.unsubscribe_all(), 2);
        assert_eq!(api.unsubscribe_all(), 0);
        assert_eq!(source.detached.load(Ordering::SeqCst), 3);
    }
}
