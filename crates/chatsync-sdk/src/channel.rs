use std::sync::{Arc, PoisonError, RwLock};

use tracing::{debug, info};

use chatsync_realtime::{RealtimeApi, RealtimeError, Subscription};
use chatsync_types::{
    ChatMessage, ChatRoom, ExternalUser, MessageChange, MessageContent, MessageSender,
    ServerReaction, Site,
};

use crate::api::MessageApi;
use crate::context::SdkContext;
use crate::error::ChannelError;
use crate::pagination::MessagePager;

const REACTION_ITEM_TYPE: &str = "chatMessage";

/// A live session on one chat room.
///
/// The room configuration follows the config document for as long as the
/// channel is open. History loads go through a versioned page cache that
/// live changes also update; see [`crate::pagination`].
///
/// Every listener the channel opens is torn down by [`close`](Self::close),
/// which also runs on drop.
pub struct Channel {
    room: Arc<RwLock<ChatRoom>>,
    realtime: RealtimeApi,
    pager: Arc<MessagePager>,
    site: Site,
    user: Option<ExternalUser>,
    api: Arc<dyn MessageApi>,
}

impl Channel {
    pub fn new(room: ChatRoom, ctx: &SdkContext) -> Result<Self, ChannelError> {
        let site = ctx.site.clone().ok_or(ChannelError::MissingContext("a site"))?;
        if room.id.is_empty() {
            return Err(ChannelError::MissingContext("a chat room id"));
        }

        let realtime = RealtimeApi::for_chat_room(Arc::clone(&ctx.source), room.id.as_str());
        let room_id = room.id.clone();
        let room = Arc::new(RwLock::new(room));

        let target = Arc::clone(&room);
        realtime
            .listen_to_config_changes(move |next: ChatRoom| {
                debug!("Chat room {} configuration replaced", next.id);
                *target.write().unwrap_or_else(PoisonError::into_inner) = next;
            })
            .map_err(ChannelError::ConfigWatch)?;

        info!("Channel opened on chat room {}", room_id);
        Ok(Self {
            room,
            realtime,
            pager: Arc::new(MessagePager::new()),
            site,
            user: ctx.user.clone(),
            api: Arc::clone(&ctx.api),
        })
    }

    /// Send `text` as the bound user.
    pub async fn send_message(&self, text: &str) -> Result<ChatMessage, ChannelError> {
        if text.trim().is_empty() {
            return Err(ChannelError::EmptyMessage);
        }
        let user = self.user()?;

        let envelope = ChatMessage {
            message: MessageContent {
                text: Some(text.to_string()),
            },
            publisher_id: Some(self.site.id.clone()),
            sender: MessageSender {
                uid: Some(user.id.clone()),
                display_name: Some(user.name.clone()),
                photo_url: user.image.clone(),
            },
            ..Default::default()
        };

        let room = self.chat_room();
        self.api
            .send_message(&room, &envelope)
            .await
            .map_err(|source| ChannelError::MessageSend {
                text: text.to_string(),
                source,
            })
    }

    /// Newest `limit` messages, oldest first.
    pub async fn load_recent_messages(
        &self,
        limit: Option<u32>,
    ) -> Result<Vec<ChatMessage>, ChannelError> {
        self.pager
            .load_recent(&self.realtime, limit)
            .await
            .map_err(|source| self.history_error(source))
    }

    /// Up to `limit` messages older than the oldest loaded one, oldest first.
    /// Empty if nothing has been loaded yet.
    pub async fn load_previous_messages(
        &self,
        limit: Option<u32>,
    ) -> Result<Vec<ChatMessage>, ChannelError> {
        self.pager
            .load_previous(&self.realtime, limit)
            .await
            .map_err(|source| self.history_error(source))
    }

    /// Called once per added, modified or removed message. The change is
    /// applied to the cached page before `callback` sees it.
    pub fn watch_new_message<F>(&self, callback: F) -> Result<Subscription, ChannelError>
    where
        F: Fn(MessageChange) + Send + Sync + 'static,
    {
        let pager = Arc::clone(&self.pager);
        self.realtime
            .listen_to_new_message(move |change| {
                pager.apply_change(&change);
                callback(change);
            })
            .map_err(|source| self.watch_error(source))
    }

    /// Called with the newest `limit` messages, oldest first, on every change.
    pub fn watch_messages<F>(
        &self,
        limit: Option<u32>,
        callback: F,
    ) -> Result<Subscription, ChannelError>
    where
        F: Fn(Vec<ChatMessage>) + Send + Sync + 'static,
    {
        self.realtime
            .listen_to_messages(callback, limit)
            .map_err(|source| self.watch_error(source))
    }

    /// React to the message with key `message_key`.
    pub async fn send_reaction(
        &self,
        message_key: &str,
        reaction: &str,
    ) -> Result<ServerReaction, ChannelError> {
        let user = self.user()?;
        let reaction = ServerReaction {
            item_type: REACTION_ITEM_TYPE.to_string(),
            item_id: message_key.to_string(),
            chat_room_id: self.realtime.scope().id().to_string(),
            user_id: user.id.clone(),
            publisher_id: Some(self.site.id.clone()),
            reaction: reaction.to_string(),
        };

        self.realtime
            .send_reaction(&reaction)
            .await
            .map_err(ChannelError::ReactionSend)
    }

    /// Reactions the bound user made in this room.
    pub fn watch_user_reactions<F>(&self, callback: F) -> Result<Subscription, ChannelError>
    where
        F: Fn(Vec<ServerReaction>) + Send + Sync + 'static,
    {
        let user = self.user()?;
        self.realtime
            .listen_to_user_reactions(user, callback)
            .map_err(|source| self.watch_error(source))
    }

    /// Current room configuration.
    pub fn chat_room(&self) -> ChatRoom {
        self.room.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Copy of the last loaded page, including live changes applied since.
    pub fn cached_messages(&self) -> Vec<ChatMessage> {
        self.pager.messages()
    }

    /// Listeners opened by this channel that are still attached.
    pub fn active_subscriptions(&self) -> usize {
        self.realtime.registry().active_count()
    }

    /// Detach every listener. Safe to call more than once.
    pub fn close(&self) {
        let detached = self.realtime.unsubscribe_all();
        if detached > 0 {
            info!(
                "Channel on chat room {} closed, {} listener(s) detached",
                self.realtime.scope().id(),
                detached
            );
        }
    }

    fn user(&self) -> Result<&ExternalUser, ChannelError> {
        self.user.as_ref().ok_or(ChannelError::MissingContext("a user"))
    }

    fn slug(&self) -> String {
        self.room.read().unwrap_or_else(PoisonError::into_inner).slug.clone()
    }

    fn history_error(&self, source: RealtimeError) -> ChannelError {
        ChannelError::HistoryLoad {
            slug: self.slug(),
            source,
        }
    }

    fn watch_error(&self, source: RealtimeError) -> ChannelError {
        ChannelError::WatchSetup {
            slug: self.slug(),
            source,
        }
    }
}

impl Drop for Channel {
    fn drop(&mut self) {
        self.close();
    }
}
