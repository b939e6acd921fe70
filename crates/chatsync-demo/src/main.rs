mod local;

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tracing::{info, warn};

use chatsync_sdk::{Channel, ChatConfig, GraphQlClient, MessageApi, SdkContext};
use chatsync_store::MemoryStore;

use crate::local::LocalSender;

const HISTORY_SIZE: usize = 45;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chatsync=debug".into()),
        )
        .init();

    // Config, with demo defaults for anything unset
    let config =
        ChatConfig::from_lookup(|name| std::env::var(name).ok().or_else(|| demo_default(name)))?;

    // Seed a room with some history
    let store = MemoryStore::open()?;
    let messages_path = format!("chat-rooms/{}/messages", config.room_id);
    store.set_document(
        &format!("chat-rooms/{}", config.room_id),
        json!({
            "_id": config.room_id,
            "slug": config.room_slug,
            "name": "Demo room",
            "siteId": config.site_id,
            "reactionsEnabled": true,
        }),
    )?;
    for n in 1..=HISTORY_SIZE {
        store.append_message(
            &messages_path,
            json!({
                "message": { "text": format!("history message {}", n) },
                "publisherId": config.site_id,
                "sender": { "uid": "bot", "displayName": "History Bot" },
            }),
        )?;
    }

    let api: Arc<dyn MessageApi> = match &config.api_url {
        Some(url) => {
            info!("Sending through GraphQL endpoint {}", url);
            let client = GraphQlClient::new(url.as_str());
            Arc::new(match &config.api_token {
                Some(token) => client.with_token(token.as_str()),
                None => client,
            })
        }
        None => Arc::new(LocalSender::new(store.clone())),
    };

    let mut ctx = SdkContext::new(Arc::new(store.clone()), api).with_site(config.site());
    if let Some(user) = config.user.clone() {
        ctx = ctx.with_user(user);
    }

    let channel = Channel::new(config.room(), &ctx)?;
    let _live = channel.watch_new_message(|change| {
        info!(
            "Live {:?}: {}",
            change.kind,
            change.message.text().unwrap_or_default()
        );
    })?;

    // Page through the whole history
    let recent = channel.load_recent_messages(Some(config.page_size)).await?;
    info!("Loaded {} recent message(s)", recent.len());
    loop {
        let older = channel.load_previous_messages(Some(config.page_size)).await?;
        if older.is_empty() {
            break;
        }
        info!(
            "Loaded {} older message(s), starting at {:?}",
            older.len(),
            older.first().and_then(|m| m.timestamp())
        );
    }

    // The history walk left the cache at the start; go back to the tail
    channel.load_recent_messages(Some(config.page_size)).await?;

    match channel.send_message("Hello from the chatsync demo").await {
        Ok(sent) => {
            if let Some(key) = sent.key.as_deref() {
                let reaction = channel.send_reaction(key, "love").await?;
                info!("Reacted {} to {}", reaction.reaction, reaction.item_id);
            }
        }
        Err(e) => warn!("Send failed: {}", e),
    }

    // Room settings change mid-session
    store.set_document(
        &format!("chat-rooms/{}", config.room_id),
        json!({ "_id": config.room_id, "slug": format!("{}-renamed", config.room_slug) }),
    )?;

    tokio::time::sleep(Duration::from_millis(200)).await;
    info!(
        "Room is now {:?}; {} message(s) cached",
        channel.chat_room().slug,
        channel.cached_messages().len()
    );

    channel.close();
    Ok(())
}

fn demo_default(name: &str) -> Option<String> {
    let value = match name {
        "CHATSYNC_ROOM_ID" => "demo-room",
        "CHATSYNC_ROOM_SLUG" => "demo",
        "CHATSYNC_SITE_ID" => "demo-site",
        "CHATSYNC_USER_ID" => "demo-user",
        "CHATSYNC_USER_NAME" => "Demo User",
        _ => return None,
    };
    Some(value.to_string())
}
