use chatsync_types::{ChatRoom, ExternalUser, Site};

use crate::error::ConfigError;

pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Session settings read from `CHATSYNC_*` environment variables.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatConfig {
    pub room_id: String,
    pub room_slug: String,
    pub site_id: String,
    pub user: Option<ExternalUser>,
    pub page_size: u32,
    /// GraphQL endpoint used for sending; unset means no remote API
    pub api_url: Option<String>,
    pub api_token: Option<String>,
}

impl ChatConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let room_id = get("CHATSYNC_ROOM_ID").ok_or(ConfigError::Missing("CHATSYNC_ROOM_ID"))?;
        let site_id = get("CHATSYNC_SITE_ID").ok_or(ConfigError::Missing("CHATSYNC_SITE_ID"))?;
        let room_slug = get("CHATSYNC_ROOM_SLUG").unwrap_or_else(|| room_id.clone());

        let page_size = match get("CHATSYNC_PAGE_SIZE") {
            Some(raw) => match raw.parse::<u32>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(ConfigError::Invalid {
                        name: "CHATSYNC_PAGE_SIZE",
                        value: raw,
                    });
                }
            },
            None => DEFAULT_PAGE_SIZE,
        };

        let user = get("CHATSYNC_USER_ID").map(|id| ExternalUser {
            name: get("CHATSYNC_USER_NAME").unwrap_or_else(|| id.clone()),
            image: get("CHATSYNC_USER_IMAGE"),
            id,
        });

        Ok(Self {
            room_id,
            room_slug,
            site_id,
            user,
            page_size,
            api_url: get("CHATSYNC_API_URL"),
            api_token: get("CHATSYNC_API_TOKEN"),
        })
    }

    pub fn site(&self) -> Site {
        Site {
            id: self.site_id.clone(),
            display_name: None,
        }
    }

    /// Descriptor to open the configured room with.
    pub fn room(&self) -> ChatRoom {
        ChatRoom {
            site_id: Some(self.site_id.clone()),
            ..ChatRoom::descriptor(&self.room_id, &self.room_slug)
        }
    }
}
