//! Client SDK for chatsync channels.
//!
//! A [`Channel`] binds to one chat room through an [`SdkContext`]: it keeps
//! the room configuration current, sends messages through a [`MessageApi`],
//! and pages through history while live changes keep the cached page fresh.

pub mod api;
pub mod channel;
pub mod config;
pub mod context;
pub mod error;
pub mod graphql;
pub mod pagination;

pub use api::MessageApi;
pub use channel::Channel;
pub use config::ChatConfig;
pub use context::SdkContext;
pub use error::{ApiError, ChannelError, ConfigError};
pub use graphql::GraphQlClient;
pub use pagination::{MessagePager, PageCache};
