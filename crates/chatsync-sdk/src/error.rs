use thiserror::Error;

use chatsync_realtime::RealtimeError;

/// Failures of the message send API.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected HTTP status {0}")]
    Status(u16),

    #[error("server returned errors: {}", .0.join("; "))]
    GraphQl(Vec<String>),

    #[error("response carried no data")]
    MissingData,

    #[error("malformed response: {0}")]
    Decode(#[from] serde_json::Error),

    /// The send backend refused the message without an HTTP exchange.
    #[error("message rejected: {0}")]
    Rejected(String),
}

/// Errors surfaced by a [`Channel`](crate::Channel).
///
/// Messages name the channel or the text involved; the failure underneath is
/// available through [`std::error::Error::source`].
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("cannot use a channel without {0}")]
    MissingContext(&'static str),

    #[error("cannot send an empty message")]
    EmptyMessage,

    #[error("cannot send this message: \"{text}\"")]
    MessageSend {
        text: String,
        #[source]
        source: ApiError,
    },

    #[error("cannot load messages on \"{slug}\" channel")]
    HistoryLoad {
        slug: String,
        #[source]
        source: RealtimeError,
    },

    #[error("cannot watch messages on \"{slug}\" channel")]
    WatchSetup {
        slug: String,
        #[source]
        source: RealtimeError,
    },

    #[error("cannot listen to chat config changes")]
    ConfigWatch(#[source] RealtimeError),

    #[error("cannot send reaction")]
    ReactionSend(#[source] RealtimeError),
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("missing environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
}
