use thiserror::Error;

/// Failures reported by a [`RealtimeSource`](crate::source::RealtimeSource)
/// implementation.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("malformed document: {0}")]
    Decode(#[from] serde_json::Error),

    /// Listeners are driven by tasks on the caller's async runtime.
    #[error("no async runtime available to drive the listener")]
    NoRuntime,

    #[error("invalid query: {0}")]
    InvalidQuery(String),
}

/// Adapter-level errors.
///
/// The display text is intentionally generic; the transport failure that
/// caused it stays reachable through [`std::error::Error::source`].
#[derive(Debug, Error)]
pub enum RealtimeError {
    #[error("failed to fetch documents")]
    Fetch(#[source] SourceError),

    #[error("failed to open listener")]
    ListenSetup(#[source] SourceError),

    #[error("failed")]
    ReactionSend(#[source] SourceError),
}

impl RealtimeError {
    /// The underlying transport failure.
    pub fn cause(&self) -> &SourceError {
        match self {
            Self::Fetch(e) | Self::ListenSetup(e) | Self::ReactionSend(e) => e,
        }
    }
}
