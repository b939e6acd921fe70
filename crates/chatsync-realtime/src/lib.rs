//! Realtime plumbing for chatsync.
//!
//! [`RealtimeSource`] is the seam to the document store that pushes changes.
//! [`RealtimeApi`] wraps a source for one channel: history fetches with
//! page normalization, typed listeners, and a [`SubscriptionRegistry`] that
//! tears every listener down in one call.

pub mod api;
pub mod error;
pub mod page;
pub mod registry;
pub mod source;
pub mod subscription;

pub use api::{ChannelScope, RealtimeApi};
pub use error::{RealtimeError, SourceError};
pub use registry::{SubscriptionPurpose, SubscriptionRegistry};
pub use source::{
    ChangeCallback, CollectionQuery, DocumentCallback, DocumentChange, Filter, FilterOp, OrderBy,
    RealtimeSource, SnapshotCallback,
};
pub use subscription::Subscription;
