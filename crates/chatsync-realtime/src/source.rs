use async_trait::async_trait;
use serde_json::Value;

use chatsync_types::ChangeKind;

use crate::error::SourceError;
use crate::subscription::Subscription;

/// Invoked with the full result set of a collection query.
pub type SnapshotCallback = Box<dyn Fn(Vec<Value>) + Send + Sync>;

/// Invoked with the latest content of a single document.
pub type DocumentCallback = Box<dyn Fn(Value) + Send + Sync>;

/// Invoked once per document that changed in a collection.
pub type ChangeCallback = Box<dyn Fn(DocumentChange) + Send + Sync>;

#[derive(Debug, Clone, PartialEq)]
pub struct DocumentChange {
    pub kind: ChangeKind,
    pub data: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Equal,
    ArrayContains,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub field: String,
    pub op: FilterOp,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub field: String,
    pub desc: bool,
}

/// Query over one collection.
///
/// `start_at` and `end_at` are inclusive cursors on the first `order_by`
/// field, read in the direction of that ordering: with a descending order,
/// `start_at` is the upper bound and `end_at` the lower bound.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollectionQuery {
    pub path: String,
    pub filters: Vec<Filter>,
    pub order_by: Vec<OrderBy>,
    pub limit: Option<u32>,
    pub start_at: Option<Value>,
    pub end_at: Option<Value>,
}

impl CollectionQuery {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn where_eq(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.filters.push(Filter {
            field: field.to_string(),
            op: FilterOp::Equal,
            value: value.into(),
        });
        self
    }

    pub fn where_array_contains(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.filters.push(Filter {
            field: field.to_string(),
            op: FilterOp::ArrayContains,
            value: value.into(),
        });
        self
    }

    pub fn order_by(mut self, field: &str, desc: bool) -> Self {
        self.order_by.push(OrderBy {
            field: field.to_string(),
            desc,
        });
        self
    }

    pub fn limit(mut self, limit: Option<u32>) -> Self {
        self.limit = limit;
        self
    }

    pub fn start_at(mut self, cursor: impl Into<Value>) -> Self {
        self.start_at = Some(cursor.into());
        self
    }

    pub fn end_at(mut self, cursor: impl Into<Value>) -> Self {
        self.end_at = Some(cursor.into());
        self
    }
}

/// The real-time document store the SDK reads from.
///
/// Listener setup is synchronous: an implementation must either return a
/// live [`Subscription`] or fail right away, never hand back a listener that
/// silently never fires. Detaching through the returned handle must be
/// idempotent.
#[async_trait]
pub trait RealtimeSource: Send + Sync {
    /// One-shot query.
    async fn fetch_collection(&self, query: &CollectionQuery) -> Result<Vec<Value>, SourceError>;

    /// Append a document to `collection`, returning it as stored.
    async fn add_item(&self, collection: &str, item: Value) -> Result<Value, SourceError>;

    /// Continuous query. The callback receives the full result set on every
    /// change, starting with the current one.
    fn listen_collection(
        &self,
        query: CollectionQuery,
        on_snapshot: SnapshotCallback,
    ) -> Result<Subscription, SourceError>;

    /// Continuous single-document listen. The callback receives the current
    /// document (if it exists) and every later version of it.
    fn listen_document(
        &self,
        path: &str,
        on_change: DocumentCallback,
    ) -> Result<Subscription, SourceError>;

    /// Continuous per-item listen on the collection named by `query.path`.
    /// Only changes made after the listener was opened are reported.
    fn listen_collection_items(
        &self,
        query: CollectionQuery,
        on_change: ChangeCallback,
    ) -> Result<Subscription, SourceError>;
}
