use std::future::Future;
use std::sync::Weak;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

use chatsync_realtime::{
    ChangeCallback, CollectionQuery, DocumentCallback, DocumentChange, RealtimeSource,
    SnapshotCallback, SourceError, Subscription,
};
use chatsync_types::ChangeKind;

use crate::models::{DocumentPath, collection_path};
use crate::queries::build_select;
use crate::{MemoryStore, StoreInner};

fn backend(e: anyhow::Error) -> SourceError {
    SourceError::Backend(e.into())
}

#[async_trait]
impl RealtimeSource for MemoryStore {
    async fn fetch_collection(&self, query: &CollectionQuery) -> Result<Vec<Value>, SourceError> {
        self.query(query).map_err(backend)
    }

    async fn add_item(&self, collection: &str, item: Value) -> Result<Value, SourceError> {
        self.add_document(collection, item)
            .map(|(_, data)| data)
            .map_err(backend)
    }

    fn listen_collection(
        &self,
        query: CollectionQuery,
        on_snapshot: SnapshotCallback,
    ) -> Result<Subscription, SourceError> {
        // Reject bad queries now rather than inside the task
        build_select(&query).map_err(|e| SourceError::InvalidQuery(e.to_string()))?;
        let collection = collection_path(&query.path)
            .map_err(|e| SourceError::InvalidQuery(e.to_string()))?;

        let mut changes = self.subscribe();
        let store = self.downgrade();

        self.spawn_listener(async move {
            if !deliver_snapshot(&store, &query, &on_snapshot) {
                return;
            }
            loop {
                match changes.recv().await {
                    Ok(change) if change.collection == collection => {}
                    Ok(_) => continue,
                    Err(RecvError::Lagged(n)) => {
                        warn!("Listener on {} lagged by {} change(s), re-querying", query.path, n);
                    }
                    Err(RecvError::Closed) => break,
                }
                if !deliver_snapshot(&store, &query, &on_snapshot) {
                    break;
                }
            }
            debug!("Collection listener on {} finished", query.path);
        })
    }

    fn listen_document(
        &self,
        path: &str,
        on_change: DocumentCallback,
    ) -> Result<Subscription, SourceError> {
        let path = DocumentPath::parse(path).map_err(|e| SourceError::InvalidQuery(e.to_string()))?;

        let mut changes = self.subscribe();
        let store = self.downgrade();

        self.spawn_listener(async move {
            if !deliver_document(&store, &path, &on_change) {
                return;
            }
            loop {
                match changes.recv().await {
                    Ok(change) if change.collection == path.collection && change.id == path.id => {
                        if change.kind != ChangeKind::Removed {
                            on_change(change.data);
                        }
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(n)) => {
                        warn!(
                            "Listener on {}/{} lagged by {} change(s), re-reading",
                            path.collection, path.id, n
                        );
                        if !deliver_document(&store, &path, &on_change) {
                            break;
                        }
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }

    fn listen_collection_items(
        &self,
        query: CollectionQuery,
        on_change: ChangeCallback,
    ) -> Result<Subscription, SourceError> {
        let collection = collection_path(&query.path)
            .map_err(|e| SourceError::InvalidQuery(e.to_string()))?;

        let mut changes = self.subscribe();

        self.spawn_listener(async move {
            loop {
                match changes.recv().await {
                    Ok(change) if change.collection == collection => {
                        on_change(DocumentChange {
                            kind: change.kind,
                            data: change.data,
                        });
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(n)) => {
                        // Per-item changes can't be recovered by re-reading
                        warn!("Item listener on {} dropped {} change(s)", collection, n);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }
}

impl MemoryStore {
    /// Run `task` on the current tokio runtime; the returned handle aborts it.
    fn spawn_listener<F>(&self, task: F) -> Result<Subscription, SourceError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| SourceError::NoRuntime)?;
        let handle = runtime.spawn(task);
        Ok(Subscription::new(move || handle.abort()))
    }
}

/// Returns false once the store is gone.
fn deliver_snapshot(
    store: &Weak<StoreInner>,
    query: &CollectionQuery,
    on_snapshot: &SnapshotCallback,
) -> bool {
    let Some(inner) = store.upgrade() else {
        return false;
    };
    let result = MemoryStore::from_inner(inner).query(query);
    match result {
        Ok(records) => on_snapshot(records),
        Err(e) => warn!("Listener query on {} failed: {}", query.path, e),
    }
    true
}

fn deliver_document(
    store: &Weak<StoreInner>,
    path: &DocumentPath,
    on_change: &DocumentCallback,
) -> bool {
    let Some(inner) = store.upgrade() else {
        return false;
    };
    let store = MemoryStore::from_inner(inner);
    match store.get_document(&DocumentPath::join(&path.collection, &path.id)) {
        Ok(Some(data)) => on_change(data),
        Ok(None) => {}
        Err(e) => warn!("Listener read of {}/{} failed: {}", path.collection, path.id, e),
    }
    true
}
