//! In-process realtime document store.
//!
//! Collections of JSON documents live in an in-memory SQLite database;
//! every write is broadcast so listeners can re-run their queries. The store
//! implements [`chatsync_realtime::RealtimeSource`] and backs the SDK's
//! tests and the demo binary. Nothing is ever written to disk.

pub mod migrations;
pub mod models;
pub mod queries;
pub mod source;

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use rusqlite::Connection;
use tokio::sync::broadcast;
use tracing::info;

pub use models::{DocumentPath, StoreChange};

const CHANGE_CAPACITY: usize = 1024;

/// Cloneable handle to one in-memory store.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<StoreInner>,
}

pub(crate) struct StoreInner {
    conn: Mutex<Connection>,
    /// Every committed write, in commit order
    changes: broadcast::Sender<StoreChange>,
    /// Last timestamp handed out by `next_timestamp`
    clock: AtomicI64,
}

impl MemoryStore {
    pub fn open() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        migrations::run(&conn)?;

        let (changes, _) = broadcast::channel(CHANGE_CAPACITY);

        info!("In-memory document store opened");
        Ok(Self {
            inner: Arc::new(StoreInner {
                conn: Mutex::new(conn),
                changes,
                clock: AtomicI64::new(0),
            }),
        })
    }

    pub fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        self.inner.with_conn(f)
    }

    /// Receive every write committed from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.inner.changes.subscribe()
    }

    /// Strictly increasing epoch-millisecond timestamp, close to wall time.
    pub fn next_timestamp(&self) -> i64 {
        let now = chrono::Utc::now().timestamp_millis();
        let mut last = self.inner.clock.load(Ordering::Relaxed);
        loop {
            let next = now.max(last + 1);
            match self
                .inner
                .clock
                .compare_exchange_weak(last, next, Ordering::AcqRel, Ordering::Relaxed)
            {
                Ok(_) => return next,
                Err(current) => last = current,
            }
        }
    }

    fn publish(&self, change: StoreChange) {
        // No receivers is fine
        let _ = self.inner.changes.send(change);
    }

    pub(crate) fn downgrade(&self) -> std::sync::Weak<StoreInner> {
        Arc::downgrade(&self.inner)
    }

    pub(crate) fn from_inner(inner: Arc<StoreInner>) -> Self {
        Self { inner }
    }
}

impl StoreInner {
    fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| anyhow::anyhow!("Store lock poisoned: {}", e))?;
        f(&conn)
    }
}
