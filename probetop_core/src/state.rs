//! Shared snapshot store: the only structure touched by more than one task.

use std::sync::Arc;

use tokio::sync::RwLock;

use crate::types::Snapshot;

/// Writers update one category under the write lock; readers take a cheap
/// `Arc` clone of the whole snapshot. A reader keeps its copy even while a
/// writer publishes, so it never sees half an update.
#[derive(Clone)]
pub struct SnapshotStore {
    inner: Arc<RwLock<Arc<Snapshot>>>,
}

impl SnapshotStore {
    pub fn new(history_capacity: usize) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(Snapshot::new(history_capacity)))),
        }
    }

    pub async fn snapshot(&self) -> Arc<Snapshot> {
        self.inner.read().await.clone()
    }

    /// Never waits; `None` only while a writer holds the lock.
    pub fn try_snapshot(&self) -> Option<Arc<Snapshot>> {
        self.inner.try_read().ok().map(|g| Arc::clone(&*g))
    }

    /// Apply `update` and bump the revision. Callers must not do I/O inside
    /// the closure: the write lock is held for its whole duration.
    pub async fn publish<F>(&self, update: F) -> u64
    where
        F: FnOnce(&mut Snapshot),
    {
        let mut guard = self.inner.write().await;
        // copy-on-write: clones only if a reader still holds the current Arc
        let snap = Arc::make_mut(&mut *guard);
        update(snap);
        snap.seq += 1;
        snap.updated_at_ms = chrono::Utc::now().timestamp_millis();
        snap.seq
    }

    pub async fn seq(&self) -> u64 {
        self.inner.read().await.seq
    }
}
