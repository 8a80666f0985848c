//! Process-local store used when no database is configured, and by tests.

use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};

use futures::future::BoxFuture;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::dao::{
    models::PhaseSnapshotEntity,
    phase_store::PhaseStore,
    storage::{StorageError, StorageResult},
};

/// Failure reported while the store is switched offline.
#[derive(Debug, Error)]
#[error("memory phase store is offline")]
pub struct MemoryStoreOffline;

impl From<MemoryStoreOffline> for StorageError {
    fn from(err: MemoryStoreOffline) -> Self {
        StorageError::unavailable(err.to_string(), err)
    }
}

#[derive(Default)]
struct MemoryInner {
    row: RwLock<Option<PhaseSnapshotEntity>>,
    offline: AtomicBool,
    writes: AtomicUsize,
}

/// Keeps the snapshot row in memory; cloning shares the same row.
#[derive(Clone, Default)]
pub struct MemoryPhaseStore {
    inner: Arc<MemoryInner>,
}

impl MemoryPhaseStore {
    /// Create an empty, online store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that already holds `row`.
    pub fn with_row(row: PhaseSnapshotEntity) -> Self {
        Self {
            inner: Arc::new(MemoryInner {
                row: RwLock::new(Some(row)),
                ..MemoryInner::default()
            }),
        }
    }

    /// Make every operation fail until switched back online.
    pub fn set_offline(&self, offline: bool) {
        self.inner.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of successful writes so far.
    pub fn write_count(&self) -> usize {
        self.inner.writes.load(Ordering::SeqCst)
    }

    fn check_online(&self) -> Result<(), MemoryStoreOffline> {
        if self.inner.offline.load(Ordering::SeqCst) {
            Err(MemoryStoreOffline)
        } else {
            Ok(())
        }
    }
}

impl PhaseStore for MemoryPhaseStore {
    fn load_snapshot(&self) -> BoxFuture<'static, StorageResult<Option<PhaseSnapshotEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store.check_online()?;
            Ok(store.inner.row.read().await.clone())
        })
    }

    fn save_snapshot(&self, snapshot: PhaseSnapshotEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.check_online()?;
            *store.inner.row.write().await = Some(snapshot);
            store.inner.writes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.check_online().map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        self.health_check()
    }
}
