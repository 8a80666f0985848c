#[cfg(feature = "couch-store")]
pub mod couchdb;
pub mod memory;
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use crate::dao::models::PhaseSnapshotEntity;
use crate::dao::storage::StorageResult;
use futures::future::BoxFuture;

/// Abstraction over the single-row store holding the last phase snapshot.
pub trait PhaseStore: Send + Sync {
    /// Read the persisted row, if one was ever written.
    fn load_snapshot(&self) -> BoxFuture<'static, StorageResult<Option<PhaseSnapshotEntity>>>;
    /// Overwrite the persisted row.
    fn save_snapshot(&self, snapshot: PhaseSnapshotEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Cheap liveness probe.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    /// Re-establish the underlying connection.
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
