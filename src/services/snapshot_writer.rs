//! Background task persisting every published phase snapshot.

use std::time::SystemTime;

use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::WatchStream;
use tracing::{debug, warn};

use crate::{
    dao::models::PhaseSnapshotEntity,
    state::{PhaseSnapshot, SharedState},
};

/// Spawn the writer. Snapshots are written one at a time in publish order; when several
/// transitions land during a slow write only the newest one is written next.
pub fn spawn_snapshot_writer(state: SharedState) -> JoinHandle<()> {
    let mut snapshots = WatchStream::from_changes(state.snapshot_watcher());
    tokio::spawn(async move {
        while let Some(snapshot) = snapshots.next().await {
            persist(&state, &snapshot).await;
        }
    })
}

async fn persist(state: &SharedState, snapshot: &PhaseSnapshot) {
    let Some(store) = state.phase_store().await else {
        debug!(version = snapshot.version, "no storage backend; snapshot kept in memory only");
        return;
    };

    let entity = PhaseSnapshotEntity::from_snapshot(snapshot, SystemTime::now());
    if let Err(err) = store.save_snapshot(entity).await {
        warn!(
            phase = %snapshot.phase,
            version = snapshot.version,
            error = %err,
            "failed to persist phase snapshot"
        );
    }
}
