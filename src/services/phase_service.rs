use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::{
    dao::{phase_store::PhaseStore, storage::StorageResult},
    dto::{
        format_system_time,
        phase::{
            PhaseAction, PhaseCommandRequest, PhaseSnapshotDto, PhaseStatusResponse,
            StoredPhaseResponse,
        },
    },
    error::ServiceError,
    state::{
        PhaseSnapshot, SharedState,
        transitions::{restore_with_broadcast, run_transition_with_broadcast},
    },
};

/// Apply an admin command and return the resulting snapshot.
pub async fn execute_command(
    state: &SharedState,
    request: PhaseCommandRequest,
) -> Result<PhaseStatusResponse, ServiceError> {
    let action = request.action;
    if action != PhaseAction::Start && (request.team_id.is_some() || request.team_name.is_some())
    {
        return Err(ServiceError::InvalidInput(
            "teamId and teamName are only accepted with `start`".into(),
        ));
    }

    let snapshot = run_transition_with_broadcast(state, request.into_event())
        .await
        .inspect_err(|err| debug!(?action, error = %err, "phase command rejected"))?;
    Ok(status_of(state, &snapshot))
}

/// Latest published snapshot together with the degraded flag.
pub fn current_status(state: &SharedState) -> PhaseStatusResponse {
    status_of(state, &state.current_snapshot())
}

/// Read back the row held by the storage backend.
pub async fn stored_snapshot(state: &SharedState) -> Result<StoredPhaseResponse, ServiceError> {
    let store = state.phase_store().await.ok_or(ServiceError::Degraded)?;
    let Some(entity) = store.load_snapshot().await? else {
        return Ok(StoredPhaseResponse {
            snapshot: None,
            updated_at: None,
        });
    };

    let updated_at = format_system_time(entity.updated_at);
    let snapshot = entity.into_snapshot()?;
    Ok(StoredPhaseResponse {
        snapshot: Some(PhaseSnapshotDto::from(&snapshot)),
        updated_at: Some(updated_at),
    })
}

/// Reconcile memory and storage after the backend (re)connects.
///
/// A pristine machine resumes the persisted snapshot when `restore_on_start` is set.
/// Otherwise the live snapshot is handed back to the snapshot writer, which persists it
/// to the installed store in order with later transitions.
pub async fn sync_with_store(state: &SharedState, store: Arc<dyn PhaseStore>) -> StorageResult<()> {
    if state.config().restore_on_start && state.current_snapshot().version == 0 {
        match load_recoverable(store.as_ref()).await? {
            Some(recovered) => {
                if restore_with_broadcast(state, recovered).await.is_some() {
                    return Ok(());
                }
            }
            None => debug!("no persisted phase to resume"),
        }
    }

    store.health_check().await?;
    state.republish_snapshot();
    let snapshot = state.current_snapshot();
    info!(phase = %snapshot.phase, version = snapshot.version, "live phase queued for storage catch-up");
    Ok(())
}

async fn load_recoverable(store: &dyn PhaseStore) -> StorageResult<Option<PhaseSnapshot>> {
    let Some(entity) = store.load_snapshot().await? else {
        return Ok(None);
    };

    match entity.into_snapshot() {
        Ok(snapshot) => Ok(Some(snapshot)),
        Err(err) => {
            warn!(error = %err, "persisted phase is unusable; starting idle");
            Ok(None)
        }
    }
}

fn status_of(state: &SharedState, snapshot: &PhaseSnapshot) -> PhaseStatusResponse {
    PhaseStatusResponse {
        snapshot: PhaseSnapshotDto::from(snapshot),
        degraded: state.is_degraded(),
    }
}
