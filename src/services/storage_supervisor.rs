use std::{future::Future, sync::Arc, time::Duration};

use tokio::time::sleep;
use tracing::{info, warn};

use crate::{
    dao::{phase_store::PhaseStore, storage::StorageError},
    services::phase_service::sync_with_store,
    state::SharedState,
};

const INITIAL_DELAY: Duration = Duration::from_millis(1_000);
const MAX_DELAY: Duration = Duration::from_secs(10);
const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(5);
const MAX_RECONNECT_ATTEMPTS: u32 = 3;

/// Keep a storage backend installed, falling back to degraded mode while it is unreachable.
///
/// Every successful (re)connection reconciles the live phase with the stored row.
pub async fn run<F, Fut>(state: SharedState, mut connect: F)
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Arc<dyn PhaseStore>, StorageError>> + Send,
{
    let mut delay = INITIAL_DELAY;

    loop {
        match connect().await {
            Ok(store) => {
                state.set_phase_store(Arc::clone(&store)).await;
                info!("storage connection established; leaving degraded mode");
                synchronize(&state, &store).await;
                delay = INITIAL_DELAY;

                watch_health(&state, &store).await;

                warn!("exhausted storage reconnect attempts; dropping backend");
                state.clear_phase_store().await;
                sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
            }
            Err(err) => {
                warn!(error = %err, "storage connection attempt failed");
                sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
            }
        }
    }
}

/// Poll the backend until it fails and cannot be revived.
async fn watch_health(state: &SharedState, store: &Arc<dyn PhaseStore>) {
    loop {
        if store.health_check().await.is_ok() {
            sleep(HEALTH_POLL_INTERVAL).await;
            continue;
        }

        if !reconnect(state, store).await {
            return;
        }
        info!("storage reconnected; leaving degraded mode");
        state.update_degraded(false);
        synchronize(state, store).await;
        sleep(HEALTH_POLL_INTERVAL).await;
    }
}

async fn reconnect(state: &SharedState, store: &Arc<dyn PhaseStore>) -> bool {
    let mut delay = INITIAL_DELAY;

    for attempt in 0..MAX_RECONNECT_ATTEMPTS {
        match store.try_reconnect().await {
            Ok(()) => return true,
            Err(err) if attempt == 0 => {
                warn!(attempt, error = %err, "storage reconnect failed; entering degraded mode");
                state.update_degraded(true);
            }
            Err(err) => warn!(attempt, error = %err, "storage reconnect attempt failed"),
        }
        sleep(delay).await;
        delay = (delay * 2).min(MAX_DELAY);
    }

    false
}

async fn synchronize(state: &SharedState, store: &Arc<dyn PhaseStore>) {
    if let Err(err) = sync_with_store(state, Arc::clone(store)).await {
        warn!(error = %err, "failed to reconcile phase with storage");
    }
}
