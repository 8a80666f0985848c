use tracing::warn;

use crate::{
    dto::health::{HealthResponse, SubscriberCounts},
    state::{SharedState, Topic},
};

/// Report storage status and live subscriber counts, logging connectivity issues.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    match state.phase_store().await {
        Some(store) => {
            if let Err(err) = store.health_check().await {
                warn!(error = %err, "storage health check failed");
            }
        }
        None => warn!("storage unavailable (degraded mode)"),
    }

    let subscribers = SubscriberCounts {
        rating: state.hub(Topic::Rating).count(),
        voting: state.hub(Topic::Voting).count(),
    };

    if state.is_degraded() {
        HealthResponse::degraded(subscribers)
    } else {
        HealthResponse::ok(subscribers)
    }
}
