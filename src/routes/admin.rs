use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    routing::{get, post},
};
use validator::Validate;

use crate::{
    dto::phase::{PhaseCommandRequest, PhaseStatusResponse, StoredPhaseResponse},
    error::AppError,
    services::phase_service,
    state::SharedState,
};

/// Admin endpoints driving the phase machine. Callers are authenticated upstream.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/admin/phase", post(run_phase_command))
        .route("/admin/phase/stored", get(stored_phase))
}

/// Apply `start`, `start-rating` or `stop` and return the resulting snapshot.
#[utoipa::path(
    post,
    path = "/admin/phase",
    tag = "admin",
    request_body = PhaseCommandRequest,
    responses(
        (status = 200, description = "Transition applied", body = PhaseStatusResponse),
        (status = 400, description = "Malformed body or team fields"),
        (status = 409, description = "Command not valid in the current phase")
    )
)]
pub async fn run_phase_command(
    State(state): State<SharedState>,
    payload: Result<Json<PhaseCommandRequest>, JsonRejection>,
) -> Result<Json<PhaseStatusResponse>, AppError> {
    let Json(payload) = payload?;
    payload.validate()?;
    Ok(Json(phase_service::execute_command(&state, payload).await?))
}

/// Show the row currently held by the storage backend.
#[utoipa::path(
    get,
    path = "/admin/phase/stored",
    tag = "admin",
    responses(
        (status = 200, description = "Persisted snapshot", body = StoredPhaseResponse),
        (status = 503, description = "No storage backend reachable")
    )
)]
pub async fn stored_phase(
    State(state): State<SharedState>,
) -> Result<Json<StoredPhaseResponse>, AppError> {
    Ok(Json(phase_service::stored_snapshot(&state).await?))
}
