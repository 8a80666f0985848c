use axum::{Json, Router, extract::State, routing::get};

use crate::{dto::phase::PhaseStatusResponse, services::phase_service, state::SharedState};

#[utoipa::path(
    get,
    path = "/phase",
    tag = "phase",
    responses((status = 200, description = "Current phase snapshot", body = PhaseStatusResponse))
)]
/// Current phase, never blocked by an in-flight command.
pub async fn current_phase(State(state): State<SharedState>) -> Json<PhaseStatusResponse> {
    Json(phase_service::current_status(&state))
}

/// Configure the phase query routes.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/phase", get(current_phase))
}
