use axum::Router;

use crate::state::SharedState;

pub mod admin;
pub mod docs;
pub mod health;
pub mod phase;
pub mod sse;

/// Compose all route trees and attach the shared state.
pub fn router(state: SharedState) -> Router<()> {
    health::router()
        .merge(phase::router())
        .merge(admin::router())
        .merge(sse::router())
        .merge(docs::router())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::{Body, to_bytes},
        http::{Request, StatusCode, header},
    };
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::phase_store::memory::MemoryPhaseStore,
        state::{AppState, Topic},
    };

    fn app() -> (SharedState, Router) {
        let state = AppState::new(AppConfig::default());
        (state.clone(), router(state))
    }

    fn command(body: Value) -> Request<Body> {
        Request::post("/admin/phase")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn start_command_returns_the_running_snapshot() {
        let (_, app) = app();
        let response = app
            .oneshot(command(json!({ "action": "start", "teamId": "5", "teamName": "Vega" })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["currentPhase"], "running");
        assert_eq!(body["currentTeamName"], "Vega");
        assert_eq!(body["pitchCycleActive"], true);
        assert_eq!(body["votingActive"], false);
        assert_eq!(body["degraded"], true);
    }

    #[tokio::test]
    async fn invalid_transition_is_a_conflict() {
        let (state, app) = app();
        let response = app.oneshot(command(json!({ "action": "stop" }))).await.unwrap();

        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert!(json_body(response).await["message"].is_string());
        assert_eq!(state.current_snapshot().version, 0);
    }

    #[tokio::test]
    async fn blank_team_name_is_rejected() {
        let (_, app) = app();
        let response = app
            .oneshot(command(json!({ "action": "start", "teamName": "   " })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unknown_action_gets_a_json_bad_request() {
        let (state, app) = app();
        let response = app
            .oneshot(command(json!({ "action": "pause" })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert!(body["message"].as_str().unwrap().starts_with("bad request:"));
        assert_eq!(state.current_snapshot().version, 0);
    }

    #[tokio::test]
    async fn non_json_body_gets_a_json_bad_request() {
        let (_, app) = app();
        let request = Request::post("/admin/phase")
            .header(header::CONTENT_TYPE, "text/plain")
            .body(Body::from("start"))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(json_body(response).await["message"].is_string());
    }

    #[tokio::test]
    async fn phase_query_reflects_commands() {
        let (state, app) = app();
        app.clone()
            .oneshot(command(json!({ "action": "start" })))
            .await
            .unwrap();

        let response = app
            .oneshot(Request::get("/phase").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["currentPhase"], "running");
        assert_eq!(body["currentTeamId"], Value::Null);
        assert!(body["cycleStartedAt"].is_string());
        assert_eq!(state.current_snapshot().version, 1);
    }

    #[tokio::test]
    async fn stored_phase_is_unavailable_while_degraded() {
        let (state, app) = app();
        let response = app
            .clone()
            .oneshot(Request::get("/admin/phase/stored").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        state.set_phase_store(Arc::new(MemoryPhaseStore::new())).await;
        let response = app
            .oneshot(Request::get("/admin/phase/stored").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["snapshot"], Value::Null);
    }

    #[tokio::test]
    async fn sse_endpoint_opens_an_event_stream() {
        let (state, app) = app();
        let response = app
            .oneshot(Request::get("/sse/rating").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/event-stream");
        assert_eq!(state.hub(Topic::Rating).count(), 1);

        drop(response);
        assert_eq!(state.hub(Topic::Rating).count(), 0);
    }

    #[tokio::test]
    async fn healthcheck_reports_degraded_mode() {
        let (_, app) = app();
        let response = app
            .oneshot(Request::get("/healthcheck").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["status"], "degraded");
        assert_eq!(body["subscribers"], json!({ "rating": 0, "voting": 0 }));
    }
}
