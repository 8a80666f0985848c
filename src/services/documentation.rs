use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for the phase backend.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::phase::current_phase,
        crate::routes::admin::run_phase_command,
        crate::routes::admin::stored_phase,
        crate::routes::sse::rating_stream,
        crate::routes::sse::voting_stream,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::health::SubscriberCounts,
            crate::dto::phase::PhaseAction,
            crate::dto::phase::PhaseCommandRequest,
            crate::dto::phase::PhaseSnapshotDto,
            crate::dto::phase::PhaseStatusResponse,
            crate::dto::phase::StoredPhaseResponse,
            crate::dto::sse::EventKind,
            crate::dto::sse::ConnectedEvent,
            crate::state::Phase,
            crate::state::Topic,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "phase", description = "Read-only phase queries"),
        (name = "admin", description = "Phase commands, authenticated upstream"),
        (name = "sse", description = "Server-sent events streams"),
    )
)]
pub struct ApiDoc;
