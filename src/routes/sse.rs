use std::convert::Infallible;

use axum::{
    Router,
    extract::State,
    response::sse::{Event, Sse},
    routing::get,
};
use futures::Stream;

use crate::{
    services::sse_service::{subscribe_stream, to_sse_response},
    state::{SharedState, Topic},
};

#[utoipa::path(
    get,
    path = "/sse/rating",
    tag = "sse",
    responses((status = 200, description = "Rating SSE stream", content_type = "text/event-stream", body = String))
)]
/// Stream phase changes to the rating screens.
pub async fn rating_stream(
    State(state): State<SharedState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    to_sse_response(subscribe_stream(state, Topic::Rating).await)
}

#[utoipa::path(
    get,
    path = "/sse/voting",
    tag = "sse",
    responses((status = 200, description = "Voting SSE stream", content_type = "text/event-stream", body = String))
)]
/// Stream phase changes to the voting screens.
pub async fn voting_stream(
    State(state): State<SharedState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    to_sse_response(subscribe_stream(state, Topic::Voting).await)
}

/// Configure the SSE endpoints.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new()
        .route("/sse/rating", get(rating_stream))
        .route("/sse/voting", get(voting_stream))
}
