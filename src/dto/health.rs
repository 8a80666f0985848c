use serde::Serialize;
use utoipa::ToSchema;

/// Live subscriber counts per SSE topic.
#[derive(Debug, Serialize, ToSchema)]
pub struct SubscriberCounts {
    /// Open `/sse/rating` streams.
    pub rating: usize,
    /// Open `/sse/voting` streams.
    pub voting: usize,
}

/// Simple health response returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Health status ("ok" or "degraded").
    pub status: String,
    /// Connected browsers per topic.
    pub subscribers: SubscriberCounts,
}

impl HealthResponse {
    /// Create a health response indicating the system is operational.
    pub fn ok(subscribers: SubscriberCounts) -> Self {
        Self {
            status: "ok".to_string(),
            subscribers,
        }
    }

    /// Create a health response indicating the system is in degraded mode.
    pub fn degraded(subscribers: SubscriberCounts) -> Self {
        Self {
            status: "degraded".to_string(),
            subscribers,
        }
    }
}
