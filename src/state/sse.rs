use serde::Serialize;
use utoipa::ToSchema;

use crate::{dto::sse::ServerEvent, state::hub::BroadcastHub};

/// Hub specialised for SSE payloads.
pub type SseHub = BroadcastHub<ServerEvent>;

/// Streams a browser can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Topic {
    /// Judge and audience rating screens.
    Rating,
    /// Team voting screens.
    Voting,
}

impl Topic {
    /// Every topic, in a stable order.
    pub const ALL: [Topic; 2] = [Topic::Rating, Topic::Voting];

    /// Name used in routes and log fields.
    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::Rating => "rating",
            Topic::Voting => "voting",
        }
    }
}

/// SSE-specific sub-state carved out from [`AppState`](super::AppState).
pub struct SseState {
    rating: SseHub,
    voting: SseHub,
}

impl SseState {
    /// Build one hub per topic.
    pub fn new() -> Self {
        Self {
            rating: SseHub::new(Topic::Rating.as_str()),
            voting: SseHub::new(Topic::Voting.as_str()),
        }
    }

    /// Access the hub serving `topic`.
    pub fn hub(&self, topic: Topic) -> &SseHub {
        match topic {
            Topic::Rating => &self.rating,
            Topic::Voting => &self.voting,
        }
    }
}

impl Default for SseState {
    fn default() -> Self {
        Self::new()
    }
}
