use std::{sync::Arc, time::SystemTime};

use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    dto::{format_system_time, phase::PhaseSnapshotDto},
    state::sse::Topic,
};

/// Kind of message pushed on a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum EventKind {
    /// First message of every connection.
    Connected,
    /// Keep-alive sent on a fixed interval.
    Heartbeat,
    /// The phase machine moved.
    PhaseChange,
}

#[derive(Clone, Debug)]
/// Dispatched payload carried across SSE channels, serialized once per broadcast.
pub struct ServerEvent {
    /// Kind copied out of the envelope for routing and tests.
    pub kind: EventKind,
    /// Serialized envelope, shared by every subscriber.
    pub data: Arc<str>,
}

#[derive(Serialize)]
struct Envelope<'a, T> {
    #[serde(rename = "type")]
    kind: EventKind,
    timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<&'a T>,
}

impl ServerEvent {
    /// Wrap `payload` in the `{type, timestamp, data?}` envelope.
    pub fn json<T>(kind: EventKind, payload: Option<&T>) -> serde_json::Result<Self>
    where
        T: Serialize,
    {
        let envelope = Envelope {
            kind,
            timestamp: format_system_time(SystemTime::now()),
            data: payload,
        };

        Ok(Self {
            kind,
            data: serde_json::to_string(&envelope)?.into(),
        })
    }

    /// Envelope without a `data` field.
    pub fn bare(kind: EventKind) -> serde_json::Result<Self> {
        Self::json::<()>(kind, None)
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
/// Initial metadata sent to an SSE client when it connects.
pub struct ConnectedEvent {
    /// Stream the client joined.
    pub topic: Topic,
    /// Whether the backend is running without a storage backend connection.
    pub degraded: bool,
    /// Phase state at connection time, so late joiners can render immediately.
    pub snapshot: PhaseSnapshotDto,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
/// Broadcast whenever the phase changes.
pub struct PhaseChangedEvent(pub PhaseSnapshotDto);

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::*;
    use crate::state::phase_machine::PhaseSnapshot;

    #[test]
    fn heartbeat_has_no_data_field() {
        let event = ServerEvent::bare(EventKind::Heartbeat).unwrap();
        let value: Value = serde_json::from_str(&event.data).unwrap();
        assert_eq!(value["type"], "heartbeat");
        assert!(value["timestamp"].is_string());
        assert!(value.get("data").is_none());
    }

    #[test]
    fn phase_change_wraps_the_snapshot() {
        let payload = PhaseChangedEvent(PhaseSnapshotDto::from(&PhaseSnapshot::idle()));
        let event = ServerEvent::json(EventKind::PhaseChange, Some(&payload)).unwrap();
        let value: Value = serde_json::from_str(&event.data).unwrap();
        assert_eq!(event.kind, EventKind::PhaseChange);
        assert_eq!(value["type"], "phaseChange");
        assert_eq!(value["data"]["currentPhase"], "idle");
    }
}
