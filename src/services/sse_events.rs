use tracing::warn;

use crate::{
    dto::{
        phase::PhaseSnapshotDto,
        sse::{ConnectedEvent, EventKind, PhaseChangedEvent, ServerEvent},
    },
    state::{SharedState, Topic, phase_machine::PhaseSnapshot},
};

/// Broadcast a phase change notification on every topic.
pub fn broadcast_phase_changed(state: &SharedState, snapshot: &PhaseSnapshot) {
    let payload = PhaseChangedEvent(PhaseSnapshotDto::from(snapshot));
    match ServerEvent::json(EventKind::PhaseChange, Some(&payload)) {
        Ok(event) => {
            for topic in Topic::ALL {
                state.hub(topic).broadcast(&event);
            }
        }
        Err(err) => warn!(error = %err, "failed to serialize phase change payload"),
    }
}

/// Build the acknowledgement pushed to a freshly opened stream.
pub fn connected_event(state: &SharedState, topic: Topic) -> Option<ServerEvent> {
    let payload = ConnectedEvent {
        topic,
        degraded: state.is_degraded(),
        snapshot: PhaseSnapshotDto::from(&state.current_snapshot()),
    };
    match ServerEvent::json(EventKind::Connected, Some(&payload)) {
        Ok(event) => Some(event),
        Err(err) => {
            warn!(topic = topic.as_str(), error = %err, "failed to serialize connected payload");
            None
        }
    }
}

/// Build a keep-alive event.
pub fn heartbeat_event() -> Option<ServerEvent> {
    match ServerEvent::bare(EventKind::Heartbeat) {
        Ok(event) => Some(event),
        Err(err) => {
            warn!(error = %err, "failed to serialize heartbeat");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use serde_json::Value;

    use super::*;
    use crate::{config::AppConfig, state::AppState};

    #[tokio::test]
    async fn phase_change_reaches_both_topics() {
        let state = AppState::new(AppConfig::default());
        let seen = Arc::new(Mutex::new(Vec::new()));
        for topic in Topic::ALL {
            let sink = Arc::clone(&seen);
            state.hub(topic).subscribe(move |event: &ServerEvent| {
                sink.lock().unwrap().push((topic, event.kind));
                Ok(())
            });
        }

        broadcast_phase_changed(&state, &PhaseSnapshot::idle());

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert!(seen.contains(&(Topic::Rating, EventKind::PhaseChange)));
        assert!(seen.contains(&(Topic::Voting, EventKind::PhaseChange)));
    }

    #[tokio::test]
    async fn connected_event_reports_topic_and_snapshot() {
        let state = AppState::new(AppConfig::default());
        let event = connected_event(&state, Topic::Voting).unwrap();
        let value: Value = serde_json::from_str(&event.data).unwrap();

        assert_eq!(value["type"], "connected");
        assert_eq!(value["data"]["topic"], "voting");
        assert_eq!(value["data"]["degraded"], true);
        assert_eq!(value["data"]["snapshot"]["currentPhase"], "idle");
    }
}
