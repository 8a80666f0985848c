use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    dto::{format_system_time, validation::validate_team_field},
    state::phase_machine::{CycleSubject, Phase, PhaseEvent, PhaseFlags, PhaseSnapshot},
};

/// Admin commands accepted by the phase endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum PhaseAction {
    /// Open a new cycle.
    Start,
    /// Warn the room, then open rating.
    StartRating,
    /// Close the current cycle.
    Stop,
}

/// Body of `POST /admin/phase`.
#[derive(Debug, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PhaseCommandRequest {
    /// Requested transition.
    pub action: PhaseAction,
    /// Team being pitched; only read by `start`.
    #[validate(length(min = 1, max = 128), custom(function = "validate_team_field"))]
    pub team_id: Option<String>,
    /// Display name of the team; only read by `start`.
    #[validate(length(min = 1, max = 128), custom(function = "validate_team_field"))]
    pub team_name: Option<String>,
}

impl PhaseCommandRequest {
    /// Translate the request into the state-machine event it asks for.
    pub fn into_event(self) -> PhaseEvent {
        match self.action {
            PhaseAction::Start => PhaseEvent::Start(CycleSubject {
                team_id: self.team_id.map(|id| id.trim().to_string()),
                team_name: self.team_name.map(|name| name.trim().to_string()),
            }),
            PhaseAction::StartRating => PhaseEvent::StartRating,
            PhaseAction::Stop => PhaseEvent::Stop,
        }
    }
}

/// Snapshot of the phase machine as exposed to clients (REST/SSE).
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PhaseSnapshotDto {
    /// Current phase.
    pub current_phase: Phase,
    /// Team of the running cycle.
    pub current_team_id: Option<String>,
    /// Display name of that team.
    pub current_team_name: Option<String>,
    /// RFC 3339 instant the cycle started, null while idle.
    pub cycle_started_at: Option<String>,
    /// RFC 3339 instant the current phase started, null while idle.
    pub phase_started_at: Option<String>,
    /// Flags derived from the phase.
    #[serde(flatten)]
    pub flags: PhaseFlags,
}

impl From<&PhaseSnapshot> for PhaseSnapshotDto {
    fn from(snapshot: &PhaseSnapshot) -> Self {
        Self {
            current_phase: snapshot.phase,
            current_team_id: snapshot.team_id().map(str::to_string),
            current_team_name: snapshot.team_name().map(str::to_string),
            cycle_started_at: snapshot.cycle_started_at.map(format_system_time),
            phase_started_at: snapshot.phase_started_at.map(format_system_time),
            flags: snapshot.flags(),
        }
    }
}

/// Response of the phase query and command endpoints.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PhaseStatusResponse {
    /// Snapshot fields, inlined.
    #[serde(flatten)]
    pub snapshot: PhaseSnapshotDto,
    /// True when no storage backend is connected.
    pub degraded: bool,
}

/// Row currently held by the storage backend.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StoredPhaseResponse {
    /// Persisted snapshot, null when nothing was written yet.
    pub snapshot: Option<PhaseSnapshotDto>,
    /// RFC 3339 instant of the last write.
    pub updated_at: Option<String>,
}
