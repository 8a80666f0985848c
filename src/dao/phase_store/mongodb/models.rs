use mongodb::bson::{DateTime, Document, doc};
use serde::{Deserialize, Serialize};

use crate::dao::models::PhaseSnapshotEntity;

/// Fixed key of the single phase document.
pub const PHASE_DOCUMENT_ID: &str = "phase_state";

/// BSON shape of the phase row, with native dates for the timestamps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoPhaseDocument {
    #[serde(rename = "_id")]
    id: String,
    current_team_id: Option<String>,
    current_team_name: Option<String>,
    pitch_cycle_active: bool,
    voting_active: bool,
    #[serde(default)]
    all_pitches_completed: bool,
    current_phase: String,
    cycle_start_ts: Option<DateTime>,
    phase_start_ts: Option<DateTime>,
    updated_at: DateTime,
}

impl From<PhaseSnapshotEntity> for MongoPhaseDocument {
    fn from(value: PhaseSnapshotEntity) -> Self {
        Self {
            id: PHASE_DOCUMENT_ID.to_owned(),
            current_team_id: value.current_team_id,
            current_team_name: value.current_team_name,
            pitch_cycle_active: value.pitch_cycle_active,
            voting_active: value.voting_active,
            all_pitches_completed: value.all_pitches_completed,
            current_phase: value.current_phase,
            cycle_start_ts: value.cycle_start_ts.map(DateTime::from_system_time),
            phase_start_ts: value.phase_start_ts.map(DateTime::from_system_time),
            updated_at: DateTime::from_system_time(value.updated_at),
        }
    }
}

impl From<MongoPhaseDocument> for PhaseSnapshotEntity {
    fn from(value: MongoPhaseDocument) -> Self {
        Self {
            current_team_id: value.current_team_id,
            current_team_name: value.current_team_name,
            pitch_cycle_active: value.pitch_cycle_active,
            voting_active: value.voting_active,
            all_pitches_completed: value.all_pitches_completed,
            current_phase: value.current_phase,
            cycle_start_ts: value.cycle_start_ts.map(DateTime::to_system_time),
            phase_start_ts: value.phase_start_ts.map(DateTime::to_system_time),
            updated_at: value.updated_at.to_system_time(),
        }
    }
}

/// Filter matching the single phase document.
pub fn phase_filter() -> Document {
    doc! { "_id": PHASE_DOCUMENT_ID }
}
