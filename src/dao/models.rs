use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::{
    dao::storage::StorageError,
    state::phase_machine::{CycleSubject, Phase, PhaseSnapshot},
};

/// Single persisted row mirroring the live phase machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseSnapshotEntity {
    /// Identifier of the team in the current cycle.
    pub current_team_id: Option<String>,
    /// Name of the team in the current cycle.
    pub current_team_name: Option<String>,
    /// Copy of the derived flag at write time.
    pub pitch_cycle_active: bool,
    /// Copy of the derived flag at write time.
    pub voting_active: bool,
    /// Copy of the derived flag at write time.
    pub all_pitches_completed: bool,
    /// Lowercase phase name.
    pub current_phase: String,
    /// Instant the cycle started.
    pub cycle_start_ts: Option<SystemTime>,
    /// Instant the current phase started.
    pub phase_start_ts: Option<SystemTime>,
    /// Instant the row was written.
    pub updated_at: SystemTime,
}

impl PhaseSnapshotEntity {
    /// Build the row for `snapshot`, stamped with `updated_at`.
    pub fn from_snapshot(snapshot: &PhaseSnapshot, updated_at: SystemTime) -> Self {
        let flags = snapshot.flags();
        Self {
            current_team_id: snapshot.team_id().map(str::to_string),
            current_team_name: snapshot.team_name().map(str::to_string),
            pitch_cycle_active: flags.pitch_cycle_active,
            voting_active: flags.voting_active,
            all_pitches_completed: flags.all_pitches_completed,
            current_phase: snapshot.phase.as_str().to_string(),
            cycle_start_ts: snapshot.cycle_started_at,
            phase_start_ts: snapshot.phase_started_at,
            updated_at,
        }
    }

    /// Rebuild the in-memory snapshot. Stored flags are ignored; they are derived from the phase.
    pub fn into_snapshot(self) -> Result<PhaseSnapshot, StorageError> {
        let phase = Phase::parse(&self.current_phase).ok_or_else(|| {
            StorageError::InvalidSnapshot(format!("unknown phase `{}`", self.current_phase))
        })?;

        let subject = match phase {
            Phase::Idle => None,
            _ => Some(CycleSubject {
                team_id: self.current_team_id,
                team_name: self.current_team_name,
            }),
        };

        let snapshot = match phase {
            Phase::Idle => PhaseSnapshot::idle(),
            _ => PhaseSnapshot {
                phase,
                cycle_started_at: self.cycle_start_ts,
                phase_started_at: self.phase_start_ts,
                subject,
                version: 0,
            },
        };

        if !snapshot.is_consistent() {
            return Err(StorageError::InvalidSnapshot(format!(
                "timestamps do not match phase `{phase}`"
            )));
        }

        Ok(snapshot)
    }
}

/// Serializable form used by document stores that keep timestamps as epoch milliseconds.
#[serde_with::serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(missing_docs)]
pub struct PhaseSnapshotBody {
    pub current_team_id: Option<String>,
    pub current_team_name: Option<String>,
    pub pitch_cycle_active: bool,
    pub voting_active: bool,
    #[serde(default)]
    pub all_pitches_completed: bool,
    pub current_phase: String,
    #[serde_as(as = "Option<serde_with::TimestampMilliSeconds<i64>>")]
    pub cycle_start_ts: Option<SystemTime>,
    #[serde_as(as = "Option<serde_with::TimestampMilliSeconds<i64>>")]
    pub phase_start_ts: Option<SystemTime>,
    #[serde_as(as = "serde_with::TimestampMilliSeconds<i64>")]
    pub updated_at: SystemTime,
}

impl From<PhaseSnapshotEntity> for PhaseSnapshotBody {
    fn from(value: PhaseSnapshotEntity) -> Self {
        Self {
            current_team_id: value.current_team_id,
            current_team_name: value.current_team_name,
            pitch_cycle_active: value.pitch_cycle_active,
            voting_active: value.voting_active,
            all_pitches_completed: value.all_pitches_completed,
            current_phase: value.current_phase,
            cycle_start_ts: value.cycle_start_ts,
            phase_start_ts: value.phase_start_ts,
            updated_at: value.updated_at,
        }
    }
}

impl From<PhaseSnapshotBody> for PhaseSnapshotEntity {
    fn from(value: PhaseSnapshotBody) -> Self {
        Self {
            current_team_id: value.current_team_id,
            current_team_name: value.current_team_name,
            pitch_cycle_active: value.pitch_cycle_active,
            voting_active: value.voting_active,
            all_pitches_completed: value.all_pitches_completed,
            current_phase: value.current_phase,
            cycle_start_ts: value.cycle_start_ts,
            phase_start_ts: value.phase_start_ts,
            updated_at: value.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;

    fn at(secs: u64) -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000 + secs)
    }

    fn warning_snapshot() -> PhaseSnapshot {
        PhaseSnapshot {
            phase: Phase::Warning,
            cycle_started_at: Some(at(0)),
            phase_started_at: Some(at(40)),
            subject: Some(CycleSubject {
                team_id: Some("12".into()),
                team_name: Some("Comet".into()),
            }),
            version: 9,
        }
    }

    #[test]
    fn entity_copies_flags_and_timestamps() {
        let entity = PhaseSnapshotEntity::from_snapshot(&warning_snapshot(), at(41));
        assert_eq!(entity.current_phase, "warning");
        assert!(entity.pitch_cycle_active);
        assert!(!entity.voting_active);
        assert_eq!(entity.cycle_start_ts, Some(at(0)));
        assert_eq!(entity.phase_start_ts, Some(at(40)));
        assert_eq!(entity.updated_at, at(41));
    }

    #[test]
    fn entity_restores_the_snapshot_without_version() {
        let entity = PhaseSnapshotEntity::from_snapshot(&warning_snapshot(), at(41));
        let restored = entity.into_snapshot().unwrap();
        assert_eq!(
            restored,
            PhaseSnapshot {
                version: 0,
                ..warning_snapshot()
            }
        );
    }

    #[test]
    fn unknown_phase_is_rejected() {
        let mut entity = PhaseSnapshotEntity::from_snapshot(&warning_snapshot(), at(41));
        entity.current_phase = "intermission".into();
        assert!(matches!(
            entity.into_snapshot(),
            Err(StorageError::InvalidSnapshot(_))
        ));
    }

    #[test]
    fn running_row_without_timestamps_is_rejected() {
        let mut entity = PhaseSnapshotEntity::from_snapshot(&warning_snapshot(), at(41));
        entity.cycle_start_ts = None;
        assert!(entity.into_snapshot().is_err());
    }

    #[test]
    fn body_uses_epoch_milliseconds() {
        let entity = PhaseSnapshotEntity::from_snapshot(&warning_snapshot(), at(41));
        let value = serde_json::to_value(PhaseSnapshotBody::from(entity)).unwrap();
        assert_eq!(value["cycleStartTs"], json!(1_700_000_000_000_i64));
        assert_eq!(value["currentPhase"], "warning");
        assert_eq!(value["updatedAt"], json!(1_700_000_041_000_i64));
    }
}
