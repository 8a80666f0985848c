use std::{fmt, time::SystemTime};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Stages of a timed rating cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// No cycle is running.
    Idle,
    /// A team is pitching.
    Running,
    /// The audience is warned that rating is about to open.
    Warning,
    /// Rating is open.
    Rating,
}

impl Phase {
    /// Lowercase name used on the wire and in storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Running => "running",
            Phase::Warning => "warning",
            Phase::Rating => "rating",
        }
    }

    /// Parse the lowercase storage name back into a phase.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "idle" => Some(Phase::Idle),
            "running" => Some(Phase::Running),
            "warning" => Some(Phase::Warning),
            "rating" => Some(Phase::Rating),
            _ => None,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Activity flags exposed to clients. Always derived from the phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PhaseFlags {
    /// A pitch cycle is in progress.
    pub pitch_cycle_active: bool,
    /// Ratings are currently accepted.
    pub voting_active: bool,
    /// Every scheduled pitch has been rated.
    pub all_pitches_completed: bool,
}

impl PhaseFlags {
    /// Flag set matching `phase`.
    pub fn for_phase(phase: Phase) -> Self {
        match phase {
            Phase::Idle => Self {
                pitch_cycle_active: false,
                voting_active: false,
                all_pitches_completed: false,
            },
            Phase::Running | Phase::Warning => Self {
                pitch_cycle_active: true,
                voting_active: false,
                all_pitches_completed: false,
            },
            Phase::Rating => Self {
                pitch_cycle_active: true,
                voting_active: true,
                all_pitches_completed: false,
            },
        }
    }
}

/// Team being pitched and rated during the current cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleSubject {
    /// External identifier of the team.
    pub team_id: Option<String>,
    /// Display name of the team.
    pub team_name: Option<String>,
}

/// Events that can be applied to the phase machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhaseEvent {
    /// Admin opens a new cycle for the given team.
    Start(CycleSubject),
    /// Admin asks for rating to open after the warning delay.
    StartRating,
    /// The warning delay elapsed without being superseded.
    WarningElapsed,
    /// Admin ends the cycle.
    Stop,
}

impl PhaseEvent {
    /// Short name used in logs and error messages.
    pub fn name(&self) -> &'static str {
        match self {
            PhaseEvent::Start(_) => "start",
            PhaseEvent::StartRating => "start-rating",
            PhaseEvent::WarningElapsed => "warning-elapsed",
            PhaseEvent::Stop => "stop",
        }
    }
}

/// Error returned when attempting to apply an invalid transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: `{}` cannot be applied while {from}", event.name())]
pub struct InvalidTransition {
    /// The phase the machine was in when the event was received.
    pub from: Phase,
    /// The rejected event.
    pub event: PhaseEvent,
}

/// Full state of the phase machine at a point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseSnapshot {
    /// Current phase.
    pub phase: Phase,
    /// Set when the cycle entered `running`.
    pub cycle_started_at: Option<SystemTime>,
    /// Set on every phase change of a cycle.
    pub phase_started_at: Option<SystemTime>,
    /// Subject of the current cycle.
    pub subject: Option<CycleSubject>,
    /// Incremented on every applied transition.
    pub version: u64,
}

impl PhaseSnapshot {
    /// Idle snapshot at version zero.
    pub fn idle() -> Self {
        Self {
            phase: Phase::Idle,
            cycle_started_at: None,
            phase_started_at: None,
            subject: None,
            version: 0,
        }
    }

    /// Flags derived from the current phase.
    pub fn flags(&self) -> PhaseFlags {
        PhaseFlags::for_phase(self.phase)
    }

    /// Identifier of the current team, if any.
    pub fn team_id(&self) -> Option<&str> {
        self.subject.as_ref().and_then(|s| s.team_id.as_deref())
    }

    /// Name of the current team, if any.
    pub fn team_name(&self) -> Option<&str> {
        self.subject.as_ref().and_then(|s| s.team_name.as_deref())
    }

    /// Whether the snapshot satisfies the phase invariants.
    pub fn is_consistent(&self) -> bool {
        match self.phase {
            Phase::Idle => {
                self.cycle_started_at.is_none()
                    && self.phase_started_at.is_none()
                    && self.subject.is_none()
            }
            _ => match (self.cycle_started_at, self.phase_started_at) {
                (Some(cycle), Some(phase)) => phase >= cycle,
                _ => false,
            },
        }
    }
}

impl Default for PhaseSnapshot {
    fn default() -> Self {
        Self::idle()
    }
}

/// Outcome of an applied transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    /// Phase before the event.
    pub from: Phase,
    /// Phase after the event.
    pub to: Phase,
    /// Version after the event.
    pub version: u64,
}

impl Transition {
    /// The new phase needs the auto-advance timer.
    pub fn arms_warning_timer(&self) -> bool {
        self.to == Phase::Warning
    }
}

/// State machine implementing the rating cycle.
#[derive(Debug, Clone, Default)]
pub struct PhaseMachine {
    state: PhaseSnapshot,
}

impl PhaseMachine {
    /// Create a new machine initialised in the idle state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inspect the current phase.
    pub fn phase(&self) -> Phase {
        self.state.phase
    }

    /// Current version counter.
    pub fn version(&self) -> u64 {
        self.state.version
    }

    /// Clone the full current state.
    pub fn snapshot(&self) -> PhaseSnapshot {
        self.state.clone()
    }

    /// True until the first transition or restore has been applied.
    pub fn is_pristine(&self) -> bool {
        self.state.version == 0 && self.state.phase == Phase::Idle
    }

    /// Validate `event` against the current phase and apply it.
    ///
    /// Rejected events leave the machine untouched.
    pub fn apply(
        &mut self,
        event: PhaseEvent,
        now: SystemTime,
    ) -> Result<Transition, InvalidTransition> {
        let from = self.state.phase;
        let next = match (from, event) {
            (Phase::Idle, PhaseEvent::Start(subject)) => PhaseSnapshot {
                phase: Phase::Running,
                cycle_started_at: Some(now),
                phase_started_at: Some(now),
                subject: Some(subject),
                version: self.state.version,
            },
            (Phase::Running | Phase::Warning, PhaseEvent::StartRating) => {
                self.enter(Phase::Warning, now)
            }
            (Phase::Warning, PhaseEvent::WarningElapsed) => self.enter(Phase::Rating, now),
            (Phase::Running | Phase::Warning | Phase::Rating, PhaseEvent::Stop) => PhaseSnapshot {
                version: self.state.version,
                ..PhaseSnapshot::idle()
            },
            (from, event) => return Err(InvalidTransition { from, event }),
        };

        self.state = PhaseSnapshot {
            version: self.state.version + 1,
            ..next
        };

        Ok(Transition {
            from,
            to: self.state.phase,
            version: self.state.version,
        })
    }

    /// Replace the state with a recovered snapshot.
    ///
    /// Only a pristine machine accepts a restore, and inconsistent snapshots are refused.
    pub fn restore(&mut self, snapshot: PhaseSnapshot) -> bool {
        if !self.is_pristine() || !snapshot.is_consistent() || snapshot.phase == Phase::Idle {
            return false;
        }

        self.state = PhaseSnapshot {
            version: self.state.version + 1,
            ..snapshot
        };
        true
    }

    fn enter(&self, phase: Phase, now: SystemTime) -> PhaseSnapshot {
        // Wall clock can step backwards; keep phase start after cycle start.
        let phase_started_at = match self.state.cycle_started_at {
            Some(cycle) if now < cycle => cycle,
            _ => now,
        };

        PhaseSnapshot {
            phase,
            phase_started_at: Some(phase_started_at),
            ..self.state.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn team() -> CycleSubject {
        CycleSubject {
            team_id: Some("team-7".into()),
            team_name: Some("Night Owls".into()),
        }
    }

    fn at(secs: u64) -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000 + secs)
    }

    fn all_events() -> Vec<PhaseEvent> {
        vec![
            PhaseEvent::Start(team()),
            PhaseEvent::StartRating,
            PhaseEvent::WarningElapsed,
            PhaseEvent::Stop,
        ]
    }

    #[test]
    fn initial_state_is_idle() {
        let sm = PhaseMachine::new();
        assert_eq!(sm.phase(), Phase::Idle);
        assert!(sm.is_pristine());
        assert_eq!(sm.snapshot().flags(), PhaseFlags::for_phase(Phase::Idle));
    }

    #[test]
    fn full_cycle_follows_the_table() {
        let mut sm = PhaseMachine::new();

        let t = sm.apply(PhaseEvent::Start(team()), at(0)).unwrap();
        assert_eq!((t.from, t.to), (Phase::Idle, Phase::Running));
        let t = sm.apply(PhaseEvent::StartRating, at(60)).unwrap();
        assert_eq!((t.from, t.to), (Phase::Running, Phase::Warning));
        assert!(t.arms_warning_timer());
        let t = sm.apply(PhaseEvent::WarningElapsed, at(65)).unwrap();
        assert_eq!((t.from, t.to), (Phase::Warning, Phase::Rating));
        assert!(!t.arms_warning_timer());
        let t = sm.apply(PhaseEvent::Stop, at(90)).unwrap();
        assert_eq!((t.from, t.to), (Phase::Rating, Phase::Idle));

        assert_eq!(sm.version(), 4);
        assert_eq!(sm.snapshot().cycle_started_at, None);
        assert_eq!(sm.snapshot().subject, None);
    }

    #[test]
    fn start_sets_both_timestamps_to_the_same_instant() {
        let mut sm = PhaseMachine::new();
        sm.apply(PhaseEvent::Start(team()), at(3)).unwrap();

        let snapshot = sm.snapshot();
        assert_eq!(snapshot.cycle_started_at, Some(at(3)));
        assert_eq!(snapshot.cycle_started_at, snapshot.phase_started_at);
        assert_eq!(snapshot.team_id(), Some("team-7"));
        assert_eq!(snapshot.team_name(), Some("Night Owls"));
    }

    #[test]
    fn phase_changes_keep_cycle_start() {
        let mut sm = PhaseMachine::new();
        sm.apply(PhaseEvent::Start(team()), at(0)).unwrap();
        sm.apply(PhaseEvent::StartRating, at(45)).unwrap();

        let snapshot = sm.snapshot();
        assert_eq!(snapshot.cycle_started_at, Some(at(0)));
        assert_eq!(snapshot.phase_started_at, Some(at(45)));
    }

    #[test]
    fn backwards_clock_is_clamped_to_cycle_start() {
        let mut sm = PhaseMachine::new();
        sm.apply(PhaseEvent::Start(team()), at(100)).unwrap();
        sm.apply(PhaseEvent::StartRating, at(50)).unwrap();

        let snapshot = sm.snapshot();
        assert_eq!(snapshot.phase_started_at, Some(at(100)));
        assert!(snapshot.is_consistent());
    }

    #[test]
    fn start_rating_can_be_repeated_while_warning() {
        let mut sm = PhaseMachine::new();
        sm.apply(PhaseEvent::Start(team()), at(0)).unwrap();
        sm.apply(PhaseEvent::StartRating, at(10)).unwrap();
        let t = sm.apply(PhaseEvent::StartRating, at(12)).unwrap();

        assert_eq!((t.from, t.to), (Phase::Warning, Phase::Warning));
        assert_eq!(sm.snapshot().phase_started_at, Some(at(12)));
    }

    #[test]
    fn illegal_events_never_change_the_phase() {
        let reachable = [
            vec![],
            vec![PhaseEvent::Start(team())],
            vec![PhaseEvent::Start(team()), PhaseEvent::StartRating],
            vec![
                PhaseEvent::Start(team()),
                PhaseEvent::StartRating,
                PhaseEvent::WarningElapsed,
            ],
        ];

        for path in reachable {
            for event in all_events() {
                let mut sm = PhaseMachine::new();
                for step in path.iter().cloned() {
                    sm.apply(step, at(1)).unwrap();
                }
                let before = sm.snapshot();
                if let Err(invalid) = sm.apply(event.clone(), at(2)) {
                    assert_eq!(invalid.from, before.phase);
                    assert_eq!(invalid.event, event);
                    assert_eq!(sm.snapshot(), before);
                }
            }
        }
    }

    #[test]
    fn invalid_transitions_are_rejected() {
        let mut sm = PhaseMachine::new();
        for event in [PhaseEvent::StartRating, PhaseEvent::WarningElapsed, PhaseEvent::Stop] {
            let err = sm.apply(event, at(0)).unwrap_err();
            assert_eq!(err.from, Phase::Idle);
        }

        sm.apply(PhaseEvent::Start(team()), at(0)).unwrap();
        let err = sm.apply(PhaseEvent::Start(team()), at(1)).unwrap_err();
        assert_eq!(err.from, Phase::Running);
        let err = sm.apply(PhaseEvent::WarningElapsed, at(1)).unwrap_err();
        assert_eq!(err.from, Phase::Running);
        assert_eq!(
            err.to_string(),
            "invalid transition: `warning-elapsed` cannot be applied while running"
        );
        assert_eq!(sm.version(), 1);
    }

    #[test]
    fn flags_follow_the_phase() {
        let mut sm = PhaseMachine::new();
        sm.apply(PhaseEvent::Start(team()), at(0)).unwrap();
        assert!(sm.snapshot().flags().pitch_cycle_active);
        assert!(!sm.snapshot().flags().voting_active);

        sm.apply(PhaseEvent::StartRating, at(1)).unwrap();
        sm.apply(PhaseEvent::WarningElapsed, at(2)).unwrap();
        assert!(sm.snapshot().flags().voting_active);

        sm.apply(PhaseEvent::Stop, at(3)).unwrap();
        let flags = sm.snapshot().flags();
        assert!(!flags.pitch_cycle_active && !flags.voting_active && !flags.all_pitches_completed);
    }

    #[test]
    fn restore_only_applies_to_a_pristine_machine() {
        let recovered = PhaseSnapshot {
            phase: Phase::Rating,
            cycle_started_at: Some(at(0)),
            phase_started_at: Some(at(30)),
            subject: Some(team()),
            version: 42,
        };

        let mut sm = PhaseMachine::new();
        assert!(sm.restore(recovered.clone()));
        assert_eq!(sm.phase(), Phase::Rating);
        assert_eq!(sm.version(), 1);
        assert!(!sm.restore(recovered.clone()));

        let mut busy = PhaseMachine::new();
        busy.apply(PhaseEvent::Start(team()), at(0)).unwrap();
        assert!(!busy.restore(recovered));
    }

    #[test]
    fn restore_rejects_inconsistent_snapshots() {
        let mut sm = PhaseMachine::new();
        let broken = PhaseSnapshot {
            phase: Phase::Running,
            cycle_started_at: Some(at(10)),
            phase_started_at: Some(at(5)),
            subject: None,
            version: 3,
        };
        assert!(!sm.restore(broken));
        assert!(sm.is_pristine());
    }

    #[test]
    fn phase_names_round_trip_through_storage_form() {
        for phase in [Phase::Idle, Phase::Running, Phase::Warning, Phase::Rating] {
            assert_eq!(Phase::parse(phase.as_str()), Some(phase));
        }
        assert_eq!(Phase::parse("paused"), None);
    }
}
