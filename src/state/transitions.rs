use std::time::{Duration, SystemTime};

use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::{
    services::sse_events::broadcast_phase_changed,
    state::{
        PendingAdvance, PhaseRuntime, SharedState,
        phase_machine::{InvalidTransition, Phase, PhaseEvent, PhaseSnapshot},
    },
};

/// Apply `event` under the command gate, then publish and broadcast the result.
///
/// Validation and mutation happen without yielding, so two commands can never both
/// pass validation against the same phase.
pub async fn run_transition_with_broadcast(
    state: &SharedState,
    event: PhaseEvent,
) -> Result<PhaseSnapshot, InvalidTransition> {
    let mut runtime = state.lock_phase().await;
    apply_locked(state, &mut runtime, event)
}

/// Timer callback: move `warning` to `rating` unless the timer was superseded.
pub async fn advance_after_warning(state: &SharedState, armed_version: u64) {
    let mut runtime = state.lock_phase().await;

    if !runtime.claim_pending(armed_version) || runtime.machine.version() != armed_version {
        debug!(
            armed_version,
            current_version = runtime.machine.version(),
            "ignoring stale warning timer"
        );
        return;
    }

    if let Err(err) = apply_locked(state, &mut runtime, PhaseEvent::WarningElapsed) {
        debug!(error = %err, "warning timer fired outside of warning phase");
    }
}

/// Arm the auto-advance timer for the machine's current version.
pub fn arm_warning_timer(state: &SharedState, runtime: &mut PhaseRuntime, delay: Duration) {
    let version = runtime.machine.version();
    let task_state = SharedState::clone(state);
    let handle = tokio::spawn(async move {
        sleep(delay).await;
        advance_after_warning(&task_state, version).await;
    })
    .abort_handle();

    runtime.arm(PendingAdvance::new(version, handle));
    debug!(version, delay_ms = delay.as_millis() as u64, "warning timer armed");
}

/// Resume a recovered snapshot if nothing has happened since startup.
///
/// A restored `warning` phase re-arms the timer for whatever is left of the delay.
/// Returns the snapshot now in effect when the restore was applied.
pub async fn restore_with_broadcast(
    state: &SharedState,
    recovered: PhaseSnapshot,
) -> Option<PhaseSnapshot> {
    let mut runtime = state.lock_phase().await;
    let phase = recovered.phase;
    let phase_started_at = recovered.phase_started_at;

    if !runtime.machine.restore(recovered) {
        debug!(phase = %phase, "skipping restore; machine already moved or snapshot unusable");
        return None;
    }

    runtime.cancel_pending();
    if phase == Phase::Warning {
        let remaining = remaining_warning_delay(
            state.config().warning_delay,
            phase_started_at,
            SystemTime::now(),
        );
        arm_warning_timer(state, &mut runtime, remaining);
    }

    let snapshot = runtime.machine.snapshot();
    info!(phase = %snapshot.phase, version = snapshot.version, "phase restored from storage");
    state.publish_snapshot(snapshot.clone());
    broadcast_phase_changed(state, &snapshot);
    Some(snapshot)
}

/// Time left in `warning` given when it started; zero once overdue.
pub fn remaining_warning_delay(
    delay: Duration,
    phase_started_at: Option<SystemTime>,
    now: SystemTime,
) -> Duration {
    let Some(started) = phase_started_at else {
        warn!("warning phase without a start time; advancing immediately");
        return Duration::ZERO;
    };
    let elapsed = now.duration_since(started).unwrap_or_default();
    delay.saturating_sub(elapsed)
}

fn apply_locked(
    state: &SharedState,
    runtime: &mut PhaseRuntime,
    event: PhaseEvent,
) -> Result<PhaseSnapshot, InvalidTransition> {
    let name = event.name();
    let transition = runtime.machine.apply(event, SystemTime::now())?;

    // Every accepted transition supersedes whatever timer was pending.
    runtime.cancel_pending();
    if transition.arms_warning_timer() {
        arm_warning_timer(state, runtime, state.config().warning_delay);
    }

    let snapshot = runtime.machine.snapshot();
    info!(
        event = name,
        from = %transition.from,
        to = %transition.to,
        version = transition.version,
        "phase transition applied"
    );

    state.publish_snapshot(snapshot.clone());
    broadcast_phase_changed(state, &snapshot);
    Ok(snapshot)
}
