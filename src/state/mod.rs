pub mod hub;
pub mod phase_machine;
pub mod sse;
pub mod transitions;

use std::sync::Arc;

use tokio::{
    sync::{Mutex, MutexGuard, RwLock, watch},
    task::AbortHandle,
};

use crate::{config::AppConfig, dao::phase_store::PhaseStore};

pub use self::hub::{BroadcastHub, DeliveryError, SubscriptionId};
pub use self::phase_machine::{InvalidTransition, Phase, PhaseSnapshot};
pub use self::sse::{SseHub, Topic};
use self::{phase_machine::PhaseMachine, sse::SseState};

pub type SharedState = Arc<AppState>;

/// Auto-advance timer armed when the machine enters `warning`.
pub struct PendingAdvance {
    /// Machine version the timer was armed for.
    pub version: u64,
    handle: AbortHandle,
}

impl PendingAdvance {
    /// Track a spawned timer task.
    pub fn new(version: u64, handle: AbortHandle) -> Self {
        Self { version, handle }
    }
}

/// Phase machine plus its single timer slot, guarded by the command gate.
#[derive(Default)]
pub struct PhaseRuntime {
    /// The phase machine itself.
    pub machine: PhaseMachine,
    pending_advance: Option<PendingAdvance>,
}

impl PhaseRuntime {
    /// Abort and forget the pending timer, if any.
    pub fn cancel_pending(&mut self) {
        if let Some(pending) = self.pending_advance.take() {
            pending.handle.abort();
        }
    }

    /// Install a new timer, cancelling the previous one first.
    pub fn arm(&mut self, pending: PendingAdvance) {
        self.cancel_pending();
        self.pending_advance = Some(pending);
    }

    /// Release the slot held by the timer armed for `version` without aborting it.
    ///
    /// Returns false when the slot belongs to another timer or is empty.
    pub fn claim_pending(&mut self, version: u64) -> bool {
        match &self.pending_advance {
            Some(pending) if pending.version == version => {
                self.pending_advance = None;
                true
            }
            _ => false,
        }
    }

    /// Version of the armed timer, if any.
    pub fn pending_version(&self) -> Option<u64> {
        self.pending_advance.as_ref().map(|pending| pending.version)
    }
}

/// Central application state: phase runtime, stream hubs and storage handle.
///
/// Built once in `main` and shared through axum's `State` for the life of the process.
pub struct AppState {
    config: AppConfig,
    phase_store: RwLock<Option<Arc<dyn PhaseStore>>>,
    sse: SseState,
    phase: Mutex<PhaseRuntime>,
    snapshot: watch::Sender<PhaseSnapshot>,
    degraded: watch::Sender<bool>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(config: AppConfig) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        let (snapshot_tx, _rx) = watch::channel(PhaseSnapshot::idle());
        Arc::new(Self {
            config,
            phase_store: RwLock::new(None),
            sse: SseState::new(),
            phase: Mutex::new(PhaseRuntime::default()),
            snapshot: snapshot_tx,
            degraded: degraded_tx,
        })
    }

    /// Runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Obtain a handle to the current phase store, if one is installed.
    pub async fn phase_store(&self) -> Option<Arc<dyn PhaseStore>> {
        let guard = self.phase_store.read().await;
        guard.as_ref().cloned()
    }

    /// Install a new phase store implementation and leave degraded mode.
    pub async fn set_phase_store(&self, store: Arc<dyn PhaseStore>) {
        {
            let mut guard = self.phase_store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false);
    }

    /// Remove the current phase store and enter degraded mode.
    pub async fn clear_phase_store(&self) {
        {
            let mut guard = self.phase_store.write().await;
            guard.take();
        }
        self.update_degraded(true);
    }

    /// Current degraded flag.
    pub fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Update and broadcast the degraded flag when the value changes.
    pub fn update_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            if *current == value {
                return false;
            }
            *current = value;
            true
        });
    }

    /// Broadcast hub serving `topic`.
    pub fn hub(&self, topic: Topic) -> &SseHub {
        self.sse.hub(topic)
    }

    /// Latest published phase snapshot. Never waits on the command gate.
    pub fn current_snapshot(&self) -> PhaseSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Subscribe to published phase snapshots.
    pub fn snapshot_watcher(&self) -> watch::Receiver<PhaseSnapshot> {
        self.snapshot.subscribe()
    }

    /// Acquire the command gate. Transitions, timer fires and restores all go through it.
    pub async fn lock_phase(&self) -> MutexGuard<'_, PhaseRuntime> {
        self.phase.lock().await
    }

    /// Notify watchers again with the unchanged snapshot, so the writer persists it.
    pub fn republish_snapshot(&self) {
        self.snapshot.send_modify(|_| {});
    }

    /// Make `snapshot` visible to queries and the persistence writer.
    pub fn publish_snapshot(&self, snapshot: PhaseSnapshot) {
        self.snapshot.send_replace(snapshot);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn starts_idle_and_degraded() {
        let state = AppState::new(AppConfig::default());
        assert!(state.is_degraded());
        assert_eq!(state.current_snapshot(), PhaseSnapshot::idle());
        assert_eq!(state.hub(Topic::Rating).count(), 0);
    }

    #[tokio::test]
    async fn degraded_flag_follows_store_presence() {
        let state = AppState::new(AppConfig::default());
        let mut watcher = state.degraded_watcher();

        state
            .set_phase_store(Arc::new(crate::dao::phase_store::memory::MemoryPhaseStore::new()))
            .await;
        assert!(!state.is_degraded());
        assert!(watcher.has_changed().unwrap());
        watcher.borrow_and_update();

        state.update_degraded(false);
        assert!(!watcher.has_changed().unwrap());

        state.clear_phase_store().await;
        assert!(state.is_degraded());
        assert!(state.phase_store().await.is_none());
    }

    #[tokio::test]
    async fn arming_replaces_the_previous_timer() {
        let first = tokio::spawn(std::future::pending::<()>());
        let second = tokio::spawn(std::future::pending::<()>());

        let mut runtime = PhaseRuntime::default();
        runtime.arm(PendingAdvance::new(1, first.abort_handle()));
        runtime.arm(PendingAdvance::new(2, second.abort_handle()));

        assert!(first.await.unwrap_err().is_cancelled());
        assert_eq!(runtime.pending_version(), Some(2));
        assert!(!runtime.claim_pending(1));
        assert!(runtime.claim_pending(2));
        assert_eq!(runtime.pending_version(), None);
        second.abort();
    }
}
