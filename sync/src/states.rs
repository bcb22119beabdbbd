use parking_lot::Mutex;
use tracing::warn;

/// Import worker state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WorkerState {
    /// Worker loop is live: waiting for blocks, importing, or backing off.
    ///
    /// Initial state. The worker is spawned together with the sync queue.
    #[default]
    Running,

    /// Shutdown was requested. The current import, if any, is allowed to
    /// finish, after which the loop exits.
    Stopping,

    /// Worker loop has exited. It is never restarted.
    Stopped,
}

impl WorkerState {
    /// Check if a transition to the target state is valid.
    pub fn can_transition_to(&self, target: WorkerState) -> bool {
        match self {
            WorkerState::Running => matches!(target, WorkerState::Stopping | WorkerState::Stopped),
            WorkerState::Stopping => matches!(target, WorkerState::Stopped),
            WorkerState::Stopped => false,
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self, WorkerState::Running)
    }
}

/// Move `state` to `target` if the transition is allowed.
pub(crate) fn transition(state: &Mutex<WorkerState>, target: WorkerState) -> bool {
    let mut current = state.lock();
    if *current == target {
        return false;
    }
    if !current.can_transition_to(target) {
        warn!(
            from = ?*current,
            to = ?target,
            "Invalid worker state transition attempted"
        );
        return false;
    }
    *current = target;
    true
}
