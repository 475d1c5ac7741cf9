//! Advisory operation lock.
//!
//! Derived from the event stream: `operation_started` locks,
//! `operation_completed` / `operation_failed` unlock. Losing connectivity
//! unlocks as well, so a dead stream never blocks the user. The lock only
//! reduces accidental double submissions from several devices; the backend
//! remains the authority.

use std::sync::Arc;

use beacon_core::{Notification, NotificationKind, OperationKind};
use tokio::sync::watch;
use tracing::debug;

/// Lock state snapshot.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LockState {
    /// An operation is in progress somewhere on the account.
    pub locked: bool,
    /// Which operation, if the server said.
    pub operation: Option<OperationKind>,
}

/// Shared, observable operation lock. Clones share state.
#[derive(Clone, Debug)]
pub struct OperationLock {
    state: Arc<watch::Sender<LockState>>,
}

impl Default for OperationLock {
    fn default() -> Self {
        Self::new()
    }
}

impl OperationLock {
    /// Unlocked.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(LockState::default());
        Self { state: Arc::new(tx) }
    }

    /// Feed one notification. Unrelated kinds are ignored.
    pub fn apply(&self, notification: &Notification) {
        match &notification.kind {
            NotificationKind::OperationStarted => {
                let operation = notification.operation();
                debug!(?operation, "operation started, locking");
                self.set(LockState {
                    locked: true,
                    operation,
                });
            }
            kind if kind.ends_operation() => {
                debug!(%kind, "operation ended, unlocking");
                self.set(LockState::default());
            }
            _ => {}
        }
    }

    /// Connectivity dropped: fail open.
    pub fn on_disconnect(&self) {
        self.set(LockState::default());
    }

    /// Whether mutating actions should be held back.
    pub fn is_locked(&self) -> bool {
        self.state.borrow().locked
    }

    /// The operation in progress, if any.
    pub fn current_operation(&self) -> Option<OperationKind> {
        self.state.borrow().operation.clone()
    }

    /// Current state.
    pub fn state(&self) -> LockState {
        self.state.borrow().clone()
    }

    /// Watch state changes.
    pub fn watch(&self) -> watch::Receiver<LockState> {
        self.state.subscribe()
    }

    fn set(&self, next: LockState) {
        let _ = self.state.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }
}
