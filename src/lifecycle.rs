//! Capture-session lifecycle signal.
//!
//! The multiplexer publishes a two-state signal that tracks registry
//! occupancy: `Working` while at least one sink is registered, `Idle`
//! otherwise. A hosting collaborator observes it to decide whether to keep
//! its own process or session alive.

use tokio::sync::watch;

/// Aggregate activity state of the capture session.
///
/// Emitted exactly once per transition: `Working` when the registry goes
/// from empty to non-empty, `Idle` when it goes back to empty. Interior
/// changes (e.g. a second sink joining) emit nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LifecycleState {
    /// No sinks are registered; the capture device is stopped.
    #[default]
    Idle,
    /// At least one sink is registered; the capture device is running.
    Working,
}

/// Publisher side of the lifecycle signal.
///
/// Built on `tokio::sync::watch`: late subscribers immediately observe the
/// most recent state, and `set` only emits on an actual transition, so
/// consecutive duplicates are never published.
pub(crate) struct LifecycleSignal {
    tx: watch::Sender<LifecycleState>,
}

impl LifecycleSignal {
    /// Creates a signal in the `Idle` state.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(LifecycleState::Idle);
        Self { tx }
    }

    /// Publishes `state` if it differs from the current value.
    pub fn set(&self, state: LifecycleState) {
        let changed = self.tx.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        });
        if changed {
            tracing::debug!(?state, "lifecycle transition");
        }
    }

    /// Returns the current state.
    pub fn current(&self) -> LifecycleState {
        *self.tx.borrow()
    }

    /// Creates a new observer of the signal.
    pub fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state_is_idle() {
        let signal = LifecycleSignal::new();
        assert_eq!(signal.current(), LifecycleState::Idle);
    }

    #[test]
    fn test_transition_is_observable() {
        let signal = LifecycleSignal::new();
        let mut rx = signal.subscribe();

        signal.set(LifecycleState::Working);

        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), LifecycleState::Working);
    }

    #[test]
    fn test_no_duplicate_emission() {
        let signal = LifecycleSignal::new();
        let mut rx = signal.subscribe();

        signal.set(LifecycleState::Working);
        let _ = rx.borrow_and_update();

        // Setting the same state again must not wake observers
        signal.set(LifecycleState::Working);
        assert!(!rx.has_changed().unwrap());

        signal.set(LifecycleState::Idle);
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), LifecycleState::Idle);
    }

    #[test]
    fn test_late_subscriber_sees_latest() {
        let signal = LifecycleSignal::new();
        signal.set(LifecycleState::Working);

        // Subscribed after the transition, still sees the current value
        let rx = signal.subscribe();
        assert_eq!(*rx.borrow(), LifecycleState::Working);
    }
}
