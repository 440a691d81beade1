//! Per-directive notify-once queue.

use std::sync::Mutex;

use super::Handle;

/// Result of registering a waiter.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Registration {
    /// Queued until the owner fires.
    Queued,
    /// The owner already fired; the waiter must proceed on its own.
    Fired,
}

/// Deferred callbacks fired once, when the owning directive is Rendered.
///
/// Registration and firing are serialized by one mutex, so a waiter either
/// lands in the queue before the fire drains it or learns that the fire
/// already happened. No wake-up is lost.
#[derive(Debug, Default)]
pub struct Scheduler {
    state: Mutex<SchedulerState>,
}

#[derive(Debug, Default)]
struct SchedulerState {
    fired: bool,
    waiters: Vec<Handle>,
}

impl Scheduler {
    pub(crate) fn register(&self, waiter: Handle) -> Registration {
        let mut state = self.state.lock().unwrap();
        if state.fired {
            return Registration::Fired;
        }
        if !state.waiters.contains(&waiter) {
            state.waiters.push(waiter);
        }
        Registration::Queued
    }

    /// Mark as fired and take the waiters. Later calls return nothing.
    pub(crate) fn fire(&self) -> Vec<Handle> {
        let mut state = self.state.lock().unwrap();
        if state.fired {
            return Vec::new();
        }
        state.fired = true;
        std::mem::take(&mut state.waiters)
    }

    pub fn has_fired(&self) -> bool {
        self.state.lock().unwrap().fired
    }

    /// Number of queued waiters.
    pub fn pending(&self) -> usize {
        self.state.lock().unwrap().waiters.len()
    }
}
