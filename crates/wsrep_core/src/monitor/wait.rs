//! Caller-owned wait token.

use parking_lot::{Condvar, MutexGuard};
use std::fmt;
use std::sync::Arc;

/// A condition a thread blocks on inside [`SendMonitor::enter`].
///
/// The handle belongs to the caller. The monitor keeps a clone in the
/// caller's queue slot only while the caller is blocked, and drops it as
/// soon as the slot is admitted, interrupted or released. One handle may
/// be reused across any number of `enter()` calls.
///
/// A handle waits on one monitor at a time. Threads may share a handle
/// while they block on the same monitor, and a handle may move to
/// another monitor once nobody is blocked on it, but blocking on two
/// monitors through one handle at the same time panics.
///
/// [`SendMonitor::enter`]: crate::SendMonitor::enter
#[derive(Clone, Default)]
pub struct WaitHandle {
    cond: Arc<Condvar>,
}

impl WaitHandle {
    /// Creates a new wait handle.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Blocks on this handle, atomically releasing `guard` for the wait.
    ///
    /// Every concurrent waiter must pass a guard of the same mutex.
    pub(crate) fn wait<T>(&self, guard: &mut MutexGuard<'_, T>) {
        self.cond.wait(guard);
    }

    /// Wakes every thread blocked on this handle. Each re-checks its own
    /// slot.
    pub(crate) fn notify(&self) {
        self.cond.notify_all();
    }
}

impl fmt::Debug for WaitHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WaitHandle")
            .field("holders", &Arc::strong_count(&self.cond))
            .finish()
    }
}
