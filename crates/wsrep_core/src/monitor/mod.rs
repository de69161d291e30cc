//! Send monitor: fair, bounded-concurrency admission to the send path.
//!
//! Callers obtain a place in line with [`SendMonitor::schedule`], which
//! never blocks, and later block in [`SendMonitor::enter`] until their
//! ticket is admitted. Admission follows the order of `schedule()` calls,
//! not the order in which threads start waiting.
//!
//! ## Ticket lifecycle
//!
//! ```text
//! Scheduled -> Waiting -> Admitted -> Left
//!          \          \-> Interrupted
//!           \          \-> Closed
//!            \-> Admitted -> Left
//! ```
//!
//! Only an admitted holder calls [`SendMonitor::leave`]. Every other exit
//! is final on its own.
//!
//! ## Example
//!
//! ```rust
//! use wsrep_core::{SendMonitor, WaitHandle};
//!
//! let monitor = SendMonitor::new(4, 1).unwrap();
//! let wait = WaitHandle::new();
//!
//! let ticket = monitor.schedule().unwrap();
//! assert_eq!(ticket.handle(), 0);
//! monitor.enter(&wait, Some(ticket)).unwrap();
//! // ... send the write-set ...
//! monitor.leave();
//! ```

mod queue;
mod wait;

pub use wait::WaitHandle;

use crate::config::MonitorConfig;
use crate::error::{CoreError, CoreResult};
use parking_lot::Mutex;
use queue::{SlotState, WaitQueue};
use tracing::{debug, warn};

/// A reserved place in the send monitor's queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    seq: u64,
    slot: usize,
    wait: bool,
}

impl Ticket {
    /// Handle used to [`interrupt`](SendMonitor::interrupt) this ticket.
    ///
    /// `0` means the ticket was admitted when it was scheduled and cannot
    /// be interrupted. Positive handles are never reused by a monitor.
    #[must_use]
    pub const fn handle(&self) -> u64 {
        if self.wait {
            self.seq + 1
        } else {
            0
        }
    }

    /// Returns true if the holder may have to block in `enter()`.
    #[must_use]
    pub const fn must_wait(&self) -> bool {
        self.wait
    }

    /// Position of this ticket in issue order, starting at 0.
    #[must_use]
    pub const fn seq(&self) -> u64 {
        self.seq
    }
}

/// Point-in-time view of a send monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorStats {
    /// Number of wait queue slots.
    pub queue_len: usize,
    /// Maximum number of holders inside at once.
    pub concurrency: usize,
    /// Tickets issued and not yet finished: queued, admitted or
    /// interrupted but not yet observed by their holder.
    pub users: usize,
    /// Admitted tickets that have not left.
    pub entered: usize,
    /// Whether admission is paused.
    pub paused: bool,
    /// Whether the monitor is closed.
    pub closed: bool,
    /// Tickets issued since creation.
    pub scheduled: u64,
    /// Holders that had to block in `enter()`.
    pub waited: u64,
    /// Tickets cancelled through `interrupt()`.
    pub interrupted: u64,
}

#[derive(Debug)]
struct MonitorState {
    queue: WaitQueue,
    concurrency: usize,
    entered: usize,
    paused: bool,
    closed: bool,
    scheduled: u64,
    waited: u64,
    interrupted: u64,
}

impl MonitorState {
    fn schedule(&mut self) -> CoreResult<Ticket> {
        if self.closed {
            return Err(CoreError::Closed);
        }
        let Some((seq, slot)) = self.queue.push() else {
            return Err(CoreError::CapacityExceeded);
        };
        self.scheduled += 1;
        self.wake_up_next();

        let wait = self.queue.state(seq, slot) != Some(SlotState::Granted);
        Ok(Ticket { seq, slot, wait })
    }

    /// Admits queued tickets in issue order up to the concurrency cap.
    fn wake_up_next(&mut self) {
        if self.paused || self.closed {
            return;
        }

        while self.entered < self.concurrency {
            match self.queue.admit_next() {
                Some(waiter) => {
                    self.entered += 1;
                    if let Some(waiter) = waiter {
                        waiter.notify();
                    }
                }
                None => break,
            }
        }

        debug_assert!(self.entered <= self.concurrency);
    }

    fn stats(&self) -> MonitorStats {
        MonitorStats {
            queue_len: self.queue.capacity(),
            concurrency: self.concurrency,
            users: self.queue.users(),
            entered: self.entered,
            paused: self.paused,
            closed: self.closed,
            scheduled: self.scheduled,
            waited: self.waited,
            interrupted: self.interrupted,
        }
    }
}

/// Bounded-concurrency FIFO gate in front of the group send path.
///
/// The monitor holds `queue_len` slots. Each ticket occupies a slot from
/// `schedule()` until it leaves, is interrupted, or is turned away by
/// `close()`. At most `concurrency` tickets are admitted at once;
/// with a concurrency of 1 the monitor is a fair mutex.
///
/// All operations except [`enter`](Self::enter) return after a brief
/// lock hold.
pub struct SendMonitor {
    state: Mutex<MonitorState>,
}

impl SendMonitor {
    /// Creates a monitor with `queue_len` slots admitting up to
    /// `concurrency` holders at once.
    ///
    /// Fails if `queue_len` is not a power of two or `concurrency` is 0.
    pub fn new(queue_len: usize, concurrency: usize) -> CoreResult<Self> {
        Self::with_config(&MonitorConfig {
            queue_len,
            concurrency,
        })
    }

    /// Creates a monitor from a configuration.
    pub fn with_config(config: &MonitorConfig) -> CoreResult<Self> {
        config.validate()?;
        debug!(
            "Creating send monitor: queue_len {}, concurrency {}",
            config.queue_len, config.concurrency
        );

        Ok(Self {
            state: Mutex::new(MonitorState {
                queue: WaitQueue::new(config.queue_len, config.concurrency),
                concurrency: config.concurrency,
                entered: 0,
                paused: false,
                closed: false,
                scheduled: 0,
                waited: 0,
                interrupted: 0,
            }),
        })
    }

    /// Reserves the next place in line without blocking.
    ///
    /// The returned ticket must be passed to [`enter`](Self::enter). Its
    /// handle is 0 if it was admitted at once.
    ///
    /// # Errors
    ///
    /// - [`CoreError::CapacityExceeded`] if every slot is taken
    /// - [`CoreError::Closed`] if the monitor has been closed
    pub fn schedule(&self) -> CoreResult<Ticket> {
        self.state.lock().schedule()
    }

    /// Enters the monitor, blocking on `wait` until admitted.
    ///
    /// Pass the ticket from a prior [`schedule`](Self::schedule) call, or
    /// `None` to schedule now. Returns only once the ticket has been
    /// admitted, interrupted, or turned away by `close()`.
    ///
    /// # Errors
    ///
    /// - [`CoreError::Interrupted`] if the ticket was cancelled
    /// - [`CoreError::Closed`] if the monitor was closed before the holder
    ///   got in; its slot is released on its behalf
    /// - [`CoreError::CapacityExceeded`] if scheduling here failed
    ///
    /// # Panics
    ///
    /// Panics if the ticket has already entered or finished.
    pub fn enter(&self, wait: &WaitHandle, ticket: Option<Ticket>) -> CoreResult<()> {
        let mut state = self.state.lock();
        let Ticket { seq, slot, .. } = match ticket {
            Some(ticket) => ticket,
            None => state.schedule()?,
        };

        loop {
            match state.queue.state(seq, slot) {
                Some(SlotState::Granted) => {
                    if state.closed {
                        // Admitted but never got in: give the grant back.
                        state.entered -= 1;
                        state.queue.release(seq, slot);
                        return Err(CoreError::Closed);
                    }
                    state.queue.mark_entered(seq, slot);
                    return Ok(());
                }
                Some(SlotState::Interrupted) => {
                    state.queue.release(seq, slot);
                    return Err(CoreError::Interrupted);
                }
                Some(SlotState::Scheduled) => {
                    if state.closed {
                        state.queue.release(seq, slot);
                        return Err(CoreError::Closed);
                    }
                    state.queue.park(seq, slot, wait);
                    state.waited += 1;
                }
                Some(SlotState::Waiting) => {
                    if state.closed {
                        state.queue.release(seq, slot);
                        return Err(CoreError::Closed);
                    }
                }
                other => panic!("enter() with a ticket that is not pending: seq {seq}, {other:?}"),
            }

            wait.wait(&mut state);
        }
    }

    /// Leaves the monitor and admits the next tickets in line.
    ///
    /// # Panics
    ///
    /// Panics if no holder is inside.
    pub fn leave(&self) {
        let mut state = self.state.lock();

        let released = state.queue.release_oldest_entered();
        assert!(released, "leave() with no holder inside the send monitor");
        state.entered -= 1;

        state.wake_up_next();
    }

    /// Stops admitting tickets. Holders already inside are unaffected.
    ///
    /// A closed monitor is not paused.
    pub fn pause(&self) {
        let mut state = self.state.lock();
        if state.closed {
            debug!("Not pausing closed send monitor");
            return;
        }
        state.paused = true;
        debug!("Send monitor paused, {} inside", state.entered);
    }

    /// Resumes admission and admits queued tickets up to the concurrency
    /// cap.
    pub fn continue_(&self) {
        let mut state = self.state.lock();

        debug_assert!(state.paused, "continue_() on an unpaused send monitor");
        if !state.paused {
            debug!("Trying to continue unpaused monitor");
            return;
        }

        state.paused = false;
        state.wake_up_next();
        debug!("Send monitor resumed, {} inside", state.entered);
    }

    /// Cancels the ticket identified by `handle`.
    ///
    /// Succeeds only if the ticket has not been admitted yet. Its holder
    /// is woken if blocked, and its `enter()` returns
    /// [`CoreError::Interrupted`] exactly once.
    ///
    /// # Errors
    ///
    /// [`CoreError::NotFound`] if the ticket is admitted, finished, or
    /// already interrupted.
    pub fn interrupt(&self, handle: u64) -> CoreResult<()> {
        let Some(seq) = handle.checked_sub(1) else {
            return Err(CoreError::NotFound);
        };

        let mut state = self.state.lock();
        match state.queue.interrupt(seq) {
            Some(waiter) => {
                if let Some(waiter) = waiter {
                    waiter.notify();
                }
                state.interrupted += 1;
                debug!("Interrupted send monitor ticket {}", handle);
                Ok(())
            }
            None => Err(CoreError::NotFound),
        }
    }

    /// Closes the monitor.
    ///
    /// Every later `schedule()` and `enter()` fails with
    /// [`CoreError::Closed`], and blocked holders are woken to fail the
    /// same way. Holders already inside stay until they `leave()`.
    ///
    /// Does not block. Returns the number of tickets still queued or
    /// inside; poll [`users`](Self::users) to observe the drain.
    pub fn close(&self) -> usize {
        let mut state = self.state.lock();

        if !state.closed {
            state.closed = true;
            state.paused = false;
            state.queue.clear_pending();
            for waiter in state.queue.waiters() {
                waiter.notify();
            }
        }

        let users = state.queue.users();
        debug!("Send monitor closed, {} users remaining", users);
        users
    }

    /// Tickets issued and not yet finished; see [`MonitorStats::users`].
    #[must_use]
    pub fn users(&self) -> usize {
        self.state.lock().queue.users()
    }

    /// Admitted tickets that have not left.
    #[must_use]
    pub fn entered(&self) -> usize {
        self.state.lock().entered
    }

    /// Whether admission is paused.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.state.lock().paused
    }

    /// Whether the monitor has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Returns a snapshot of the monitor's counters.
    #[must_use]
    pub fn stats(&self) -> MonitorStats {
        self.state.lock().stats()
    }
}

impl Drop for SendMonitor {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        if state.queue.users() > 0 {
            warn!(
                "Destroying send monitor with {} users, {} inside",
                state.queue.users(),
                state.entered
            );
        }
    }
}

impl std::fmt::Debug for SendMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let stats = self.stats();
        f.debug_struct("SendMonitor")
            .field("users", &stats.users)
            .field("entered", &stats.entered)
            .field("paused", &stats.paused)
            .field("closed", &stats.closed)
            .finish_non_exhaustive()
    }
}
