//! Preallocated wait slots backing the send monitor.
//!
//! Slots are taken from a free list, so a finished ticket hands its slot
//! back at once no matter where it sits in issue order. Two index queues
//! keep the order:
//!
//! - `pending` - slots not yet admitted, in issue order
//! - `admitted` - slots admitted and not yet finished, in admission order
//!
//! A ticket is addressed by its sequence number and slot index. The slot
//! remembers the sequence number it was issued for, so a stale ticket
//! never matches a reused slot.

use super::wait::WaitHandle;
use std::collections::VecDeque;

/// Lifecycle of a ticket's slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SlotState {
    /// Not issued.
    Free,
    /// Issued; the holder has not blocked yet.
    Scheduled,
    /// The holder is blocked in `enter()`.
    Waiting,
    /// Admitted; the holder has not returned from `enter()` yet.
    Granted,
    /// The holder returned from `enter()` and is inside.
    Entered,
    /// Cancelled before admission; the holder has not observed it yet.
    Interrupted,
}

#[derive(Debug)]
struct WaitSlot {
    seq: u64,
    state: SlotState,
    waiter: Option<WaitHandle>,
}

/// Fixed set of wait slots with issue-order admission.
#[derive(Debug)]
pub(crate) struct WaitQueue {
    slots: Box<[WaitSlot]>,
    free: Vec<usize>,
    pending: VecDeque<usize>,
    admitted: VecDeque<usize>,
    next_seq: u64,
}

impl WaitQueue {
    /// Creates `len` slots. At most `concurrency` are expected to be
    /// admitted at once.
    pub(crate) fn new(len: usize, concurrency: usize) -> Self {
        let slots = (0..len)
            .map(|_| WaitSlot {
                seq: 0,
                state: SlotState::Free,
                waiter: None,
            })
            .collect();
        Self {
            slots,
            free: (0..len).rev().collect(),
            pending: VecDeque::with_capacity(len),
            admitted: VecDeque::with_capacity(concurrency.min(len)),
            next_seq: 0,
        }
    }

    /// Number of slots.
    pub(crate) fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Tickets issued and not yet finished.
    pub(crate) fn users(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    pub(crate) fn is_full(&self) -> bool {
        self.free.is_empty()
    }

    fn slot_mut(&mut self, seq: u64, idx: usize) -> Option<&mut WaitSlot> {
        let slot = self.slots.get_mut(idx)?;
        (slot.seq == seq && slot.state != SlotState::Free).then_some(slot)
    }

    /// Issues a ticket at the back of the line. Returns its sequence
    /// number and slot index, or `None` if every slot is taken.
    pub(crate) fn push(&mut self) -> Option<(u64, usize)> {
        let idx = self.free.pop()?;
        let seq = self.next_seq;
        self.next_seq += 1;

        let slot = &mut self.slots[idx];
        debug_assert_eq!(slot.state, SlotState::Free);
        slot.seq = seq;
        slot.state = SlotState::Scheduled;
        slot.waiter = None;
        self.pending.push_back(idx);
        Some((seq, idx))
    }

    /// Returns the state of the live ticket `seq` in slot `idx`.
    pub(crate) fn state(&self, seq: u64, idx: usize) -> Option<SlotState> {
        let slot = self.slots.get(idx)?;
        (slot.seq == seq && slot.state != SlotState::Free).then_some(slot.state)
    }

    /// Parks `waiter` in the slot; the holder is about to block.
    pub(crate) fn park(&mut self, seq: u64, idx: usize, waiter: &WaitHandle) {
        if let Some(slot) = self.slot_mut(seq, idx) {
            debug_assert_eq!(slot.state, SlotState::Scheduled);
            slot.state = SlotState::Waiting;
            slot.waiter = Some(waiter.clone());
        }
    }

    /// Marks an admitted holder as inside.
    pub(crate) fn mark_entered(&mut self, seq: u64, idx: usize) {
        if let Some(slot) = self.slot_mut(seq, idx) {
            debug_assert_eq!(slot.state, SlotState::Granted);
            slot.state = SlotState::Entered;
        }
    }

    /// Cancels the pending ticket `seq` and drops it from the line.
    ///
    /// Returns `None` if no pending ticket has that sequence number,
    /// otherwise the blocked holder to wake, if any.
    pub(crate) fn interrupt(&mut self, seq: u64) -> Option<Option<WaitHandle>> {
        let pos = self
            .pending
            .iter()
            .position(|&idx| self.slots[idx].seq == seq)?;
        let idx = self.pending.remove(pos)?;

        let slot = &mut self.slots[idx];
        slot.state = SlotState::Interrupted;
        Some(slot.waiter.take())
    }

    /// Finishes a ticket and returns its slot to the free list.
    pub(crate) fn release(&mut self, seq: u64, idx: usize) {
        let Some(slot) = self.slot_mut(seq, idx) else {
            return;
        };
        let prev = slot.state;
        slot.state = SlotState::Free;
        slot.waiter = None;

        let line = match prev {
            SlotState::Granted | SlotState::Entered => &mut self.admitted,
            _ => &mut self.pending,
        };
        line.retain(|&i| i != idx);
        self.free.push(idx);
    }

    /// Finishes the earliest admitted ticket whose holder is inside.
    ///
    /// Returns false if no holder is inside.
    pub(crate) fn release_oldest_entered(&mut self) -> bool {
        let Some(pos) = self
            .admitted
            .iter()
            .position(|&idx| self.slots[idx].state == SlotState::Entered)
        else {
            return false;
        };
        if let Some(idx) = self.admitted.remove(pos) {
            let slot = &mut self.slots[idx];
            slot.state = SlotState::Free;
            slot.waiter = None;
            self.free.push(idx);
        }
        true
    }

    /// Admits the next pending ticket in issue order.
    ///
    /// Returns `None` when nothing is pending, otherwise the blocked
    /// holder to wake, if the ticket's holder is already blocked.
    pub(crate) fn admit_next(&mut self) -> Option<Option<WaitHandle>> {
        let idx = self.pending.pop_front()?;
        self.admitted.push_back(idx);

        let slot = &mut self.slots[idx];
        debug_assert!(matches!(
            slot.state,
            SlotState::Scheduled | SlotState::Waiting
        ));
        slot.state = SlotState::Granted;
        Some(slot.waiter.take())
    }

    /// Takes every pending ticket out of the line. Their holders find
    /// out on their next look at the slot.
    pub(crate) fn clear_pending(&mut self) {
        self.pending.clear();
    }

    /// Holders currently blocked in `enter()`.
    pub(crate) fn waiters(&self) -> impl Iterator<Item = &WaitHandle> + '_ {
        self.slots.iter().filter_map(|slot| slot.waiter.as_ref())
    }
}
