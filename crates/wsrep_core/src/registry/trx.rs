//! Shared transaction handle.

use super::write_set::WriteSet;
use crate::types::{ConnId, NodeId, TrxId};
use parking_lot::{Mutex, MutexGuard};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::trace;

struct TrxInner {
    source: NodeId,
    conn_id: Option<ConnId>,
    trx_id: Option<TrxId>,
    local: bool,
    // Both are changed only under the registry lock. `held` is set while
    // the owner (the trx map entry or the connection) keeps its reference.
    refs: AtomicUsize,
    held: AtomicBool,
    write_set: Mutex<WriteSet>,
}

/// Shared handle to one transaction's write-set state.
///
/// Cloning the handle does not count as a reference. References are
/// counted explicitly by the [`TrxRegistry`](super::TrxRegistry): the
/// registry's own entry is one reference, and every successful
/// `get_or_create_trx` adds one that the caller gives back with
/// `release_trx`. The registry keeps its reference until the handle is
/// discarded; the state is freed when the last reference is released.
///
/// A transaction started on a connection is owned by the connection
/// instead: the connection holds its one reference until the transaction
/// is detached, and callers never add or release references to it.
#[derive(Clone)]
pub struct TrxHandle {
    inner: Arc<TrxInner>,
}

impl TrxHandle {
    pub(crate) fn new(
        source: NodeId,
        conn_id: Option<ConnId>,
        trx_id: Option<TrxId>,
        local: bool,
    ) -> Self {
        trace!("Creating trx handle conn {:?} trx {:?}", conn_id, trx_id);
        Self {
            inner: Arc::new(TrxInner {
                source,
                conn_id,
                trx_id,
                local,
                refs: AtomicUsize::new(1),
                held: AtomicBool::new(true),
                write_set: Mutex::new(WriteSet::new()),
            }),
        }
    }

    /// Node the transaction originated on.
    #[must_use]
    pub fn source(&self) -> NodeId {
        self.inner.source
    }

    /// Connection the transaction belongs to, if it was started implicitly
    /// on one.
    #[must_use]
    pub fn conn_id(&self) -> Option<ConnId> {
        self.inner.conn_id
    }

    /// Transaction ID, if the transaction was registered by ID.
    #[must_use]
    pub fn trx_id(&self) -> Option<TrxId> {
        self.inner.trx_id
    }

    /// Whether the transaction originated on this node.
    #[must_use]
    pub fn is_local(&self) -> bool {
        self.inner.local
    }

    /// Current number of references, the registry's own included.
    #[must_use]
    pub fn ref_count(&self) -> usize {
        self.inner.refs.load(Ordering::Relaxed)
    }

    /// Whether the transaction is still in the registry's transaction
    /// map. Always false for connection-owned transactions.
    #[must_use]
    pub fn is_registered(&self) -> bool {
        self.inner.conn_id.is_none() && self.owner_holds_ref()
    }

    /// Whether a connection still owns this transaction.
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.inner.conn_id.is_some() && self.owner_holds_ref()
    }

    /// Locks the write-set for reading or appending.
    ///
    /// One thread drives a transaction at a time, so the lock is not
    /// expected to be contended.
    pub fn write_set(&self) -> MutexGuard<'_, WriteSet> {
        self.inner.write_set.lock()
    }

    /// Returns true if both handles refer to the same transaction.
    #[must_use]
    pub fn ptr_eq(&self, other: &TrxHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Whether the owner still holds its reference.
    pub(crate) fn owner_holds_ref(&self) -> bool {
        self.inner.held.load(Ordering::Relaxed)
    }

    pub(crate) fn add_ref(&self) {
        self.inner.refs.fetch_add(1, Ordering::Relaxed);
    }

    /// Drops one reference, freeing the write-set with the last one.
    pub(crate) fn unref(&self) -> usize {
        let prev = self.inner.refs.fetch_sub(1, Ordering::Relaxed);
        debug_assert!(prev > 0, "trx handle reference count underflow");
        let remaining = prev - 1;
        if remaining == 0 {
            self.inner.write_set.lock().clear();
            trace!(
                "Destroyed trx handle conn {:?} trx {:?}",
                self.inner.conn_id,
                self.inner.trx_id
            );
        }
        remaining
    }

    /// Gives up the owner's reference.
    pub(crate) fn release_owner_ref(&self) -> usize {
        let was_held = self.inner.held.swap(false, Ordering::Relaxed);
        debug_assert!(was_held, "owner reference released twice");
        self.unref()
    }
}

impl fmt::Debug for TrxHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrxHandle")
            .field("source", &self.inner.source)
            .field("conn_id", &self.inner.conn_id)
            .field("trx_id", &self.inner.trx_id)
            .field("local", &self.inner.local)
            .field("refs", &self.ref_count())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_trx() -> TrxHandle {
        TrxHandle::new(NodeId::random(), None, Some(TrxId::new(1)), true)
    }

    #[test]
    fn new_handle_holds_one_reference() {
        let trx = create_trx();
        assert_eq!(trx.ref_count(), 1);
        assert!(trx.is_registered());
        assert!(trx.is_local());
        assert_eq!(trx.trx_id(), Some(TrxId::new(1)));
        assert_eq!(trx.conn_id(), None);
    }

    #[test]
    fn conn_handle_is_attached_not_registered() {
        let trx = TrxHandle::new(NodeId::nil(), Some(ConnId::new(7)), None, true);
        assert!(trx.is_attached());
        assert!(!trx.is_registered());

        trx.release_owner_ref();
        assert!(!trx.is_attached());
        assert_eq!(trx.ref_count(), 0);
    }

    #[test]
    fn clones_share_state() {
        let trx = create_trx();
        let other = trx.clone();
        other.write_set().append(b"row");

        assert!(trx.ptr_eq(&other));
        assert_eq!(trx.write_set().as_bytes(), b"row");
        assert_eq!(trx.ref_count(), 1);
    }

    #[test]
    fn last_unref_frees_write_set() {
        let trx = create_trx();
        trx.add_ref();
        trx.write_set().append(b"row");

        assert_eq!(trx.release_owner_ref(), 1);
        assert!(!trx.is_registered());
        assert_eq!(trx.write_set().len(), 3);

        assert_eq!(trx.unref(), 0);
        assert!(trx.write_set().is_empty());
    }
}
