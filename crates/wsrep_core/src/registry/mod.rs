//! Transaction registry: bookkeeping of live local transactions and
//! client connections.
//!
//! Session threads look transactions up by transaction ID or by
//! connection ID, append to the write-set through the returned
//! [`TrxHandle`], and hand it to background threads. The registry only
//! tracks who holds what. It never blocks on anything but its own lock.
//!
//! ## Reference counting
//!
//! - A registered transaction starts with one reference owned by the
//!   registry.
//! - Each `get_or_create_trx` adds one; each `release_trx` removes one.
//! - `discard_trx` drops the registry's reference and forgets the ID.
//!   Holders still referencing the transaction keep it alive, and the
//!   last `release_trx` frees it.
//!
//! A transaction started implicitly on a connection is owned by that
//! connection instead and is released when it is detached.

mod conn;
mod trx;
mod write_set;

pub use trx::TrxHandle;
pub use write_set::WriteSet;

use crate::types::{ConnId, NodeId, TrxId};
use bytes::Bytes;
use conn::Connection;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fmt;
use tracing::{info, trace};

#[derive(Debug, Default)]
struct RegistryMaps {
    trx_map: BTreeMap<TrxId, TrxHandle>,
    conn_map: BTreeMap<ConnId, Connection>,
}

impl RegistryMaps {
    fn create_trx(&mut self, source: NodeId, trx_id: TrxId) -> TrxHandle {
        let trx = TrxHandle::new(source, None, Some(trx_id), true);
        if self.trx_map.insert(trx_id, trx.clone()).is_some() {
            panic!("duplicate {trx_id} in transaction registry");
        }
        trx
    }

    fn create_conn(&mut self, conn_id: ConnId) -> &mut Connection {
        use std::collections::btree_map::Entry;

        match self.conn_map.entry(conn_id) {
            Entry::Vacant(entry) => entry.insert(Connection::new(conn_id)),
            Entry::Occupied(_) => panic!("duplicate {conn_id} in transaction registry"),
        }
    }
}

/// Registry of local transactions and connections.
///
/// Both maps sit behind one mutex, so there is no lock ordering between
/// them. The mutex guards the maps and reference counts only; write-set
/// contents are driven by one holder at a time.
#[derive(Default)]
pub struct TrxRegistry {
    maps: Mutex<RegistryMaps>,
}

impl TrxRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up a transaction by ID, creating it if `create` is set.
    ///
    /// On success the transaction's reference count is incremented; give
    /// the reference back with [`release_trx`](Self::release_trx).
    /// Returns `None` if the transaction is unknown and `create` is false.
    ///
    /// # Panics
    ///
    /// Panics if inserting the new transaction collides with an existing
    /// entry.
    pub fn get_or_create_trx(
        &self,
        source: NodeId,
        trx_id: TrxId,
        create: bool,
    ) -> Option<TrxHandle> {
        let mut guard = self.maps.lock();
        let maps = &mut *guard;

        let trx = match maps.trx_map.get(&trx_id) {
            Some(trx) => trx.clone(),
            None if create => maps.create_trx(source, trx_id),
            None => return None,
        };
        trx.add_ref();
        Some(trx)
    }

    /// Gives back a reference obtained from
    /// [`get_or_create_trx`](Self::get_or_create_trx).
    ///
    /// # Panics
    ///
    /// Panics if this would release the reference held by the handle's
    /// owner (its trx map entry or its connection), or if no reference
    /// is outstanding at all.
    pub fn release_trx(&self, trx: TrxHandle) {
        let _guard = self.maps.lock();

        if trx.owner_holds_ref() {
            let owner = if trx.conn_id().is_some() {
                "its connection's"
            } else {
                "the registry's own"
            };
            assert!(
                trx.ref_count() > 1,
                "release of {trx:?} would drop {owner} reference"
            );
        } else {
            assert!(
                trx.ref_count() > 0,
                "release of {trx:?} with no outstanding reference"
            );
        }
        trx.unref();
    }

    /// Forgets a transaction and drops the registry's reference to it.
    ///
    /// Outstanding holders keep the transaction alive until they release
    /// it. Unknown IDs are ignored.
    pub fn discard_trx(&self, trx_id: TrxId) {
        let mut maps = self.maps.lock();
        if let Some(trx) = maps.trx_map.remove(&trx_id) {
            trx.release_owner_ref();
        }
    }

    /// Returns the transaction running on a connection.
    ///
    /// With `create` set, a missing connection is created and a missing
    /// transaction is started. A new transaction on a known connection
    /// begins with the connection's default-database query, if one was
    /// set. The returned handle is owned by the connection and is not
    /// counted; do not pass it to `release_trx`.
    ///
    /// Returns `None` if there is no transaction and `create` is false.
    pub fn get_or_create_conn_trx(
        &self,
        source: NodeId,
        conn_id: ConnId,
        create: bool,
    ) -> Option<TrxHandle> {
        let mut guard = self.maps.lock();
        let maps = &mut *guard;

        if !maps.conn_map.contains_key(&conn_id) {
            if !create {
                return None;
            }
            let trx = TrxHandle::new(source, Some(conn_id), None, true);
            maps.create_conn(conn_id).assign_trx(Some(trx.clone()));
            return Some(trx);
        }

        let conn = maps.conn_map.get_mut(&conn_id)?;
        if conn.trx().is_none() && create {
            let trx = TrxHandle::new(source, Some(conn_id), None, true);
            if !conn.default_db().is_empty() {
                trx.write_set().prepend(conn.default_db());
            }
            conn.assign_trx(Some(trx));
        }

        conn.trx().cloned()
    }

    /// Detaches and releases the transaction running on a connection.
    ///
    /// The connection itself stays registered.
    pub fn discard_conn_trx(&self, conn_id: ConnId) {
        let mut maps = self.maps.lock();
        if let Some(conn) = maps.conn_map.get_mut(&conn_id) {
            conn.assign_trx(None);
        }
    }

    /// Forgets a connection, releasing its transaction if any.
    pub fn discard_conn(&self, conn_id: ConnId) {
        let mut maps = self.maps.lock();
        if let Some(mut conn) = maps.conn_map.remove(&conn_id) {
            trace!("Discarding {}", conn.conn_id());
            conn.assign_trx(None);
        }
    }

    /// Stores the query that seeds transactions later started on a
    /// connection, creating the connection if needed.
    pub fn set_conn_default_database(&self, conn_id: ConnId, query: &[u8]) {
        let mut maps = self.maps.lock();
        let conn = maps
            .conn_map
            .entry(conn_id)
            .or_insert_with(|| Connection::new(conn_id));
        conn.set_default_db(Bytes::copy_from_slice(query));
    }

    /// Number of registered transaction IDs.
    #[must_use]
    pub fn trx_count(&self) -> usize {
        self.maps.lock().trx_map.len()
    }

    /// Number of known connections.
    #[must_use]
    pub fn conn_count(&self) -> usize {
        self.maps.lock().conn_map.len()
    }
}

impl fmt::Display for TrxRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let maps = self.maps.lock();
        write!(f, "trx map:")?;
        for trx_id in maps.trx_map.keys() {
            write!(f, " {}", trx_id.as_u64())?;
        }
        write!(f, "\nconn query map:")?;
        for conn_id in maps.conn_map.keys() {
            write!(f, " {}", conn_id.as_u64())?;
        }
        writeln!(f)
    }
}

impl fmt::Debug for TrxRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrxRegistry")
            .field("trx_count", &self.trx_count())
            .field("conn_count", &self.conn_count())
            .finish()
    }
}

impl Drop for TrxRegistry {
    fn drop(&mut self) {
        let maps = self.maps.get_mut();
        info!(
            "Transaction registry trx map usage {}, conn map usage {}",
            maps.trx_map.len(),
            maps.conn_map.len()
        );
        for trx in std::mem::take(&mut maps.trx_map).into_values() {
            trx.release_owner_ref();
        }
        for mut conn in std::mem::take(&mut maps.conn_map).into_values() {
            conn.assign_trx(None);
        }
    }
}
