//! Per-connection session state.

use super::trx::TrxHandle;
use crate::types::ConnId;
use bytes::Bytes;

/// Session context of one client connection.
#[derive(Debug)]
pub(crate) struct Connection {
    conn_id: ConnId,
    trx: Option<TrxHandle>,
    default_db: Bytes,
}

impl Connection {
    pub(crate) fn new(conn_id: ConnId) -> Self {
        Self {
            conn_id,
            trx: None,
            default_db: Bytes::new(),
        }
    }

    pub(crate) fn conn_id(&self) -> ConnId {
        self.conn_id
    }

    /// The transaction currently running on this connection.
    pub(crate) fn trx(&self) -> Option<&TrxHandle> {
        self.trx.as_ref()
    }

    /// Attaches `trx`, releasing the previously attached transaction.
    ///
    /// The connection owns the attached transaction's one reference.
    pub(crate) fn assign_trx(&mut self, trx: Option<TrxHandle>) {
        if let Some(old) = std::mem::replace(&mut self.trx, trx) {
            old.release_owner_ref();
        }
    }

    /// Query that seeds transactions started later on this connection.
    pub(crate) fn default_db(&self) -> &Bytes {
        &self.default_db
    }

    pub(crate) fn set_default_db(&mut self, query: Bytes) {
        self.default_db = query;
    }
}
