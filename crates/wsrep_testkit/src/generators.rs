//! Property-based test generators using proptest.
//!
//! Provides strategies for monitor geometries and for operation
//! sequences driven against the transaction registry.

use proptest::prelude::*;
use wsrep_core::{ConnId, TrxId};

/// Strategy for valid send monitor geometries: a power-of-two queue
/// length and a concurrency of at least 1.
pub fn monitor_geometry_strategy() -> impl Strategy<Value = (usize, usize)> {
    (0u32..8).prop_flat_map(|shift| {
        let queue_len = 1usize << shift;
        (Just(queue_len), 1..=queue_len)
    })
}

/// Strategy for transaction IDs drawn from a small key space, so
/// sequences revisit the same transactions.
pub fn trx_id_strategy() -> impl Strategy<Value = TrxId> {
    (0u64..8).prop_map(TrxId::new)
}

/// Strategy for connection IDs drawn from a small key space.
pub fn conn_id_strategy() -> impl Strategy<Value = ConnId> {
    (0u64..4).prop_map(ConnId::new)
}

/// Strategy for default-database statements.
pub fn use_query_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::string::string_regex("USE [a-z][a-z0-9_]{0,15}")
        .expect("Invalid regex")
        .prop_map(String::into_bytes)
}

/// One step against a transaction registry.
#[derive(Debug, Clone)]
pub enum RegistryOperation {
    /// Look up or create a transaction and keep the reference.
    Acquire {
        /// Transaction ID
        trx_id: TrxId,
    },
    /// Give back one held reference, picked by index.
    Release {
        /// Index into the held references
        index: prop::sample::Index,
    },
    /// Discard a transaction ID.
    Discard {
        /// Transaction ID
        trx_id: TrxId,
    },
    /// Start or look up a connection's transaction.
    ConnBegin {
        /// Connection ID
        conn_id: ConnId,
    },
    /// Detach a connection's transaction.
    ConnDiscardTrx {
        /// Connection ID
        conn_id: ConnId,
    },
    /// Set a connection's default database.
    SetDatabase {
        /// Connection ID
        conn_id: ConnId,
        /// Statement recorded for the connection
        query: Vec<u8>,
    },
}

/// Strategy for registry operations.
pub fn registry_operation_strategy() -> impl Strategy<Value = RegistryOperation> {
    prop_oneof![
        4 => trx_id_strategy().prop_map(|trx_id| RegistryOperation::Acquire { trx_id }),
        4 => any::<prop::sample::Index>().prop_map(|index| RegistryOperation::Release { index }),
        1 => trx_id_strategy().prop_map(|trx_id| RegistryOperation::Discard { trx_id }),
        2 => conn_id_strategy().prop_map(|conn_id| RegistryOperation::ConnBegin { conn_id }),
        1 => conn_id_strategy().prop_map(|conn_id| RegistryOperation::ConnDiscardTrx { conn_id }),
        1 => (conn_id_strategy(), use_query_strategy())
            .prop_map(|(conn_id, query)| RegistryOperation::SetDatabase { conn_id, query }),
    ]
}

/// Strategy for generating a sequence of registry operations.
pub fn registry_sequence_strategy(
    min_ops: usize,
    max_ops: usize,
) -> impl Strategy<Value = Vec<RegistryOperation>> {
    prop::collection::vec(registry_operation_strategy(), min_ops..max_ops)
}

/// Proptest settings for model checks driven by these strategies. No
/// regression files are written.
#[must_use]
pub fn model_config(cases: u32) -> ProptestConfig {
    ProptestConfig {
        cases,
        max_shrink_iters: cases.saturating_mul(16),
        failure_persistence: None,
        ..ProptestConfig::default()
    }
}
