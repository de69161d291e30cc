//! Transaction registry tests across threads, plus a property test of the
//! reference counting rules.

use proptest::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;
use std::thread;
use wsrep_core::{ConnId, NodeId, TrxHandle, TrxId, TrxRegistry};
use wsrep_testkit::{model_config, registry_sequence_strategy, RegistryOperation};

#[test]
fn concurrent_acquire_release_returns_to_baseline() {
    const THREADS: usize = 8;
    const ROUNDS: usize = 500;

    let registry = Arc::new(TrxRegistry::new());
    let source = NodeId::random();

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let registry = Arc::clone(&registry);
            thread::spawn(move || {
                for i in 0..ROUNDS {
                    let id = TrxId::new(((t + i) % 4) as u64);
                    let trx = registry.get_or_create_trx(source, id, true).unwrap();
                    assert!(trx.ref_count() >= 2);
                    registry.release_trx(trx);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    assert_eq!(registry.trx_count(), 4);
    for id in 0..4 {
        let trx = registry
            .get_or_create_trx(source, TrxId::new(id), false)
            .unwrap();
        assert_eq!(trx.ref_count(), 2);
        registry.release_trx(trx.clone());
        registry.discard_trx(TrxId::new(id));
        assert_eq!(trx.ref_count(), 0);
    }
    assert_eq!(registry.trx_count(), 0);
}

#[test]
fn handoff_to_background_thread() {
    let registry = Arc::new(TrxRegistry::new());
    let source = NodeId::random();
    let id = TrxId::new(42);

    let session = registry.get_or_create_trx(source, id, true).unwrap();
    session.write_set().append(b"INSERT 1;");

    let background = {
        let registry = Arc::clone(&registry);
        thread::spawn(move || {
            let trx = registry.get_or_create_trx(source, id, false).unwrap();
            trx.write_set().append(b"INSERT 2;");
            trx
        })
    };
    let background_ref = background.join().unwrap();
    assert!(background_ref.ptr_eq(&session));
    assert_eq!(session.ref_count(), 3);

    // The session finishes first; the background thread still holds on.
    registry.release_trx(session);
    registry.discard_trx(id);
    assert_eq!(background_ref.ref_count(), 1);
    assert_eq!(background_ref.write_set().as_bytes(), b"INSERT 1;INSERT 2;");

    registry.release_trx(background_ref.clone());
    assert_eq!(background_ref.ref_count(), 0);
}

#[test]
fn connections_are_independent_across_threads() {
    let registry = Arc::new(TrxRegistry::new());
    let source = NodeId::random();

    let handles: Vec<_> = (0..8u64)
        .map(|c| {
            let registry = Arc::clone(&registry);
            thread::spawn(move || {
                let conn = ConnId::new(c);
                let query = format!("USE db{c}");
                registry.set_conn_default_database(conn, query.as_bytes());

                for _ in 0..50 {
                    let trx = registry.get_or_create_conn_trx(source, conn, true).unwrap();
                    assert_eq!(trx.write_set().as_bytes(), query.as_bytes());
                    registry.discard_conn_trx(conn);
                    assert_eq!(trx.ref_count(), 0);
                }
                registry.discard_conn(conn);
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("Thread panicked");
    }
    assert_eq!(registry.conn_count(), 0);
}

/// Every handle's count equals the references handed out plus the
/// registry's own.
fn check_counts(held: &[TrxHandle]) {
    for trx in held {
        let outstanding = held.iter().filter(|other| other.ptr_eq(trx)).count();
        let expected = outstanding + usize::from(trx.is_registered());
        assert_eq!(trx.ref_count(), expected, "{trx:?}");
    }
}

#[derive(Default)]
struct ConnModel {
    default_db: Vec<u8>,
    trx: Option<TrxHandle>,
}

proptest! {
    #![proptest_config(model_config(256))]

    #[test]
    fn ref_counts_match_outstanding_references(ops in registry_sequence_strategy(1, 64)) {
        let registry = TrxRegistry::new();
        let source = NodeId::nil();
        let mut held: Vec<TrxHandle> = Vec::new();
        let mut conns: HashMap<ConnId, ConnModel> = HashMap::new();

        for op in ops {
            match op {
                RegistryOperation::Acquire { trx_id } => {
                    let trx = registry.get_or_create_trx(source, trx_id, true).unwrap();
                    prop_assert!(trx.is_registered());
                    held.push(trx);
                }
                RegistryOperation::Release { index } => {
                    if !held.is_empty() {
                        let trx = held.swap_remove(index.index(held.len()));
                        registry.release_trx(trx);
                    }
                }
                RegistryOperation::Discard { trx_id } => {
                    registry.discard_trx(trx_id);
                    prop_assert!(registry.get_or_create_trx(source, trx_id, false).is_none());
                }
                RegistryOperation::ConnBegin { conn_id } => {
                    let model = conns.entry(conn_id).or_default();
                    let trx = registry.get_or_create_conn_trx(source, conn_id, true).unwrap();
                    match &model.trx {
                        Some(running) => prop_assert!(trx.ptr_eq(running)),
                        None => {
                            let write_set = trx.write_set();
                            prop_assert_eq!(write_set.as_bytes(), &model.default_db[..]);
                        }
                    }
                    prop_assert!(trx.is_attached());
                    prop_assert!(!trx.is_registered());
                    prop_assert_eq!(trx.ref_count(), 1);
                    model.trx = Some(trx);
                }
                RegistryOperation::ConnDiscardTrx { conn_id } => {
                    registry.discard_conn_trx(conn_id);
                    if let Some(trx) = conns.get_mut(&conn_id).and_then(|m| m.trx.take()) {
                        prop_assert!(!trx.is_attached());
                        prop_assert_eq!(trx.ref_count(), 0);
                    }
                }
                RegistryOperation::SetDatabase { conn_id, query } => {
                    registry.set_conn_default_database(conn_id, &query);
                    conns.entry(conn_id).or_default().default_db = query;
                }
            }
            check_counts(&held);
        }

        prop_assert_eq!(registry.conn_count(), conns.len());
        for trx in held.drain(..) {
            registry.release_trx(trx);
        }
    }
}
