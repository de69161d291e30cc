//! Benchmark utilities.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use rand::Rng;
use wsrep_core::TrxId;

/// Generate a random statement payload of the specified size.
pub fn random_statement(size: usize) -> Vec<u8> {
    let mut rng = rand::thread_rng();
    (0..size).map(|_| rng.gen_range(b' '..=b'~')).collect()
}

/// Generate `count` transaction IDs spread over `keys` distinct values.
pub fn random_trx_ids(count: usize, keys: u64) -> Vec<TrxId> {
    let mut rng = rand::thread_rng();
    (0..count)
        .map(|_| TrxId::new(rng.gen_range(0..keys.max(1))))
        .collect()
}
