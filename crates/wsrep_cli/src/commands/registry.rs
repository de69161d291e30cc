//! Transaction registry stress command.

use super::report;
use tracing::info;
use wsrep_testkit::{stress_registry_refcounts, StressConfig};

/// Runs the stress-registry command.
pub fn run(
    threads: usize,
    operations: usize,
    trx_keys: usize,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    if threads == 0 {
        return Err("At least one thread is required".into());
    }

    let config = StressConfig {
        operations,
        threads,
        trx_keys,
        ..StressConfig::default()
    };
    info!(
        "Stressing transaction registry: {} threads, {} operations, {} trx keys",
        threads, operations, trx_keys
    );

    let result = stress_registry_refcounts(&config);
    report("transaction registry", &result, format)
}
