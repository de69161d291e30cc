//! Send monitor stress command.

use super::report;
use tracing::info;
use wsrep_core::MonitorConfig;
use wsrep_testkit::{stress_monitor_fifo, stress_monitor_interrupts, StressConfig};

/// Runs the stress-monitor command.
///
/// With `interrupt_every` of 0 only the FIFO scenario runs.
pub fn run(
    monitor: &MonitorConfig,
    threads: usize,
    operations: usize,
    interrupt_every: usize,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    monitor.validate()?;
    if threads == 0 {
        return Err("At least one thread is required".into());
    }

    let config = StressConfig {
        operations,
        threads,
        queue_len: monitor.queue_len,
        concurrency: monitor.concurrency,
        interrupt_every,
        ..StressConfig::default()
    };
    info!(
        "Stressing send monitor: {} threads, {} operations, queue_len {}, concurrency {}",
        threads, operations, monitor.queue_len, monitor.concurrency
    );

    let result = stress_monitor_fifo(&config);
    report("send monitor FIFO", &result, format)?;

    if interrupt_every > 0 {
        let result = stress_monitor_interrupts(&config);
        report("send monitor interrupts", &result, format)?;
    }

    Ok(())
}
