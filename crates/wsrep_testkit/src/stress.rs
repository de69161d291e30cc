//! Stress tests for the send monitor and the transaction registry.
//!
//! These runs hammer one shared instance from several threads and count
//! invariant violations observed along the way.

use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use wsrep_core::{
    ConnId, CoreError, NodeId, SendMonitor, Ticket, TrxId, TrxRegistry, WaitHandle,
};

/// Result of a stress test run.
#[derive(Debug, Clone, Serialize)]
pub struct StressTestResult {
    /// Total operations performed.
    pub total_ops: usize,
    /// Successful operations.
    pub successful_ops: usize,
    /// Failed operations.
    pub failed_ops: usize,
    /// Invariant violations observed.
    pub violations: usize,
    /// Total duration.
    pub duration: Duration,
    /// Operations per second.
    pub ops_per_second: f64,
}

impl StressTestResult {
    /// Creates a new result.
    pub fn new(successful: usize, failed: usize, violations: usize, duration: Duration) -> Self {
        let total = successful + failed;
        let ops_per_second = if duration.as_secs_f64() > 0.0 {
            total as f64 / duration.as_secs_f64()
        } else {
            0.0
        };

        Self {
            total_ops: total,
            successful_ops: successful,
            failed_ops: failed,
            violations,
            duration,
            ops_per_second,
        }
    }

    /// Prints a summary of the test.
    pub fn print_summary(&self, name: &str) {
        println!("\n=== {} ===", name);
        println!("Total operations: {}", self.total_ops);
        println!("Successful: {}", self.successful_ops);
        println!("Failed: {}", self.failed_ops);
        println!("Violations: {}", self.violations);
        println!("Duration: {:?}", self.duration);
        println!("Throughput: {:.2} ops/sec", self.ops_per_second);
    }
}

/// Configuration for stress tests.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Number of operations to perform, split across threads.
    pub operations: usize,
    /// Number of concurrent threads.
    pub threads: usize,
    /// Send monitor queue length (power of two).
    pub queue_len: usize,
    /// Send monitor concurrency.
    pub concurrency: usize,
    /// Every n-th waiting ticket is handed to the interrupter thread.
    pub interrupt_every: usize,
    /// Number of distinct transaction IDs used against the registry.
    pub trx_keys: usize,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            operations: 10_000,
            threads: 4,
            queue_len: 64,
            concurrency: 1,
            interrupt_every: 8,
            trx_keys: 16,
        }
    }
}

/// Schedules until a slot frees up. `Closed` is passed through.
fn schedule_with_retry(sm: &SendMonitor) -> Result<Ticket, CoreError> {
    loop {
        match sm.schedule() {
            Err(CoreError::CapacityExceeded) => thread::yield_now(),
            other => return other,
        }
    }
}

/// Tracks holders inside the monitor and flags cap or order breaches.
struct InsideTracker {
    concurrency: usize,
    inside: AtomicUsize,
    last_seq: Mutex<Option<u64>>,
    violations: AtomicUsize,
}

impl InsideTracker {
    fn new(concurrency: usize) -> Self {
        Self {
            concurrency,
            inside: AtomicUsize::new(0),
            last_seq: Mutex::new(None),
            violations: AtomicUsize::new(0),
        }
    }

    fn enter(&self, seq: u64) {
        let now = self.inside.fetch_add(1, Ordering::SeqCst) + 1;
        if now > self.concurrency {
            self.violations.fetch_add(1, Ordering::Relaxed);
        }
        // With a single holder, entry order is admission order.
        if self.concurrency == 1 {
            let mut last = self.last_seq.lock();
            if last.map_or(false, |prev| seq <= prev) {
                self.violations.fetch_add(1, Ordering::Relaxed);
            }
            *last = Some(seq);
        }
    }

    fn leave(&self) {
        self.inside.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Run a schedule/enter/leave loop on every thread, checking the
/// concurrency cap and, with a concurrency of 1, FIFO admission.
pub fn stress_monitor_fifo(config: &StressConfig) -> StressTestResult {
    let sm = match SendMonitor::new(config.queue_len, config.concurrency) {
        Ok(sm) => Arc::new(sm),
        Err(_) => return StressTestResult::new(0, config.operations, 0, Duration::ZERO),
    };
    let tracker = Arc::new(InsideTracker::new(config.concurrency));
    let successful = Arc::new(AtomicUsize::new(0));
    let failed = Arc::new(AtomicUsize::new(0));
    let ops_per_thread = config.operations / config.threads;

    let start = Instant::now();

    let handles: Vec<_> = (0..config.threads)
        .map(|_| {
            let sm = Arc::clone(&sm);
            let tracker = Arc::clone(&tracker);
            let successful = Arc::clone(&successful);
            let failed = Arc::clone(&failed);

            thread::spawn(move || {
                let wait = WaitHandle::new();
                for _ in 0..ops_per_thread {
                    let result = schedule_with_retry(&sm)
                        .and_then(|ticket| sm.enter(&wait, Some(ticket)).map(|()| ticket));
                    match result {
                        Ok(ticket) => {
                            tracker.enter(ticket.seq());
                            tracker.leave();
                            sm.leave();
                            successful.fetch_add(1, Ordering::Relaxed);
                        }
                        Err(_) => {
                            failed.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    let mut violations = tracker.violations.load(Ordering::Relaxed);
    if sm.users() != 0 || sm.entered() != 0 {
        violations += 1;
    }

    StressTestResult::new(
        successful.load(Ordering::Relaxed),
        failed.load(Ordering::Relaxed),
        violations,
        start.elapsed(),
    )
}

/// Run the monitor loop while a separate thread interrupts waiting
/// tickets.
///
/// Interrupted entries count as failed operations. Every ticket must end
/// up either inside or interrupted, and the monitor must drain.
pub fn stress_monitor_interrupts(config: &StressConfig) -> StressTestResult {
    let sm = match SendMonitor::new(config.queue_len, config.concurrency) {
        Ok(sm) => Arc::new(sm),
        Err(_) => return StressTestResult::new(0, config.operations, 0, Duration::ZERO),
    };
    let tracker = Arc::new(InsideTracker::new(config.concurrency));
    let targets: Arc<Mutex<Vec<u64>>> = Arc::new(Mutex::new(Vec::new()));
    let done = Arc::new(AtomicBool::new(false));
    let successful = Arc::new(AtomicUsize::new(0));
    let failed = Arc::new(AtomicUsize::new(0));
    let unexpected = Arc::new(AtomicUsize::new(0));
    let ops_per_thread = config.operations / config.threads;
    let interrupt_every = config.interrupt_every.max(1);

    let start = Instant::now();

    let interrupter = {
        let sm = Arc::clone(&sm);
        let targets = Arc::clone(&targets);
        let done = Arc::clone(&done);
        thread::spawn(move || {
            while !done.load(Ordering::Acquire) {
                let batch: Vec<u64> = targets.lock().drain(..).collect();
                for handle in batch {
                    // NotFound is fine: the ticket got in first.
                    let _ = sm.interrupt(handle);
                }
                thread::yield_now();
            }
        })
    };

    let workers: Vec<_> = (0..config.threads)
        .map(|_| {
            let sm = Arc::clone(&sm);
            let tracker = Arc::clone(&tracker);
            let targets = Arc::clone(&targets);
            let successful = Arc::clone(&successful);
            let failed = Arc::clone(&failed);
            let unexpected = Arc::clone(&unexpected);

            thread::spawn(move || {
                let wait = WaitHandle::new();
                for i in 0..ops_per_thread {
                    let ticket = match schedule_with_retry(&sm) {
                        Ok(ticket) => ticket,
                        Err(_) => {
                            unexpected.fetch_add(1, Ordering::Relaxed);
                            continue;
                        }
                    };
                    if ticket.must_wait() && i % interrupt_every == 0 {
                        targets.lock().push(ticket.handle());
                    }

                    match sm.enter(&wait, Some(ticket)) {
                        Ok(()) => {
                            tracker.enter(ticket.seq());
                            tracker.leave();
                            sm.leave();
                            successful.fetch_add(1, Ordering::Relaxed);
                        }
                        Err(CoreError::Interrupted) => {
                            failed.fetch_add(1, Ordering::Relaxed);
                        }
                        Err(_) => {
                            unexpected.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                }
            })
        })
        .collect();

    for handle in workers {
        handle.join().expect("Thread panicked");
    }
    done.store(true, Ordering::Release);
    interrupter.join().expect("Thread panicked");

    let mut violations =
        tracker.violations.load(Ordering::Relaxed) + unexpected.load(Ordering::Relaxed);
    if sm.users() != 0 || sm.entered() != 0 {
        violations += 1;
    }
    let stats = sm.stats();
    if stats.interrupted != failed.load(Ordering::Relaxed) as u64 {
        violations += 1;
    }

    StressTestResult::new(
        successful.load(Ordering::Relaxed),
        failed.load(Ordering::Relaxed),
        violations,
        start.elapsed(),
    )
}

/// Run acquire/append/release cycles over shared transaction IDs, with
/// periodic discards and per-thread connection transactions.
///
/// Afterwards every surviving transaction must be back to the registry's
/// single reference.
pub fn stress_registry_refcounts(config: &StressConfig) -> StressTestResult {
    let registry = Arc::new(TrxRegistry::new());
    let source = NodeId::random();
    let trx_keys = config.trx_keys.max(1) as u64;
    let ops_per_thread = config.operations / config.threads;
    let successful = Arc::new(AtomicUsize::new(0));
    let failed = Arc::new(AtomicUsize::new(0));

    let start = Instant::now();

    let handles: Vec<_> = (0..config.threads)
        .map(|t| {
            let registry = Arc::clone(&registry);
            let successful = Arc::clone(&successful);
            let failed = Arc::clone(&failed);

            thread::spawn(move || {
                let conn = ConnId::new(t as u64);
                registry.set_conn_default_database(conn, format!("USE db{t}").as_bytes());

                for i in 0..ops_per_thread {
                    let trx_id = TrxId::new((t + i) as u64 % trx_keys);

                    if i % 16 == 15 {
                        registry.discard_trx(trx_id);
                        continue;
                    }
                    if i % 4 == 3 {
                        match registry.get_or_create_conn_trx(source, conn, true) {
                            Some(trx) => {
                                trx.write_set().append(b"UPDATE t SET c = c + 1;");
                                registry.discard_conn_trx(conn);
                                successful.fetch_add(1, Ordering::Relaxed);
                            }
                            None => {
                                failed.fetch_add(1, Ordering::Relaxed);
                            }
                        }
                        continue;
                    }

                    match registry.get_or_create_trx(source, trx_id, true) {
                        Some(trx) => {
                            trx.write_set().append(b"INSERT INTO t VALUES (1);");
                            registry.release_trx(trx);
                            successful.fetch_add(1, Ordering::Relaxed);
                        }
                        None => {
                            failed.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    let mut violations = 0;
    for key in 0..trx_keys {
        if let Some(trx) = registry.get_or_create_trx(source, TrxId::new(key), false) {
            if trx.ref_count() != 2 {
                violations += 1;
            }
            registry.release_trx(trx);
        }
    }
    if registry.conn_count() != config.threads {
        violations += 1;
    }
    for t in 0..config.threads {
        registry.discard_conn(ConnId::new(t as u64));
    }

    StressTestResult::new(
        successful.load(Ordering::Relaxed),
        failed.load(Ordering::Relaxed),
        violations,
        start.elapsed(),
    )
}
