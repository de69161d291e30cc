//! # wsrep Core
//!
//! Admission control and transaction bookkeeping for synchronous
//! multi-master write-set replication.
//!
//! This crate provides:
//! - [`SendMonitor`] - fair (FIFO), bounded-concurrency admission to the
//!   path that broadcasts write-sets, with pause/continue, per-ticket
//!   interruption and a non-blocking close
//! - [`TrxRegistry`] - thread-safe registry mapping transaction IDs and
//!   connection IDs to shared, reference-counted [`TrxHandle`]s
//!
//! The two components never call each other. Sending the write-set once
//! admitted, certification and write-set encoding belong to the
//! surrounding replication engine.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod monitor;
pub mod registry;
pub mod types;

pub use config::MonitorConfig;
pub use error::{CoreError, CoreResult};
pub use monitor::{MonitorStats, SendMonitor, Ticket, WaitHandle};
pub use registry::{TrxHandle, TrxRegistry, WriteSet};
pub use types::{ConnId, NodeId, TrxId};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
