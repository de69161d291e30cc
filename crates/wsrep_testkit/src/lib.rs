//! # wsrep Testkit
//!
//! Test utilities for `wsrep_core`.
//!
//! This crate provides:
//! - Property-based test generators using proptest
//! - Multi-threaded stress harnesses for the send monitor and the
//!   transaction registry
//!
//! ## Usage
//!
//! ```rust,ignore
//! use wsrep_testkit::prelude::*;
//!
//! #[test]
//! fn monitor_survives_load() {
//!     let result = stress_monitor_fifo(&StressConfig::default());
//!     assert_eq!(result.violations, 0);
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod generators;
pub mod stress;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::generators::*;
    pub use crate::stress::*;
}

pub use generators::*;
pub use stress::*;
