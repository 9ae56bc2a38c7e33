//! # tidelog Testkit
//!
//! Test utilities for tidelog.
//!
//! This crate provides:
//! - In-memory test contexts with crash simulation
//! - Property-based generators of transaction scripts
//! - The logging workload harness: build a log with concurrent backends,
//!   then recover it and check the result
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tidelog_testkit::prelude::*;
//!
//! let tc = TestContext::new(LoggingType::Aries);
//! let table = tc.table();
//! assert!(tc.start());
//! tc.insert_committed(&table, b"row".to_vec()).unwrap();
//! let log = tc.crash();
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod workload;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::workload::*;
    pub use tidelog_core::{LoggingMode, LoggingType};
}

pub use fixtures::*;
pub use generators::*;
pub use workload::*;
