//! Shared helpers for the tidelog benchmarks.

pub mod utils;
