//! Verify command implementation.

use super::{open_log, CommandError};
use std::collections::BTreeMap;
use std::path::Path;
use tidelog_core::{LogDevice, LogReader};

/// Verification result.
#[derive(Debug, Default)]
pub struct VerifyResult {
    /// Intact records read.
    pub records: usize,
    /// Records per type name.
    pub by_type: BTreeMap<&'static str, usize>,
    /// Offset just past the last intact frame.
    pub valid_end: u64,
    /// Bytes of incomplete trailing frame. Recovery truncates these.
    pub torn_bytes: u64,
    /// Corruption that stopped the scan.
    pub error: Option<String>,
}

impl VerifyResult {
    fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Runs the verify command.
pub fn run(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    println!("Verifying log at {}", path.display());
    println!();

    let device = open_log(path)?;
    let result = verify_log(&device);
    print_result(&result);

    println!();
    if result.is_ok() {
        println!("✓ Log verification passed");
        Ok(())
    } else {
        println!("✗ Log verification failed");
        Err(CommandError::VerificationFailed.into())
    }
}

/// Scans every frame of the log.
pub fn verify_log<D: LogDevice + ?Sized>(device: &D) -> VerifyResult {
    let mut result = VerifyResult::default();
    let mut reader = LogReader::new(device);

    for item in reader.by_ref() {
        match item {
            Ok((_, record)) => {
                result.records += 1;
                *result.by_type.entry(record.record_type().name()).or_default() += 1;
            }
            Err(e) => {
                result.error = Some(e.to_string());
                break;
            }
        }
    }

    result.valid_end = reader.valid_end();
    result.torn_bytes = reader.torn_bytes();
    result
}

fn print_result(result: &VerifyResult) {
    println!("  Records: {}", result.records);
    for (name, count) in &result.by_type {
        println!("    {name:12} {count}");
    }
    println!("  Valid end: {}", result.valid_end);
    if result.torn_bytes > 0 {
        println!("  Torn tail: {} bytes (truncated on recovery)", result.torn_bytes);
    }
    if let Some(error) = &result.error {
        println!("  Error: {error}");
    }
}
