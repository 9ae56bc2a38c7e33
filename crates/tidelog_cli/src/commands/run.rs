//! Run command implementation.

use tidelog_core::Context;
use tidelog_testkit::{check_recovery, prepare_log_file, reset_system, LoggingTestConfig};
use tracing::info;

/// Runs the logging workload: builds the log, resets the system, then
/// recovers and checks it.
pub fn run(config: &LoggingTestConfig) -> Result<(), Box<dyn std::error::Error>> {
    info!(
        logging_type = %config.logging_type,
        tuples = config.tuple_count,
        backends = config.backend_count,
        columns = config.column_count,
        dir = %config.dir.display(),
        "starting logging workload"
    );

    let ctx = Context::new(config.logging_config());
    prepare_log_file(&ctx, config)?;
    reset_system(&ctx);
    let outcome = check_recovery(&ctx, config)?;

    let stats = &outcome.stats;
    println!("Log file:          {}", config.log_path().display());
    println!("Records read:      {}", stats.records_read);
    println!("Records applied:   {}", stats.applied);
    println!("Records skipped:   {}", stats.skipped);
    println!("Committed txns:    {}", stats.committed_txns);
    println!("Aborted txns:      {}", stats.aborted_txns);
    println!("Uncommitted txns:  {}", stats.uncommitted_txns);
    println!("Truncated bytes:   {}", stats.truncated_bytes);
    println!("Active tuples:     {}", outcome.active_tuples);
    if config.check_tuple_count {
        println!("✓ Tuple count matches ({})", config.expected_tuple_count());
    }

    Ok(())
}
