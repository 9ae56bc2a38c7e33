//! Logging workload harness.
//!
//! Builds a log with concurrent backends, then recovers it and checks what
//! came back:
//!
//! 1. [`prepare_log_file`] starts a fresh log, runs [`build_log`] (every
//!    backend inserts, updates and deletes tuples, one transaction per
//!    change) and ends logging.
//! 2. [`check_recovery`] recreates the empty table, replays the log and
//!    optionally checks the active tuple count.
//!
//! Each backend inserts `tuple_count` tuples, updates every one of them and
//! then deletes the first updated tuple, so `tuple_count - 1` tuples per
//! backend survive.

use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use thiserror::Error;
use tidelog_core::{
    BackendLogger, Column, Context, DataTable, DatabaseId, ItemPointer, LogDestination, LogError,
    LogRecordType, LoggingConfig, LoggingMode, LoggingType, RecoveryStats, Schema, TableId,
    Transaction, Tuple, Value,
};
use tracing::{debug, info};

/// Database every workload table lives in.
pub const TEST_DATABASE_ID: DatabaseId = DatabaseId::new(20000);

/// Table the workload writes.
pub const TEST_TABLE_ID: TableId = TableId::new(10000);

/// Name of the workload table.
pub const TEST_TABLE_NAME: &str = "USERTABLE";

/// Maximum length of each varchar field.
pub const FIELD_LENGTH: u32 = 100;

/// Errors from the workload harness.
#[derive(Debug, Error)]
pub enum WorkloadError {
    /// Error from the logging core.
    #[error(transparent)]
    Log(#[from] LogError),

    /// Filesystem error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A frontend logger is already running for the configuration.
    #[error("another frontend logger is running for {0}")]
    FrontendRunning(LoggingType),

    /// The frontend logger never reached the mode.
    #[error("{logging_type} did not reach {mode}")]
    ModeNotReached {
        /// Configuration waited on.
        logging_type: LoggingType,
        /// Mode waited for.
        mode: LoggingMode,
    },

    /// A backend's records could not be made durable.
    #[error("{0} backend records were not flushed")]
    FlushFailed(LoggingType),

    /// `end_logging` failed.
    #[error("failed to terminate the {0} frontend logger")]
    EndLoggingFailed(LoggingType),

    /// The log to recover from does not exist.
    #[error("log file not found: {0}")]
    MissingLog(PathBuf),

    /// Active tuple count differs from the expected count.
    #[error("expected {expected} active tuples, found {actual}")]
    TupleCountMismatch {
        /// Expected count.
        expected: usize,
        /// Actual count.
        actual: usize,
    },

    /// A backend thread panicked.
    #[error("backend thread panicked")]
    BackendPanicked,
}

/// Result type for workload operations.
pub type WorkloadResult<T> = Result<T, WorkloadError>;

/// Parameters of one workload run.
#[derive(Debug, Clone)]
pub struct LoggingTestConfig {
    /// Logging configuration under test.
    pub logging_type: LoggingType,
    /// Tuples each backend inserts.
    pub tuple_count: usize,
    /// Concurrent backends.
    pub backend_count: usize,
    /// Varchar fields after the integer key.
    pub column_count: usize,
    /// Whether to check the active tuple count after build and recovery.
    pub check_tuple_count: bool,
    /// Whether recovery applies every record regardless of commit.
    pub redo_all: bool,
    /// Directory holding the log file.
    pub dir: PathBuf,
}

impl Default for LoggingTestConfig {
    fn default() -> Self {
        Self {
            logging_type: LoggingType::Aries,
            tuple_count: 100,
            backend_count: 2,
            column_count: 10,
            check_tuple_count: false,
            redo_all: false,
            dir: std::env::temp_dir(),
        }
    }
}

impl LoggingTestConfig {
    /// Path of the log file for this run.
    #[must_use]
    pub fn log_path(&self) -> PathBuf {
        self.logging_config().log_path(self.logging_type)
    }

    /// Active tuples a full run leaves behind.
    #[must_use]
    pub fn expected_tuple_count(&self) -> usize {
        self.tuple_count.saturating_sub(1) * self.backend_count
    }

    /// Core configuration matching this run.
    #[must_use]
    pub fn logging_config(&self) -> LoggingConfig {
        LoggingConfig::new().log_dir(&self.dir)
    }
}

/// What [`check_recovery`] found.
#[derive(Debug, Clone)]
pub struct RecoveryOutcome {
    /// Replay statistics.
    pub stats: RecoveryStats,
    /// Active tuples in the workload table after replay.
    pub active_tuples: usize,
}

/// Writes a fresh log by running the workload with logging on.
///
/// # Errors
///
/// Returns an error if a frontend logger is already running, a mode is not
/// reached, the workload fails, or logging cannot be ended.
pub fn prepare_log_file(ctx: &Context, config: &LoggingTestConfig) -> WorkloadResult<()> {
    let path = config.log_path();
    if path.exists() {
        std::fs::remove_file(&path)?;
    }

    let logging_type = config.logging_type;
    start_logging(ctx, config, path)?;

    let txns = ctx.transaction_manager();
    txns.set_logging_type(Some(logging_type));
    let built = build_log(ctx, config);
    txns.set_logging_type(None);
    built?;

    if !ctx.log_manager().end_logging(logging_type) {
        return Err(WorkloadError::EndLoggingFailed(logging_type));
    }
    info!(%logging_type, path = %config.log_path().display(), "log file prepared");
    Ok(())
}

/// Recovers the log into a fresh table and reports the outcome.
///
/// # Errors
///
/// Returns an error if the log is missing, recovery does not reach LOGGING,
/// or the tuple count check fails.
pub fn check_recovery(ctx: &Context, config: &LoggingTestConfig) -> WorkloadResult<RecoveryOutcome> {
    let path = config.log_path();
    if !path.exists() {
        return Err(WorkloadError::MissingLog(path));
    }

    let logging_type = config.logging_type;
    let table = create_database_and_table(ctx, config.column_count)?;
    start_logging(ctx, config, path)?;

    let active_tuples = table.active_tuple_count();
    let checked = if config.check_tuple_count {
        check_tuple_count(ctx, config.expected_tuple_count())
    } else {
        Ok(())
    };
    let stats = ctx
        .log_manager()
        .last_recovery(logging_type)
        .unwrap_or_default();

    if !ctx.log_manager().end_logging(logging_type) {
        return Err(WorkloadError::EndLoggingFailed(logging_type));
    }
    drop_database_and_table(ctx)?;
    checked?;

    info!(%logging_type, active_tuples, "recovery checked");
    Ok(RecoveryOutcome {
        stats,
        active_tuples,
    })
}

/// STANDBY → RECOVERY → LOGGING on the file at `path`.
fn start_logging(ctx: &Context, config: &LoggingTestConfig, path: PathBuf) -> WorkloadResult<()> {
    let logging_type = config.logging_type;
    let log_manager = ctx.log_manager();

    if log_manager.active_frontend_logger_count() > 0 {
        return Err(WorkloadError::FrontendRunning(logging_type));
    }
    log_manager.set_log_destination(logging_type, LogDestination::File(path));
    if !log_manager.start_standby_mode(logging_type) {
        return Err(WorkloadError::FrontendRunning(logging_type));
    }
    wait_for(ctx, logging_type, LoggingMode::Standby)?;

    log_manager.set_test_redo_all_logs(logging_type, config.redo_all);
    log_manager.start_recovery_mode(logging_type);
    wait_for(ctx, logging_type, LoggingMode::Logging)
}

fn wait_for(ctx: &Context, logging_type: LoggingType, mode: LoggingMode) -> WorkloadResult<()> {
    if ctx.log_manager().wait_for_mode(mode, true, logging_type) {
        Ok(())
    } else {
        Err(WorkloadError::ModeNotReached { logging_type, mode })
    }
}

/// Creates the workload table, runs every backend on its own thread and, for
/// ARIES, drops the table afterwards.
///
/// # Errors
///
/// Returns the first backend error, or an error if the tuple count check
/// fails.
pub fn build_log(ctx: &Context, config: &LoggingTestConfig) -> WorkloadResult<()> {
    let table = create_database_and_table(ctx, config.column_count)?;

    let results: Vec<WorkloadResult<()>> = thread::scope(|scope| {
        let handles: Vec<_> = (0..config.backend_count)
            .map(|_| scope.spawn(|| run_backend(ctx, config, &table)))
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().unwrap_or(Err(WorkloadError::BackendPanicked)))
            .collect()
    });
    results.into_iter().collect::<WorkloadResult<Vec<()>>>()?;

    if config.check_tuple_count {
        check_tuple_count(ctx, config.expected_tuple_count())?;
    }

    if config.logging_type == LoggingType::Aries {
        drop_database_and_table(ctx)?;
    }
    Ok(())
}

/// One backend: insert, update, delete, then flush and unregister.
///
/// # Errors
///
/// Returns an error if a storage or transaction operation fails, or
/// [`WorkloadError::FlushFailed`] if the records cannot be made durable.
pub fn run_backend(
    ctx: &Context,
    config: &LoggingTestConfig,
    table: &Arc<DataTable>,
) -> WorkloadResult<()> {
    let logging_type = config.logging_type;
    let commit = true;

    let locations = insert_tuples(ctx, logging_type, table, config.tuple_count, commit)?;
    let locations = update_tuples(ctx, logging_type, table, &locations, commit)?;
    delete_tuples(ctx, logging_type, table, &locations[..locations.len().min(1)], commit)?;

    let log_manager = ctx.log_manager();
    if log_manager.is_in_logging_mode(logging_type) {
        let logger = log_manager.get_backend_logger(logging_type);
        let flushed = logger.wait_for_flushing();
        log_manager.remove_backend_logger(&logger);
        if !flushed {
            return Err(WorkloadError::FlushFailed(logging_type));
        }
    }
    debug!(%logging_type, tuples = config.tuple_count, "backend finished");
    Ok(())
}

/// Inserts `count` tuples, one transaction each.
///
/// # Errors
///
/// Returns an error if a storage or transaction operation fails.
pub fn insert_tuples(
    ctx: &Context,
    logging_type: LoggingType,
    table: &DataTable,
    count: usize,
    commit: bool,
) -> WorkloadResult<Vec<ItemPointer>> {
    let txns = ctx.transaction_manager();
    let mut locations = Vec::with_capacity(count);

    for tuple in create_tuples(table.schema(), count)? {
        let mut txn = txns.begin_transaction();
        let payload = tuple.encode();

        let location = table.insert_tuple(payload.clone())?;
        txn.record_insert(table.database_id(), table.table_id(), location)?;
        locations.push(location);

        log_tuple(
            ctx,
            logging_type,
            LogRecordType::Insert,
            &txn,
            table,
            location,
            ItemPointer::INVALID,
            Some(payload),
        )?;
        finish(ctx, &mut txn, commit)?;
    }

    Ok(locations)
}

/// Replaces the tuple at each location with a new version, one transaction
/// each. Returns the new locations.
///
/// # Errors
///
/// Returns an error if a storage or transaction operation fails.
pub fn update_tuples(
    ctx: &Context,
    logging_type: LoggingType,
    table: &DataTable,
    locations: &[ItemPointer],
    commit: bool,
) -> WorkloadResult<Vec<ItemPointer>> {
    let txns = ctx.transaction_manager();
    let tuples = create_tuples(table.schema(), locations.len())?;
    let mut inserted = Vec::with_capacity(locations.len());

    for (old_location, tuple) in locations.iter().copied().zip(tuples) {
        let mut txn = txns.begin_transaction();

        table.delete_tuple(old_location)?;
        txn.record_delete(table.database_id(), table.table_id(), old_location)?;

        let payload = tuple.encode();
        let new_location = table.insert_tuple(payload.clone())?;
        txn.record_insert(table.database_id(), table.table_id(), new_location)?;
        inserted.push(new_location);

        log_tuple(
            ctx,
            logging_type,
            LogRecordType::Update,
            &txn,
            table,
            new_location,
            old_location,
            Some(payload),
        )?;
        finish(ctx, &mut txn, commit)?;
    }

    Ok(inserted)
}

/// Deletes the tuple at each location, one transaction each.
///
/// # Errors
///
/// Returns an error if a storage or transaction operation fails.
pub fn delete_tuples(
    ctx: &Context,
    logging_type: LoggingType,
    table: &DataTable,
    locations: &[ItemPointer],
    commit: bool,
) -> WorkloadResult<()> {
    let txns = ctx.transaction_manager();

    for &location in locations {
        let mut txn = txns.begin_transaction();

        table.delete_tuple(location)?;
        txn.record_delete(table.database_id(), table.table_id(), location)?;

        log_tuple(
            ctx,
            logging_type,
            LogRecordType::Delete,
            &txn,
            table,
            ItemPointer::INVALID,
            location,
            None,
        )?;
        finish(ctx, &mut txn, commit)?;
    }

    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn log_tuple(
    ctx: &Context,
    logging_type: LoggingType,
    record_type: LogRecordType,
    txn: &Transaction,
    table: &DataTable,
    new_location: ItemPointer,
    old_location: ItemPointer,
    payload: Option<Vec<u8>>,
) -> WorkloadResult<()> {
    let log_manager = ctx.log_manager();
    if !log_manager.is_in_logging_mode(logging_type) {
        return Ok(());
    }

    let record = BackendLogger::get_tuple_record(
        record_type,
        txn.id(),
        table.table_id(),
        new_location,
        old_location,
        payload,
        table.database_id(),
    )?;
    log_manager.get_backend_logger(logging_type).log(record);
    Ok(())
}

fn finish(ctx: &Context, txn: &mut Transaction, commit: bool) -> WorkloadResult<()> {
    let txns = ctx.transaction_manager();
    if commit {
        txns.commit_transaction(txn)?;
    } else {
        txns.abort_transaction(txn)?;
    }
    Ok(())
}

/// Integer key followed by `column_count` varchar fields.
#[must_use]
pub fn create_schema(column_count: usize) -> Schema {
    let mut columns = vec![Column::integer("YCSB_KEY")];
    columns.extend((0..column_count).map(|i| Column::varchar(format!("FIELD{i}"), FIELD_LENGTH)));
    Schema::new(columns)
}

/// Tuples `0..count`: the key is the index and every field its decimal
/// text.
///
/// # Errors
///
/// Returns an error if `schema` is not shaped like [`create_schema`].
pub fn create_tuples(schema: &Schema, count: usize) -> WorkloadResult<Vec<Tuple>> {
    (0..count)
        .map(|i| {
            let key = i32::try_from(i)
                .map_err(|_| LogError::invalid_argument(format!("tuple key {i} out of range")))?;
            let mut values = vec![Value::Integer(key)];
            values.extend((1..schema.column_count()).map(|_| Value::Varchar(i.to_string())));
            Ok(Tuple::new(schema, values)?)
        })
        .collect()
}

/// Creates the workload database and an empty workload table, replacing
/// any table left from an earlier run.
///
/// # Errors
///
/// Returns an error if the table cannot be created.
pub fn create_database_and_table(ctx: &Context, column_count: usize) -> WorkloadResult<Arc<DataTable>> {
    let database = ctx.catalog().create_database(TEST_DATABASE_ID);
    if database.get_table(TEST_TABLE_ID).is_some() {
        database.drop_table(TEST_TABLE_ID)?;
    }
    Ok(database.create_table(TEST_TABLE_ID, TEST_TABLE_NAME, create_schema(column_count))?)
}

/// Drops the workload table and database.
///
/// # Errors
///
/// Returns an error if either does not exist.
pub fn drop_database_and_table(ctx: &Context) -> WorkloadResult<()> {
    let catalog = ctx.catalog();
    if let Some(database) = catalog.get_database_by_oid(TEST_DATABASE_ID) {
        database.drop_table(TEST_TABLE_ID)?;
    }
    catalog.drop_database(TEST_DATABASE_ID)?;
    Ok(())
}

/// Checks the active tuple count of the workload table.
///
/// # Errors
///
/// Returns [`WorkloadError::TupleCountMismatch`] on a different count, or a
/// lookup error if the table does not exist.
pub fn check_tuple_count(ctx: &Context, expected: usize) -> WorkloadResult<()> {
    let actual = ctx
        .catalog()
        .get_table_by_ids(TEST_DATABASE_ID, TEST_TABLE_ID)?
        .active_tuple_count();
    if actual == expected {
        Ok(())
    } else {
        Err(WorkloadError::TupleCountMismatch { expected, actual })
    }
}

/// Forgets every database and restarts transaction ids, as a restart would.
pub fn reset_system(ctx: &Context) {
    ctx.reset();
    debug!("system reset");
}

#[cfg(test)]
mod tests {
    use super::*;
    use tidelog_storage::MemoryDevice;

    #[test]
    fn schema_shape() {
        let schema = create_schema(3);
        assert_eq!(schema.column_count(), 4);
        assert_eq!(schema.columns()[0].name, "YCSB_KEY");
        assert_eq!(schema.columns()[3].name, "FIELD2");
    }

    #[test]
    fn tuples_carry_their_index() {
        let schema = create_schema(2);
        let tuples = create_tuples(&schema, 3).unwrap();

        assert_eq!(tuples.len(), 3);
        assert_eq!(tuples[2].get(0), Some(&Value::Integer(2)));
        assert_eq!(tuples[2].get(2), Some(&Value::Varchar("2".into())));
    }

    #[test]
    fn expected_count() {
        let config = LoggingTestConfig {
            tuple_count: 10,
            backend_count: 4,
            ..LoggingTestConfig::default()
        };
        assert_eq!(config.expected_tuple_count(), 36);
        assert!(config.log_path().ends_with("aries.log"));
    }

    #[test]
    fn workload_without_logging_leaves_expected_tuples() {
        let config = LoggingTestConfig {
            tuple_count: 5,
            backend_count: 1,
            column_count: 2,
            ..LoggingTestConfig::default()
        };
        let ctx = Context::new(config.logging_config());
        let table = create_database_and_table(&ctx, config.column_count).unwrap();

        run_backend(&ctx, &config, &table).unwrap();
        check_tuple_count(&ctx, 4).unwrap();
    }

    #[test]
    fn failed_flush_fails_the_backend() {
        let config = LoggingTestConfig {
            tuple_count: 3,
            backend_count: 1,
            column_count: 1,
            ..LoggingTestConfig::default()
        };
        let ctx = Context::new(config.logging_config().synchronous_commit(false));
        let device = MemoryDevice::new();
        ctx.log_manager()
            .set_log_destination(config.logging_type, LogDestination::Memory(device.clone()));
        assert!(ctx.log_manager().start_standby_mode(config.logging_type));
        wait_for(&ctx, config.logging_type, LoggingMode::Standby).unwrap();
        ctx.log_manager().start_recovery_mode(config.logging_type);
        wait_for(&ctx, config.logging_type, LoggingMode::Logging).unwrap();

        device.fail_syncs(true);
        ctx.transaction_manager().set_logging_type(Some(config.logging_type));
        let table = create_database_and_table(&ctx, config.column_count).unwrap();

        let result = run_backend(&ctx, &config, &table);
        assert!(matches!(result, Err(WorkloadError::FlushFailed(LoggingType::Aries))));
        assert!(device.durable_image().is_empty());
    }

    #[test]
    fn aborted_inserts_are_undone() {
        let ctx = Context::new(LoggingConfig::default());
        let table = create_database_and_table(&ctx, 1).unwrap();

        insert_tuples(&ctx, LoggingType::Peloton, &table, 3, false).unwrap();
        assert_eq!(table.active_tuple_count(), 0);
    }
}
