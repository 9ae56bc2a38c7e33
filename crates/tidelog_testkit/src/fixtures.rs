//! Test fixtures.
//!
//! [`TestContext`] wraps a [`Context`] logging to an in-memory device, so a
//! test can start logging, write, crash and restart on what the crash left
//! behind.

use crate::workload::{create_database_and_table, TEST_DATABASE_ID, TEST_TABLE_ID};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tidelog_core::{
    encode_frame_into, BackendLogger, Context, DataTable, ItemPointer, LogDestination, LogRecord,
    LogRecordType, LogResult, LoggingConfig, LoggingMode, LoggingType, RecoveryStats,
    Transaction,
};
use tidelog_storage::MemoryDevice;

/// Configuration with a short flush interval for tests.
#[must_use]
pub fn test_config() -> LoggingConfig {
    LoggingConfig::new()
        .flush_interval(Duration::from_millis(1))
        .shutdown_timeout(Duration::from_secs(5))
}

/// Creates a temporary directory for log files.
///
/// # Panics
///
/// Panics if the directory cannot be created.
#[must_use]
pub fn temp_log_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp directory")
}

/// Encodes `records` as a complete log image.
///
/// # Panics
///
/// Panics if a record cannot be encoded.
#[must_use]
pub fn encode_log(records: &[LogRecord]) -> Vec<u8> {
    let mut out = Vec::new();
    for record in records {
        encode_frame_into(record, &mut out).expect("Failed to encode record");
    }
    out
}

/// A context logging to an in-memory device.
pub struct TestContext {
    ctx: Context,
    device: MemoryDevice,
    logging_type: LoggingType,
}

impl TestContext {
    /// Creates a context over an empty log.
    #[must_use]
    pub fn new(logging_type: LoggingType) -> Self {
        Self::with_device(logging_type, MemoryDevice::new())
    }

    /// Creates a context over an existing log image.
    #[must_use]
    pub fn with_log(logging_type: LoggingType, image: Vec<u8>) -> Self {
        Self::with_device(logging_type, MemoryDevice::with_data(image))
    }

    /// Creates a context over `device`.
    #[must_use]
    pub fn with_device(logging_type: LoggingType, device: MemoryDevice) -> Self {
        let ctx = Context::new(test_config());
        ctx.log_manager()
            .set_log_destination(logging_type, LogDestination::Memory(device.clone()));
        Self {
            ctx,
            device,
            logging_type,
        }
    }

    /// The wrapped context.
    #[must_use]
    pub fn ctx(&self) -> &Context {
        &self.ctx
    }

    /// The log device.
    #[must_use]
    pub fn device(&self) -> &MemoryDevice {
        &self.device
    }

    /// The logging configuration under test.
    #[must_use]
    pub fn logging_type(&self) -> LoggingType {
        self.logging_type
    }

    /// Creates the workload table with one varchar field.
    ///
    /// # Panics
    ///
    /// Panics if the table cannot be created.
    #[must_use]
    pub fn table(&self) -> Arc<DataTable> {
        create_database_and_table(&self.ctx, 1).expect("Failed to create table")
    }

    /// Drives the frontend logger through recovery into LOGGING and turns on
    /// transaction markers. Returns `false` if LOGGING was not reached.
    pub fn start(&self) -> bool {
        self.start_with(false)
    }

    /// Like [`Self::start`], replaying every record regardless of commit
    /// when `redo_all` is set.
    pub fn start_with(&self, redo_all: bool) -> bool {
        let log = self.ctx.log_manager();
        if !log.start_standby_mode(self.logging_type)
            || !log.wait_for_mode(LoggingMode::Standby, true, self.logging_type)
        {
            return false;
        }
        log.set_test_redo_all_logs(self.logging_type, redo_all);
        log.start_recovery_mode(self.logging_type);
        if !log.wait_for_mode(LoggingMode::Logging, true, self.logging_type) {
            return false;
        }
        self.ctx
            .transaction_manager()
            .set_logging_type(Some(self.logging_type));
        true
    }

    /// Statistics of the last recovery.
    #[must_use]
    pub fn last_recovery(&self) -> Option<RecoveryStats> {
        self.ctx.log_manager().last_recovery(self.logging_type)
    }

    /// The calling worker's backend logger.
    #[must_use]
    pub fn logger(&self) -> Arc<BackendLogger> {
        self.ctx.log_manager().get_backend_logger(self.logging_type)
    }

    /// Inserts `payload` into `table` inside `txn` and logs the insert.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert cannot be stored or logged.
    pub fn insert(
        &self,
        txn: &mut Transaction,
        table: &DataTable,
        payload: Vec<u8>,
    ) -> LogResult<ItemPointer> {
        let location = table.insert_tuple(payload.clone())?;
        txn.record_insert(table.database_id(), table.table_id(), location)?;
        self.logger().log(BackendLogger::get_tuple_record(
            LogRecordType::Insert,
            txn.id(),
            table.table_id(),
            location,
            ItemPointer::INVALID,
            Some(payload),
            table.database_id(),
        )?);
        Ok(location)
    }

    /// Deletes the tuple at `location` inside `txn` and logs the delete.
    ///
    /// # Errors
    ///
    /// Returns an error if there is no active tuple there.
    pub fn delete(&self, txn: &mut Transaction, table: &DataTable, location: ItemPointer) -> LogResult<()> {
        table.delete_tuple(location)?;
        txn.record_delete(table.database_id(), table.table_id(), location)?;
        self.logger().log(BackendLogger::get_tuple_record(
            LogRecordType::Delete,
            txn.id(),
            table.table_id(),
            ItemPointer::INVALID,
            location,
            None,
            table.database_id(),
        )?);
        Ok(())
    }

    /// Commits one transaction inserting `payload`.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert or the commit fails.
    pub fn insert_committed(&self, table: &DataTable, payload: Vec<u8>) -> LogResult<ItemPointer> {
        let txns = self.ctx.transaction_manager();
        let mut txn = txns.begin_transaction();
        let location = self.insert(&mut txn, table, payload)?;
        txns.commit_transaction(&mut txn)?;
        Ok(location)
    }

    /// Ends logging cleanly and returns the log device.
    ///
    /// # Panics
    ///
    /// Panics if the frontend logger does not terminate.
    #[must_use]
    pub fn shutdown(self) -> MemoryDevice {
        assert!(
            self.ctx.log_manager().end_logging(self.logging_type),
            "frontend logger did not terminate"
        );
        self.device
    }

    /// Drops the context without ending logging and returns a device
    /// holding only the bytes that were synced.
    #[must_use]
    pub fn crash(self) -> MemoryDevice {
        let Self { ctx, device, .. } = self;
        drop(ctx);
        MemoryDevice::with_data(device.durable_image())
    }
}

impl std::fmt::Debug for TestContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestContext")
            .field("logging_type", &self.logging_type)
            .field("log_len", &self.device.contents().len())
            .finish_non_exhaustive()
    }
}

/// Active payloads of the workload table, ordered by location.
///
/// # Panics
///
/// Panics if the workload table does not exist.
#[must_use]
pub fn table_image(ctx: &Context) -> Vec<(ItemPointer, Vec<u8>)> {
    let table = ctx
        .catalog()
        .get_table_by_ids(TEST_DATABASE_ID, TEST_TABLE_ID)
        .expect("workload table missing");
    let mut image = Vec::new();
    for block in 0..table.block_count() as u32 {
        for offset in 0..table.tuples_per_block() {
            let location = ItemPointer::new(block, offset);
            if let Some(payload) = table.get_tuple(location) {
                image.push((location, payload));
            }
        }
    }
    image
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn committed_insert_survives_crash() {
        let tc = TestContext::new(LoggingType::Aries);
        let table = tc.table();
        assert!(tc.start());
        let location = tc.insert_committed(&table, vec![1, 2, 3]).unwrap();

        let restarted = TestContext::with_device(LoggingType::Aries, tc.crash());
        restarted.table();
        assert!(restarted.start());
        assert_eq!(table_image(restarted.ctx()), vec![(location, vec![1, 2, 3])]);
        let _ = restarted.shutdown();
    }

    #[test]
    fn encode_log_concatenates_frames() {
        let records = vec![
            LogRecord::TransactionBegin {
                txn_id: tidelog_core::TxnId::new(1),
            },
            LogRecord::TransactionCommit {
                txn_id: tidelog_core::TxnId::new(1),
            },
        ];
        let image = encode_log(&records);
        let device = MemoryDevice::with_data(image);
        let read: Vec<_> = tidelog_core::LogReader::new(&device)
            .map(|r| r.unwrap().1)
            .collect();
        assert_eq!(read, records);
    }
}
