//! Backend logger: the per-worker side of the log.

use crate::config::LoggingType;
use crate::error::{LogError, LogResult};
use crate::logging::mode::LoggingMode;
use crate::logging::slot::Slot;
use crate::types::{DatabaseId, ItemPointer, TableId, TxnId, WorkerId};
use crate::wal::{LogRecord, LogRecordType};
use parking_lot::{Condvar, Mutex};
use std::mem;
use std::sync::Weak;
use tracing::debug;

#[derive(Debug, Default)]
struct Buffer {
    records: Vec<LogRecord>,
    /// Records accepted so far.
    submitted: u64,
    /// Records known durable.
    flushed: u64,
    closed: bool,
    failed: bool,
}

/// Buffers the records of one worker until the frontend logger collects them.
///
/// `log` only touches the worker-local buffer and never waits on I/O. Records
/// are collected in submission order and moved, not copied, to the frontend.
pub struct BackendLogger {
    logging_type: LoggingType,
    worker: WorkerId,
    slot: Weak<Slot>,
    buffer: Mutex<Buffer>,
    flushed: Condvar,
}

impl BackendLogger {
    pub(crate) fn new(logging_type: LoggingType, worker: WorkerId, slot: Weak<Slot>) -> Self {
        Self {
            logging_type,
            worker,
            slot,
            buffer: Mutex::new(Buffer::default()),
            flushed: Condvar::new(),
        }
    }

    /// Logging configuration this logger feeds.
    #[must_use]
    pub fn logging_type(&self) -> LoggingType {
        self.logging_type
    }

    /// Worker that owns this logger.
    #[must_use]
    pub fn worker(&self) -> WorkerId {
        self.worker
    }

    /// Submits a record.
    ///
    /// Dropped with a debug trace when the configuration is not in LOGGING
    /// mode or shutdown already closed this logger.
    pub fn log(&self, record: LogRecord) {
        let mode = match self.slot.upgrade() {
            Some(slot) => slot.mode(),
            None => LoggingMode::Sleep,
        };
        if mode != LoggingMode::Logging {
            debug!(
                logging_type = %self.logging_type,
                %mode,
                record = record.record_type().name(),
                "not logging, record dropped"
            );
            return;
        }

        let mut buffer = self.buffer.lock();
        if buffer.closed || buffer.failed {
            debug!(
                logging_type = %self.logging_type,
                record = record.record_type().name(),
                "backend logger closed, record dropped"
            );
            return;
        }
        buffer.records.push(record);
        buffer.submitted += 1;
    }

    /// Builds a tuple record.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::InvalidArgument`] for transaction record types, a
    /// missing payload on `Insert`/`Update`, an oversized payload, or a
    /// missing location.
    #[allow(clippy::too_many_arguments)]
    pub fn get_tuple_record(
        record_type: LogRecordType,
        txn_id: TxnId,
        table_id: TableId,
        new_location: ItemPointer,
        old_location: ItemPointer,
        tuple: Option<Vec<u8>>,
        db_id: DatabaseId,
    ) -> LogResult<LogRecord> {
        let payload = |tuple: Option<Vec<u8>>| -> LogResult<Vec<u8>> {
            let payload = tuple.ok_or_else(|| {
                LogError::invalid_argument(format!(
                    "{} record requires a tuple payload",
                    record_type.name()
                ))
            })?;
            if payload.len() > LogRecord::MAX_PAYLOAD_SIZE {
                return Err(LogError::invalid_argument(format!(
                    "tuple payload of {} bytes is too large",
                    payload.len()
                )));
            }
            Ok(payload)
        };
        let located = |location: ItemPointer, which: &str| -> LogResult<ItemPointer> {
            if location.is_valid() {
                Ok(location)
            } else {
                Err(LogError::invalid_argument(format!(
                    "{} record requires a valid {which} location",
                    record_type.name()
                )))
            }
        };

        match record_type {
            LogRecordType::Insert => Ok(LogRecord::Insert {
                txn_id,
                db_id,
                table_id,
                new_location: located(new_location, "new")?,
                payload: payload(tuple)?,
            }),
            LogRecordType::Delete => Ok(LogRecord::Delete {
                txn_id,
                db_id,
                table_id,
                old_location: located(old_location, "old")?,
            }),
            LogRecordType::Update => Ok(LogRecord::Update {
                txn_id,
                db_id,
                table_id,
                new_location: located(new_location, "new")?,
                old_location: located(old_location, "old")?,
                payload: payload(tuple)?,
            }),
            LogRecordType::TransactionBegin
            | LogRecordType::TransactionCommit
            | LogRecordType::TransactionAbort => Err(LogError::invalid_argument(format!(
                "{} is not a tuple record type",
                record_type.name()
            ))),
        }
    }

    /// Blocks until every record submitted so far is durable.
    ///
    /// Returns `false` if those records can no longer become durable: the
    /// frontend logger halted, or the log manager went away.
    #[must_use]
    pub fn wait_for_flushing(&self) -> bool {
        let target = {
            let buffer = self.buffer.lock();
            if buffer.flushed >= buffer.submitted {
                return true;
            }
            if buffer.failed {
                return false;
            }
            buffer.submitted
        };

        let requested = self.slot.upgrade().is_some_and(|slot| slot.request_flush());
        if !requested {
            self.fail();
            return false;
        }

        let mut buffer = self.buffer.lock();
        while buffer.flushed < target {
            if buffer.failed {
                return false;
            }
            self.flushed.wait(&mut buffer);
        }
        true
    }

    /// Records buffered and not yet collected.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.buffer.lock().records.len()
    }

    /// Takes the buffered records and the submission watermark they reach.
    pub(crate) fn collect(&self) -> (Vec<LogRecord>, u64) {
        let mut buffer = self.buffer.lock();
        (mem::take(&mut buffer.records), buffer.submitted)
    }

    /// Like [`Self::collect`], and refuses every later record.
    pub(crate) fn close_and_collect(&self) -> (Vec<LogRecord>, u64) {
        let mut buffer = self.buffer.lock();
        buffer.closed = true;
        (mem::take(&mut buffer.records), buffer.submitted)
    }

    pub(crate) fn mark_flushed(&self, upto: u64) {
        let mut buffer = self.buffer.lock();
        if upto > buffer.flushed {
            buffer.flushed = upto;
            self.flushed.notify_all();
        }
    }

    pub(crate) fn has_unflushed(&self) -> bool {
        let buffer = self.buffer.lock();
        buffer.flushed < buffer.submitted
    }

    pub(crate) fn fail(&self) {
        let mut buffer = self.buffer.lock();
        buffer.failed = true;
        self.flushed.notify_all();
    }
}

impl std::fmt::Debug for BackendLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let buffer = self.buffer.lock();
        f.debug_struct("BackendLogger")
            .field("logging_type", &self.logging_type)
            .field("worker", &self.worker)
            .field("pending", &buffer.records.len())
            .field("submitted", &buffer.submitted)
            .field("flushed", &buffer.flushed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn logging_slot() -> Arc<Slot> {
        let slot = Arc::new(Slot::new(LoggingType::Aries));
        slot.lock().mode = LoggingMode::Logging;
        slot
    }

    fn begin(id: u64) -> LogRecord {
        LogRecord::TransactionBegin {
            txn_id: TxnId::new(id),
        }
    }

    #[test]
    fn log_outside_logging_mode_is_dropped() {
        let slot = Arc::new(Slot::new(LoggingType::Aries));
        let logger = BackendLogger::new(LoggingType::Aries, WorkerId::current(), Arc::downgrade(&slot));

        logger.log(begin(1));
        assert_eq!(logger.pending(), 0);
        assert!(logger.wait_for_flushing());
    }

    #[test]
    fn wait_on_halted_slot_fails_without_blocking() {
        let slot = logging_slot();
        let logger = BackendLogger::new(LoggingType::Aries, WorkerId::current(), Arc::downgrade(&slot));

        logger.log(begin(1));
        slot.lock().halted = true;
        assert!(!logger.wait_for_flushing());
        assert!(!logger.wait_for_flushing());
    }

    #[test]
    fn collect_preserves_submission_order() {
        let slot = logging_slot();
        let logger = BackendLogger::new(LoggingType::Aries, WorkerId::current(), Arc::downgrade(&slot));

        for id in 1..=3 {
            logger.log(begin(id));
        }
        let (records, upto) = logger.collect();

        assert_eq!(upto, 3);
        let ids: Vec<_> = records.iter().map(|r| r.txn_id().as_u64()).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(logger.pending(), 0);
        assert!(logger.has_unflushed());

        logger.mark_flushed(upto);
        assert!(!logger.has_unflushed());
        assert!(logger.wait_for_flushing());
    }

    #[test]
    fn closed_logger_refuses_records() {
        let slot = logging_slot();
        let logger = BackendLogger::new(LoggingType::Aries, WorkerId::current(), Arc::downgrade(&slot));

        logger.log(begin(1));
        let (records, _) = logger.close_and_collect();
        assert_eq!(records.len(), 1);

        logger.log(begin(2));
        assert_eq!(logger.pending(), 0);
    }

    #[test]
    fn failure_releases_flush_waiters() {
        let slot = logging_slot();
        let logger = Arc::new(BackendLogger::new(
            LoggingType::Aries,
            WorkerId::current(),
            Arc::downgrade(&slot),
        ));
        logger.log(begin(1));

        let waiter = {
            let logger = Arc::clone(&logger);
            std::thread::spawn(move || logger.wait_for_flushing())
        };
        slot.halt();
        logger.fail();

        assert!(!waiter.join().unwrap());
    }

    #[test]
    fn tuple_record_constructor_validates() {
        let loc = ItemPointer::new(0, 1);
        let db = DatabaseId::new(1);
        let table = TableId::new(1);
        let txn = TxnId::new(1);

        let insert = BackendLogger::get_tuple_record(
            LogRecordType::Insert,
            txn,
            table,
            loc,
            ItemPointer::INVALID,
            Some(vec![1, 2]),
            db,
        )
        .unwrap();
        assert_eq!(insert.record_type(), LogRecordType::Insert);

        let delete = BackendLogger::get_tuple_record(
            LogRecordType::Delete,
            txn,
            table,
            ItemPointer::INVALID,
            loc,
            None,
            db,
        )
        .unwrap();
        assert_eq!(delete.record_type(), LogRecordType::Delete);

        assert!(BackendLogger::get_tuple_record(
            LogRecordType::Insert,
            txn,
            table,
            loc,
            ItemPointer::INVALID,
            None,
            db,
        )
        .is_err());
        assert!(BackendLogger::get_tuple_record(
            LogRecordType::Update,
            txn,
            table,
            loc,
            ItemPointer::INVALID,
            Some(vec![]),
            db,
        )
        .is_err());
        assert!(BackendLogger::get_tuple_record(
            LogRecordType::TransactionCommit,
            txn,
            table,
            loc,
            loc,
            Some(vec![]),
            db,
        )
        .is_err());
    }
}
