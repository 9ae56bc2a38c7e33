//! Redo-only recovery.
//!
//! The replayer makes a single forward pass over the log. Tuple records are
//! held per transaction and applied, in log order, when that transaction's
//! commit marker is read; an abort marker discards them, and whatever is
//! still held at the end of the log belonged to a transaction that never
//! finished. In redo-all mode every tuple record is applied as it is read.

use crate::error::LogResult;
use crate::types::{DatabaseId, ItemPointer, TableId, TxnId};
use crate::wal::{LogReader, LogRecord};
use std::collections::HashMap;
use tidelog_storage::LogDevice;
use tracing::{debug, info, warn};

/// Storage the replayer applies tuple records to.
pub trait ReplayTarget: Send + Sync {
    /// Installs `payload` as the active tuple at `location`, overwriting any
    /// tuple already there.
    ///
    /// # Errors
    ///
    /// Returns an error if the database, table or location is unknown.
    fn insert_tuple_at(
        &self,
        db_id: DatabaseId,
        table_id: TableId,
        location: ItemPointer,
        payload: &[u8],
    ) -> LogResult<()>;

    /// Marks the tuple at `location` inactive.
    ///
    /// # Errors
    ///
    /// Returns an error if the database, table or location is unknown.
    fn deactivate_tuple_at(
        &self,
        db_id: DatabaseId,
        table_id: TableId,
        location: ItemPointer,
    ) -> LogResult<()>;

    /// Called once after a successful replay, before logging resumes.
    fn finish_replay(&self, _stats: &RecoveryStats) {}
}

/// Outcome of one replay.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryStats {
    /// Frames read.
    pub records_read: u64,
    /// Tuple records applied to storage.
    pub applied: u64,
    /// Tuple records the storage rejected.
    pub skipped: u64,
    /// Transactions with a commit marker.
    pub committed_txns: u64,
    /// Transactions with an abort marker.
    pub aborted_txns: u64,
    /// Transactions with neither.
    pub uncommitted_txns: u64,
    /// Highest transaction id in the log.
    pub max_txn_id: Option<TxnId>,
    /// Offset just past the last intact frame.
    pub valid_end: u64,
    /// Bytes of torn tail past `valid_end`.
    pub truncated_bytes: u64,
}

/// Replays a log into a [`ReplayTarget`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Replayer {
    redo_all: bool,
}

impl Replayer {
    /// Creates a commit-gated replayer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies every tuple record regardless of its transaction's outcome.
    #[must_use]
    pub const fn redo_all(mut self, redo_all: bool) -> Self {
        self.redo_all = redo_all;
        self
    }

    /// Replays `device` from the start.
    ///
    /// Storage rejections are counted as skipped and do not stop the scan.
    /// The torn tail, if any, is reported in the stats but not removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the log is corrupted before its end or cannot be
    /// read.
    pub fn replay<D: LogDevice + ?Sized>(
        &self,
        device: &D,
        target: &dyn ReplayTarget,
    ) -> LogResult<RecoveryStats> {
        let mut stats = RecoveryStats::default();
        let mut open: HashMap<TxnId, Vec<LogRecord>> = HashMap::new();
        let mut reader = LogReader::new(device);

        for item in reader.by_ref() {
            let (offset, record) = item?;
            stats.records_read += 1;
            let txn_id = record.txn_id();
            stats.max_txn_id = stats.max_txn_id.max(Some(txn_id));

            match record {
                LogRecord::TransactionBegin { txn_id } => {
                    open.entry(txn_id).or_default();
                }
                LogRecord::TransactionCommit { txn_id } => {
                    stats.committed_txns += 1;
                    for held in open.remove(&txn_id).unwrap_or_default() {
                        apply(&held, target, &mut stats);
                    }
                }
                LogRecord::TransactionAbort { txn_id } => {
                    stats.aborted_txns += 1;
                    if let Some(held) = open.remove(&txn_id) {
                        debug!(%txn_id, discarded = held.len(), "aborted transaction discarded");
                    }
                }
                tuple => {
                    let held = open.entry(txn_id).or_default();
                    if self.redo_all {
                        apply(&tuple, target, &mut stats);
                    } else {
                        debug!(offset, %txn_id, record = tuple.record_type().name(), "held until commit");
                        held.push(tuple);
                    }
                }
            }
        }

        stats.uncommitted_txns = open.len() as u64;
        stats.valid_end = reader.valid_end();
        stats.truncated_bytes = reader.torn_bytes();

        info!(
            records = stats.records_read,
            applied = stats.applied,
            skipped = stats.skipped,
            committed = stats.committed_txns,
            aborted = stats.aborted_txns,
            uncommitted = stats.uncommitted_txns,
            torn_bytes = stats.truncated_bytes,
            redo_all = self.redo_all,
            "log replayed"
        );
        Ok(stats)
    }
}

fn apply(record: &LogRecord, target: &dyn ReplayTarget, stats: &mut RecoveryStats) {
    let result = match record {
        LogRecord::Insert {
            db_id,
            table_id,
            new_location,
            payload,
            ..
        } => target.insert_tuple_at(*db_id, *table_id, *new_location, payload),
        LogRecord::Delete {
            db_id,
            table_id,
            old_location,
            ..
        } => target.deactivate_tuple_at(*db_id, *table_id, *old_location),
        LogRecord::Update {
            db_id,
            table_id,
            new_location,
            old_location,
            payload,
            ..
        } => target
            .insert_tuple_at(*db_id, *table_id, *new_location, payload)
            .and_then(|()| target.deactivate_tuple_at(*db_id, *table_id, *old_location)),
        LogRecord::TransactionBegin { .. }
        | LogRecord::TransactionCommit { .. }
        | LogRecord::TransactionAbort { .. } => Ok(()),
    };

    match result {
        Ok(()) => stats.applied += 1,
        Err(e) => {
            stats.skipped += 1;
            warn!(
                txn_id = %record.txn_id(),
                record = record.record_type().name(),
                error = %e,
                "replay skipped record"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LogError;
    use crate::wal::encode_frame_into;
    use parking_lot::Mutex;
    use std::collections::BTreeMap;
    use tidelog_storage::MemoryDevice;

    /// Slot map keyed by location; `true` means active.
    #[derive(Default)]
    struct Slots {
        tuples: Mutex<BTreeMap<ItemPointer, (Vec<u8>, bool)>>,
    }

    impl Slots {
        fn active(&self) -> Vec<ItemPointer> {
            self.tuples
                .lock()
                .iter()
                .filter(|(_, (_, active))| *active)
                .map(|(loc, _)| *loc)
                .collect()
        }
    }

    impl ReplayTarget for Slots {
        fn insert_tuple_at(
            &self,
            _db: DatabaseId,
            table: TableId,
            location: ItemPointer,
            payload: &[u8],
        ) -> LogResult<()> {
            if table != TableId::new(1) {
                return Err(LogError::TableNotFound {
                    database: DatabaseId::new(1),
                    table,
                });
            }
            self.tuples.lock().insert(location, (payload.to_vec(), true));
            Ok(())
        }

        fn deactivate_tuple_at(
            &self,
            _db: DatabaseId,
            _table: TableId,
            location: ItemPointer,
        ) -> LogResult<()> {
            match self.tuples.lock().get_mut(&location) {
                Some(slot) => {
                    slot.1 = false;
                    Ok(())
                }
                None => Err(LogError::TupleNotFound(location)),
            }
        }
    }

    fn loc(offset: u32) -> ItemPointer {
        ItemPointer::new(0, offset)
    }

    fn insert(txn: u64, offset: u32) -> LogRecord {
        LogRecord::Insert {
            txn_id: TxnId::new(txn),
            db_id: DatabaseId::new(1),
            table_id: TableId::new(1),
            new_location: loc(offset),
            payload: vec![offset as u8],
        }
    }

    fn log_of(records: &[LogRecord]) -> MemoryDevice {
        let mut data = Vec::new();
        for record in records {
            encode_frame_into(record, &mut data).unwrap();
        }
        MemoryDevice::with_data(data)
    }

    fn begin(txn: u64) -> LogRecord {
        LogRecord::TransactionBegin { txn_id: TxnId::new(txn) }
    }

    fn commit(txn: u64) -> LogRecord {
        LogRecord::TransactionCommit { txn_id: TxnId::new(txn) }
    }

    fn abort(txn: u64) -> LogRecord {
        LogRecord::TransactionAbort { txn_id: TxnId::new(txn) }
    }

    #[test]
    fn only_committed_transactions_are_applied() {
        let device = log_of(&[
            begin(1),
            insert(1, 0),
            commit(1),
            begin(2),
            insert(2, 1),
            abort(2),
            begin(3),
            insert(3, 2),
        ]);
        let slots = Slots::default();

        let stats = Replayer::new().replay(&device, &slots).unwrap();

        assert_eq!(slots.active(), vec![loc(0)]);
        assert_eq!(stats.records_read, 8);
        assert_eq!(stats.applied, 1);
        assert_eq!(stats.committed_txns, 1);
        assert_eq!(stats.aborted_txns, 1);
        assert_eq!(stats.uncommitted_txns, 1);
        assert_eq!(stats.max_txn_id, Some(TxnId::new(3)));
    }

    #[test]
    fn redo_all_applies_unfinished_work() {
        let device = log_of(&[begin(1), insert(1, 0), begin(2), insert(2, 1), abort(2)]);
        let slots = Slots::default();

        let stats = Replayer::new().redo_all(true).replay(&device, &slots).unwrap();

        assert_eq!(slots.active(), vec![loc(0), loc(1)]);
        assert_eq!(stats.applied, 2);
        assert_eq!(stats.uncommitted_txns, 1);
    }

    #[test]
    fn interleaved_transactions_apply_at_their_commit() {
        let device = log_of(&[
            begin(1),
            begin(2),
            insert(1, 0),
            insert(2, 1),
            commit(2),
            LogRecord::Delete {
                txn_id: TxnId::new(1),
                db_id: DatabaseId::new(1),
                table_id: TableId::new(1),
                old_location: loc(1),
            },
            commit(1),
        ]);
        let slots = Slots::default();

        Replayer::new().replay(&device, &slots).unwrap();
        assert_eq!(slots.active(), vec![loc(0)]);
    }

    #[test]
    fn update_leaves_only_the_new_version() {
        let device = log_of(&[
            begin(1),
            insert(1, 0),
            commit(1),
            begin(2),
            LogRecord::Update {
                txn_id: TxnId::new(2),
                db_id: DatabaseId::new(1),
                table_id: TableId::new(1),
                new_location: loc(5),
                old_location: loc(0),
                payload: b"v2".to_vec(),
            },
            commit(2),
        ]);
        let slots = Slots::default();

        Replayer::new().replay(&device, &slots).unwrap();
        assert_eq!(slots.active(), vec![loc(5)]);
    }

    #[test]
    fn replay_twice_is_idempotent() {
        let device = log_of(&[begin(1), insert(1, 0), insert(1, 1), commit(1)]);
        let slots = Slots::default();

        Replayer::new().replay(&device, &slots).unwrap();
        let stats = Replayer::new().replay(&device, &slots).unwrap();

        assert_eq!(slots.active(), vec![loc(0), loc(1)]);
        assert_eq!(stats.skipped, 0);
    }

    #[test]
    fn rejected_records_are_skipped_and_counted() {
        let device = log_of(&[
            begin(1),
            LogRecord::Insert {
                txn_id: TxnId::new(1),
                db_id: DatabaseId::new(1),
                table_id: TableId::new(99),
                new_location: loc(0),
                payload: vec![],
            },
            insert(1, 1),
            commit(1),
        ]);
        let slots = Slots::default();

        let stats = Replayer::new().replay(&device, &slots).unwrap();
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.applied, 1);
        assert_eq!(slots.active(), vec![loc(1)]);
    }

    #[test]
    fn torn_tail_is_reported() {
        let device = log_of(&[begin(1), insert(1, 0), commit(1)]);
        let full = device.len();
        let mut data = device.contents();
        data.extend_from_slice(&b"TLOG"[..3]);
        let device = MemoryDevice::with_data(data);

        let stats = Replayer::new().replay(&device, &Slots::default()).unwrap();
        assert_eq!(stats.valid_end, full);
        assert_eq!(stats.truncated_bytes, 3);
    }

    #[test]
    fn mid_log_corruption_fails_replay() {
        let device = log_of(&[begin(1), insert(1, 0), commit(1)]);
        let mut data = device.contents();
        data[12] ^= 0x55;
        let device = MemoryDevice::with_data(data);

        assert!(Replayer::new().replay(&device, &Slots::default()).is_err());
    }
}
