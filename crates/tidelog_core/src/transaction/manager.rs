//! Transaction manager.

use crate::catalog::Catalog;
use crate::config::LoggingType;
use crate::error::{LogError, LogResult};
use crate::logging::{BackendLogger, LogManager};
use crate::transaction::state::{IntentKind, Transaction};
use crate::types::TxnId;
use crate::wal::LogRecord;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Hands out transaction ids.
///
/// Shared between the transaction manager and recovery, which moves it past
/// every id found in the log.
#[derive(Debug)]
pub struct TxnIdAllocator {
    next: AtomicU64,
}

impl Default for TxnIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl TxnIdAllocator {
    /// Creates an allocator whose first id is 1.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    /// Returns a fresh id.
    pub fn allocate(&self) -> TxnId {
        TxnId::new(self.next.fetch_add(1, Ordering::SeqCst))
    }

    /// The id the next `allocate` returns.
    #[must_use]
    pub fn peek_next(&self) -> TxnId {
        TxnId::new(self.next.load(Ordering::SeqCst))
    }

    /// Ensures every later id is greater than `seen`.
    pub fn advance_past(&self, seen: TxnId) {
        self.next
            .fetch_max(seen.as_u64().saturating_add(1), Ordering::SeqCst);
    }

    /// Restarts numbering at 1.
    pub fn reset(&self) {
        self.next.store(1, Ordering::SeqCst);
    }
}

/// Begins, commits and aborts transactions.
///
/// While a logging type is set, begin/commit/abort submit the matching
/// marker through the calling worker's backend logger, and commit waits for
/// that logger to be flushed when synchronous commit is on.
pub struct TransactionManager {
    ids: Arc<TxnIdAllocator>,
    catalog: Arc<Catalog>,
    log_manager: Arc<LogManager>,
    logging_type: RwLock<Option<LoggingType>>,
    synchronous_commit: bool,
    active: AtomicUsize,
}

impl TransactionManager {
    /// Creates a transaction manager.
    pub fn new(
        ids: Arc<TxnIdAllocator>,
        catalog: Arc<Catalog>,
        log_manager: Arc<LogManager>,
        synchronous_commit: bool,
    ) -> Self {
        Self {
            ids,
            catalog,
            log_manager,
            logging_type: RwLock::new(None),
            synchronous_commit,
            active: AtomicUsize::new(0),
        }
    }

    /// Selects which configuration transaction markers go to. `None` turns
    /// marker logging off.
    pub fn set_logging_type(&self, logging_type: Option<LoggingType>) {
        *self.logging_type.write() = logging_type;
    }

    /// The configuration transaction markers go to.
    #[must_use]
    pub fn logging_type(&self) -> Option<LoggingType> {
        *self.logging_type.read()
    }

    /// The id allocator.
    #[must_use]
    pub fn ids(&self) -> &Arc<TxnIdAllocator> {
        &self.ids
    }

    /// Starts a transaction.
    pub fn begin_transaction(&self) -> Transaction {
        let txn = Transaction::new(self.ids.allocate());
        self.active.fetch_add(1, Ordering::SeqCst);
        self.log_marker(LogRecord::TransactionBegin { txn_id: txn.id() });
        txn
    }

    /// Commits a transaction.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::TransactionNotActive`] if `txn` already finished,
    /// or [`LogError::InvalidOperation`] if synchronous commit is on and the
    /// commit marker could not be made durable.
    pub fn commit_transaction(&self, txn: &mut Transaction) -> LogResult<()> {
        txn.ensure_active()?;
        let txn_id = txn.id();

        txn.mark_committed();
        self.active.fetch_sub(1, Ordering::SeqCst);
        let logger = self.log_marker(LogRecord::TransactionCommit { txn_id });

        if self.synchronous_commit {
            if let Some(logger) = logger {
                if !logger.wait_for_flushing() {
                    return Err(LogError::invalid_operation(format!(
                        "commit of {txn_id} could not be made durable"
                    )));
                }
            }
        }
        debug!(%txn_id, "transaction committed");
        Ok(())
    }

    /// Aborts a transaction, undoing its recorded changes newest first.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::TransactionNotActive`] if `txn` already finished.
    pub fn abort_transaction(&self, txn: &mut Transaction) -> LogResult<()> {
        txn.ensure_active()?;
        let txn_id = txn.id();

        for intent in txn.mark_aborted().into_iter().rev() {
            let undone = self
                .catalog
                .get_table_by_ids(intent.db_id, intent.table_id)
                .and_then(|table| match intent.kind {
                    IntentKind::Insert => table.deactivate_tuple_at(intent.location),
                    IntentKind::Delete => table.reactivate_tuple_at(intent.location),
                });
            if let Err(e) = undone {
                warn!(%txn_id, location = %intent.location, error = %e, "undo failed");
            }
        }

        self.active.fetch_sub(1, Ordering::SeqCst);
        self.log_marker(LogRecord::TransactionAbort { txn_id });
        debug!(%txn_id, "transaction aborted");
        Ok(())
    }

    /// Number of transactions begun and not yet finished.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Restarts id numbering and forgets active transactions. Only valid
    /// between runs.
    pub fn reset_states(&self) {
        self.ids.reset();
        self.active.store(0, Ordering::SeqCst);
    }

    fn log_marker(&self, record: LogRecord) -> Option<Arc<BackendLogger>> {
        let logging_type = self.logging_type()?;
        if !self.log_manager.is_in_logging_mode(logging_type) {
            return None;
        }
        let logger = self.log_manager.get_backend_logger(logging_type);
        logger.log(record);
        Some(logger)
    }
}

impl std::fmt::Debug for TransactionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionManager")
            .field("next_txn_id", &self.ids.peek_next())
            .field("active_count", &self.active_count())
            .field("logging_type", &self.logging_type())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LoggingConfig;
    use crate::context::CatalogTarget;
    use crate::logging::{LogDestination, LoggingMode};
    use crate::storage::{Column, Schema};
    use crate::types::{DatabaseId, TableId};
    use crate::wal::{LogReader, LogRecordType};
    use std::time::Duration;
    use tidelog_storage::MemoryDevice;

    fn setup() -> (Arc<Catalog>, TransactionManager) {
        let catalog = Arc::new(Catalog::new(4));
        let ids = Arc::new(TxnIdAllocator::new());
        let target = Arc::new(CatalogTarget::new(Arc::clone(&catalog), Arc::clone(&ids)));
        let config = LoggingConfig::new().flush_interval(Duration::from_millis(1));
        let log_manager = Arc::new(LogManager::new(config, target));
        let manager = TransactionManager::new(ids, Arc::clone(&catalog), log_manager, true);
        (catalog, manager)
    }

    #[test]
    fn allocator_advances_past_seen_ids() {
        let ids = TxnIdAllocator::new();
        assert_eq!(ids.allocate(), TxnId::new(1));

        ids.advance_past(TxnId::new(10));
        assert_eq!(ids.allocate(), TxnId::new(11));

        ids.advance_past(TxnId::new(3));
        assert_eq!(ids.peek_next(), TxnId::new(12));

        ids.reset();
        assert_eq!(ids.allocate(), TxnId::new(1));
    }

    #[test]
    fn commit_and_double_commit() {
        let (_catalog, manager) = setup();
        let mut txn = manager.begin_transaction();
        assert_eq!(manager.active_count(), 1);

        manager.commit_transaction(&mut txn).unwrap();
        assert_eq!(manager.active_count(), 0);
        assert!(matches!(
            manager.commit_transaction(&mut txn),
            Err(LogError::TransactionNotActive(_))
        ));
    }

    #[test]
    fn abort_undoes_changes() {
        let (catalog, manager) = setup();
        let db = catalog.create_database(DatabaseId::new(1));
        let table = db
            .create_table(TableId::new(1), "t", Schema::new(vec![Column::integer("id")]))
            .unwrap();
        let existing = table.insert_tuple(vec![1]).unwrap();

        let mut txn = manager.begin_transaction();
        let inserted = table.insert_tuple(vec![2]).unwrap();
        txn.record_insert(db.id(), table.table_id(), inserted).unwrap();
        table.delete_tuple(existing).unwrap();
        txn.record_delete(db.id(), table.table_id(), existing).unwrap();

        manager.abort_transaction(&mut txn).unwrap();

        assert_eq!(table.get_tuple(existing), Some(vec![1]));
        assert_eq!(table.get_tuple(inserted), None);
        assert_eq!(table.active_tuple_count(), 1);
    }

    #[test]
    fn markers_are_logged_while_logging() {
        let (_catalog, manager) = setup();
        let device = MemoryDevice::new();
        let log_manager = Arc::clone(&manager.log_manager);
        log_manager.set_log_destination(LoggingType::Peloton, LogDestination::Memory(device.clone()));
        assert!(log_manager.start_standby_mode(LoggingType::Peloton));
        assert!(log_manager.wait_for_mode(LoggingMode::Standby, true, LoggingType::Peloton));
        log_manager.start_recovery_mode(LoggingType::Peloton);
        assert!(log_manager.wait_for_mode(LoggingMode::Logging, true, LoggingType::Peloton));

        manager.set_logging_type(Some(LoggingType::Peloton));
        let mut committed = manager.begin_transaction();
        manager.commit_transaction(&mut committed).unwrap();
        let mut aborted = manager.begin_transaction();
        manager.abort_transaction(&mut aborted).unwrap();
        assert!(log_manager.end_logging(LoggingType::Peloton));

        let types: Vec<_> = LogReader::new(&device)
            .map(|r| r.unwrap().1.record_type())
            .collect();
        assert_eq!(
            types,
            vec![
                LogRecordType::TransactionBegin,
                LogRecordType::TransactionCommit,
                LogRecordType::TransactionBegin,
                LogRecordType::TransactionAbort,
            ]
        );
    }
}
