//! The process context: catalog, transactions and logging wired together.

use crate::catalog::Catalog;
use crate::config::LoggingConfig;
use crate::error::LogResult;
use crate::logging::{LogManager, RecoveryStats, ReplayTarget};
use crate::transaction::{TransactionManager, TxnIdAllocator};
use crate::types::{DatabaseId, ItemPointer, TableId};
use std::sync::Arc;
use tracing::info;

/// Replays log records into the tables of a [`Catalog`].
#[derive(Debug)]
pub struct CatalogTarget {
    catalog: Arc<Catalog>,
    ids: Arc<TxnIdAllocator>,
}

impl CatalogTarget {
    /// Creates a target over `catalog` that advances `ids` after replay.
    #[must_use]
    pub fn new(catalog: Arc<Catalog>, ids: Arc<TxnIdAllocator>) -> Self {
        Self { catalog, ids }
    }
}

impl ReplayTarget for CatalogTarget {
    fn insert_tuple_at(
        &self,
        db_id: DatabaseId,
        table_id: TableId,
        location: ItemPointer,
        payload: &[u8],
    ) -> LogResult<()> {
        self.catalog
            .get_table_by_ids(db_id, table_id)?
            .insert_tuple_at(location, payload.to_vec())
    }

    fn deactivate_tuple_at(
        &self,
        db_id: DatabaseId,
        table_id: TableId,
        location: ItemPointer,
    ) -> LogResult<()> {
        self.catalog
            .get_table_by_ids(db_id, table_id)?
            .deactivate_tuple_at(location)
    }

    fn finish_replay(&self, stats: &RecoveryStats) {
        if let Some(max) = stats.max_txn_id {
            self.ids.advance_past(max);
        }
    }
}

/// Owns every process-wide component. Nothing in the crate is a global.
///
/// Dropping a context without ending logging stops its frontend loggers
/// without a final drain, as a crash would.
#[derive(Debug)]
pub struct Context {
    config: LoggingConfig,
    catalog: Arc<Catalog>,
    transaction_manager: Arc<TransactionManager>,
    log_manager: Arc<LogManager>,
}

impl Context {
    /// Builds a context from `config`.
    #[must_use]
    pub fn new(config: LoggingConfig) -> Self {
        let catalog = Arc::new(Catalog::new(config.tuples_per_block));
        let ids = Arc::new(TxnIdAllocator::new());
        let target = Arc::new(CatalogTarget::new(Arc::clone(&catalog), Arc::clone(&ids)));
        let log_manager = Arc::new(LogManager::new(config.clone(), target));
        let transaction_manager = Arc::new(TransactionManager::new(
            ids,
            Arc::clone(&catalog),
            Arc::clone(&log_manager),
            config.synchronous_commit,
        ));

        info!(log_dir = %config.log_dir.display(), "context created");
        Self {
            config,
            catalog,
            transaction_manager,
            log_manager,
        }
    }

    /// Configuration.
    #[must_use]
    pub fn config(&self) -> &LoggingConfig {
        &self.config
    }

    /// Catalog.
    #[must_use]
    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    /// Transaction manager.
    #[must_use]
    pub fn transaction_manager(&self) -> &Arc<TransactionManager> {
        &self.transaction_manager
    }

    /// Log manager.
    #[must_use]
    pub fn log_manager(&self) -> &Arc<LogManager> {
        &self.log_manager
    }

    /// Clears the catalog and transaction state between runs.
    pub fn reset(&self) {
        self.catalog.reset();
        self.transaction_manager.reset_states();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LoggingType;
    use crate::logging::{BackendLogger, LogDestination, LoggingMode};
    use crate::storage::{Column, Schema};
    use crate::types::TxnId;
    use crate::wal::LogRecordType;
    use std::time::Duration;
    use tidelog_storage::MemoryDevice;

    fn config() -> LoggingConfig {
        LoggingConfig::new().flush_interval(Duration::from_millis(1))
    }

    fn start(ctx: &Context, device: &MemoryDevice) {
        let log = ctx.log_manager();
        log.set_log_destination(LoggingType::Aries, LogDestination::Memory(device.clone()));
        assert!(log.start_standby_mode(LoggingType::Aries));
        assert!(log.wait_for_mode(LoggingMode::Standby, true, LoggingType::Aries));
        log.start_recovery_mode(LoggingType::Aries);
        assert!(log.wait_for_mode(LoggingMode::Logging, true, LoggingType::Aries));
    }

    fn user_table(ctx: &Context) -> Arc<crate::storage::DataTable> {
        ctx.catalog()
            .create_database(DatabaseId::new(1))
            .create_table(TableId::new(1), "USERTABLE", Schema::new(vec![Column::integer("id")]))
            .unwrap()
    }

    #[test]
    fn committed_insert_survives_crash() {
        let device = MemoryDevice::new();
        {
            let ctx = Context::new(config());
            let table = user_table(&ctx);
            start(&ctx, &device);
            let txns = ctx.transaction_manager();
            txns.set_logging_type(Some(LoggingType::Aries));

            let logger = ctx.log_manager().get_backend_logger(LoggingType::Aries);
            let mut txn = txns.begin_transaction();
            let location = table.insert_tuple(vec![42]).unwrap();
            txn.record_insert(DatabaseId::new(1), TableId::new(1), location).unwrap();
            logger.log(
                BackendLogger::get_tuple_record(
                    LogRecordType::Insert,
                    txn.id(),
                    TableId::new(1),
                    location,
                    ItemPointer::INVALID,
                    Some(vec![42]),
                    DatabaseId::new(1),
                )
                .unwrap(),
            );
            txns.commit_transaction(&mut txn).unwrap();
        }

        let durable = MemoryDevice::with_data(device.durable_image());
        let ctx = Context::new(config());
        let table = user_table(&ctx);
        start(&ctx, &durable);

        assert_eq!(table.active_tuple_count(), 1);
        assert_eq!(table.get_tuple(ItemPointer::new(0, 0)), Some(vec![42]));
        assert_eq!(ctx.transaction_manager().ids().peek_next(), TxnId::new(2));
        assert!(ctx.log_manager().end_logging(LoggingType::Aries));
    }

    #[test]
    fn reset_clears_catalog_and_ids() {
        let ctx = Context::new(config());
        user_table(&ctx);
        ctx.transaction_manager().begin_transaction();

        ctx.reset();
        assert!(ctx.catalog().get_database_by_oid(DatabaseId::new(1)).is_none());
        assert_eq!(ctx.transaction_manager().ids().peek_next(), TxnId::new(1));
    }
}
