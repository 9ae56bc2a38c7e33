//! Database and table lookup by id.

use crate::error::{LogError, LogResult};
use crate::storage::{DataTable, Schema};
use crate::types::{DatabaseId, TableId};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// A database: a set of tables.
#[derive(Debug)]
pub struct Database {
    id: DatabaseId,
    tuples_per_block: u32,
    tables: RwLock<HashMap<TableId, Arc<DataTable>>>,
}

impl Database {
    fn new(id: DatabaseId, tuples_per_block: u32) -> Self {
        Self {
            id,
            tuples_per_block,
            tables: RwLock::new(HashMap::new()),
        }
    }

    /// Database id.
    #[must_use]
    pub fn id(&self) -> DatabaseId {
        self.id
    }

    /// Creates an empty table.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::InvalidOperation`] if `table_id` is taken.
    pub fn create_table(
        &self,
        table_id: TableId,
        name: impl Into<String>,
        schema: Schema,
    ) -> LogResult<Arc<DataTable>> {
        let mut tables = self.tables.write();
        if tables.contains_key(&table_id) {
            return Err(LogError::invalid_operation(format!(
                "{table_id} already exists in {}",
                self.id
            )));
        }
        let table = Arc::new(DataTable::new(
            self.id,
            table_id,
            name,
            schema,
            self.tuples_per_block,
        ));
        tables.insert(table_id, Arc::clone(&table));
        debug!(database = %self.id, table = %table_id, "table created");
        Ok(table)
    }

    /// Drops a table.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::TableNotFound`] if there is no such table.
    pub fn drop_table(&self, table_id: TableId) -> LogResult<()> {
        self.tables
            .write()
            .remove(&table_id)
            .map(|_| ())
            .ok_or(LogError::TableNotFound {
                database: self.id,
                table: table_id,
            })
    }

    /// Looks up a table.
    #[must_use]
    pub fn get_table(&self, table_id: TableId) -> Option<Arc<DataTable>> {
        self.tables.read().get(&table_id).cloned()
    }

    /// Number of tables.
    #[must_use]
    pub fn table_count(&self) -> usize {
        self.tables.read().len()
    }
}

/// Every database known to the process.
#[derive(Debug)]
pub struct Catalog {
    tuples_per_block: u32,
    databases: RwLock<HashMap<DatabaseId, Arc<Database>>>,
}

impl Catalog {
    /// Creates an empty catalog whose tables use `tuples_per_block` slots
    /// per block.
    #[must_use]
    pub fn new(tuples_per_block: u32) -> Self {
        Self {
            tuples_per_block,
            databases: RwLock::new(HashMap::new()),
        }
    }

    /// Creates a database, or returns the existing one.
    pub fn create_database(&self, db_id: DatabaseId) -> Arc<Database> {
        let mut databases = self.databases.write();
        Arc::clone(databases.entry(db_id).or_insert_with(|| {
            debug!(database = %db_id, "database created");
            Arc::new(Database::new(db_id, self.tuples_per_block))
        }))
    }

    /// Drops a database and its tables.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::DatabaseNotFound`] if there is no such database.
    pub fn drop_database(&self, db_id: DatabaseId) -> LogResult<()> {
        self.databases
            .write()
            .remove(&db_id)
            .map(|_| ())
            .ok_or(LogError::DatabaseNotFound(db_id))
    }

    /// Looks up a database.
    #[must_use]
    pub fn get_database_by_oid(&self, db_id: DatabaseId) -> Option<Arc<Database>> {
        self.databases.read().get(&db_id).cloned()
    }

    /// Looks up a table.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::DatabaseNotFound`] or [`LogError::TableNotFound`].
    pub fn get_table_by_ids(&self, db_id: DatabaseId, table_id: TableId) -> LogResult<Arc<DataTable>> {
        let database = self
            .get_database_by_oid(db_id)
            .ok_or(LogError::DatabaseNotFound(db_id))?;
        database.get_table(table_id).ok_or(LogError::TableNotFound {
            database: db_id,
            table: table_id,
        })
    }

    /// Forgets every database.
    pub fn reset(&self) {
        self.databases.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Column;

    fn schema() -> Schema {
        Schema::new(vec![Column::integer("id")])
    }

    #[test]
    fn table_lookup_by_ids() {
        let catalog = Catalog::new(10);
        let db = catalog.create_database(DatabaseId::new(20000));
        db.create_table(TableId::new(10000), "USERTABLE", schema()).unwrap();

        let table = catalog
            .get_table_by_ids(DatabaseId::new(20000), TableId::new(10000))
            .unwrap();
        assert_eq!(table.name(), "USERTABLE");
        assert_eq!(table.tuples_per_block(), 10);

        assert!(matches!(
            catalog.get_table_by_ids(DatabaseId::new(1), TableId::new(10000)),
            Err(LogError::DatabaseNotFound(_))
        ));
        assert!(matches!(
            catalog.get_table_by_ids(DatabaseId::new(20000), TableId::new(1)),
            Err(LogError::TableNotFound { .. })
        ));
    }

    #[test]
    fn create_database_is_idempotent() {
        let catalog = Catalog::new(10);
        let first = catalog.create_database(DatabaseId::new(1));
        let second = catalog.create_database(DatabaseId::new(1));
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn duplicate_table_is_rejected() {
        let catalog = Catalog::new(10);
        let db = catalog.create_database(DatabaseId::new(1));
        db.create_table(TableId::new(1), "t", schema()).unwrap();
        assert!(db.create_table(TableId::new(1), "t", schema()).is_err());

        db.drop_table(TableId::new(1)).unwrap();
        assert_eq!(db.table_count(), 0);
        assert!(db.drop_table(TableId::new(1)).is_err());
    }

    #[test]
    fn drop_and_reset() {
        let catalog = Catalog::new(10);
        catalog.create_database(DatabaseId::new(1));
        catalog.create_database(DatabaseId::new(2));

        catalog.drop_database(DatabaseId::new(1)).unwrap();
        assert!(catalog.get_database_by_oid(DatabaseId::new(1)).is_none());
        assert!(catalog.drop_database(DatabaseId::new(1)).is_err());

        catalog.reset();
        assert!(catalog.get_database_by_oid(DatabaseId::new(2)).is_none());
    }
}
