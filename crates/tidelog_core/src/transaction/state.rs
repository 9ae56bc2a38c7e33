//! Transaction state.

use crate::error::{LogError, LogResult};
use crate::types::{DatabaseId, ItemPointer, TableId, TxnId};

/// State of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    /// Transaction is active and can record changes.
    Active,
    /// Transaction has been committed.
    Committed,
    /// Transaction has been aborted.
    Aborted,
}

/// Kind of change a transaction made to a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntentKind {
    /// A tuple was written to the slot.
    Insert,
    /// The slot's tuple was deactivated.
    Delete,
}

/// One change recorded for undo on abort.
///
/// Intents are not log records: the transaction keeps them in memory and
/// drops them on commit or abort.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Intent {
    /// What happened.
    pub kind: IntentKind,
    /// Database of the table.
    pub db_id: DatabaseId,
    /// Table changed.
    pub table_id: TableId,
    /// Slot changed.
    pub location: ItemPointer,
}

/// A transaction in progress.
#[derive(Debug)]
pub struct Transaction {
    id: TxnId,
    state: TransactionState,
    intents: Vec<Intent>,
}

impl Transaction {
    pub(crate) fn new(id: TxnId) -> Self {
        Self {
            id,
            state: TransactionState::Active,
            intents: Vec::new(),
        }
    }

    /// Returns the transaction id.
    #[must_use]
    pub fn id(&self) -> TxnId {
        self.id
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> TransactionState {
        self.state
    }

    /// Checks if the transaction is still active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state == TransactionState::Active
    }

    /// Recorded changes, oldest first.
    #[must_use]
    pub fn intents(&self) -> &[Intent] {
        &self.intents
    }

    /// Records that a tuple was written at `location`.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::TransactionNotActive`] after commit or abort.
    pub fn record_insert(
        &mut self,
        db_id: DatabaseId,
        table_id: TableId,
        location: ItemPointer,
    ) -> LogResult<()> {
        self.record(IntentKind::Insert, db_id, table_id, location)
    }

    /// Records that the tuple at `location` was deactivated.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::TransactionNotActive`] after commit or abort.
    pub fn record_delete(
        &mut self,
        db_id: DatabaseId,
        table_id: TableId,
        location: ItemPointer,
    ) -> LogResult<()> {
        self.record(IntentKind::Delete, db_id, table_id, location)
    }

    fn record(
        &mut self,
        kind: IntentKind,
        db_id: DatabaseId,
        table_id: TableId,
        location: ItemPointer,
    ) -> LogResult<()> {
        self.ensure_active()?;
        self.intents.push(Intent {
            kind,
            db_id,
            table_id,
            location,
        });
        Ok(())
    }

    pub(crate) fn ensure_active(&self) -> LogResult<()> {
        if self.is_active() {
            Ok(())
        } else {
            Err(LogError::TransactionNotActive(self.id))
        }
    }

    pub(crate) fn mark_committed(&mut self) {
        self.state = TransactionState::Committed;
        self.intents.clear();
    }

    /// Marks aborted and hands back the intents to undo.
    pub(crate) fn mark_aborted(&mut self) -> Vec<Intent> {
        self.state = TransactionState::Aborted;
        std::mem::take(&mut self.intents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intents_are_recorded_in_order() {
        let mut txn = Transaction::new(TxnId::new(1));
        let db = DatabaseId::new(1);
        let table = TableId::new(1);

        txn.record_insert(db, table, ItemPointer::new(0, 0)).unwrap();
        txn.record_delete(db, table, ItemPointer::new(0, 0)).unwrap();

        let kinds: Vec<_> = txn.intents().iter().map(|i| i.kind).collect();
        assert_eq!(kinds, vec![IntentKind::Insert, IntentKind::Delete]);
    }

    #[test]
    fn finished_transaction_rejects_changes() {
        let mut txn = Transaction::new(TxnId::new(1));
        txn.mark_committed();

        assert_eq!(txn.state(), TransactionState::Committed);
        assert!(matches!(
            txn.record_insert(DatabaseId::new(1), TableId::new(1), ItemPointer::new(0, 0)),
            Err(LogError::TransactionNotActive(_))
        ));
    }

    #[test]
    fn abort_hands_back_intents() {
        let mut txn = Transaction::new(TxnId::new(2));
        txn.record_insert(DatabaseId::new(1), TableId::new(1), ItemPointer::new(0, 3))
            .unwrap();

        let undo = txn.mark_aborted();
        assert_eq!(undo.len(), 1);
        assert!(txn.intents().is_empty());
        assert!(!txn.is_active());
    }
}
