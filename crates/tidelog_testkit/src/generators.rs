//! Property-based test generators using proptest.
//!
//! Transaction scripts are sequences of finished or unfinished transactions
//! over a small location space, so inserts, updates and deletes collide
//! often. [`TxnScript::to_records`] renders a script as the log a serial run
//! would write, and [`TxnScript::expected_image`] is the table image a
//! commit-gated replay of that log must produce.

use proptest::prelude::*;
use std::collections::BTreeMap;
use tidelog_core::{DatabaseId, ItemPointer, LogRecord, TableId, TxnId};

/// Blocks the generated locations fall into.
pub const SCRIPT_BLOCKS: u32 = 4;

/// Offsets the generated locations fall into. Fits the default
/// `tuples_per_block`.
pub const SCRIPT_OFFSETS: u32 = 8;

/// Strategy for locations inside the script location space.
pub fn location_strategy() -> impl Strategy<Value = ItemPointer> {
    (0..SCRIPT_BLOCKS, 0..SCRIPT_OFFSETS).prop_map(|(block, offset)| ItemPointer::new(block, offset))
}

/// Strategy for tuple payloads.
pub fn payload_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..64)
}

/// One tuple change inside a scripted transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptOp {
    /// Insert `payload` at `location`.
    Insert {
        /// Slot written.
        location: ItemPointer,
        /// Tuple bytes.
        payload: Vec<u8>,
    },
    /// Delete the tuple at `location`.
    Delete {
        /// Slot deactivated.
        location: ItemPointer,
    },
    /// Write `payload` at `new_location` and deactivate `old_location`.
    Update {
        /// Slot written.
        new_location: ItemPointer,
        /// Slot deactivated.
        old_location: ItemPointer,
        /// Tuple bytes.
        payload: Vec<u8>,
    },
}

/// Strategy for a single tuple change.
pub fn script_op_strategy() -> impl Strategy<Value = ScriptOp> {
    prop_oneof![
        3 => (location_strategy(), payload_strategy())
            .prop_map(|(location, payload)| ScriptOp::Insert { location, payload }),
        1 => location_strategy().prop_map(|location| ScriptOp::Delete { location }),
        2 => (location_strategy(), location_strategy(), payload_strategy()).prop_map(
            |(new_location, old_location, payload)| ScriptOp::Update {
                new_location,
                old_location,
                payload,
            }
        ),
    ]
}

/// How a scripted transaction ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxnOutcome {
    /// A COMMIT marker follows its changes.
    Commit,
    /// An ABORT marker follows its changes.
    Abort,
    /// The log ends without a marker, as after a crash.
    Unfinished,
}

/// Strategy for transaction outcomes, mostly commits.
pub fn outcome_strategy() -> impl Strategy<Value = TxnOutcome> {
    prop_oneof![
        6 => Just(TxnOutcome::Commit),
        2 => Just(TxnOutcome::Abort),
        1 => Just(TxnOutcome::Unfinished),
    ]
}

/// A transaction of a script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptTxn {
    /// Changes in order.
    pub ops: Vec<ScriptOp>,
    /// How it ends.
    pub outcome: TxnOutcome,
}

/// A serial sequence of transactions against one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxnScript {
    /// Database of the table.
    pub db_id: DatabaseId,
    /// Table written.
    pub table_id: TableId,
    /// Transactions in execution order. The n-th has id n + 1.
    pub txns: Vec<ScriptTxn>,
}

/// Strategy for scripts of up to `max_txns` transactions.
pub fn txn_script_strategy(
    db_id: DatabaseId,
    table_id: TableId,
    max_txns: usize,
) -> impl Strategy<Value = TxnScript> {
    prop::collection::vec(
        (prop::collection::vec(script_op_strategy(), 0..6), outcome_strategy())
            .prop_map(|(ops, outcome)| ScriptTxn { ops, outcome }),
        0..=max_txns,
    )
    .prop_map(move |txns| TxnScript {
        db_id,
        table_id,
        txns,
    })
}

impl TxnScript {
    /// Id of the transaction at `index`.
    #[must_use]
    pub fn txn_id(index: usize) -> TxnId {
        TxnId::new(index as u64 + 1)
    }

    /// The log a serial run of the script writes.
    #[must_use]
    pub fn to_records(&self) -> Vec<LogRecord> {
        let mut records = Vec::new();
        for (index, txn) in self.txns.iter().enumerate() {
            let txn_id = Self::txn_id(index);
            records.push(LogRecord::TransactionBegin { txn_id });
            records.extend(txn.ops.iter().map(|op| self.record(txn_id, op)));
            match txn.outcome {
                TxnOutcome::Commit => records.push(LogRecord::TransactionCommit { txn_id }),
                TxnOutcome::Abort => records.push(LogRecord::TransactionAbort { txn_id }),
                TxnOutcome::Unfinished => {}
            }
        }
        records
    }

    /// Active tuples after replaying only the committed transactions.
    #[must_use]
    pub fn expected_image(&self) -> BTreeMap<ItemPointer, Vec<u8>> {
        self.image(|outcome| outcome == TxnOutcome::Commit)
    }

    /// Active tuples after replaying every transaction regardless of its
    /// outcome.
    #[must_use]
    pub fn redo_all_image(&self) -> BTreeMap<ItemPointer, Vec<u8>> {
        self.image(|_| true)
    }

    /// Highest transaction id in the log.
    #[must_use]
    pub fn max_txn_id(&self) -> Option<TxnId> {
        self.txns.len().checked_sub(1).map(Self::txn_id)
    }

    fn image(&self, applies: impl Fn(TxnOutcome) -> bool) -> BTreeMap<ItemPointer, Vec<u8>> {
        let mut image = BTreeMap::new();
        for txn in self.txns.iter().filter(|txn| applies(txn.outcome)) {
            for op in &txn.ops {
                match op {
                    ScriptOp::Insert { location, payload } => {
                        image.insert(*location, payload.clone());
                    }
                    ScriptOp::Delete { location } => {
                        image.remove(location);
                    }
                    ScriptOp::Update {
                        new_location,
                        old_location,
                        payload,
                    } => {
                        image.insert(*new_location, payload.clone());
                        image.remove(old_location);
                    }
                }
            }
        }
        image
    }

    fn record(&self, txn_id: TxnId, op: &ScriptOp) -> LogRecord {
        let (db_id, table_id) = (self.db_id, self.table_id);
        match op.clone() {
            ScriptOp::Insert { location, payload } => LogRecord::Insert {
                txn_id,
                db_id,
                table_id,
                new_location: location,
                payload,
            },
            ScriptOp::Delete { location } => LogRecord::Delete {
                txn_id,
                db_id,
                table_id,
                old_location: location,
            },
            ScriptOp::Update {
                new_location,
                old_location,
                payload,
            } => LogRecord::Update {
                txn_id,
                db_id,
                table_id,
                new_location,
                old_location,
                payload,
            },
        }
    }
}
