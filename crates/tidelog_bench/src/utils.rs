//! Benchmark utilities.

use rand::Rng;
use tidelog_core::{DatabaseId, ItemPointer, LogRecord, TableId, TxnId};

/// Database the benchmark records target.
pub const BENCH_DATABASE_ID: DatabaseId = DatabaseId::new(20000);

/// Table the benchmark records target.
pub const BENCH_TABLE_ID: TableId = TableId::new(10000);

/// Generate random tuple data of the specified size.
pub fn random_data(size: usize) -> Vec<u8> {
    let mut rng = rand::thread_rng();
    (0..size).map(|_| rng.gen()).collect()
}

/// Generate one committed insert transaction per payload, as the records a
/// backend would log.
pub fn committed_inserts(count: usize, payload_size: usize) -> Vec<LogRecord> {
    let mut records = Vec::with_capacity(count * 3);
    for i in 0..count {
        let txn_id = TxnId::new(i as u64 + 1);
        records.push(LogRecord::TransactionBegin { txn_id });
        records.push(LogRecord::Insert {
            txn_id,
            db_id: BENCH_DATABASE_ID,
            table_id: BENCH_TABLE_ID,
            new_location: ItemPointer::new((i / 64) as u32, (i % 64) as u32),
            payload: random_data(payload_size),
        });
        records.push(LogRecord::TransactionCommit { txn_id });
    }
    records
}
