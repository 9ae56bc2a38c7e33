//! Log record types and payload serialization.

use crate::error::{LogError, LogResult};
use crate::types::{DatabaseId, ItemPointer, TableId, TxnId};

/// Type tag of a log record, stored as one byte in the frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum LogRecordType {
    /// A transaction began.
    TransactionBegin = 1,
    /// A tuple was inserted.
    Insert = 2,
    /// A tuple was deleted.
    Delete = 3,
    /// A tuple was updated (delete at old location, insert at new).
    Update = 4,
    /// A transaction committed.
    TransactionCommit = 5,
    /// A transaction aborted.
    TransactionAbort = 6,
}

impl LogRecordType {
    /// Converts a byte to a record type.
    #[must_use]
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            1 => Some(Self::TransactionBegin),
            2 => Some(Self::Insert),
            3 => Some(Self::Delete),
            4 => Some(Self::Update),
            5 => Some(Self::TransactionCommit),
            6 => Some(Self::TransactionAbort),
            _ => None,
        }
    }

    /// Converts the record type to a byte.
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        self as u8
    }

    /// Returns `true` for tuple mutation records.
    #[must_use]
    pub const fn is_tuple(self) -> bool {
        matches!(self, Self::Insert | Self::Delete | Self::Update)
    }

    /// Upper-case name used by dumps and traces.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::TransactionBegin => "TXN_BEGIN",
            Self::Insert => "INSERT",
            Self::Delete => "DELETE",
            Self::Update => "UPDATE",
            Self::TransactionCommit => "TXN_COMMIT",
            Self::TransactionAbort => "TXN_ABORT",
        }
    }
}

/// A log record. Immutable once built; moved, never shared, on its way from a
/// backend logger to the log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogRecord {
    /// A transaction began.
    TransactionBegin {
        /// Transaction id.
        txn_id: TxnId,
    },

    /// A transaction committed.
    TransactionCommit {
        /// Transaction id.
        txn_id: TxnId,
    },

    /// A transaction aborted.
    TransactionAbort {
        /// Transaction id.
        txn_id: TxnId,
    },

    /// A tuple was inserted at `new_location`.
    Insert {
        /// Transaction id.
        txn_id: TxnId,
        /// Database owning the table.
        db_id: DatabaseId,
        /// Table receiving the tuple.
        table_id: TableId,
        /// Slot the tuple was written to.
        new_location: ItemPointer,
        /// Serialized tuple.
        payload: Vec<u8>,
    },

    /// The tuple at `old_location` was deleted.
    Delete {
        /// Transaction id.
        txn_id: TxnId,
        /// Database owning the table.
        db_id: DatabaseId,
        /// Table holding the tuple.
        table_id: TableId,
        /// Slot that was deactivated.
        old_location: ItemPointer,
    },

    /// The tuple at `old_location` was replaced by `payload` at `new_location`.
    Update {
        /// Transaction id.
        txn_id: TxnId,
        /// Database owning the table.
        db_id: DatabaseId,
        /// Table holding the tuple.
        table_id: TableId,
        /// Slot holding the new version.
        new_location: ItemPointer,
        /// Slot holding the old version.
        old_location: ItemPointer,
        /// Serialized new version.
        payload: Vec<u8>,
    },
}

impl LogRecord {
    /// Encoded size of the fixed fields of the largest tuple record
    /// (`Update`): ids, two locations and the payload length.
    pub const MAX_FIELDS_SIZE: usize = 8 + 4 + 4 + 2 * 8 + 4;

    /// Maximum tuple payload, so that the whole record still fits the
    /// four-byte frame length.
    pub const MAX_PAYLOAD_SIZE: usize = u32::MAX as usize - Self::MAX_FIELDS_SIZE;

    /// Returns the record type.
    #[must_use]
    pub fn record_type(&self) -> LogRecordType {
        match self {
            Self::TransactionBegin { .. } => LogRecordType::TransactionBegin,
            Self::TransactionCommit { .. } => LogRecordType::TransactionCommit,
            Self::TransactionAbort { .. } => LogRecordType::TransactionAbort,
            Self::Insert { .. } => LogRecordType::Insert,
            Self::Delete { .. } => LogRecordType::Delete,
            Self::Update { .. } => LogRecordType::Update,
        }
    }

    /// Returns the transaction the record belongs to.
    #[must_use]
    pub fn txn_id(&self) -> TxnId {
        match self {
            Self::TransactionBegin { txn_id }
            | Self::TransactionCommit { txn_id }
            | Self::TransactionAbort { txn_id }
            | Self::Insert { txn_id, .. }
            | Self::Delete { txn_id, .. }
            | Self::Update { txn_id, .. } => *txn_id,
        }
    }

    /// Returns the `(database, table)` a tuple record targets.
    #[must_use]
    pub fn table(&self) -> Option<(DatabaseId, TableId)> {
        match self {
            Self::Insert {
                db_id, table_id, ..
            }
            | Self::Delete {
                db_id, table_id, ..
            }
            | Self::Update {
                db_id, table_id, ..
            } => Some((*db_id, *table_id)),
            _ => None,
        }
    }

    /// Serializes the record payload (without frame envelope).
    ///
    /// # Errors
    ///
    /// Returns an error if a tuple payload exceeds [`Self::MAX_PAYLOAD_SIZE`].
    pub fn encode_payload(&self) -> LogResult<Vec<u8>> {
        let mut buf = Vec::new();

        match self {
            Self::TransactionBegin { txn_id }
            | Self::TransactionCommit { txn_id }
            | Self::TransactionAbort { txn_id } => {
                buf.extend_from_slice(&txn_id.as_u64().to_le_bytes());
            }

            Self::Insert {
                txn_id,
                db_id,
                table_id,
                new_location,
                payload,
            } => {
                put_header(&mut buf, *txn_id, *db_id, *table_id);
                put_location(&mut buf, *new_location);
                put_bytes(&mut buf, payload)?;
            }

            Self::Delete {
                txn_id,
                db_id,
                table_id,
                old_location,
            } => {
                put_header(&mut buf, *txn_id, *db_id, *table_id);
                put_location(&mut buf, *old_location);
            }

            Self::Update {
                txn_id,
                db_id,
                table_id,
                new_location,
                old_location,
                payload,
            } => {
                put_header(&mut buf, *txn_id, *db_id, *table_id);
                put_location(&mut buf, *new_location);
                put_location(&mut buf, *old_location);
                put_bytes(&mut buf, payload)?;
            }
        }

        Ok(buf)
    }

    /// Deserializes a record from its type tag and payload.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::LogCorruption`] when the payload is short or has
    /// trailing bytes.
    pub fn decode_payload(record_type: LogRecordType, payload: &[u8]) -> LogResult<Self> {
        let mut cursor = Cursor::new(payload);

        let record = match record_type {
            LogRecordType::TransactionBegin => Self::TransactionBegin {
                txn_id: TxnId::new(cursor.u64()?),
            },
            LogRecordType::TransactionCommit => Self::TransactionCommit {
                txn_id: TxnId::new(cursor.u64()?),
            },
            LogRecordType::TransactionAbort => Self::TransactionAbort {
                txn_id: TxnId::new(cursor.u64()?),
            },
            LogRecordType::Insert => {
                let (txn_id, db_id, table_id) = cursor.header()?;
                Self::Insert {
                    txn_id,
                    db_id,
                    table_id,
                    new_location: cursor.location()?,
                    payload: cursor.bytes()?,
                }
            }
            LogRecordType::Delete => {
                let (txn_id, db_id, table_id) = cursor.header()?;
                Self::Delete {
                    txn_id,
                    db_id,
                    table_id,
                    old_location: cursor.location()?,
                }
            }
            LogRecordType::Update => {
                let (txn_id, db_id, table_id) = cursor.header()?;
                Self::Update {
                    txn_id,
                    db_id,
                    table_id,
                    new_location: cursor.location()?,
                    old_location: cursor.location()?,
                    payload: cursor.bytes()?,
                }
            }
        };

        if cursor.remaining() != 0 {
            return Err(LogError::log_corruption(format!(
                "{} trailing bytes in {} record",
                cursor.remaining(),
                record_type.name()
            )));
        }

        Ok(record)
    }
}

fn put_header(buf: &mut Vec<u8>, txn_id: TxnId, db_id: DatabaseId, table_id: TableId) {
    buf.extend_from_slice(&txn_id.as_u64().to_le_bytes());
    buf.extend_from_slice(&db_id.as_u32().to_le_bytes());
    buf.extend_from_slice(&table_id.as_u32().to_le_bytes());
}

fn put_location(buf: &mut Vec<u8>, location: ItemPointer) {
    buf.extend_from_slice(&location.block.to_le_bytes());
    buf.extend_from_slice(&location.offset.to_le_bytes());
}

fn put_bytes(buf: &mut Vec<u8>, bytes: &[u8]) -> LogResult<()> {
    let too_large = || {
        LogError::invalid_argument(format!(
            "tuple payload too large: {} bytes exceeds maximum of {} bytes",
            bytes.len(),
            LogRecord::MAX_PAYLOAD_SIZE
        ))
    };
    if bytes.len() > LogRecord::MAX_PAYLOAD_SIZE {
        return Err(too_large());
    }
    let len = u32::try_from(bytes.len()).map_err(|_| too_large())?;
    buf.extend_from_slice(&len.to_le_bytes());
    buf.extend_from_slice(bytes);
    Ok(())
}

struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn take(&mut self, len: usize) -> LogResult<&'a [u8]> {
        if self.remaining() < len {
            return Err(LogError::log_corruption("unexpected end of record payload"));
        }
        let slice = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn u32(&mut self) -> LogResult<u32> {
        let mut raw = [0u8; 4];
        raw.copy_from_slice(self.take(4)?);
        Ok(u32::from_le_bytes(raw))
    }

    fn u64(&mut self) -> LogResult<u64> {
        let mut raw = [0u8; 8];
        raw.copy_from_slice(self.take(8)?);
        Ok(u64::from_le_bytes(raw))
    }

    fn header(&mut self) -> LogResult<(TxnId, DatabaseId, TableId)> {
        Ok((
            TxnId::new(self.u64()?),
            DatabaseId::new(self.u32()?),
            TableId::new(self.u32()?),
        ))
    }

    fn location(&mut self) -> LogResult<ItemPointer> {
        Ok(ItemPointer::new(self.u32()?, self.u32()?))
    }

    fn bytes(&mut self) -> LogResult<Vec<u8>> {
        let len = self.u32()? as usize;
        Ok(self.take(len)?.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn insert() -> LogRecord {
        LogRecord::Insert {
            txn_id: TxnId::new(7),
            db_id: DatabaseId::new(20000),
            table_id: TableId::new(10000),
            new_location: ItemPointer::new(2, 4),
            payload: vec![0xCA, 0xFE],
        }
    }

    #[test]
    fn record_type_byte_tags() {
        for byte in 1..=6u8 {
            let t = LogRecordType::from_byte(byte).unwrap();
            assert_eq!(t.as_byte(), byte);
        }
        assert_eq!(LogRecordType::from_byte(0), None);
        assert_eq!(LogRecordType::from_byte(7), None);
    }

    #[test]
    fn largest_record_fits_the_frame_length() {
        let update = LogRecord::Update {
            txn_id: TxnId::new(1),
            db_id: DatabaseId::new(1),
            table_id: TableId::new(1),
            new_location: ItemPointer::new(0, 1),
            old_location: ItemPointer::new(0, 0),
            payload: Vec::new(),
        };
        let fields = update.encode_payload().unwrap().len();

        assert_eq!(fields, LogRecord::MAX_FIELDS_SIZE);
        assert_eq!(LogRecord::MAX_PAYLOAD_SIZE + fields, u32::MAX as usize);
    }

    #[test]
    fn delete_carries_no_payload() {
        let record = LogRecord::Delete {
            txn_id: TxnId::new(3),
            db_id: DatabaseId::new(1),
            table_id: TableId::new(2),
            old_location: ItemPointer::new(0, 9),
        };
        // txn (8) + db (4) + table (4) + location (8)
        assert_eq!(record.encode_payload().unwrap().len(), 24);
    }

    #[test]
    fn update_keeps_both_locations() {
        let record = LogRecord::Update {
            txn_id: TxnId::new(3),
            db_id: DatabaseId::new(1),
            table_id: TableId::new(2),
            new_location: ItemPointer::new(5, 1),
            old_location: ItemPointer::new(0, 9),
            payload: b"v2".to_vec(),
        };
        let payload = record.encode_payload().unwrap();
        let decoded = LogRecord::decode_payload(LogRecordType::Update, &payload).unwrap();
        assert_eq!(decoded, record);
        assert_eq!(decoded.table(), Some((DatabaseId::new(1), TableId::new(2))));
    }

    #[test]
    fn transaction_markers_have_no_table() {
        let record = LogRecord::TransactionCommit {
            txn_id: TxnId::new(11),
        };
        assert_eq!(record.table(), None);
        assert_eq!(record.txn_id(), TxnId::new(11));
        assert!(!record.record_type().is_tuple());
    }

    #[test]
    fn short_payload_is_corruption() {
        let payload = insert().encode_payload().unwrap();
        let result = LogRecord::decode_payload(LogRecordType::Insert, &payload[..payload.len() - 1]);
        assert!(matches!(result, Err(LogError::LogCorruption { .. })));
    }

    #[test]
    fn trailing_bytes_are_corruption() {
        let mut payload = LogRecord::TransactionBegin {
            txn_id: TxnId::new(1),
        }
        .encode_payload()
        .unwrap();
        payload.push(0);
        let result = LogRecord::decode_payload(LogRecordType::TransactionBegin, &payload);
        assert!(matches!(result, Err(LogError::LogCorruption { .. })));
    }

    #[test]
    fn decoding_under_the_wrong_tag_fails() {
        let payload = insert().encode_payload().unwrap();
        assert!(LogRecord::decode_payload(LogRecordType::Delete, &payload).is_err());
    }

    proptest! {
        #[test]
        fn insert_payload_survives_encoding(
            txn in any::<u64>(),
            block in 0u32..1000,
            offset in 0u32..1000,
            payload in prop::collection::vec(any::<u8>(), 0..256),
        ) {
            let record = LogRecord::Insert {
                txn_id: TxnId::new(txn),
                db_id: DatabaseId::new(1),
                table_id: TableId::new(1),
                new_location: ItemPointer::new(block, offset),
                payload,
            };
            let bytes = record.encode_payload().unwrap();
            prop_assert_eq!(
                LogRecord::decode_payload(LogRecordType::Insert, &bytes).unwrap(),
                record
            );
        }
    }
}
