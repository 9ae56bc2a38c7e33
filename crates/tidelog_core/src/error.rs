//! Error types for the logging core.

use crate::types::{DatabaseId, ItemPointer, TableId, TxnId};
use std::io;
use thiserror::Error;

/// Result type for core operations.
pub type LogResult<T> = Result<T, LogError>;

/// Errors that can occur in the logging core and its collaborators.
#[derive(Debug, Error)]
pub enum LogError {
    /// Log device error.
    #[error("storage error: {0}")]
    Storage(#[from] tidelog_storage::StorageError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The log is corrupted (not a torn tail).
    #[error("log corruption: {message}")]
    LogCorruption {
        /// Description of the corruption.
        message: String,
    },

    /// A complete frame failed its checksum.
    #[error("checksum mismatch at offset {offset}: expected {expected:08x}, got {actual:08x}")]
    ChecksumMismatch {
        /// Offset of the frame.
        offset: u64,
        /// Stored checksum.
        expected: u32,
        /// Computed checksum.
        actual: u32,
    },

    /// A caller passed an argument that cannot form a valid request.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// Description of the problem.
        message: String,
    },

    /// Operation not permitted in the current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why the operation is invalid.
        message: String,
    },

    /// Database id unknown to the catalog.
    #[error("database not found: {0}")]
    DatabaseNotFound(DatabaseId),

    /// Table id unknown to its database.
    #[error("table {table} not found in {database}")]
    TableNotFound {
        /// Database searched.
        database: DatabaseId,
        /// Missing table.
        table: TableId,
    },

    /// Location cannot address a slot of the table.
    #[error("invalid tuple location {0}")]
    InvalidLocation(ItemPointer),

    /// No tuple has ever been stored at the location.
    #[error("no tuple at {0}")]
    TupleNotFound(ItemPointer),

    /// The slot already holds an active tuple.
    #[error("slot {0} already holds an active tuple")]
    SlotOccupied(ItemPointer),

    /// Transaction already committed or aborted.
    #[error("transaction {0} is not active")]
    TransactionNotActive(TxnId),
}

impl LogError {
    /// Creates a log corruption error.
    pub fn log_corruption(message: impl Into<String>) -> Self {
        Self::LogCorruption {
            message: message.into(),
        }
    }

    /// Creates an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }
}
