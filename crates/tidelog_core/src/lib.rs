//! # tidelog core
//!
//! Write-ahead logging and redo recovery for a transactional storage engine.
//!
//! This crate provides:
//! - Log records and their framed, checksummed on-disk format
//! - Backend loggers (one per worker) and a frontend logger thread per
//!   logging configuration that batches, writes and syncs their records
//! - The log manager and its STANDBY → RECOVERY → LOGGING → TERMINATE →
//!   SLEEP mode state machine
//! - Commit-gated redo replay of an existing log on start
//! - Minimal storage, catalog and transaction collaborators, owned by a
//!   [`Context`]
//!
//! ## Example
//!
//! ```rust,no_run
//! use tidelog_core::{Context, LoggingConfig, LoggingMode, LoggingType};
//!
//! let ctx = Context::new(LoggingConfig::new().log_dir("/tmp/tidelog"));
//! let log = ctx.log_manager();
//!
//! assert!(log.start_standby_mode(LoggingType::Aries));
//! log.wait_for_mode(LoggingMode::Standby, true, LoggingType::Aries);
//! log.start_recovery_mode(LoggingType::Aries);
//! log.wait_for_mode(LoggingMode::Logging, true, LoggingType::Aries);
//!
//! // ... run transactions ...
//!
//! assert!(log.end_logging(LoggingType::Aries));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod catalog;
mod config;
mod context;
mod error;
mod logging;
mod storage;
mod transaction;
mod types;
mod wal;

pub use catalog::{Catalog, Database};
pub use config::{LoggingConfig, LoggingType};
pub use context::{CatalogTarget, Context};
pub use error::{LogError, LogResult};
pub use logging::{
    BackendLogger, LogDestination, LogManager, LoggingMode, RecoveryStats, ReplayTarget, Replayer,
};
pub use storage::{Column, ColumnType, DataTable, Schema, Tuple, Value, MAX_BLOCKS};
pub use transaction::{
    Intent, IntentKind, Transaction, TransactionManager, TransactionState, TxnIdAllocator,
};
pub use types::{DatabaseId, ItemPointer, TableId, TxnId, WorkerId};
pub use tidelog_storage::{FileDevice, LogDevice, MemoryDevice, StorageError};
pub use wal::{
    compute_crc32, encode_frame, encode_frame_into, LogReader, LogRecord, LogRecordType,
    CRC_SIZE, HEADER_SIZE, LOG_MAGIC, LOG_VERSION,
};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
