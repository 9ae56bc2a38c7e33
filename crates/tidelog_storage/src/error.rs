//! Error types for log devices.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for device operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors raised by a [`crate::LogDevice`].
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Attempted to read beyond the end of the device.
    #[error("read beyond end of device: offset {offset}, len {len}, size {size}")]
    ReadPastEnd {
        /// The requested read offset.
        offset: u64,
        /// The requested read length.
        len: usize,
        /// The current device length.
        size: u64,
    },

    /// Attempted to grow the device through `truncate`.
    #[error("cannot truncate to {requested} bytes, device holds {size}")]
    InvalidTruncate {
        /// The requested length.
        requested: u64,
        /// The current device length.
        size: u64,
    },

    /// Another process or logger holds the log file.
    #[error("log file is locked by another logger: {}", path.display())]
    Locked {
        /// The locked file.
        path: PathBuf,
    },

    /// A fault injected by a test device.
    #[error("injected fault: {0}")]
    Injected(&'static str),
}
