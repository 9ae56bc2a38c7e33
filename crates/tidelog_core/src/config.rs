//! Logging configuration.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Recovery/durability strategy of a logging configuration.
///
/// This is a tag, not a separate code path: both strategies run the same
/// frontend logger and replayer. It keys the per-configuration state in the
/// log manager and picks the default log file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LoggingType {
    /// Full ARIES-style redo logging.
    Aries,
    /// Lightweight logging.
    Peloton,
}

impl LoggingType {
    /// Every logging type, in tag order.
    pub const ALL: [Self; 2] = [Self::Aries, Self::Peloton];

    /// Default file name of this configuration's log.
    #[must_use]
    pub const fn file_name(self) -> &'static str {
        match self {
            Self::Aries => "aries.log",
            Self::Peloton => "peloton.log",
        }
    }

    /// Lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Aries => "aries",
            Self::Peloton => "peloton",
        }
    }
}

impl fmt::Display for LoggingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LoggingType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "aries" | "1" => Ok(Self::Aries),
            "peloton" | "2" => Ok(Self::Peloton),
            other => Err(format!("unknown logging type: {other}")),
        }
    }
}

/// Configuration for a [`crate::Context`] and its log manager.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Directory holding one log file per logging type.
    pub log_dir: PathBuf,

    /// How long the frontend logger sleeps between collection rounds when
    /// nobody is waiting for a flush.
    pub flush_interval: Duration,

    /// Upper bound `end_logging` waits for the final drain.
    pub shutdown_timeout: Duration,

    /// Whether commit waits until the worker's records are durable.
    pub synchronous_commit: bool,

    /// Tuple slots per storage block (tile group).
    pub tuples_per_block: u32,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_dir: std::env::temp_dir().join("tidelog"),
            flush_interval: Duration::from_millis(5),
            shutdown_timeout: Duration::from_secs(10),
            synchronous_commit: true,
            tuples_per_block: 10,
        }
    }
}

impl LoggingConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the log directory.
    #[must_use]
    pub fn log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_dir = dir.into();
        self
    }

    /// Sets the idle interval between collection rounds.
    #[must_use]
    pub const fn flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = interval;
        self
    }

    /// Sets the bound on `end_logging`.
    #[must_use]
    pub const fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Sets whether commit waits for durability.
    #[must_use]
    pub const fn synchronous_commit(mut self, value: bool) -> Self {
        self.synchronous_commit = value;
        self
    }

    /// Sets the number of slots per storage block.
    #[must_use]
    pub const fn tuples_per_block(mut self, count: u32) -> Self {
        self.tuples_per_block = count;
        self
    }

    /// Path of the log file for `logging_type` under [`Self::log_dir`].
    #[must_use]
    pub fn log_path(&self, logging_type: LoggingType) -> PathBuf {
        self.log_dir.join(logging_type.file_name())
    }
}
