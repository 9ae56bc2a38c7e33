//! Logging pipeline.
//!
//! Workers submit records to their [`BackendLogger`]; one frontend logger
//! thread per [`crate::LoggingType`] collects every backend buffer, appends
//! the batch to the log device and syncs it, then advances each logger's
//! flushed watermark. On start the frontend logger replays the existing log
//! (STANDBY → RECOVERY → LOGGING) before records are accepted.

mod backend;
mod destination;
mod frontend;
mod manager;
mod mode;
mod recovery;
mod slot;

pub use backend::BackendLogger;
pub use destination::LogDestination;
pub use manager::LogManager;
pub use mode::LoggingMode;
pub use recovery::{RecoveryStats, ReplayTarget, Replayer};
