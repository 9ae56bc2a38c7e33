//! CLI command implementations.

pub mod dump;
pub mod run;
pub mod verify;

use std::path::{Path, PathBuf};
use thiserror::Error;
use tidelog_storage::FileDevice;

/// Errors reported by the commands themselves.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The log file does not exist.
    #[error("log file not found: {0}")]
    LogNotFound(PathBuf),

    /// The scan found corruption before the end of the log.
    #[error("log verification failed")]
    VerificationFailed,
}

/// Opens an existing log file without creating it.
pub fn open_log(path: &Path) -> Result<FileDevice, Box<dyn std::error::Error>> {
    if !path.is_file() {
        return Err(CommandError::LogNotFound(path.to_path_buf()).into());
    }
    Ok(FileDevice::open(path)?)
}
