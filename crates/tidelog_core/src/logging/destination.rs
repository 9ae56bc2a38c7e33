//! Where a frontend logger writes its log.

use std::path::PathBuf;
use tidelog_storage::{FileDevice, LogDevice, MemoryDevice, StorageResult};

/// Log destination of one logging configuration.
///
/// The frontend logger opens it on its own thread while in STANDBY.
#[derive(Debug, Clone)]
pub enum LogDestination {
    /// A log file, created if missing and locked exclusively while open.
    File(PathBuf),
    /// A shared in-memory buffer.
    Memory(MemoryDevice),
}

impl LogDestination {
    /// Opens the destination as a log device.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created, opened or locked.
    pub fn open(&self) -> StorageResult<Box<dyn LogDevice>> {
        match self {
            Self::File(path) => Ok(Box::new(FileDevice::open(path)?)),
            Self::Memory(device) => Ok(Box::new(device.clone())),
        }
    }

    /// Short description for traces.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::File(path) => path.display().to_string(),
            Self::Memory(_) => "<memory>".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_destination_shares_the_buffer() {
        let device = MemoryDevice::new();
        let destination = LogDestination::Memory(device.clone());

        let mut opened = destination.open().unwrap();
        opened.append(b"frame").unwrap();
        assert_eq!(device.contents(), b"frame");
        assert_eq!(destination.describe(), "<memory>");
    }

    #[test]
    fn file_destination_is_locked_while_open() {
        let dir = tempfile::tempdir().unwrap();
        let destination = LogDestination::File(dir.path().join("aries.log"));

        let first = destination.open().unwrap();
        assert!(destination.open().is_err());
        drop(first);
        assert!(destination.open().is_ok());
    }
}
