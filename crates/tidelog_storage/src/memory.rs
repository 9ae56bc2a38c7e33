//! In-memory log device for tests and crash simulation.

use crate::device::LogDevice;
use crate::error::{StorageError, StorageResult};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Debug, Default)]
struct Shared {
    data: RwLock<Vec<u8>>,
    synced_len: AtomicU64,
    fail_appends: AtomicBool,
    fail_syncs: AtomicBool,
}

/// An in-memory log device.
///
/// Clones share the same buffer, so a test can hand one clone to a frontend
/// logger and keep another to inspect what was written, or to "crash" by
/// taking [`MemoryDevice::durable_image`] (only the bytes covered by the last
/// successful `sync`) and recovering from it.
///
/// Appends and syncs can be made to fail on demand to exercise the
/// durability-failure paths.
#[derive(Debug, Clone, Default)]
pub struct MemoryDevice {
    shared: Arc<Shared>,
}

impl MemoryDevice {
    /// Creates an empty device.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a device preloaded with `data`, all of it considered durable.
    #[must_use]
    pub fn with_data(data: Vec<u8>) -> Self {
        let len = data.len() as u64;
        Self {
            shared: Arc::new(Shared {
                data: RwLock::new(data),
                synced_len: AtomicU64::new(len),
                ..Shared::default()
            }),
        }
    }

    /// Returns a copy of every byte appended so far.
    #[must_use]
    pub fn contents(&self) -> Vec<u8> {
        self.shared.data.read().clone()
    }

    /// Returns the bytes that would survive a crash right now.
    #[must_use]
    pub fn durable_image(&self) -> Vec<u8> {
        let data = self.shared.data.read();
        let synced = self.shared.synced_len.load(Ordering::SeqCst) as usize;
        data[..synced.min(data.len())].to_vec()
    }

    /// Makes every subsequent append fail while `fail` is set.
    pub fn fail_appends(&self, fail: bool) {
        self.shared.fail_appends.store(fail, Ordering::SeqCst);
    }

    /// Makes every subsequent sync fail while `fail` is set.
    pub fn fail_syncs(&self, fail: bool) {
        self.shared.fail_syncs.store(fail, Ordering::SeqCst);
    }
}

impl LogDevice for MemoryDevice {
    fn append(&mut self, bytes: &[u8]) -> StorageResult<u64> {
        if self.shared.fail_appends.load(Ordering::SeqCst) {
            return Err(StorageError::Injected("append"));
        }

        let mut data = self.shared.data.write();
        let offset = data.len() as u64;
        data.extend_from_slice(bytes);
        Ok(offset)
    }

    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        let data = self.shared.data.read();
        let size = data.len() as u64;
        let end = offset.saturating_add(len as u64);

        if offset > size || end > size {
            return Err(StorageError::ReadPastEnd { offset, len, size });
        }

        Ok(data[offset as usize..end as usize].to_vec())
    }

    fn len(&self) -> u64 {
        self.shared.data.read().len() as u64
    }

    fn sync(&mut self) -> StorageResult<()> {
        if self.shared.fail_syncs.load(Ordering::SeqCst) {
            return Err(StorageError::Injected("sync"));
        }

        let len = self.shared.data.read().len() as u64;
        self.shared.synced_len.store(len, Ordering::SeqCst);
        Ok(())
    }

    fn truncate(&mut self, new_len: u64) -> StorageResult<()> {
        let mut data = self.shared.data.write();
        let size = data.len() as u64;

        if new_len > size {
            return Err(StorageError::InvalidTruncate {
                requested: new_len,
                size,
            });
        }

        data.truncate(new_len as usize);
        self.shared.synced_len.fetch_min(new_len, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_buffer() {
        let device = MemoryDevice::new();
        let mut writer = device.clone();

        writer.append(b"record").unwrap();
        assert_eq!(device.contents(), b"record");
        assert_eq!(device.len(), 6);
    }

    #[test]
    fn durable_image_only_covers_synced_bytes() {
        let mut device = MemoryDevice::new();
        device.append(b"synced").unwrap();
        device.sync().unwrap();
        device.append(b"-lost").unwrap();

        assert_eq!(device.durable_image(), b"synced");
        assert_eq!(device.contents(), b"synced-lost");
    }

    #[test]
    fn preloaded_data_is_durable() {
        let device = MemoryDevice::with_data(b"old log".to_vec());
        assert_eq!(device.durable_image(), b"old log");
        assert_eq!(device.read_at(4, 3).unwrap(), b"log");
    }

    #[test]
    fn injected_append_failure() {
        let mut device = MemoryDevice::new();
        device.fail_appends(true);
        assert!(matches!(
            device.append(b"x"),
            Err(StorageError::Injected("append"))
        ));
        assert!(device.is_empty());

        device.fail_appends(false);
        assert_eq!(device.append(b"x").unwrap(), 0);
    }

    #[test]
    fn injected_sync_failure_keeps_durable_length() {
        let mut device = MemoryDevice::new();
        device.append(b"abc").unwrap();
        device.fail_syncs(true);

        assert!(device.sync().is_err());
        assert!(device.durable_image().is_empty());
    }

    #[test]
    fn truncate_lowers_durable_length() {
        let mut device = MemoryDevice::new();
        device.append(b"abcdef").unwrap();
        device.sync().unwrap();

        device.truncate(2).unwrap();
        assert_eq!(device.durable_image(), b"ab");
        assert!(device.truncate(10).is_err());
    }

    #[test]
    fn read_past_end_fails() {
        let mut device = MemoryDevice::new();
        device.append(b"abc").unwrap();
        assert!(matches!(
            device.read_at(1, 5),
            Err(StorageError::ReadPastEnd { .. })
        ));
    }
}
