//! Log device trait definition.

use crate::error::StorageResult;

/// An append-only destination for serialized log frames.
///
/// # Invariants
///
/// - `append` writes at the current end and returns that offset
/// - `read_at` returns exactly the bytes previously appended at that offset
/// - after `sync` returns `Ok`, every appended byte survives process death
/// - `truncate` only ever shrinks the device (used to cut a torn tail)
///
/// Devices are owned by a single frontend logger thread, so methods take
/// `&mut self` for mutation; `Send` is required to move the device onto
/// that thread.
pub trait LogDevice: Send {
    /// Appends `data` at the end of the device, returning its offset.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails. A failed append may leave a
    /// partial frame behind; recovery treats it as a torn tail.
    fn append(&mut self, data: &[u8]) -> StorageResult<u64>;

    /// Reads `len` bytes starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StorageError::ReadPastEnd`] when the range extends
    /// beyond the device length.
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>>;

    /// Current length in bytes; the offset of the next append.
    fn len(&self) -> u64;

    /// Returns `true` when nothing has been appended.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forces all appended bytes to durable media.
    ///
    /// # Errors
    ///
    /// Returns an error if the sync fails; the caller must not acknowledge
    /// any record written since the last successful sync.
    fn sync(&mut self) -> StorageResult<()>;

    /// Shrinks the device to `new_len` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StorageError::InvalidTruncate`] if `new_len` exceeds
    /// the current length.
    fn truncate(&mut self, new_len: u64) -> StorageResult<()>;
}

impl<D: LogDevice + ?Sized> LogDevice for Box<D> {
    fn append(&mut self, data: &[u8]) -> StorageResult<u64> {
        (**self).append(data)
    }

    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        (**self).read_at(offset, len)
    }

    fn len(&self) -> u64 {
        (**self).len()
    }

    fn sync(&mut self) -> StorageResult<()> {
        (**self).sync()
    }

    fn truncate(&mut self, new_len: u64) -> StorageResult<()> {
        (**self).truncate(new_len)
    }
}
