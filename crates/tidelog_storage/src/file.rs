//! File-backed log device.

use crate::device::LogDevice;
use crate::error::{StorageError, StorageResult};
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// A log file on the local file system.
///
/// The file is opened read/write and locked exclusively (advisory `flock`
/// through `fs2`) for as long as the device lives, so two frontend loggers
/// can never append to the same log, even from different processes.
///
/// `sync` calls `File::sync_all`, which is the durability point the
/// frontend logger waits on before acknowledging a flush.
///
/// # Example
///
/// ```no_run
/// use tidelog_storage::{FileDevice, LogDevice};
/// use std::path::Path;
///
/// let mut device = FileDevice::open(Path::new("aries.log")).unwrap();
/// device.append(b"frame").unwrap();
/// device.sync().unwrap();
/// ```
#[derive(Debug)]
pub struct FileDevice {
    path: PathBuf,
    file: File,
    len: u64,
}

impl FileDevice {
    /// Opens or creates the log file at `path`, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Locked`] if another logger holds the file, or
    /// an I/O error if it cannot be created.
    pub fn open(path: &Path) -> StorageResult<Self> {
        let parent = path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent)?;
        let created = !path.exists();

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        if fs2::FileExt::try_lock_exclusive(&file).is_err() {
            return Err(StorageError::Locked {
                path: path.to_path_buf(),
            });
        }

        // A new directory entry is only durable once the directory is synced.
        if created {
            sync_directory(parent)?;
        }

        let len = file.metadata()?.len();

        Ok(Self {
            path: path.to_path_buf(),
            file,
            len,
        })
    }

    /// Returns the path of the log file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(unix)]
fn sync_directory(dir: &Path) -> StorageResult<()> {
    File::open(dir)?.sync_all()?;
    Ok(())
}

// NTFS journals directory metadata; directories cannot be opened for fsync.
#[cfg(not(unix))]
fn sync_directory(_dir: &Path) -> StorageResult<()> {
    Ok(())
}

impl LogDevice for FileDevice {
    fn append(&mut self, data: &[u8]) -> StorageResult<u64> {
        let offset = self.len;
        if data.is_empty() {
            return Ok(offset);
        }

        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(data)?;
        self.len += data.len() as u64;

        Ok(offset)
    }

    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        let end = offset.saturating_add(len as u64);
        if offset > self.len || end > self.len {
            return Err(StorageError::ReadPastEnd {
                offset,
                len,
                size: self.len,
            });
        }

        let mut buffer = vec![0u8; len];
        if len > 0 {
            let mut file = &self.file;
            file.seek(SeekFrom::Start(offset))?;
            file.read_exact(&mut buffer)?;
        }

        Ok(buffer)
    }

    fn len(&self) -> u64 {
        self.len
    }

    fn sync(&mut self) -> StorageResult<()> {
        self.file.flush()?;
        self.file.sync_all()?;
        Ok(())
    }

    fn truncate(&mut self, new_len: u64) -> StorageResult<()> {
        if new_len > self.len {
            return Err(StorageError::InvalidTruncate {
                requested: new_len,
                size: self.len,
            });
        }

        self.file.set_len(new_len)?;
        self.file.sync_all()?;
        self.len = new_len;

        Ok(())
    }
}
