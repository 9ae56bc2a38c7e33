//! Streaming reader over a log device.
//!
//! Reads frames one at a time through a bounded buffer. The reader tells a
//! torn tail (what an interrupted final append leaves behind) apart from
//! corruption inside the log:
//!
//! - an incomplete trailing frame ends iteration;
//! - a complete final frame whose checksum fails also ends iteration;
//! - a bad magic with no intact frame anywhere after it (zero fill left by an
//!   extended file, a half-written header) also ends iteration;
//! - a checksum failure with more frames after it, a bad magic followed by an
//!   intact frame, or an unknown version or type is an error.
//!
//! After iteration ends cleanly, [`LogReader::valid_end`] is the offset just
//! past the last good frame; anything beyond it is the torn tail.

use crate::error::{LogError, LogResult};
use crate::wal::frame::{compute_crc32, CRC_SIZE, HEADER_SIZE, LOG_MAGIC, LOG_VERSION};
use crate::wal::record::{LogRecord, LogRecordType};
use tidelog_storage::LogDevice;

const READ_BUFFER_SIZE: usize = 64 * 1024;

/// A streaming iterator over `(offset, record)` pairs.
pub struct LogReader<'a, D: LogDevice + ?Sized> {
    device: &'a D,
    total_size: u64,
    offset: u64,
    buffer: Vec<u8>,
    buffer_pos: usize,
    buffer_len: usize,
    finished: bool,
}

impl<'a, D: LogDevice + ?Sized> LogReader<'a, D> {
    /// Creates a reader starting at the beginning of `device`.
    pub fn new(device: &'a D) -> Self {
        Self {
            device,
            total_size: device.len(),
            offset: 0,
            buffer: vec![0u8; READ_BUFFER_SIZE],
            buffer_pos: 0,
            buffer_len: 0,
            finished: false,
        }
    }

    /// Offset just past the last frame returned.
    #[must_use]
    pub fn valid_end(&self) -> u64 {
        self.offset
    }

    /// Bytes past [`Self::valid_end`].
    #[must_use]
    pub fn torn_bytes(&self) -> u64 {
        self.total_size - self.offset
    }

    /// Size of the device when the reader was created.
    #[must_use]
    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    fn ensure_buffered(&mut self, min_bytes: usize) -> LogResult<bool> {
        let available = self.buffer_len - self.buffer_pos;
        if available >= min_bytes {
            return Ok(true);
        }

        let unread = (self.total_size - self.offset) as usize;
        if unread < min_bytes {
            return Ok(false);
        }

        if self.buffer_pos > 0 {
            self.buffer.copy_within(self.buffer_pos..self.buffer_len, 0);
        }
        self.buffer_len = available;
        self.buffer_pos = 0;

        if min_bytes > self.buffer.len() {
            self.buffer.resize(min_bytes.next_power_of_two(), 0);
        }

        let to_read = (self.buffer.len() - self.buffer_len).min(unread - available);
        if to_read > 0 {
            let read_offset = self.offset + self.buffer_len as u64;
            let data = self.device.read_at(read_offset, to_read)?;
            self.buffer[self.buffer_len..self.buffer_len + data.len()].copy_from_slice(&data);
            self.buffer_len += data.len();
        }

        Ok(self.buffer_len - self.buffer_pos >= min_bytes)
    }

    /// Whether a frame with a valid checksum starts at or after `from`.
    fn intact_frame_after(&self, from: u64) -> LogResult<bool> {
        let mut pos = from;
        while pos + ((HEADER_SIZE + CRC_SIZE) as u64) <= self.total_size {
            let len = ((self.total_size - pos) as usize).min(READ_BUFFER_SIZE);
            let chunk = self.device.read_at(pos, len)?;
            for (i, window) in chunk.windows(LOG_MAGIC.len()).enumerate() {
                if window == LOG_MAGIC && self.is_intact_frame(pos + i as u64)? {
                    return Ok(true);
                }
            }
            if pos + len as u64 >= self.total_size {
                break;
            }
            // Overlap so a magic split across chunks is still seen.
            pos += (len - (LOG_MAGIC.len() - 1)) as u64;
        }
        Ok(false)
    }

    fn is_intact_frame(&self, at: u64) -> LogResult<bool> {
        if at + HEADER_SIZE as u64 > self.total_size {
            return Ok(false);
        }
        let header = self.device.read_at(at, HEADER_SIZE)?;
        let payload_len = u64::from(u32::from_le_bytes([header[7], header[8], header[9], header[10]]));
        let end = at + HEADER_SIZE as u64 + payload_len + CRC_SIZE as u64;
        if end > self.total_size {
            return Ok(false);
        }

        let frame = self.device.read_at(at, (end - at) as usize)?;
        let body_len = frame.len() - CRC_SIZE;
        let mut raw_crc = [0u8; CRC_SIZE];
        raw_crc.copy_from_slice(&frame[body_len..]);
        Ok(u32::from_le_bytes(raw_crc) == compute_crc32(&frame[..body_len]))
    }

    fn read_next(&mut self) -> LogResult<Option<(u64, LogRecord)>> {
        let start = self.offset;

        if !self.ensure_buffered(HEADER_SIZE)? {
            return Ok(None);
        }

        if self.buffer[self.buffer_pos..self.buffer_pos + LOG_MAGIC.len()] != LOG_MAGIC {
            if self.intact_frame_after(start + 1)? {
                return Err(LogError::log_corruption(format!(
                    "invalid magic at offset {start}"
                )));
            }
            return Ok(None);
        }

        let header = &self.buffer[self.buffer_pos..self.buffer_pos + HEADER_SIZE];

        let version = u16::from_le_bytes([header[4], header[5]]);
        if version > LOG_VERSION {
            return Err(LogError::log_corruption(format!(
                "unsupported version {version} at offset {start}"
            )));
        }

        let type_byte = header[6];
        let payload_len = u32::from_le_bytes([header[7], header[8], header[9], header[10]]) as usize;
        let total_len = HEADER_SIZE + payload_len + CRC_SIZE;

        if !self.ensure_buffered(total_len)? {
            return Ok(None);
        }

        let frame = &self.buffer[self.buffer_pos..self.buffer_pos + total_len];
        let body = &frame[..HEADER_SIZE + payload_len];
        let mut raw_crc = [0u8; CRC_SIZE];
        raw_crc.copy_from_slice(&frame[HEADER_SIZE + payload_len..]);
        let stored = u32::from_le_bytes(raw_crc);
        let computed = compute_crc32(body);

        if stored != computed {
            if start + total_len as u64 == self.total_size {
                return Ok(None);
            }
            return Err(LogError::ChecksumMismatch {
                offset: start,
                expected: stored,
                actual: computed,
            });
        }

        let record_type = LogRecordType::from_byte(type_byte).ok_or_else(|| {
            LogError::log_corruption(format!(
                "unknown record type {type_byte} at offset {start}"
            ))
        })?;
        let record = LogRecord::decode_payload(record_type, &body[HEADER_SIZE..])?;

        self.buffer_pos += total_len;
        self.offset += total_len as u64;
        Ok(Some((start, record)))
    }
}

impl<D: LogDevice + ?Sized> Iterator for LogReader<'_, D> {
    type Item = LogResult<(u64, LogRecord)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        match self.read_next() {
            Ok(Some(item)) => Some(Ok(item)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}
