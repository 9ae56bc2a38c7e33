//! On-disk framing of log records.
//!
//! ```text
//! | magic "TLOG" (4) | version (2) | type (1) | payload len (4) | payload | crc32 (4) |
//! ```
//!
//! Integers are little-endian. The CRC covers header and payload.

use crate::error::{LogError, LogResult};
use crate::wal::record::LogRecord;

/// Frame magic.
pub const LOG_MAGIC: [u8; 4] = *b"TLOG";

/// Current frame format version.
pub const LOG_VERSION: u16 = 1;

/// magic (4) + version (2) + type (1) + length (4)
pub const HEADER_SIZE: usize = 11;

/// Trailing checksum size.
pub const CRC_SIZE: usize = 4;

/// Computes the frame checksum.
#[must_use]
pub fn compute_crc32(data: &[u8]) -> u32 {
    crc32fast::hash(data)
}

/// Appends the framed encoding of `record` to `out`.
///
/// # Errors
///
/// Returns an error if the record payload cannot be encoded.
pub fn encode_frame_into(record: &LogRecord, out: &mut Vec<u8>) -> LogResult<()> {
    let payload = record.encode_payload()?;
    let len = u32::try_from(payload.len())
        .map_err(|_| LogError::invalid_argument("record payload exceeds frame limit"))?;

    let start = out.len();
    out.reserve(HEADER_SIZE + payload.len() + CRC_SIZE);
    out.extend_from_slice(&LOG_MAGIC);
    out.extend_from_slice(&LOG_VERSION.to_le_bytes());
    out.push(record.record_type().as_byte());
    out.extend_from_slice(&len.to_le_bytes());
    out.extend_from_slice(&payload);

    let crc = compute_crc32(&out[start..]);
    out.extend_from_slice(&crc.to_le_bytes());
    Ok(())
}

/// Encodes `record` as a standalone frame.
///
/// # Errors
///
/// Returns an error if the record payload cannot be encoded.
pub fn encode_frame(record: &LogRecord) -> LogResult<Vec<u8>> {
    let mut out = Vec::new();
    encode_frame_into(record, &mut out)?;
    Ok(out)
}
