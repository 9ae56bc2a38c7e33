//! Log record format.
//!
//! Records are framed with a magic, a version, a type tag, a length and a
//! CRC32 trailer, and appended to a [`tidelog_storage::LogDevice`] by the
//! frontend logger. The [`LogReader`] streams them back for recovery and
//! for the `dump`/`verify` tools.

mod frame;
mod reader;
mod record;

pub use frame::{
    compute_crc32, encode_frame, encode_frame_into, CRC_SIZE, HEADER_SIZE, LOG_MAGIC, LOG_VERSION,
};
pub use reader::LogReader;
pub use record::{LogRecord, LogRecordType};
