//! # tidelog storage
//!
//! Log devices for the tidelog write-ahead log.
//!
//! A log device is the physical destination a frontend logger writes to. It is
//! an **opaque, append-only byte sequence**: it knows nothing about log
//! records, frames, or checksums. The core crate owns every byte of the
//! format.
//!
//! ## Devices
//!
//! - [`FileDevice`] - a log file, exclusively locked while open
//! - [`MemoryDevice`] - a shared in-memory buffer with fault injection,
//!   used to simulate crashes and durability failures in tests
//!
//! ## Example
//!
//! ```rust
//! use tidelog_storage::{LogDevice, MemoryDevice};
//!
//! let mut device = MemoryDevice::new();
//! let offset = device.append(b"frame").unwrap();
//! device.sync().unwrap();
//! assert_eq!(device.read_at(offset, 5).unwrap(), b"frame");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod device;
mod error;
mod file;
mod memory;

pub use device::LogDevice;
pub use error::{StorageError, StorageResult};
pub use file::FileDevice;
pub use memory::MemoryDevice;
