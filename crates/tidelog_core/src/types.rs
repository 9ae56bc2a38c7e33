//! Core identifiers shared by the logging subsystem and its collaborators.

use std::fmt;
use std::thread::{self, ThreadId};

/// Unique identifier for a transaction.
///
/// Transaction ids are handed out monotonically by the transaction manager
/// and are never reused within a run; recovery advances the allocator past
/// every id found in the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TxnId(pub u64);

impl TxnId {
    /// Creates a new transaction id.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw id value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TxnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "txn:{}", self.0)
    }
}

/// Object id of a database in the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DatabaseId(pub u32);

impl DatabaseId {
    /// Creates a new database id.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the raw id value.
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for DatabaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "db:{}", self.0)
    }
}

/// Object id of a table within a database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TableId(pub u32);

impl TableId {
    /// Creates a new table id.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the raw id value.
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "table:{}", self.0)
    }
}

/// Physical address of a tuple slot: block (tile group) and offset within it.
///
/// The logging subsystem never interprets a tuple beyond this address and
/// its opaque payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ItemPointer {
    /// Block number within the table.
    pub block: u32,
    /// Slot offset within the block.
    pub offset: u32,
}

impl ItemPointer {
    /// The "no location" sentinel.
    pub const INVALID: Self = Self {
        block: u32::MAX,
        offset: u32::MAX,
    };

    /// Creates a location.
    #[must_use]
    pub const fn new(block: u32, offset: u32) -> Self {
        Self { block, offset }
    }

    /// Returns `true` unless this is [`ItemPointer::INVALID`].
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.block != u32::MAX
    }
}

impl fmt::Display for ItemPointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "({}, {})", self.block, self.offset)
        } else {
            f.write_str("(invalid)")
        }
    }
}

/// Identity of a worker producing log records: the OS thread it runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WorkerId(ThreadId);

impl WorkerId {
    /// The worker identity of the calling thread.
    #[must_use]
    pub fn current() -> Self {
        Self(thread::current().id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_location_sentinel() {
        assert!(!ItemPointer::INVALID.is_valid());
        assert!(ItemPointer::new(0, 0).is_valid());
        assert_eq!(ItemPointer::INVALID.to_string(), "(invalid)");
        assert_eq!(ItemPointer::new(3, 7).to_string(), "(3, 7)");
    }

    #[test]
    fn txn_id_ordering_and_display() {
        assert!(TxnId::new(1) < TxnId::new(2));
        assert_eq!(format!("{}", TxnId::new(9)), "txn:9");
    }

    #[test]
    fn worker_identity_is_per_thread() {
        let here = WorkerId::current();
        assert_eq!(here, WorkerId::current());

        let there = std::thread::spawn(WorkerId::current).join().unwrap();
        assert_ne!(here, there);
    }
}
