//! In-memory tables addressed by [`ItemPointer`].

use crate::error::{LogError, LogResult};
use crate::storage::tuple::Schema;
use crate::types::{DatabaseId, ItemPointer, TableId};
use parking_lot::RwLock;

/// Upper bound on the block number a location may name.
pub const MAX_BLOCKS: u32 = 1 << 20;

#[derive(Debug, Clone)]
struct TupleSlot {
    payload: Vec<u8>,
    active: bool,
}

#[derive(Debug, Default)]
struct Blocks {
    /// `blocks[b][o]` is the slot at `(b, o)`; `None` was never written.
    blocks: Vec<Vec<Option<TupleSlot>>>,
    /// Next candidate slot for `insert_tuple`.
    cursor: (u32, u32),
    active: usize,
}

/// A table of fixed-size blocks of tuple slots.
///
/// Slots are written once by `insert_tuple` or `insert_tuple_at` and then
/// flip between active and inactive. A location never moves.
#[derive(Debug)]
pub struct DataTable {
    db_id: DatabaseId,
    table_id: TableId,
    name: String,
    schema: Schema,
    tuples_per_block: u32,
    inner: RwLock<Blocks>,
}

impl DataTable {
    /// Creates an empty table.
    ///
    /// A `tuples_per_block` of zero is treated as one.
    pub fn new(
        db_id: DatabaseId,
        table_id: TableId,
        name: impl Into<String>,
        schema: Schema,
        tuples_per_block: u32,
    ) -> Self {
        Self {
            db_id,
            table_id,
            name: name.into(),
            schema,
            tuples_per_block: tuples_per_block.max(1),
            inner: RwLock::new(Blocks::default()),
        }
    }

    /// Owning database.
    #[must_use]
    pub fn database_id(&self) -> DatabaseId {
        self.db_id
    }

    /// Table id.
    #[must_use]
    pub fn table_id(&self) -> TableId {
        self.table_id
    }

    /// Table name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Row schema.
    #[must_use]
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Slots per block.
    #[must_use]
    pub fn tuples_per_block(&self) -> u32 {
        self.tuples_per_block
    }

    /// Stores `payload` in the next never-written slot.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::InvalidOperation`] when the table is full.
    pub fn insert_tuple(&self, payload: Vec<u8>) -> LogResult<ItemPointer> {
        let mut inner = self.inner.write();
        let (mut block, mut offset) = inner.cursor;

        loop {
            if block >= MAX_BLOCKS {
                return Err(LogError::invalid_operation(format!(
                    "table {} is full",
                    self.table_id
                )));
            }
            let taken = inner
                .blocks
                .get(block as usize)
                .and_then(|b| b.get(offset as usize))
                .is_some_and(Option::is_some);
            if !taken {
                break;
            }
            offset += 1;
            if offset == self.tuples_per_block {
                block += 1;
                offset = 0;
            }
        }

        let location = ItemPointer::new(block, offset);
        self.write_slot(&mut inner, location, payload);
        inner.cursor = (block, offset);
        Ok(location)
    }

    /// Stores `payload` as the active tuple at `location`, replacing whatever
    /// was there.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::InvalidLocation`] if `location` is outside the
    /// table's addressable range.
    pub fn insert_tuple_at(&self, location: ItemPointer, payload: Vec<u8>) -> LogResult<()> {
        self.check_location(location)?;
        let mut inner = self.inner.write();
        self.write_slot(&mut inner, location, payload);
        Ok(())
    }

    /// Deactivates the active tuple at `location`.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::TupleNotFound`] if no active tuple is there.
    pub fn delete_tuple(&self, location: ItemPointer) -> LogResult<()> {
        self.check_location(location)?;
        let mut inner = self.inner.write();
        match slot_mut(&mut inner, location) {
            Some(slot) if slot.active => {
                slot.active = false;
                inner.active -= 1;
                Ok(())
            }
            _ => Err(LogError::TupleNotFound(location)),
        }
    }

    /// Marks the tuple at `location` inactive. Already inactive is fine.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::TupleNotFound`] if the slot was never written.
    pub fn deactivate_tuple_at(&self, location: ItemPointer) -> LogResult<()> {
        self.set_active(location, false)
    }

    /// Marks the tuple at `location` active again.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::TupleNotFound`] if the slot was never written.
    pub fn reactivate_tuple_at(&self, location: ItemPointer) -> LogResult<()> {
        self.set_active(location, true)
    }

    /// Payload of the active tuple at `location`.
    #[must_use]
    pub fn get_tuple(&self, location: ItemPointer) -> Option<Vec<u8>> {
        let inner = self.inner.read();
        inner
            .blocks
            .get(location.block as usize)
            .and_then(|b| b.get(location.offset as usize))
            .and_then(Option::as_ref)
            .filter(|slot| slot.active)
            .map(|slot| slot.payload.clone())
    }

    /// Number of active tuples.
    #[must_use]
    pub fn active_tuple_count(&self) -> usize {
        self.inner.read().active
    }

    /// Number of allocated blocks.
    #[must_use]
    pub fn block_count(&self) -> usize {
        self.inner.read().blocks.len()
    }

    fn check_location(&self, location: ItemPointer) -> LogResult<()> {
        if !location.is_valid()
            || location.block >= MAX_BLOCKS
            || location.offset >= self.tuples_per_block
        {
            return Err(LogError::InvalidLocation(location));
        }
        Ok(())
    }

    fn write_slot(&self, inner: &mut Blocks, location: ItemPointer, payload: Vec<u8>) {
        let per_block = self.tuples_per_block as usize;
        let block = location.block as usize;
        if inner.blocks.len() <= block {
            inner.blocks.resize_with(block + 1, || vec![None; per_block]);
        }

        let slot = &mut inner.blocks[block][location.offset as usize];
        let was_active = slot.as_ref().is_some_and(|s| s.active);
        *slot = Some(TupleSlot {
            payload,
            active: true,
        });
        if !was_active {
            inner.active += 1;
        }
    }

    fn set_active(&self, location: ItemPointer, active: bool) -> LogResult<()> {
        self.check_location(location)?;
        let mut inner = self.inner.write();
        let slot = slot_mut(&mut inner, location).ok_or(LogError::TupleNotFound(location))?;
        if slot.active == active {
            return Ok(());
        }
        slot.active = active;
        if active {
            inner.active += 1;
        } else {
            inner.active -= 1;
        }
        Ok(())
    }
}

fn slot_mut(inner: &mut Blocks, location: ItemPointer) -> Option<&mut TupleSlot> {
    inner
        .blocks
        .get_mut(location.block as usize)
        .and_then(|b| b.get_mut(location.offset as usize))
        .and_then(Option::as_mut)
}
