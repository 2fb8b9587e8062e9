//! Type-erased per-column transfers, so that one chunk loop can drive columns of different
//! value types.

use crate::backend::BintableBackend;
use crate::dispatch::{ColumnSlot, FitsValue};

/// Moves chunks of one column from the backend into memory.
pub trait ChunkRead {
    fn slot(&self) -> &ColumnSlot;

    /// Rows available in memory.
    fn row_count(&self) -> usize;

    fn read_chunk(
        &mut self,
        backend: &dyn BintableBackend,
        file_front: usize,
        memory_front: usize,
        rows: usize,
    ) -> anyhow::Result<()>;
}

/// Moves chunks of one column from memory to the backend.
pub trait ChunkWrite {
    fn slot(&self) -> &ColumnSlot;

    fn row_count(&self) -> usize;

    fn write_chunk(
        &self,
        backend: &mut dyn BintableBackend,
        file_front: usize,
        memory_front: usize,
        rows: usize,
    ) -> anyhow::Result<()>;
}

pub struct ReadTransfer<'c, T> {
    slot: ColumnSlot,
    values: &'c mut [T],
    per_row: usize,
}

impl<'c, T: FitsValue> ReadTransfer<'c, T> {
    pub(crate) fn new(slot: ColumnSlot, values: &'c mut [T]) -> Self {
        let per_row = slot.descriptor.values_per_row().max(1);
        Self {
            slot,
            values,
            per_row,
        }
    }
}

impl<T: FitsValue> ChunkRead for ReadTransfer<'_, T> {
    fn slot(&self) -> &ColumnSlot {
        &self.slot
    }

    fn row_count(&self) -> usize {
        self.values.len() / self.per_row
    }

    fn read_chunk(
        &mut self,
        backend: &dyn BintableBackend,
        file_front: usize,
        memory_front: usize,
        rows: usize,
    ) -> anyhow::Result<()> {
        let start = memory_front * self.per_row;
        let end = start + rows * self.per_row;
        T::read_rows(backend, &self.slot, file_front, &mut self.values[start..end])
    }
}

pub struct WriteTransfer<'c, T> {
    slot: ColumnSlot,
    values: &'c [T],
    per_row: usize,
}

impl<'c, T: FitsValue> WriteTransfer<'c, T> {
    pub(crate) fn new(slot: ColumnSlot, values: &'c [T]) -> Self {
        let per_row = slot.descriptor.values_per_row().max(1);
        Self {
            slot,
            values,
            per_row,
        }
    }
}

impl<T: FitsValue> ChunkWrite for WriteTransfer<'_, T> {
    fn slot(&self) -> &ColumnSlot {
        &self.slot
    }

    fn row_count(&self) -> usize {
        self.values.len() / self.per_row
    }

    fn write_chunk(
        &self,
        backend: &mut dyn BintableBackend,
        file_front: usize,
        memory_front: usize,
        rows: usize,
    ) -> anyhow::Result<()> {
        let start = memory_front * self.per_row;
        let end = start + rows * self.per_row;
        T::write_rows(backend, &self.slot, file_front, &self.values[start..end])
    }
}
