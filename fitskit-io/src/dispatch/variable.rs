use super::scalar::{decode_values, encode_values};
use super::{ColumnSlot, Primitive};
use crate::backend::BintableBackend;

/// Owned heap rows of one chunk.
///
/// Every row buffer is sized from the length the backend reports for that row, and all of
/// them are released together when the arena is dropped, whether or not the chunk completed.
#[derive(Debug, Default)]
pub struct RowBuffers {
    rows: Vec<Vec<u8>>,
}

impl RowBuffers {
    pub fn with_capacity(row_count: usize) -> Self {
        Self {
            rows: Vec::with_capacity(row_count),
        }
    }

    /// Append a zeroed buffer of `byte_count` bytes and return it.
    pub fn allocate(&mut self, byte_count: usize) -> &mut [u8] {
        self.rows.push(vec![0u8; byte_count]);
        let last = self.rows.len() - 1;
        &mut self.rows[last]
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn byte_count(&self) -> usize {
        self.rows.iter().map(Vec::len).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = &[u8]> {
        self.rows.iter().map(Vec::as_slice)
    }
}

/// Read variable-length rows: query each row length, fill one owned buffer per row, then
/// decode all rows into `out`.
///
/// `out` is only modified once every row has been fetched.
pub(crate) fn read_rows<P: Primitive>(
    backend: &dyn BintableBackend,
    column: &ColumnSlot,
    first_row: usize,
    out: &mut [Vec<P>],
) -> anyhow::Result<()> {
    let width = column.descriptor.code.width;
    let mut buffers = RowBuffers::with_capacity(out.len());
    for row in first_row..first_row + out.len() {
        let len = backend.var_row_len(column.index, row)?;
        let buffer = buffers.allocate(len * width);
        backend.read_var_row(column.index, row, buffer)?;
    }
    tracing::trace!(
        "Fetched {} heap bytes for {} rows of column {}",
        buffers.byte_count(),
        buffers.len(),
        column.name
    );
    for (value, raw) in out.iter_mut().zip(buffers.iter()) {
        value.clear();
        value.resize(raw.len() / width, P::default());
        decode_values(raw, value);
    }
    Ok(())
}

/// Write each row with its own length.
pub(crate) fn write_rows<P: Primitive>(
    backend: &mut dyn BintableBackend,
    column: &ColumnSlot,
    first_row: usize,
    values: &[Vec<P>],
) -> anyhow::Result<()> {
    for (row, value) in (first_row..).zip(values) {
        let raw = encode_values(value);
        backend.write_var_row(column.index, row, &raw)?;
    }
    Ok(())
}
