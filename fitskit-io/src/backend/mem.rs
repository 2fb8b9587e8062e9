use std::cell::Cell;

use bytes::{Buf, BufMut};
use fitskit_config::CONFIG;
use indexmap::IndexMap;

use crate::backend::{BintableBackend, ColumnDescriptor};
use crate::dispatch::DESCRIPTOR_WIDTH;

/// Binary table held in memory with the layout of a FITS data unit: fixed-width big-endian
/// rows followed by a heap for variable-length arrays.
///
/// Backend calls are counted so that callers can check how transfers were batched.
#[derive(Debug)]
pub struct MemBintable {
    /// Columns in storage order, keyed by upper-case name.
    columns: IndexMap<String, ColumnDescriptor>,
    data: Vec<u8>,
    row_count: usize,
    heap: Vec<u8>,
    writable: bool,
    read_calls: Cell<usize>,
    write_calls: Cell<usize>,
}

impl Default for MemBintable {
    fn default() -> Self {
        Self::new()
    }
}

impl MemBintable {
    /// Empty writable table.
    pub fn new() -> Self {
        Self {
            columns: IndexMap::new(),
            data: Vec::new(),
            row_count: 0,
            heap: Vec::new(),
            writable: true,
            read_calls: Cell::new(0),
            write_calls: Cell::new(0),
        }
    }

    /// Table with the given columns and `row_count` zero-filled rows.
    pub fn with_columns(
        columns: impl IntoIterator<Item = ColumnDescriptor>,
        row_count: usize,
    ) -> anyhow::Result<Self> {
        let mut table = Self::new();
        for column in columns {
            table.insert_column(table.column_count(), column)?;
        }
        table.extend_rows(row_count)?;
        Ok(table)
    }

    pub fn read_only(mut self) -> Self {
        self.writable = false;
        self
    }

    /// Bytes per row.
    pub fn row_width(&self) -> usize {
        self.columns.values().map(ColumnDescriptor::field_width).sum()
    }

    pub fn heap_size(&self) -> usize {
        self.heap.len()
    }

    pub fn read_calls(&self) -> usize {
        self.read_calls.get()
    }

    pub fn write_calls(&self) -> usize {
        self.write_calls.get()
    }

    pub fn reset_counters(&self) {
        self.read_calls.set(0);
        self.write_calls.set(0);
    }

    fn descriptor(&self, index: usize) -> anyhow::Result<&ColumnDescriptor> {
        self.columns
            .get_index(index)
            .map(|(_, column)| column)
            .ok_or_else(|| anyhow::anyhow!("No column at index {}", index))
    }

    fn ensure_writable(&self, action: &str) -> anyhow::Result<()> {
        if !self.writable {
            anyhow::bail!("Cannot {}: table is opened read-only", action);
        }
        Ok(())
    }

    fn field_offset(&self, index: usize) -> usize {
        self.columns
            .values()
            .take(index)
            .map(ColumnDescriptor::field_width)
            .sum()
    }

    /// Byte ranges of the fields of column `index` for `byte_count / width` rows from `first_row`.
    fn field_ranges(
        &self,
        index: usize,
        first_row: usize,
        byte_count: usize,
    ) -> anyhow::Result<impl Iterator<Item = std::ops::Range<usize>>> {
        let width = self.descriptor(index)?.field_width();
        if width == 0 {
            if byte_count != 0 {
                anyhow::bail!("Column {} has no data, got {} bytes", index, byte_count);
            }
            return Ok(Vec::new().into_iter());
        }
        if byte_count % width != 0 {
            anyhow::bail!(
                "Buffer of {} bytes does not hold whole fields of {} bytes",
                byte_count,
                width
            );
        }
        let rows = byte_count / width;
        if first_row + rows > self.row_count {
            anyhow::bail!(
                "Rows {}..{} out of range, table has {} rows",
                first_row,
                first_row + rows,
                self.row_count
            );
        }
        let row_width = self.row_width();
        let offset = self.field_offset(index);
        Ok((first_row..first_row + rows)
            .map(|row| {
                let start = row * row_width + offset;
                start..start + width
            })
            .collect::<Vec<_>>()
            .into_iter())
    }

    /// Position of the `P` descriptor of a variable-length row.
    fn heap_descriptor(&self, index: usize, row: usize) -> anyhow::Result<usize> {
        let column = self.descriptor(index)?;
        if !column.code.variable {
            anyhow::bail!("Column {} is not a variable-length column", column.name);
        }
        if row >= self.row_count {
            anyhow::bail!("Row {} out of range, table has {} rows", row, self.row_count);
        }
        Ok(row * self.row_width() + self.field_offset(index))
    }

    fn read_heap_descriptor(&self, index: usize, row: usize) -> anyhow::Result<(usize, usize)> {
        let position = self.heap_descriptor(index, row)?;
        let mut field = &self.data[position..position + DESCRIPTOR_WIDTH];
        let count = field.get_u32() as usize;
        let offset = field.get_u32() as usize;
        Ok((count, offset))
    }

    /// Rebuild every row with a new width, `edit` copying one old row into the new data.
    fn relayout<F>(&mut self, new_row_width: usize, mut edit: F)
    where
        F: FnMut(&[u8], &mut Vec<u8>),
    {
        let old_row_width = self.row_width();
        let mut data = Vec::with_capacity(self.row_count * new_row_width);
        for row in 0..self.row_count {
            let start = row * old_row_width;
            edit(&self.data[start..start + old_row_width], &mut data);
        }
        self.data = data;
    }
}

/// Bytes of a field holding zeros, empty heap rows or blank text.
///
/// Offset-coded values store zero with the sign bit set.
fn zero_field(column: &ColumnDescriptor) -> Vec<u8> {
    let mut field = vec![0u8; column.field_width()];
    if column.code.offset && !column.code.variable {
        for element in field.chunks_exact_mut(column.code.width) {
            element[0] = 0x80;
        }
    }
    field
}

impl BintableBackend for MemBintable {
    fn is_writable(&self) -> bool {
        self.writable
    }

    fn column_count(&self) -> usize {
        self.columns.len()
    }

    fn row_count(&self) -> usize {
        self.row_count
    }

    fn buffer_row_count(&self) -> usize {
        CONFIG.buffer_rows(self.row_width())
    }

    fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.get_index_of(&name.to_uppercase())
    }

    fn column_descriptor(&self, index: usize) -> anyhow::Result<ColumnDescriptor> {
        self.descriptor(index).cloned()
    }

    fn read_rows(&self, index: usize, first_row: usize, out: &mut [u8]) -> anyhow::Result<()> {
        let ranges = self.field_ranges(index, first_row, out.len())?;
        let mut buf = &mut out[..];
        for range in ranges {
            buf.put_slice(&self.data[range]);
        }
        self.read_calls.set(self.read_calls.get() + 1);
        Ok(())
    }

    fn write_rows(&mut self, index: usize, first_row: usize, data: &[u8]) -> anyhow::Result<()> {
        self.ensure_writable("write rows")?;
        let ranges = self.field_ranges(index, first_row, data.len())?;
        let mut buf = data;
        for range in ranges {
            let width = range.len();
            self.data[range].copy_from_slice(&buf[..width]);
            buf.advance(width);
        }
        self.write_calls.set(self.write_calls.get() + 1);
        Ok(())
    }

    fn var_row_len(&self, index: usize, row: usize) -> anyhow::Result<usize> {
        Ok(self.read_heap_descriptor(index, row)?.0)
    }

    fn read_var_row(&self, index: usize, row: usize, out: &mut [u8]) -> anyhow::Result<()> {
        let (count, offset) = self.read_heap_descriptor(index, row)?;
        let byte_count = count * self.descriptor(index)?.code.width;
        if out.len() != byte_count {
            anyhow::bail!(
                "Row {} holds {} bytes, got a buffer of {} bytes",
                row,
                byte_count,
                out.len()
            );
        }
        if offset + byte_count > self.heap.len() {
            anyhow::bail!("Descriptor of row {} points past the end of the heap", row);
        }
        out.copy_from_slice(&self.heap[offset..offset + byte_count]);
        self.read_calls.set(self.read_calls.get() + 1);
        Ok(())
    }

    /// Append the row to the heap; previous data of the row stays in the heap unreferenced.
    fn write_var_row(&mut self, index: usize, row: usize, data: &[u8]) -> anyhow::Result<()> {
        self.ensure_writable("write heap")?;
        let position = self.heap_descriptor(index, row)?;
        let width = self.descriptor(index)?.code.width;
        if data.len() % width != 0 {
            anyhow::bail!("Heap data of {} bytes is not a whole number of elements", data.len());
        }
        let count = u32::try_from(data.len() / width)?;
        let offset = u32::try_from(self.heap.len())?;
        self.heap.extend_from_slice(data);
        let mut field = &mut self.data[position..position + DESCRIPTOR_WIDTH];
        field.put_u32(count);
        field.put_u32(offset);
        self.write_calls.set(self.write_calls.get() + 1);
        Ok(())
    }

    fn extend_rows(&mut self, row_count: usize) -> anyhow::Result<()> {
        if row_count <= self.row_count {
            return Ok(());
        }
        self.ensure_writable("extend table")?;
        let row = self.columns.values().flat_map(zero_field).collect::<Vec<_>>();
        self.data.reserve((row_count - self.row_count) * row.len());
        for _ in self.row_count..row_count {
            self.data.extend_from_slice(&row);
        }
        self.row_count = row_count;
        Ok(())
    }

    fn insert_column(&mut self, index: usize, column: ColumnDescriptor) -> anyhow::Result<()> {
        self.ensure_writable("insert column")?;
        if index > self.columns.len() {
            anyhow::bail!(
                "Cannot insert column at {}, table has {} columns",
                index,
                self.columns.len()
            );
        }
        let key = column.name.to_uppercase();
        if self.columns.contains_key(&key) {
            anyhow::bail!("Column {} already exists", column.name);
        }
        let offset = self.field_offset(index);
        let field = zero_field(&column);
        self.relayout(self.row_width() + field.len(), |row, data| {
            data.extend_from_slice(&row[..offset]);
            data.extend_from_slice(&field);
            data.extend_from_slice(&row[offset..]);
        });
        self.columns.shift_insert(index, key, column);
        Ok(())
    }

    fn remove_column(&mut self, index: usize) -> anyhow::Result<()> {
        self.ensure_writable("remove column")?;
        let width = self.descriptor(index)?.field_width();
        let offset = self.field_offset(index);
        self.relayout(self.row_width() - width, |row, data| {
            data.extend_from_slice(&row[..offset]);
            data.extend_from_slice(&row[offset + width..]);
        });
        self.columns.shift_remove_index(index);
        Ok(())
    }

    fn rename_column(&mut self, index: usize, name: &str) -> anyhow::Result<()> {
        self.ensure_writable("rename column")?;
        let key = name.to_uppercase();
        if let Some(existing) = self.columns.get_index_of(&key) {
            if existing != index {
                anyhow::bail!("Column {} already exists", name);
            }
        }
        let (_, mut column) = self
            .columns
            .shift_remove_index(index)
            .ok_or_else(|| anyhow::anyhow!("No column at index {}", index))?;
        column.name = name.to_string();
        self.columns.shift_insert(index, key, column);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::{ScalarType, TEXT_CODE};

    fn table() -> MemBintable {
        MemBintable::with_columns(
            [
                ColumnDescriptor::new("A", "", ScalarType::I16.code(), 1),
                ColumnDescriptor::new("B", "m", ScalarType::F32.code(), 2),
            ],
            3,
        )
        .expect("table")
    }

    #[test]
    fn layout_is_row_major() {
        let mut table = table();
        assert_eq!(table.row_width(), 10);
        table.write_rows(0, 0, &[0, 1, 0, 2, 0, 3]).unwrap();
        table.write_rows(1, 1, &[0xAA; 8]).unwrap();
        assert_eq!(&table.data[..12], &[0, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 2]);
        assert_eq!(&table.data[12..20], &[0xAA; 8]);
        let mut out = [0u8; 4];
        table.read_rows(0, 1, &mut out).unwrap();
        assert_eq!(out, [0, 2, 0, 3]);
        assert_eq!(table.read_calls(), 1);
        assert_eq!(table.write_calls(), 2);
    }

    #[test]
    fn out_of_range_rows_are_rejected() {
        let table = table();
        let mut out = [0u8; 4];
        assert!(table.read_rows(0, 2, &mut out).is_err());
        assert!(table.read_rows(0, 0, &mut [0u8; 3]).is_err());
        assert!(table.read_rows(5, 0, &mut out).is_err());
    }

    #[test]
    fn columns_can_be_inserted_and_removed() {
        let mut table = table();
        table.write_rows(0, 0, &[0, 1, 0, 2, 0, 3]).unwrap();
        table
            .insert_column(1, ColumnDescriptor::new("name", "", TEXT_CODE, 4))
            .unwrap();
        assert_eq!(table.column_index("NAME"), Some(1));
        assert_eq!(table.column_index("b"), Some(2));
        let mut out = [0u8; 6];
        table.read_rows(0, 0, &mut out).unwrap();
        assert_eq!(out, [0, 1, 0, 2, 0, 3]);
        table.read_rows(1, 0, &mut [0u8; 12]).unwrap();
        assert!(table
            .insert_column(0, ColumnDescriptor::new("A", "", TEXT_CODE, 1))
            .is_err());

        table.remove_column(0).unwrap();
        assert_eq!(table.column_count(), 2);
        assert_eq!(table.row_width(), 12);
        assert_eq!(table.column_index("A"), None);
    }

    #[test]
    fn rename_keeps_position() {
        let mut table = table();
        table.rename_column(0, "Alpha").unwrap();
        assert_eq!(table.column_index("ALPHA"), Some(0));
        assert_eq!(table.column_descriptor(0).unwrap().name, "Alpha");
        assert!(table.rename_column(0, "b").is_err());
    }

    #[test]
    fn heap_rows() {
        let code = ScalarType::I32.code().to_variable();
        let mut table =
            MemBintable::with_columns([ColumnDescriptor::new("V", "", code, 0)], 2).unwrap();
        assert_eq!(table.var_row_len(0, 0).unwrap(), 0);
        table.write_var_row(0, 1, &[0, 0, 0, 7, 0, 0, 0, 8]).unwrap();
        assert_eq!(table.var_row_len(0, 1).unwrap(), 2);
        let mut out = [0u8; 8];
        table.read_var_row(0, 1, &mut out).unwrap();
        assert_eq!(out, [0, 0, 0, 7, 0, 0, 0, 8]);
        assert!(table.read_var_row(0, 1, &mut [0u8; 4]).is_err());
        assert_eq!(table.heap_size(), 8);
    }

    #[test]
    fn read_only_table_rejects_mutations() {
        let mut table = table().read_only();
        assert!(table.write_rows(0, 0, &[0, 1]).is_err());
        assert!(table.extend_rows(10).is_err());
        assert!(table.remove_column(0).is_err());
        assert!(table.rename_column(0, "C").is_err());
        assert_eq!(table.row_count(), 3);
    }

    #[test]
    fn new_rows_and_columns_hold_zeros() {
        let mut table = MemBintable::with_columns(
            [ColumnDescriptor::new("U", "", ScalarType::U16.code(), 2)],
            1,
        )
        .unwrap();
        assert_eq!(table.data, vec![0x80, 0, 0x80, 0]);
        table
            .insert_column(0, ColumnDescriptor::new("B", "", ScalarType::I8.code(), 1))
            .unwrap();
        table.extend_rows(2).unwrap();
        assert_eq!(table.data, vec![0x80, 0x80, 0, 0x80, 0, 0x80, 0x80, 0, 0x80, 0]);
    }

    #[test]
    fn buffer_rows_follow_row_width() {
        let table = table();
        assert_eq!(table.buffer_row_count(), CONFIG.buffer_rows(10));
        assert!(table.buffer_row_count() >= 1);
    }
}
