//! Storage backends.
//!
//! The traits below are the only way the engine touches a data unit. They expose the few
//! primitives a FITS library offers (metadata, raw big-endian transfers of contiguous rows and
//! heap access) and report failures as [`anyhow::Error`], which the engine wraps with context.

pub mod image;
pub mod mem;

pub use image::MemImage;
pub use mem::MemBintable;

use crate::dispatch::TypeCode;

/// Declared layout of one table column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDescriptor {
    pub name: String,
    pub unit: String,
    pub code: TypeCode,
    pub repeat: usize,
}

impl ColumnDescriptor {
    pub fn new(name: impl Into<String>, unit: impl Into<String>, code: TypeCode, repeat: usize) -> Self {
        Self {
            name: name.into(),
            unit: unit.into(),
            code,
            repeat,
        }
    }

    /// Bytes of the column in each row.
    pub fn field_width(&self) -> usize {
        self.code.field_width(self.repeat)
    }

    pub fn tform(&self) -> String {
        self.code.tform(self.repeat)
    }
}

/// Binary table data unit, stored row after row.
pub trait BintableBackend {
    fn is_writable(&self) -> bool;

    fn column_count(&self) -> usize;

    fn row_count(&self) -> usize;

    /// Number of rows the backend moves per buffer, used to size engine chunks.
    fn buffer_row_count(&self) -> usize;

    /// Case-insensitive lookup.
    fn column_index(&self, name: &str) -> Option<usize>;

    fn column_descriptor(&self, index: usize) -> anyhow::Result<ColumnDescriptor>;

    /// Read the fields of column `index` for consecutive rows from `first_row`.
    ///
    /// `out` holds a whole number of fields.
    fn read_rows(&self, index: usize, first_row: usize, out: &mut [u8]) -> anyhow::Result<()>;

    fn write_rows(&mut self, index: usize, first_row: usize, data: &[u8]) -> anyhow::Result<()>;

    /// Element count of a variable-length row.
    fn var_row_len(&self, index: usize, row: usize) -> anyhow::Result<usize>;

    /// Read the heap data of a variable-length row, `out` being sized from
    /// [`BintableBackend::var_row_len`].
    fn read_var_row(&self, index: usize, row: usize, out: &mut [u8]) -> anyhow::Result<()>;

    /// Store the heap data of a variable-length row, its element count being given by the
    /// length of `data`.
    fn write_var_row(&mut self, index: usize, row: usize, data: &[u8]) -> anyhow::Result<()>;

    /// Grow the table to `row_count` rows, new rows being zero-filled.
    fn extend_rows(&mut self, row_count: usize) -> anyhow::Result<()>;

    fn insert_column(&mut self, index: usize, column: ColumnDescriptor) -> anyhow::Result<()>;

    fn remove_column(&mut self, index: usize) -> anyhow::Result<()>;

    fn rename_column(&mut self, index: usize, name: &str) -> anyhow::Result<()>;
}

/// Image data unit: one N-dimensional array.
pub trait ImageBackend {
    fn is_writable(&self) -> bool;

    fn type_code(&self) -> TypeCode;

    /// Lengths along each axis, first axis fastest.
    fn shape(&self) -> Vec<i64>;

    /// Read consecutive elements starting at element `first`.
    fn read_raw(&self, first: usize, out: &mut [u8]) -> anyhow::Result<()>;

    fn write_raw(&mut self, first: usize, data: &[u8]) -> anyhow::Result<()>;

    /// Change the type and shape of the data unit, discarding its values.
    fn reshape(&mut self, code: TypeCode, shape: &[i64]) -> anyhow::Result<()>;
}
