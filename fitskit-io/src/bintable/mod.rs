//! Column-wise access to binary tables.
//!
//! Rows are stored one after the other, each row interleaving the fields of every column. The
//! engine therefore reads and writes in chunks of rows sized after the backend buffer, and
//! within a chunk visits every column of a sequence before moving on, so that the rows of the
//! chunk are only brought in once whatever the number of columns.

mod seq;
pub mod transfer;

use std::collections::HashSet;
use std::fmt;

use fitskit_config::CONFIG;
use fitskit_data::{
    Column, ColumnInfo, FileMemSegments, FitsError, FitsResult, IoContext, Segment, VecColumn,
};

use crate::backend::{BintableBackend, ColumnDescriptor};
use crate::dispatch::{ColumnSlot, FitsValue};

pub use seq::{
    indexed, named, Indexed, Named, Selector, SeqColumns, SeqColumnsMut, SeqInfos, SeqSelectors,
};
use transfer::{ChunkRead, ChunkWrite, ReadTransfer, WriteTransfer};

/// Column name (case-insensitive) or 0-based index.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ColumnKey {
    Name(String),
    Index(usize),
}

impl From<&str> for ColumnKey {
    fn from(name: &str) -> Self {
        ColumnKey::Name(name.to_string())
    }
}

impl From<String> for ColumnKey {
    fn from(name: String) -> Self {
        ColumnKey::Name(name)
    }
}

impl From<&String> for ColumnKey {
    fn from(name: &String) -> Self {
        ColumnKey::Name(name.clone())
    }
}

impl From<usize> for ColumnKey {
    fn from(index: usize) -> Self {
        ColumnKey::Index(index)
    }
}

impl fmt::Display for ColumnKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnKey::Name(name) => write!(f, "{}", name),
            ColumnKey::Index(index) => write!(f, "#{}", index),
        }
    }
}

/// A freshly allocated column and the slot it is read from.
pub(crate) struct Allocated<T> {
    pub(crate) slot: ColumnSlot,
    pub(crate) column: VecColumn<T>,
}

impl<T: FitsValue> Allocated<T> {
    pub(crate) fn transfer(&mut self) -> Box<dyn ChunkRead + '_> {
        Box::new(ReadTransfer::new(self.slot.clone(), self.column.data_mut()))
    }
}

/// Check that every column of a sequence has the same number of rows.
fn pair_keys<'c, K: Into<ColumnKey>, S: SeqColumnsMut<'c>>(
    keys: impl IntoIterator<Item = K>,
    columns: &S,
) -> FitsResult<Vec<ColumnKey>> {
    let keys: Vec<ColumnKey> = keys.into_iter().map(Into::into).collect();
    if keys.len() != columns.column_count() {
        return Err(FitsError::SizeMismatch(format!(
            "{} keys for {} columns",
            keys.len(),
            columns.column_count()
        )));
    }
    Ok(keys)
}

fn common_row_count<'t>(columns: impl IntoIterator<Item = (&'t str, usize)>) -> FitsResult<usize> {
    let mut common: Option<(&str, usize)> = None;
    for (name, rows) in columns {
        match common {
            None => common = Some((name, rows)),
            Some((first, expected)) if expected != rows => {
                return Err(FitsError::SizeMismatch(format!(
                    "column {} has {} rows but column {} has {}",
                    name, rows, first, expected
                )));
            }
            Some(_) => {}
        }
    }
    Ok(common.map_or(0, |(_, rows)| rows))
}

/// Columns of a binary table data unit.
///
/// Every operation validates its whole input (column names and types, row counts, segments,
/// writability) before the first backend transfer, so a failed call leaves the table untouched.
pub struct BintableColumns<'a> {
    backend: &'a mut dyn BintableBackend,
}

impl<'a> BintableColumns<'a> {
    pub fn new(backend: &'a mut dyn BintableBackend) -> Self {
        Self { backend }
    }

    pub fn column_count(&self) -> usize {
        self.backend.column_count()
    }

    pub fn row_count(&self) -> usize {
        self.backend.row_count()
    }

    pub fn buffer_row_count(&self) -> usize {
        self.backend.buffer_row_count()
    }

    pub fn has(&self, name: &str) -> bool {
        self.backend.column_index(name).is_some()
    }

    pub fn read_index(&self, name: &str) -> FitsResult<usize> {
        self.resolve(&ColumnKey::from(name))
    }

    pub fn read_indices<S: AsRef<str>>(&self, names: &[S]) -> FitsResult<Vec<usize>> {
        names.iter().map(|name| self.read_index(name.as_ref())).collect()
    }

    pub fn read_name(&self, index: usize) -> FitsResult<String> {
        let index = self.resolve(&ColumnKey::Index(index))?;
        Ok(self.descriptor(index)?.name)
    }

    pub fn read_all_names(&self) -> FitsResult<Vec<String>> {
        (0..self.column_count())
            .map(|index| Ok(self.descriptor(index)?.name))
            .collect()
    }

    /// Metadata of a column, which must hold values of type `T`.
    pub fn read_info<T: FitsValue>(&self, key: impl Into<ColumnKey>) -> FitsResult<ColumnInfo<T>> {
        Ok(self.slot::<T>(&key.into())?.info())
    }

    pub fn rename(&mut self, key: impl Into<ColumnKey>, name: &str) -> FitsResult<()> {
        self.ensure_writable("rename column")?;
        let key = key.into();
        let index = self.resolve(&key)?;
        tracing::debug!("Renaming column {} to {}", key, name);
        self.backend
            .rename_column(index, name)
            .io_context(|| format!("renaming column {} to {}", key, name))
    }

    pub fn remove(&mut self, key: impl Into<ColumnKey>) -> FitsResult<()> {
        self.remove_seq([key])
    }

    /// Remove several columns; nothing is removed unless every key resolves.
    pub fn remove_seq<K: Into<ColumnKey>>(
        &mut self,
        keys: impl IntoIterator<Item = K>,
    ) -> FitsResult<()> {
        self.ensure_writable("remove column")?;
        let mut indices = keys
            .into_iter()
            .map(|key| self.resolve(&key.into()))
            .collect::<FitsResult<Vec<_>>>()?;
        indices.sort_unstable();
        indices.dedup();
        for index in indices.into_iter().rev() {
            tracing::debug!("Removing column #{}", index);
            self.backend
                .remove_column(index)
                .io_context(|| format!("removing column #{}", index))?;
        }
        Ok(())
    }

    /// Declare a new column at `index`, or after the last column.
    ///
    /// Returns the index of the new column.
    pub fn init<T: FitsValue>(
        &mut self,
        info: &ColumnInfo<T>,
        index: Option<usize>,
    ) -> FitsResult<usize> {
        self.init_seq((info,), index)
    }

    /// Declare consecutive columns, starting at `index` or after the last column.
    ///
    /// `infos` is either a slice of infos of one type or a tuple of references to infos, e.g.
    /// `(&ColumnInfo::<i32>::new("I", "", 1), &ColumnInfo::<String>::new("NAME", "", 8))`.
    /// Nothing is inserted unless every column can be.
    pub fn init_seq<S: SeqInfos>(&mut self, infos: S, index: Option<usize>) -> FitsResult<usize> {
        self.ensure_writable("initialize column")?;
        let count = self.column_count();
        let first = index.unwrap_or(count);
        FitsError::may_throw_out_of_bounds("Column index", first as i64, 0, count as i64)?;
        let descriptors = infos.descriptors();
        let mut names = HashSet::new();
        for descriptor in &descriptors {
            if self.has(&descriptor.name) || !names.insert(descriptor.name.to_uppercase()) {
                return Err(FitsError::Duplicate(descriptor.name.clone()));
            }
        }
        for (index, descriptor) in (first..).zip(descriptors) {
            tracing::debug!(
                "Initializing column {} ({}) at index {}",
                descriptor.name,
                descriptor.tform(),
                index
            );
            let name = descriptor.name.clone();
            self.backend
                .insert_column(index, descriptor)
                .io_context(|| format!("initializing column {}", name))?;
        }
        Ok(first)
    }

    /// Read a whole column.
    pub fn read<T: FitsValue>(&self, key: impl Into<ColumnKey>) -> FitsResult<VecColumn<T>> {
        self.read_segment(Segment::whole(self.row_count()), key)
    }

    /// Fill `column` with a whole table column; both must have the same number of rows.
    pub fn read_to<T: FitsValue, D: AsRef<[T]> + AsMut<[T]>>(
        &self,
        key: impl Into<ColumnKey>,
        column: &mut Column<T, D>,
    ) -> FitsResult<()> {
        let transfer = self.read_transfer(&key.into(), column)?;
        self.read_whole(vec![transfer])
    }

    /// Fill `column` from the table column of the same name.
    pub fn read_into<T: FitsValue, D: AsRef<[T]> + AsMut<[T]>>(
        &self,
        column: &mut Column<T, D>,
    ) -> FitsResult<()> {
        let key = ColumnKey::Name(column.name().to_string());
        self.read_to(key, column)
    }

    pub fn read_segment<T: FitsValue>(
        &self,
        rows: Segment,
        key: impl Into<ColumnKey>,
    ) -> FitsResult<VecColumn<T>> {
        let key = key.into();
        let rows = rows.resolve(self.row_count())?;
        let mut allocated = self.allocate::<T>(&key, rows.size() as usize)?;
        self.read_chunks(rows, 0, &mut [allocated.transfer()])?;
        Ok(allocated.column)
    }

    /// Read rows of a table column into rows of `column`, as mapped by `segments`.
    pub fn read_segment_to<T: FitsValue, D: AsRef<[T]> + AsMut<[T]>>(
        &self,
        segments: FileMemSegments,
        key: impl Into<ColumnKey>,
        column: &mut Column<T, D>,
    ) -> FitsResult<()> {
        let transfer = self.read_transfer(&key.into(), column)?;
        self.read_segments(segments, vec![transfer])
    }

    /// Read whole columns in one pass, e.g. `(named::<i32>("I"), indexed::<f64>(2))`.
    pub fn read_seq<S: SeqSelectors>(&self, selectors: S) -> FitsResult<S::Output> {
        self.read_segment_seq(Segment::whole(self.row_count()), selectors)
    }

    pub fn read_segment_seq<S: SeqSelectors>(
        &self,
        rows: Segment,
        selectors: S,
    ) -> FitsResult<S::Output> {
        let rows = rows.resolve(self.row_count())?;
        selectors.read_from(self, rows)
    }

    /// Read whole columns of the same type in one pass.
    pub fn read_seq_vec<T: FitsValue, K: Into<ColumnKey>>(
        &self,
        keys: impl IntoIterator<Item = K>,
    ) -> FitsResult<Vec<VecColumn<T>>> {
        let rows = Segment::whole(self.row_count()).resolve(self.row_count())?;
        let mut allocated = keys
            .into_iter()
            .map(|key| self.allocate::<T>(&key.into(), rows.size() as usize))
            .collect::<FitsResult<Vec<_>>>()?;
        {
            let mut transfers = allocated
                .iter_mut()
                .map(Allocated::transfer)
                .collect::<Vec<_>>();
            self.read_chunks(rows, 0, &mut transfers)?;
        }
        Ok(allocated.into_iter().map(|allocated| allocated.column).collect())
    }

    /// Fill columns from the table columns of the same names, in one pass.
    pub fn read_seq_to<'c, S: SeqColumnsMut<'c>>(&self, columns: S) -> FitsResult<()> {
        let transfers = columns.transfers(self, None)?;
        self.read_whole(transfers)
    }

    pub fn read_segment_seq_to<'c, S: SeqColumnsMut<'c>>(
        &self,
        segments: FileMemSegments,
        columns: S,
    ) -> FitsResult<()> {
        let transfers = columns.transfers(self, None)?;
        self.read_segments(segments, transfers)
    }

    /// Fill columns from the table columns of `keys`, paired in order, in one pass.
    pub fn read_keyed_seq_to<'c, K: Into<ColumnKey>, S: SeqColumnsMut<'c>>(
        &self,
        keys: impl IntoIterator<Item = K>,
        columns: S,
    ) -> FitsResult<()> {
        let keys = pair_keys(keys, &columns)?;
        let transfers = columns.transfers(self, Some(&keys))?;
        self.read_whole(transfers)
    }

    pub fn read_segment_keyed_seq_to<'c, K: Into<ColumnKey>, S: SeqColumnsMut<'c>>(
        &self,
        segments: FileMemSegments,
        keys: impl IntoIterator<Item = K>,
        columns: S,
    ) -> FitsResult<()> {
        let keys = pair_keys(keys, &columns)?;
        let transfers = columns.transfers(self, Some(&keys))?;
        self.read_segments(segments, transfers)
    }

    /// Write a whole column into the table column of the same name, from row 0.
    ///
    /// The table is extended if the column has more rows.
    pub fn write<T: FitsValue, D: AsRef<[T]>>(&mut self, column: &Column<T, D>) -> FitsResult<()> {
        self.write_segment(FileMemSegments::from_file_front(0), column)
    }

    pub fn write_segment<T: FitsValue, D: AsRef<[T]>>(
        &mut self,
        segments: FileMemSegments,
        column: &Column<T, D>,
    ) -> FitsResult<()> {
        let key = ColumnKey::Name(column.name().to_string());
        let transfer = self.write_transfer(&key, column)?;
        self.write_chunks(segments, &[transfer])
    }

    /// Write several columns in one pass; they must have the same number of rows.
    pub fn write_seq<'c, S: SeqColumns<'c>>(&mut self, columns: S) -> FitsResult<()> {
        self.write_segment_seq(FileMemSegments::from_file_front(0), columns)
    }

    pub fn write_segment_seq<'c, S: SeqColumns<'c>>(
        &mut self,
        segments: FileMemSegments,
        columns: S,
    ) -> FitsResult<()> {
        let transfers = columns.transfers(self)?;
        self.write_chunks(segments, &transfers)
    }

    fn ensure_writable(&self, action: &str) -> FitsResult<()> {
        if !self.backend.is_writable() {
            return Err(FitsError::ReadOnly(action.to_string()));
        }
        Ok(())
    }

    fn resolve(&self, key: &ColumnKey) -> FitsResult<usize> {
        match key {
            ColumnKey::Name(name) => self
                .backend
                .column_index(name)
                .ok_or_else(|| FitsError::NotFound(name.clone())),
            ColumnKey::Index(index) if *index < self.column_count() => Ok(*index),
            ColumnKey::Index(index) => Err(FitsError::NotFound(format!(
                "#{} (table has {} columns)",
                index,
                self.column_count()
            ))),
        }
    }

    fn descriptor(&self, index: usize) -> FitsResult<ColumnDescriptor> {
        self.backend
            .column_descriptor(index)
            .io_context(|| format!("reading metadata of column #{}", index))
    }

    /// Resolve a column for values of type `T`.
    pub(crate) fn slot<T: FitsValue>(&self, key: &ColumnKey) -> FitsResult<ColumnSlot> {
        let index = self.resolve(key)?;
        let declared = self.descriptor(index)?;
        let requested = T::describe(declared.repeat);
        if requested.code != declared.code {
            return Err(FitsError::TypeMismatch {
                requested: requested.code.label(requested.repeat),
                declared: declared.code.label(declared.repeat),
                name: declared.name,
            });
        }
        Ok(ColumnSlot {
            index,
            name: declared.name,
            unit: declared.unit,
            descriptor: requested,
        })
    }

    pub(crate) fn allocate<T: FitsValue>(
        &self,
        key: &ColumnKey,
        row_count: usize,
    ) -> FitsResult<Allocated<T>> {
        let slot = self.slot::<T>(key)?;
        let column = VecColumn::zeroed(slot.info(), row_count);
        Ok(Allocated { slot, column })
    }

    fn check_layout<T: FitsValue, D: AsRef<[T]>>(
        slot: &ColumnSlot,
        column: &Column<T, D>,
    ) -> FitsResult<()> {
        let expected = slot.descriptor.values_per_row();
        if column.values_per_row() != expected {
            return Err(FitsError::SizeMismatch(format!(
                "column {} has {} values per row in memory and {} in the table",
                slot.name,
                column.values_per_row(),
                expected
            )));
        }
        Ok(())
    }

    pub(crate) fn read_transfer<'c, T: FitsValue, D: AsRef<[T]> + AsMut<[T]>>(
        &self,
        key: &ColumnKey,
        column: &'c mut Column<T, D>,
    ) -> FitsResult<Box<dyn ChunkRead + 'c>> {
        let slot = self.slot::<T>(key)?;
        Self::check_layout(&slot, column)?;
        Ok(Box::new(ReadTransfer::new(slot, column.data_mut())))
    }

    pub(crate) fn write_transfer<'c, T: FitsValue, D: AsRef<[T]>>(
        &self,
        key: &ColumnKey,
        column: &'c Column<T, D>,
    ) -> FitsResult<Box<dyn ChunkWrite + 'c>> {
        let slot = self.slot::<T>(key)?;
        Self::check_layout(&slot, column)?;
        Ok(Box::new(WriteTransfer::new(slot, column.data())))
    }

    fn chunk_rows(&self) -> usize {
        CONFIG.chunk_rows(self.buffer_row_count())
    }

    /// Read every table row into columns which must have as many rows as the table.
    fn read_whole(&self, mut transfers: Vec<Box<dyn ChunkRead + '_>>) -> FitsResult<()> {
        let table_rows = self.row_count();
        let memory_rows = common_row_count(
            transfers
                .iter()
                .map(|transfer| (transfer.slot().name.as_str(), transfer.row_count())),
        )?;
        if !transfers.is_empty() && memory_rows != table_rows {
            return Err(FitsError::SizeMismatch(format!(
                "table has {} rows, columns have {}",
                table_rows, memory_rows
            )));
        }
        self.read_chunks(Segment::whole(table_rows), 0, &mut transfers)
    }

    fn read_segments(
        &self,
        segments: FileMemSegments,
        mut transfers: Vec<Box<dyn ChunkRead + '_>>,
    ) -> FitsResult<()> {
        let table_rows = self.row_count();
        let memory_rows = common_row_count(
            transfers
                .iter()
                .map(|transfer| (transfer.slot().name.as_str(), transfer.row_count())),
        )?;
        let (file, memory) = segments.resolve(table_rows as i64 - 1, memory_rows as i64 - 1)?;
        let file = file.resolve(table_rows)?;
        self.read_chunks(file, memory.front as usize, &mut transfers)
    }

    /// Read a resolved file segment, chunk by chunk, each chunk visiting every column.
    pub(crate) fn read_chunks(
        &self,
        file: Segment,
        memory_front: usize,
        transfers: &mut [Box<dyn ChunkRead + '_>],
    ) -> FitsResult<()> {
        if file.is_empty() || transfers.is_empty() {
            return Ok(());
        }
        let chunk_rows = self.chunk_rows();
        tracing::debug!(
            "Reading rows {} to {} of {} column(s) in chunks of {} rows",
            file.front,
            file.back,
            transfers.len(),
            chunk_rows
        );
        for chunk in file.chunks(chunk_rows) {
            let memory = memory_front + (chunk.front - file.front) as usize;
            tracing::trace!("Reading chunk {:?} into memory row {}", chunk, memory);
            for transfer in transfers.iter_mut() {
                transfer
                    .read_chunk(
                        &*self.backend,
                        chunk.front as usize,
                        memory,
                        chunk.size() as usize,
                    )
                    .io_context(|| {
                        format!(
                            "reading rows {} to {} of column {}",
                            chunk.front,
                            chunk.back,
                            transfer.slot().name
                        )
                    })?;
            }
        }
        Ok(())
    }

    /// Write columns of equal row counts into the rows mapped by `segments`, extending the
    /// table first if needed.
    fn write_chunks(
        &mut self,
        segments: FileMemSegments,
        transfers: &[Box<dyn ChunkWrite + '_>],
    ) -> FitsResult<()> {
        self.ensure_writable("write columns")?;
        let memory_rows = common_row_count(
            transfers
                .iter()
                .map(|transfer| (transfer.slot().name.as_str(), transfer.row_count())),
        )?;
        let to_memory_end = segments.file.front + memory_rows as i64 - segments.memory_front - 1;
        let (file, memory) = segments.resolve(to_memory_end, memory_rows as i64 - 1)?;
        if file.is_empty() || transfers.is_empty() {
            return Ok(());
        }
        let table_rows = self.row_count();
        if file.back >= table_rows as i64 {
            let row_count = file.back as usize + 1;
            tracing::debug!("Extending table from {} to {} rows", table_rows, row_count);
            self.backend
                .extend_rows(row_count)
                .io_context(|| format!("extending table to {} rows", row_count))?;
        }
        let chunk_rows = self.chunk_rows();
        tracing::debug!(
            "Writing rows {} to {} of {} column(s) in chunks of {} rows",
            file.front,
            file.back,
            transfers.len(),
            chunk_rows
        );
        for chunk in file.chunks(chunk_rows) {
            let memory_front = (memory.front + chunk.front - file.front) as usize;
            tracing::trace!("Writing chunk {:?} from memory row {}", chunk, memory_front);
            for transfer in transfers {
                transfer
                    .write_chunk(
                        &mut *self.backend,
                        chunk.front as usize,
                        memory_front,
                        chunk.size() as usize,
                    )
                    .io_context(|| {
                        format!(
                            "writing rows {} to {} of column {}",
                            chunk.front,
                            chunk.back,
                            transfer.slot().name
                        )
                    })?;
            }
        }
        Ok(())
    }
}
