//! Heterogeneous column sequences.
//!
//! Tuples of selectors or columns are expanded into lists of type-erased transfers, so that a
//! single pass over the rows serves every column of the sequence.

use std::marker::PhantomData;

use fitskit_data::{Column, ColumnInfo, FitsResult, Segment, VecColumn};

use super::transfer::{ChunkRead, ChunkWrite};
use super::{BintableColumns, ColumnKey};
use crate::backend::ColumnDescriptor;
use crate::dispatch::FitsValue;

/// Selects a column and the type to read it as.
pub trait Selector {
    type Value: FitsValue;

    fn key(&self) -> ColumnKey;
}

/// Column selected by name.
#[derive(Debug, Clone, PartialEq)]
pub struct Named<T> {
    name: String,
    _value: PhantomData<T>,
}

impl<T> Named<T> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            _value: PhantomData,
        }
    }
}

impl<T: FitsValue> Selector for Named<T> {
    type Value = T;

    fn key(&self) -> ColumnKey {
        ColumnKey::Name(self.name.clone())
    }
}

/// Column selected by 0-based index.
#[derive(Debug, Clone, PartialEq)]
pub struct Indexed<T> {
    index: usize,
    _value: PhantomData<T>,
}

impl<T> Indexed<T> {
    pub fn new(index: usize) -> Self {
        Self {
            index,
            _value: PhantomData,
        }
    }
}

impl<T: FitsValue> Selector for Indexed<T> {
    type Value = T;

    fn key(&self) -> ColumnKey {
        ColumnKey::Index(self.index)
    }
}

pub fn named<T>(name: impl Into<String>) -> Named<T> {
    Named::new(name)
}

pub fn indexed<T>(index: usize) -> Indexed<T> {
    Indexed::new(index)
}

/// Tuples of selectors, read into a tuple of owned columns.
pub trait SeqSelectors {
    type Output;

    /// Read an already resolved row segment.
    fn read_from(self, engine: &BintableColumns<'_>, rows: Segment) -> FitsResult<Self::Output>;
}

/// Columns to be written in one pass.
pub trait SeqColumns<'c> {
    fn transfers(self, engine: &BintableColumns<'_>) -> FitsResult<Vec<Box<dyn ChunkWrite + 'c>>>;
}

/// Columns to be filled in one pass.
pub trait SeqColumnsMut<'c> {
    fn column_count(&self) -> usize;

    /// Transfers filling column `i` from the table column `keys[i]`, or from the table column
    /// of the same name when no keys are given.
    fn transfers(
        self,
        engine: &BintableColumns<'_>,
        keys: Option<&[ColumnKey]>,
    ) -> FitsResult<Vec<Box<dyn ChunkRead + 'c>>>;
}

/// Column metadata declared in one call.
pub trait SeqInfos {
    fn descriptors(self) -> Vec<ColumnDescriptor>;
}

fn name_key<T: FitsValue, D: AsRef<[T]>>(column: &Column<T, D>) -> ColumnKey {
    ColumnKey::Name(column.name().to_string())
}

fn next_key<T: FitsValue, D: AsRef<[T]>>(
    keys: &mut Option<std::slice::Iter<'_, ColumnKey>>,
    column: &Column<T, D>,
) -> ColumnKey {
    keys.as_mut()
        .and_then(Iterator::next)
        .cloned()
        .unwrap_or_else(|| name_key(column))
}

fn descriptor<T: FitsValue>(info: &ColumnInfo<T>) -> ColumnDescriptor {
    let described = T::describe(info.repeat_count);
    ColumnDescriptor::new(&info.name, &info.unit, described.code, described.repeat)
}

impl<'c, T: FitsValue, D: AsRef<[T]>> SeqColumns<'c> for &'c [Column<T, D>] {
    fn transfers(self, engine: &BintableColumns<'_>) -> FitsResult<Vec<Box<dyn ChunkWrite + 'c>>> {
        self.iter()
            .map(|column| engine.write_transfer(&name_key(column), column))
            .collect()
    }
}

impl<'c, T: FitsValue, D: AsRef<[T]>> SeqColumns<'c> for &'c Vec<Column<T, D>> {
    fn transfers(self, engine: &BintableColumns<'_>) -> FitsResult<Vec<Box<dyn ChunkWrite + 'c>>> {
        self.as_slice().transfers(engine)
    }
}

impl<'c, T: FitsValue, D: AsRef<[T]> + AsMut<[T]>> SeqColumnsMut<'c> for &'c mut [Column<T, D>] {
    fn column_count(&self) -> usize {
        self.len()
    }

    fn transfers(
        self,
        engine: &BintableColumns<'_>,
        keys: Option<&[ColumnKey]>,
    ) -> FitsResult<Vec<Box<dyn ChunkRead + 'c>>> {
        let mut keys = keys.map(|keys| keys.iter());
        self.iter_mut()
            .map(|column| {
                let key = next_key(&mut keys, column);
                engine.read_transfer(&key, column)
            })
            .collect()
    }
}

impl<'c, T: FitsValue, D: AsRef<[T]> + AsMut<[T]>> SeqColumnsMut<'c> for &'c mut Vec<Column<T, D>> {
    fn column_count(&self) -> usize {
        self.len()
    }

    fn transfers(
        self,
        engine: &BintableColumns<'_>,
        keys: Option<&[ColumnKey]>,
    ) -> FitsResult<Vec<Box<dyn ChunkRead + 'c>>> {
        self.as_mut_slice().transfers(engine, keys)
    }
}

impl<T: FitsValue> SeqInfos for &[ColumnInfo<T>] {
    fn descriptors(self) -> Vec<ColumnDescriptor> {
        self.iter().map(descriptor).collect()
    }
}

impl<T: FitsValue, const N: usize> SeqInfos for &[ColumnInfo<T>; N] {
    fn descriptors(self) -> Vec<ColumnDescriptor> {
        self.as_slice().descriptors()
    }
}

impl<T: FitsValue> SeqInfos for &Vec<ColumnInfo<T>> {
    fn descriptors(self) -> Vec<ColumnDescriptor> {
        self.as_slice().descriptors()
    }
}

macro_rules! impl_seq_tuple {
    ($($s:ident $t:ident $d:ident $v:ident),+) => {
        impl<$($s: Selector),+> SeqSelectors for ($($s,)+) {
            type Output = ($(VecColumn<<$s as Selector>::Value>,)+);

            fn read_from(
                self,
                engine: &BintableColumns<'_>,
                rows: Segment,
            ) -> FitsResult<Self::Output> {
                let ($($v,)+) = self;
                $(
                    let mut $v = engine
                        .allocate::<<$s as Selector>::Value>(&$v.key(), rows.size() as usize)?;
                )+
                {
                    let mut transfers = vec![$($v.transfer()),+];
                    engine.read_chunks(rows, 0, &mut transfers)?;
                }
                Ok(($($v.column,)+))
            }
        }

        impl<'c, $($t: FitsValue, $d: AsRef<[$t]>),+> SeqColumns<'c> for ($(&'c Column<$t, $d>,)+) {
            fn transfers(
                self,
                engine: &BintableColumns<'_>,
            ) -> FitsResult<Vec<Box<dyn ChunkWrite + 'c>>> {
                let ($($v,)+) = self;
                Ok(vec![$(engine.write_transfer(&name_key($v), $v)?),+])
            }
        }

        impl<'c, $($t: FitsValue, $d: AsRef<[$t]> + AsMut<[$t]>),+> SeqColumnsMut<'c>
            for ($(&'c mut Column<$t, $d>,)+)
        {
            fn column_count(&self) -> usize {
                [$(stringify!($v)),+].len()
            }

            fn transfers(
                self,
                engine: &BintableColumns<'_>,
                keys: Option<&[ColumnKey]>,
            ) -> FitsResult<Vec<Box<dyn ChunkRead + 'c>>> {
                let mut keys = keys.map(|keys| keys.iter());
                let ($($v,)+) = self;
                Ok(vec![$({
                    let key = next_key(&mut keys, $v);
                    engine.read_transfer(&key, $v)?
                }),+])
            }
        }

        impl<'i, $($t: FitsValue),+> SeqInfos for ($(&'i ColumnInfo<$t>,)+) {
            fn descriptors(self) -> Vec<ColumnDescriptor> {
                let ($($v,)+) = self;
                vec![$(descriptor($v)),+]
            }
        }
    };
}

impl_seq_tuple!(S1 T1 D1 c1);
impl_seq_tuple!(S1 T1 D1 c1, S2 T2 D2 c2);
impl_seq_tuple!(S1 T1 D1 c1, S2 T2 D2 c2, S3 T3 D3 c3);
impl_seq_tuple!(S1 T1 D1 c1, S2 T2 D2 c2, S3 T3 D3 c3, S4 T4 D4 c4);
impl_seq_tuple!(S1 T1 D1 c1, S2 T2 D2 c2, S3 T3 D3 c3, S4 T4 D4 c4, S5 T5 D5 c5);
impl_seq_tuple!(S1 T1 D1 c1, S2 T2 D2 c2, S3 T3 D3 c3, S4 T4 D4 c4, S5 T5 D5 c5, S6 T6 D6 c6);
