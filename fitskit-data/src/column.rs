use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

use serde::{Deserialize, Serialize};

use crate::error::{FitsError, FitsResult};
use crate::position::resolve_coordinate;

/// Repeat count of variable-length columns.
pub const VARIABLE_REPEAT_COUNT: usize = 0;

/// Values which can be stored in a [`Column`].
pub trait ColumnElement {
    /// Whether one value fills a whole row (text, variable-length arrays)
    /// instead of one of the `repeat_count` slots of a row.
    const ROW_VALUE: bool = false;

    /// Number of buffer values per row for a given repeat count.
    fn values_per_row(repeat_count: usize) -> usize {
        if Self::ROW_VALUE {
            1
        } else {
            repeat_count.max(1)
        }
    }
}

macro_rules! impl_slot_element {
    ($($t:ty),*) => {
        $(impl ColumnElement for $t {})*
    };
}

impl_slot_element!(bool, u8, i8, i16, u16, i32, u32, i64, u64, f32, f64);

impl ColumnElement for String {
    const ROW_VALUE: bool = true;
}

impl<T> ColumnElement for Vec<T> {
    const ROW_VALUE: bool = true;
}

/// Column metadata.
///
/// For numeric columns, `repeat_count` is the number of values per row (1 for scalars).
/// For text columns it is the maximum number of characters per row, and for variable-length
/// columns it is [`VARIABLE_REPEAT_COUNT`].
#[derive(Serialize, Deserialize)]
pub struct ColumnInfo<T> {
    pub name: String,
    pub unit: String,
    pub repeat_count: usize,
    #[serde(skip)]
    _value: PhantomData<T>,
}

impl<T> ColumnInfo<T> {
    pub fn new(name: impl Into<String>, unit: impl Into<String>, repeat_count: usize) -> Self {
        Self {
            name: name.into(),
            unit: unit.into(),
            repeat_count,
            _value: PhantomData,
        }
    }

    /// Info of a variable-length column.
    pub fn variable(name: impl Into<String>, unit: impl Into<String>) -> Self {
        Self::new(name, unit, VARIABLE_REPEAT_COUNT)
    }

    pub fn is_variable(&self) -> bool {
        self.repeat_count == VARIABLE_REPEAT_COUNT
    }
}

// No bounds on `T`: it only tags the value type.
impl<T> Clone for ColumnInfo<T> {
    fn clone(&self) -> Self {
        Self::new(self.name.clone(), self.unit.clone(), self.repeat_count)
    }
}

impl<T> PartialEq for ColumnInfo<T> {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.unit == other.unit
            && self.repeat_count == other.repeat_count
    }
}

impl<T> Eq for ColumnInfo<T> {}

impl<T> Hash for ColumnInfo<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.unit.hash(state);
        self.repeat_count.hash(state);
    }
}

impl<T> fmt::Debug for ColumnInfo<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ColumnInfo")
            .field("name", &self.name)
            .field("unit", &self.unit)
            .field("repeat_count", &self.repeat_count)
            .finish()
    }
}

/// Named column of a binary table, stored contiguously row after row.
///
/// As for rasters, the buffer type `D` selects the ownership model: [`VecColumn`] owns its
/// values, [`PtrColumn`] and [`ConstColumn`] are views over caller storage.
#[derive(Debug, Clone, PartialEq)]
pub struct Column<T, D = Vec<T>> {
    info: ColumnInfo<T>,
    data: D,
}

pub type VecColumn<T> = Column<T, Vec<T>>;
pub type PtrColumn<'a, T> = Column<T, &'a mut [T]>;
pub type ConstColumn<'a, T> = Column<T, &'a [T]>;

impl<T: ColumnElement, D: AsRef<[T]>> Column<T, D> {
    /// Wrap a buffer with column metadata.
    ///
    /// # Errors
    /// Returns [`FitsError::SizeMismatch`] if the buffer does not hold a whole number of rows.
    pub fn new(info: ColumnInfo<T>, data: D) -> FitsResult<Self> {
        let per_row = T::values_per_row(info.repeat_count);
        let len = data.as_ref().len();
        if len % per_row != 0 {
            return Err(FitsError::SizeMismatch(format!(
                "column {}: buffer length {} is not a multiple of {} values per row",
                info.name, len, per_row
            )));
        }
        Ok(Self { info, data })
    }

    pub fn info(&self) -> &ColumnInfo<T> {
        &self.info
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }

    pub fn rename(&mut self, name: impl Into<String>) {
        self.info.name = name.into();
    }

    pub fn set_unit(&mut self, unit: impl Into<String>) {
        self.info.unit = unit.into();
    }

    pub fn values_per_row(&self) -> usize {
        T::values_per_row(self.info.repeat_count)
    }

    pub fn row_count(&self) -> usize {
        self.data.as_ref().len() / self.values_per_row()
    }

    /// Number of elements, counted in rows.
    pub fn element_count(&self) -> usize {
        self.row_count()
    }

    /// Length of the underlying buffer.
    pub fn value_count(&self) -> usize {
        self.data.as_ref().len()
    }

    pub fn data(&self) -> &[T] {
        self.data.as_ref()
    }

    fn offset_of(&self, row: i64, repeat: i64) -> FitsResult<usize> {
        let per_row = self.values_per_row() as i64;
        let row = resolve_coordinate("Row", row, self.row_count() as i64)?;
        let repeat = resolve_coordinate("Repeat index", repeat, per_row)?;
        Ok((row * per_row + repeat) as usize)
    }

    /// Values of one row, negative indices counting from the end.
    pub fn row(&self, row: i64) -> FitsResult<&[T]> {
        let first = self.offset_of(row, 0)?;
        Ok(&self.data.as_ref()[first..first + self.values_per_row()])
    }

    /// Bounds-checked access to one value, negative indices counting from the end.
    pub fn at(&self, row: i64, repeat: i64) -> FitsResult<&T> {
        let offset = self.offset_of(row, repeat)?;
        Ok(&self.data.as_ref()[offset])
    }

    pub fn as_const_column(&self) -> ConstColumn<'_, T> {
        Column {
            info: self.info.clone(),
            data: self.data.as_ref(),
        }
    }
}

impl<T: ColumnElement, D: AsRef<[T]> + AsMut<[T]>> Column<T, D> {
    pub fn data_mut(&mut self) -> &mut [T] {
        self.data.as_mut()
    }

    pub fn row_mut(&mut self, row: i64) -> FitsResult<&mut [T]> {
        let first = self.offset_of(row, 0)?;
        let per_row = self.values_per_row();
        Ok(&mut self.data.as_mut()[first..first + per_row])
    }

    pub fn at_mut(&mut self, row: i64, repeat: i64) -> FitsResult<&mut T> {
        let offset = self.offset_of(row, repeat)?;
        Ok(&mut self.data.as_mut()[offset])
    }

    pub fn as_ptr_column(&mut self) -> PtrColumn<'_, T> {
        Column {
            info: self.info.clone(),
            data: self.data.as_mut(),
        }
    }
}

impl<T: ColumnElement> VecColumn<T> {
    /// Allocate `row_count` rows of default values.
    pub fn zeroed(info: ColumnInfo<T>, row_count: usize) -> Self
    where
        T: Default + Clone,
    {
        let len = row_count * T::values_per_row(info.repeat_count);
        Self {
            info,
            data: vec![T::default(); len],
        }
    }

    pub fn vector(&self) -> &Vec<T> {
        &self.data
    }

    /// Move the values out, leaving the column empty.
    pub fn take(&mut self) -> Vec<T> {
        std::mem::take(&mut self.data)
    }

    /// Move the values into `destination`, leaving the column empty.
    pub fn move_to(&mut self, destination: &mut Vec<T>) {
        *destination = self.take();
    }

    pub fn into_parts(self) -> (ColumnInfo<T>, Vec<T>) {
        (self.info, self.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_data_can_be_shared() {
        let mut input = vec![1, 2, 3];
        {
            let mut column: PtrColumn<i32> =
                Column::new(ColumnInfo::new("SHARED", "", 1), input.as_mut_slice()).unwrap();
            assert_eq!(column.data()[1], 2);
            column.data_mut()[1] = 4;
        }
        assert_eq!(input[1], 4);
    }

    #[test]
    fn column_data_can_be_moved() {
        let mut input = vec![4, 5, 6];
        let mut column = VecColumn::new(ColumnInfo::<i32>::new("DATA", "", 1), std::mem::take(&mut input)).unwrap();
        assert_eq!(column.vector()[1], 5);
        assert!(input.is_empty());
        column.move_to(&mut input);
        assert_eq!(input[1], 5);
        assert!(column.vector().is_empty());
        assert_eq!(column.row_count(), 0);
        assert_eq!(column.element_count(), 0);
    }

    #[test]
    fn subscript_bounds() {
        let (row_count, repeat_count) = (10i64, 3i64);
        let values = (0..(row_count * repeat_count) as i32).collect::<Vec<_>>();
        let mut column =
            VecColumn::new(ColumnInfo::new("VEC", "", repeat_count as usize), values).unwrap();
        *column.at_mut(1, -1).unwrap() = 1;
        assert_eq!(*column.at(1, -1).unwrap(), 1);
        let vec = column.vector().clone();
        assert_eq!(*column.at(0, 0).unwrap(), vec[0]);
        assert_eq!(
            *column.at(-1, 0).unwrap(),
            vec[((row_count - 1) * repeat_count) as usize]
        );
        assert_eq!(*column.at(-row_count, 0).unwrap(), vec[0]);
        assert_eq!(*column.at(0, -1).unwrap(), vec[(repeat_count - 1) as usize]);
        assert_eq!(
            *column.at(-1, -1).unwrap(),
            vec[(row_count * repeat_count - 1) as usize]
        );
        assert!(column.at(row_count, 0).is_err());
        assert!(column.at(-1 - row_count, 0).is_err());
        assert!(column.at(0, repeat_count).is_err());
        assert!(column.at(0, -1 - repeat_count).is_err());
        assert_eq!(column.row(2).unwrap(), &vec[6..9]);
    }

    #[test]
    fn string_column_element_count_is_row_count() {
        let (row_count, repeat_count) = (17usize, 7usize);
        let mut vec_column =
            VecColumn::<String>::zeroed(ColumnInfo::new("STR", "", repeat_count), row_count);
        assert_eq!(vec_column.info().repeat_count, repeat_count);
        assert_eq!(vec_column.row_count(), row_count);
        assert_eq!(vec_column.element_count(), row_count);

        let ptr_column = vec_column.as_ptr_column();
        assert_eq!(ptr_column.info().repeat_count, repeat_count);
        assert_eq!(ptr_column.row_count(), row_count);
        assert_eq!(ptr_column.element_count(), row_count);

        let const_column = vec_column.as_const_column();
        assert_eq!(const_column.row_count(), row_count);
        assert_eq!(const_column.element_count(), row_count);
    }

    #[test]
    fn variable_length_rows_are_single_values() {
        let rows = vec![vec![1.0f64], vec![], vec![2.0, 3.0, 4.0]];
        let column = VecColumn::new(ColumnInfo::variable("VAR", "m"), rows).unwrap();
        assert!(column.info().is_variable());
        assert_eq!(column.row_count(), 3);
        assert_eq!(column.at(-1, 0).unwrap().len(), 3);
        assert!(column.at(0, 1).is_err());
    }

    #[test]
    fn buffer_must_hold_whole_rows() {
        let result = VecColumn::new(ColumnInfo::<f32>::new("RADEC", "deg", 2), vec![0.0; 5]);
        assert!(matches!(result, Err(FitsError::SizeMismatch(_))));
    }

    #[test]
    fn column_info_is_serializable() {
        let info = ColumnInfo::<f64>::new("FLUX", "erg/s", 4);
        let json = serde_json::to_string(&info).unwrap();
        assert_eq!(json, r#"{"name":"FLUX","unit":"erg/s","repeat_count":4}"#);
        let back: ColumnInfo<f64> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, info);
    }

    /// Value type with none of the standard traits.
    struct Opaque;

    impl ColumnElement for Opaque {}

    #[test]
    fn views_do_not_require_value_traits() {
        let info = ColumnInfo::<Opaque>::new("OPAQUE", "", 2);
        assert_eq!(info.clone(), info);
        assert!(format!("{:?}", info).contains("OPAQUE"));
        let mut column = VecColumn::new(info, vec![Opaque, Opaque, Opaque, Opaque]).unwrap();
        assert_eq!(column.as_const_column().row_count(), 2);
        assert_eq!(column.as_ptr_column().info().name, "OPAQUE");
    }
}
