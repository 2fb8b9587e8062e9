//! Type dispatch.
//!
//! Maps each logical element type to its on-disk [`TypeCode`] and to one of four transfer
//! strategies ([`Capability`]):
//! - plain scalars and fixed-length vectors are moved with one bulk transfer per chunk
//!   ([`scalar`]);
//! - text columns are moved as fixed-width character blocks and decoded row-wise ([`text`]);
//! - variable-length arrays are read row by row from the heap into owned row buffers
//!   ([`variable`]).
//!
//! The strategy is selected once per call from the requested Rust type, never per row.

pub mod scalar;
pub mod text;
pub mod variable;

use std::collections::HashMap;
use std::fmt;

use bytes::{Buf, BufMut, BytesMut};
use fitskit_data::{ColumnElement, ColumnInfo, VARIABLE_REPEAT_COUNT};
use lazy_static::lazy_static;

use crate::backend::BintableBackend;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarType {
    Bool,
    U8,
    I8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
}

impl ScalarType {
    pub const ALL: [ScalarType; 11] = [
        ScalarType::Bool,
        ScalarType::U8,
        ScalarType::I8,
        ScalarType::I16,
        ScalarType::U16,
        ScalarType::I32,
        ScalarType::U32,
        ScalarType::I64,
        ScalarType::U64,
        ScalarType::F32,
        ScalarType::F64,
    ];

    /// On-disk code of the type.
    ///
    /// Types without a native FITS representation are stored in the type of the same width
    /// and opposite signedness, with the sign bit flipped.
    pub const fn code(self) -> TypeCode {
        match self {
            ScalarType::Bool => TypeCode::new('L', 1, false),
            ScalarType::U8 => TypeCode::new('B', 1, false),
            ScalarType::I8 => TypeCode::new('B', 1, true),
            ScalarType::I16 => TypeCode::new('I', 2, false),
            ScalarType::U16 => TypeCode::new('I', 2, true),
            ScalarType::I32 => TypeCode::new('J', 4, false),
            ScalarType::U32 => TypeCode::new('J', 4, true),
            ScalarType::I64 => TypeCode::new('K', 8, false),
            ScalarType::U64 => TypeCode::new('K', 8, true),
            ScalarType::F32 => TypeCode::new('E', 4, false),
            ScalarType::F64 => TypeCode::new('D', 8, false),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicalType {
    Scalar(ScalarType),
    Text,
    VarArray(ScalarType),
}

/// Code of the values as stored in a data unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeCode {
    /// TFORM letter of one stored element.
    pub letter: char,
    /// Byte width of one stored element.
    pub width: usize,
    /// Whether the sign bit of stored values is flipped.
    pub offset: bool,
    /// Whether values live in the heap and the row only holds a `P` descriptor.
    pub variable: bool,
}

pub const TEXT_CODE: TypeCode = TypeCode::new('A', 1, false);

/// Byte width of a `P` descriptor: element count and heap offset, both 32-bit.
pub const DESCRIPTOR_WIDTH: usize = 8;

impl TypeCode {
    pub const fn new(letter: char, width: usize, offset: bool) -> Self {
        Self {
            letter,
            width,
            offset,
            variable: false,
        }
    }

    pub const fn to_variable(self) -> Self {
        Self {
            variable: true,
            ..self
        }
    }

    /// TFORM value for a column of `repeat` values, e.g. `3E`, `8A` or `1PJ`.
    pub fn tform(&self, repeat: usize) -> String {
        if self.variable {
            format!("1P{}", self.letter)
        } else {
            format!("{}{}", repeat, self.letter)
        }
    }

    /// TFORM value, flagged when values are stored with an offset.
    pub fn label(&self, repeat: usize) -> String {
        if self.offset {
            format!("{} (offset)", self.tform(repeat))
        } else {
            self.tform(repeat)
        }
    }

    /// Bytes occupied in a row by a field of `repeat` values.
    pub fn field_width(&self, repeat: usize) -> usize {
        if self.variable {
            DESCRIPTOR_WIDTH
        } else {
            repeat * self.width
        }
    }

    /// BITPIX of an image of this type, if images can hold it.
    pub fn bitpix(&self) -> Option<i64> {
        if self.variable {
            return None;
        }
        match self.letter {
            'B' => Some(8),
            'I' => Some(16),
            'J' => Some(32),
            'K' => Some(64),
            'E' => Some(-32),
            'D' => Some(-64),
            _ => None,
        }
    }
}

impl fmt::Display for TypeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.variable {
            write!(f, "P")?;
        }
        write!(f, "{}", self.letter)?;
        if self.offset {
            write!(f, " (offset)")?;
        }
        Ok(())
    }
}

/// Transfer strategy of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    Scalar,
    FixedVector,
    VariableVector,
    Text,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeDescriptor {
    pub logical: LogicalType,
    pub capability: Capability,
    pub code: TypeCode,
    pub repeat: usize,
}

impl TypeDescriptor {
    pub fn field_width(&self) -> usize {
        self.code.field_width(self.repeat)
    }

    /// Number of Rust values per row.
    pub fn values_per_row(&self) -> usize {
        match self.capability {
            Capability::FixedVector => self.repeat,
            Capability::Scalar | Capability::VariableVector | Capability::Text => 1,
        }
    }

    pub fn tform(&self) -> String {
        self.code.tform(self.repeat)
    }
}

/// Process-wide table of logical types and their codes.
#[derive(Debug)]
pub struct TypeRegistry {
    codes: HashMap<LogicalType, TypeCode>,
    logicals: HashMap<TypeCode, LogicalType>,
}

impl TypeRegistry {
    fn new() -> Self {
        let mut codes = HashMap::new();
        codes.insert(LogicalType::Text, TEXT_CODE);
        for scalar in ScalarType::ALL {
            codes.insert(LogicalType::Scalar(scalar), scalar.code());
            codes.insert(LogicalType::VarArray(scalar), scalar.code().to_variable());
        }
        let logicals = codes.iter().map(|(logical, code)| (*code, *logical)).collect();
        Self { codes, logicals }
    }

    /// Code of a logical type; every logical type is registered.
    pub fn code(&self, logical: LogicalType) -> TypeCode {
        self.codes[&logical]
    }

    /// Logical type stored with a given code.
    pub fn logical(&self, code: TypeCode) -> Option<LogicalType> {
        self.logicals.get(&code).copied()
    }

    /// Describe a column of `logical` values with the given repeat count.
    pub fn describe(&self, logical: LogicalType, repeat: usize) -> TypeDescriptor {
        let code = self.code(logical);
        let (capability, repeat) = match logical {
            LogicalType::Scalar(_) if repeat <= 1 => (Capability::Scalar, 1),
            LogicalType::Scalar(_) => (Capability::FixedVector, repeat),
            LogicalType::Text => (Capability::Text, repeat),
            LogicalType::VarArray(_) => (Capability::VariableVector, VARIABLE_REPEAT_COUNT),
        };
        TypeDescriptor {
            logical,
            capability,
            code,
            repeat,
        }
    }
}

lazy_static! {
    pub static ref TYPE_REGISTRY: TypeRegistry = TypeRegistry::new();
}

/// A column resolved for one call: its position, name and descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSlot {
    pub index: usize,
    pub name: String,
    pub unit: String,
    pub descriptor: TypeDescriptor,
}

impl ColumnSlot {
    pub fn info<T>(&self) -> ColumnInfo<T> {
        ColumnInfo::new(self.name.clone(), self.unit.clone(), self.descriptor.repeat)
    }
}

/// Numeric and logical values, with their big-endian codec.
pub trait Primitive: ColumnElement + Copy + Default + PartialEq + fmt::Debug + 'static {
    const SCALAR: ScalarType;

    fn get(buf: &mut &[u8]) -> Self;

    fn put(self, buf: &mut BytesMut);
}

macro_rules! impl_primitive {
    ($t:ty, $scalar:ident, $get:ident, $put:ident) => {
        impl Primitive for $t {
            const SCALAR: ScalarType = ScalarType::$scalar;

            fn get(buf: &mut &[u8]) -> Self {
                buf.$get()
            }

            fn put(self, buf: &mut BytesMut) {
                buf.$put(self)
            }
        }
    };
}

macro_rules! impl_offset_primitive {
    ($t:ty, $scalar:ident, $get:ident, $put:ident, $sign_bit:expr) => {
        impl Primitive for $t {
            const SCALAR: ScalarType = ScalarType::$scalar;

            fn get(buf: &mut &[u8]) -> Self {
                buf.$get() ^ $sign_bit
            }

            fn put(self, buf: &mut BytesMut) {
                buf.$put(self ^ $sign_bit)
            }
        }
    };
}

impl_primitive!(u8, U8, get_u8, put_u8);
impl_primitive!(i16, I16, get_i16, put_i16);
impl_primitive!(i32, I32, get_i32, put_i32);
impl_primitive!(i64, I64, get_i64, put_i64);
impl_primitive!(f32, F32, get_f32, put_f32);
impl_primitive!(f64, F64, get_f64, put_f64);
impl_offset_primitive!(u16, U16, get_u16, put_u16, 0x8000);
impl_offset_primitive!(u32, U32, get_u32, put_u32, 0x8000_0000);
impl_offset_primitive!(u64, U64, get_u64, put_u64, 0x8000_0000_0000_0000);

impl Primitive for i8 {
    const SCALAR: ScalarType = ScalarType::I8;

    fn get(buf: &mut &[u8]) -> Self {
        (buf.get_u8() ^ 0x80) as i8
    }

    fn put(self, buf: &mut BytesMut) {
        buf.put_u8((self as u8) ^ 0x80)
    }
}

impl Primitive for bool {
    const SCALAR: ScalarType = ScalarType::Bool;

    /// `T` is true; `F` and the null byte are false.
    fn get(buf: &mut &[u8]) -> Self {
        buf.get_u8() == b'T'
    }

    fn put(self, buf: &mut BytesMut) {
        buf.put_u8(if self { b'T' } else { b'F' })
    }
}

/// Values which can be transferred between a table column and memory.
pub trait FitsValue: ColumnElement + Default + Clone + fmt::Debug + 'static {
    const LOGICAL: LogicalType;

    fn describe(repeat: usize) -> TypeDescriptor {
        TYPE_REGISTRY.describe(Self::LOGICAL, repeat)
    }

    /// Fill `out` with consecutive rows starting at `first_row`.
    ///
    /// `out` holds a whole number of rows, as given by [`TypeDescriptor::values_per_row`].
    fn read_rows(
        backend: &dyn BintableBackend,
        column: &ColumnSlot,
        first_row: usize,
        out: &mut [Self],
    ) -> anyhow::Result<()>;

    fn write_rows(
        backend: &mut dyn BintableBackend,
        column: &ColumnSlot,
        first_row: usize,
        values: &[Self],
    ) -> anyhow::Result<()>;
}

impl<P: Primitive> FitsValue for P {
    const LOGICAL: LogicalType = LogicalType::Scalar(P::SCALAR);

    fn read_rows(
        backend: &dyn BintableBackend,
        column: &ColumnSlot,
        first_row: usize,
        out: &mut [Self],
    ) -> anyhow::Result<()> {
        scalar::read_rows(backend, column, first_row, out)
    }

    fn write_rows(
        backend: &mut dyn BintableBackend,
        column: &ColumnSlot,
        first_row: usize,
        values: &[Self],
    ) -> anyhow::Result<()> {
        scalar::write_rows(backend, column, first_row, values)
    }
}

impl FitsValue for String {
    const LOGICAL: LogicalType = LogicalType::Text;

    fn read_rows(
        backend: &dyn BintableBackend,
        column: &ColumnSlot,
        first_row: usize,
        out: &mut [Self],
    ) -> anyhow::Result<()> {
        text::read_rows(backend, column, first_row, out)
    }

    fn write_rows(
        backend: &mut dyn BintableBackend,
        column: &ColumnSlot,
        first_row: usize,
        values: &[Self],
    ) -> anyhow::Result<()> {
        text::write_rows(backend, column, first_row, values)
    }
}

impl<P: Primitive> FitsValue for Vec<P> {
    const LOGICAL: LogicalType = LogicalType::VarArray(P::SCALAR);

    fn read_rows(
        backend: &dyn BintableBackend,
        column: &ColumnSlot,
        first_row: usize,
        out: &mut [Self],
    ) -> anyhow::Result<()> {
        variable::read_rows(backend, column, first_row, out)
    }

    fn write_rows(
        backend: &mut dyn BintableBackend,
        column: &ColumnSlot,
        first_row: usize,
        values: &[Self],
    ) -> anyhow::Result<()> {
        variable::write_rows(backend, column, first_row, values)
    }
}
