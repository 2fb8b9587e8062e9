//! Typed containers for the data units of FITS files: N-dimensional rasters, binary table
//! columns and the row segments used to transfer parts of them.

pub mod column;
pub mod error;
pub mod position;
pub mod raster;
pub mod segment;

pub use column::{
    Column, ColumnElement, ColumnInfo, ConstColumn, PtrColumn, VecColumn, VARIABLE_REPEAT_COUNT,
};
pub use error::{FitsError, FitsResult, IoContext};
pub use position::{Position, PositionIter, VARIABLE_DIMENSION};
pub use raster::{ConstRaster, PtrRaster, Raster, VecRaster};
pub use segment::{FileMemSegments, Segment};
