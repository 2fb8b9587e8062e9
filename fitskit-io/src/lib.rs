//! Typed I/O for FITS data units.
//!
//! [`BintableColumns`] reads and writes binary table columns, whole or by row segment, one
//! at a time or several in a single pass. [`ImageRaster`] reads and writes image rasters.
//! Both run on top of a storage backend ([`backend`]); in-memory backends are provided.

pub mod backend;
pub mod bintable;
pub mod dispatch;
pub mod image;

pub use backend::{BintableBackend, ColumnDescriptor, ImageBackend, MemBintable, MemImage};
pub use bintable::{indexed, named, BintableColumns, ColumnKey, Indexed, Named};
pub use dispatch::{FitsValue, Primitive, ScalarType, TypeCode, TYPE_REGISTRY};
pub use image::ImageRaster;
