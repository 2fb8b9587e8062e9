//! N-dimensional addressing.
//!
//! A [`Position`] is either a fixed-size array `[i64; N]`, whose dimension is known at compile
//! time, or a `Vec<i64>`, whose dimension is only known at runtime. Both share the same
//! arithmetic: the first index varies fastest, i.e.
//! `offset = p[0] + s[0] * (p[1] + s[1] * (p[2] + ...))`.
//!
//! Negative coordinates are resolved Python-style (`-1` is the last element along an axis)
//! each time a position is used; resolved coordinates must lie in `[0, shape[i])`.

use std::fmt::Debug;

use crate::error::{FitsError, FitsResult};

/// Dimension value of variable-dimension positions.
pub const VARIABLE_DIMENSION: Option<usize> = None;

/// A list of coordinates or lengths.
pub trait Position: Clone + Debug + PartialEq + AsRef<[i64]> + AsMut<[i64]> {
    /// Number of axes, or [`VARIABLE_DIMENSION`] if only known at runtime.
    const DIMENSION: Option<usize>;

    /// Build a position from a slice of coordinates.
    ///
    /// # Errors
    /// Returns [`FitsError::SizeMismatch`] if the slice length differs from a fixed dimension.
    fn from_slice(values: &[i64]) -> FitsResult<Self>;

    /// Number of axes of this instance.
    fn dimension(&self) -> usize {
        self.as_ref().len()
    }

    /// A position of the same dimension with all coordinates set to 0.
    fn zeros_like(&self) -> Self {
        let mut zeros = self.clone();
        zeros.as_mut().fill(0);
        zeros
    }
}

impl<const N: usize> Position for [i64; N] {
    const DIMENSION: Option<usize> = Some(N);

    fn from_slice(values: &[i64]) -> FitsResult<Self> {
        values.try_into().map_err(|_| {
            FitsError::SizeMismatch(format!(
                "expected {} coordinates, got {}",
                N,
                values.len()
            ))
        })
    }
}

impl Position for Vec<i64> {
    const DIMENSION: Option<usize> = VARIABLE_DIMENSION;

    fn from_slice(values: &[i64]) -> FitsResult<Self> {
        Ok(values.to_vec())
    }
}

/// Linear offset of an already resolved position.
///
/// For fixed-size arrays the loop bound is a compile-time constant and gets unrolled.
#[inline]
pub fn index(shape: &[i64], position: &[i64]) -> i64 {
    position
        .iter()
        .zip(shape)
        .rev()
        .fold(0, |acc, (&coord, &length)| coord + length * acc)
}

/// Number of elements described by a shape already checked by [`validate_shape`].
pub fn shape_size(shape: &[i64]) -> i64 {
    shape.iter().product()
}

/// Check that every length of a shape is non-negative and that the number of elements fits
/// in an `i64`, returning that number.
pub fn validate_shape(shape: &[i64]) -> FitsResult<i64> {
    if let Some(length) = shape.iter().find(|length| **length < 0) {
        return Err(FitsError::SizeMismatch(format!(
            "shape {:?} has a negative length: {}",
            shape, length
        )));
    }
    shape
        .iter()
        .try_fold(1i64, |size, length| size.checked_mul(*length))
        .ok_or_else(|| {
            FitsError::SizeMismatch(format!("shape {:?} has too many elements", shape))
        })
}

/// Resolve negative coordinates and check bounds.
pub fn resolve<P: Position>(shape: &P, position: &P) -> FitsResult<P> {
    let lengths = shape.as_ref();
    if lengths.len() != position.dimension() {
        return Err(FitsError::SizeMismatch(format!(
            "position {:?} does not match shape {:?}",
            position, shape
        )));
    }
    let mut resolved = position.clone();
    for (axis, (coord, &length)) in resolved.as_mut().iter_mut().zip(lengths).enumerate() {
        let given = *coord;
        if given < 0 {
            *coord += length;
        }
        if *coord < 0 || *coord >= length {
            return Err(FitsError::out_of_bounds(
                format!("Coordinate {}", axis),
                given,
                -length,
                length - 1,
            ));
        }
    }
    Ok(resolved)
}

/// Resolve a single coordinate along an axis of `length` elements.
pub fn resolve_coordinate(what: &str, given: i64, length: i64) -> FitsResult<i64> {
    let resolved = if given < 0 { given + length } else { given };
    if resolved < 0 || resolved >= length {
        return Err(FitsError::out_of_bounds(what, given, -length, length - 1));
    }
    Ok(resolved)
}

/// Resolve a position and compute its offset.
pub fn checked_index<P: Position>(shape: &P, position: &P) -> FitsResult<usize> {
    let resolved = resolve(shape, position)?;
    Ok(index(shape.as_ref(), resolved.as_ref()) as usize)
}

/// Iterator over every position of a shape, in storage order.
#[derive(Debug, Clone)]
pub struct PositionIter<P: Position> {
    shape: P,
    current: Option<P>,
}

impl<P: Position> PositionIter<P> {
    pub fn new(shape: P) -> Self {
        let current = if matches!(validate_shape(shape.as_ref()), Ok(size) if size > 0) {
            Some(shape.zeros_like())
        } else {
            None
        };
        Self { shape, current }
    }
}

impl<P: Position> Iterator for PositionIter<P> {
    type Item = P;

    fn next(&mut self) -> Option<P> {
        let current = self.current.take()?;
        let mut next = current.clone();
        let mut carried = true;
        for (coord, &length) in next.as_mut().iter_mut().zip(self.shape.as_ref()) {
            *coord += 1;
            if *coord < length {
                carried = false;
                break;
            }
            *coord = 0;
        }
        if !carried {
            self.current = Some(next);
        }
        Some(current)
    }
}
