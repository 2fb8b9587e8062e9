use std::marker::PhantomData;
use std::ops::{Index, IndexMut};

use num_traits::ToPrimitive;

use crate::error::{FitsError, FitsResult};
use crate::position::{self, Position, PositionIter};

/// N-dimensional array stored as one linear buffer, first index fastest.
///
/// The buffer type `D` selects the ownership model:
/// - `Vec<T>` owns its data ([`VecRaster`]);
/// - `&mut [T]` is a mutable view over caller storage ([`PtrRaster`]);
/// - `&[T]` is a read-only view ([`ConstRaster`]).
///
/// The shape is fixed at construction and always matches the buffer length.
#[derive(Debug, Clone, PartialEq)]
pub struct Raster<T, P: Position = [i64; 2], D = Vec<T>> {
    shape: P,
    data: D,
    _value: PhantomData<T>,
}

pub type VecRaster<T, P = [i64; 2]> = Raster<T, P, Vec<T>>;
pub type PtrRaster<'a, T, P = [i64; 2]> = Raster<T, P, &'a mut [T]>;
pub type ConstRaster<'a, T, P = [i64; 2]> = Raster<T, P, &'a [T]>;

impl<T, P: Position, D: AsRef<[T]>> Raster<T, P, D> {
    /// Wrap a buffer with a shape.
    ///
    /// # Errors
    /// Returns [`FitsError::SizeMismatch`] if a length is negative, if the size overflows or if the buffer length is not
    /// the product of the shape.
    pub fn new(shape: P, data: D) -> FitsResult<Self> {
        let expected = position::validate_shape(shape.as_ref())?;
        if data.as_ref().len() as i64 != expected {
            return Err(FitsError::SizeMismatch(format!(
                "buffer length {} does not match shape {:?} (size {})",
                data.as_ref().len(),
                shape,
                expected
            )));
        }
        Ok(Self {
            shape,
            data,
            _value: PhantomData,
        })
    }

    pub fn shape(&self) -> &P {
        &self.shape
    }

    /// Number of axes.
    pub fn dimension(&self) -> usize {
        P::DIMENSION.unwrap_or_else(|| self.shape.dimension())
    }

    /// Number of elements.
    pub fn size(&self) -> usize {
        self.data.as_ref().len()
    }

    pub fn data(&self) -> &[T] {
        self.data.as_ref()
    }

    /// Offset of a position in the buffer, after resolving negative coordinates.
    pub fn offset_of(&self, position: &P) -> FitsResult<usize> {
        position::checked_index(&self.shape, position)
    }

    /// Bounds-checked element access, negative coordinates counting from the end.
    pub fn at(&self, position: &P) -> FitsResult<&T> {
        let offset = self.offset_of(position)?;
        Ok(&self.data.as_ref()[offset])
    }

    /// Iterate positions in storage order.
    pub fn positions(&self) -> PositionIter<P> {
        PositionIter::new(self.shape.clone())
    }

    pub fn as_const_raster(&self) -> ConstRaster<'_, T, P> {
        Raster {
            shape: self.shape.clone(),
            data: self.data.as_ref(),
            _value: PhantomData,
        }
    }

    /// Element-wise comparison with a relative tolerance.
    ///
    /// Each value `a` of `self` is tested against the reference `b` as `|a - b| <= tol * |b|`,
    /// or `|a| <= tol` when `b` is zero. Shapes must be equal.
    pub fn approx<E: AsRef<[T]>>(&self, reference: &Raster<T, P, E>, tol: f64) -> bool
    where
        T: ToPrimitive,
    {
        if self.shape != reference.shape {
            return false;
        }
        self.data()
            .iter()
            .zip(reference.data())
            .all(|(test, reference)| approx_value(test, reference, tol))
    }
}

pub(crate) fn approx_value<T: ToPrimitive>(test: &T, reference: &T, tol: f64) -> bool {
    match (test.to_f64(), reference.to_f64()) {
        (Some(test), Some(reference)) => {
            if test == reference {
                return true;
            }
            let diff = (test - reference).abs();
            if reference == 0.0 {
                diff <= tol
            } else {
                diff <= tol * reference.abs()
            }
        }
        _ => false,
    }
}

impl<T, P: Position, D: AsRef<[T]> + AsMut<[T]>> Raster<T, P, D> {
    pub fn data_mut(&mut self) -> &mut [T] {
        self.data.as_mut()
    }

    pub fn at_mut(&mut self, position: &P) -> FitsResult<&mut T> {
        let offset = self.offset_of(position)?;
        Ok(&mut self.data.as_mut()[offset])
    }

    pub fn as_ptr_raster(&mut self) -> PtrRaster<'_, T, P> {
        Raster {
            shape: self.shape.clone(),
            data: self.data.as_mut(),
            _value: PhantomData,
        }
    }
}

impl<T, P: Position> VecRaster<T, P> {
    /// Allocate a raster filled with default values.
    pub fn zeroed(shape: P) -> FitsResult<Self>
    where
        T: Default + Clone,
    {
        let size = position::validate_shape(shape.as_ref())? as usize;
        Self::new(shape, vec![T::default(); size])
    }

    /// Allocate a raster whose values are computed from their position.
    pub fn from_fn<F>(shape: P, mut f: F) -> FitsResult<Self>
    where
        F: FnMut(&P) -> T,
    {
        position::validate_shape(shape.as_ref())?;
        let data = PositionIter::new(shape.clone())
            .map(|position| f(&position))
            .collect::<Vec<_>>();
        Self::new(shape, data)
    }

    pub fn vector(&self) -> &Vec<T> {
        &self.data
    }

    pub fn into_vec(self) -> Vec<T> {
        self.data
    }
}

/// Unchecked subscript: coordinates must already be in `[0, shape[i])`.
impl<T, P: Position, D: AsRef<[T]>> Index<P> for Raster<T, P, D> {
    type Output = T;

    fn index(&self, position: P) -> &T {
        let offset = position::index(self.shape.as_ref(), position.as_ref());
        &self.data.as_ref()[offset as usize]
    }
}

impl<T, P: Position, D: AsRef<[T]> + AsMut<[T]>> IndexMut<P> for Raster<T, P, D> {
    fn index_mut(&mut self, position: P) -> &mut T {
        let offset = position::index(self.shape.as_ref(), position.as_ref());
        &mut self.data.as_mut()[offset as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern(position: &[i64; 2]) -> f32 {
        position[0] as f32 + 0.1 * position[1] as f32
    }

    #[test]
    fn small_raster_size() {
        let raster = VecRaster::<f32>::zeroed([3, 2]).unwrap();
        assert_eq!(raster.dimension(), 2);
        assert_eq!(raster.size(), 6);
        assert_eq!(raster.vector().len(), 6);
    }

    #[test]
    fn variable_dimension_raster_size() {
        let raster = VecRaster::<i32, Vec<i64>>::zeroed(vec![4, 3]).unwrap();
        assert_eq!(raster.dimension(), 2);
        assert_eq!(raster.size(), 12);
        assert_eq!(raster.vector().len(), 12);
    }

    #[test]
    fn subscript_bounds() {
        let (width, height) = (4i64, 3i64);
        let mut raster = VecRaster::<i32>::from_fn([width, height], |p| {
            (p[0] * 10 + p[1]) as i32
        })
        .unwrap();
        *raster.at_mut(&[1, -1]).unwrap() = 1;
        assert_eq!(*raster.at(&[1, -1]).unwrap(), 1);
        let vec = raster.vector().clone();
        assert_eq!(*raster.at(&[0, 0]).unwrap(), vec[0]);
        assert_eq!(*raster.at(&[-1, 0]).unwrap(), vec[(width - 1) as usize]);
        assert_eq!(*raster.at(&[-width, 0]).unwrap(), vec[0]);
        assert_eq!(
            *raster.at(&[0, -1]).unwrap(),
            vec[((height - 1) * width) as usize]
        );
        assert_eq!(
            *raster.at(&[-1, -1]).unwrap(),
            vec[(height * width - 1) as usize]
        );
        assert!(raster.at(&[width, 0]).is_err());
        assert!(raster.at(&[-1 - width, 0]).is_err());
        assert!(raster.at(&[0, height]).is_err());
        assert!(raster.at(&[0, -1 - height]).is_err());
    }

    #[test]
    fn unchecked_subscript_uses_first_index_fastest() {
        let mut raster = VecRaster::from_fn([16, 9], pattern).unwrap();
        assert_eq!(raster[[2, 1]], raster.data()[2 + 16]);
        raster[[15, 8]] = -1.0;
        assert_eq!(*raster.data().last().unwrap(), -1.0);
    }

    #[test]
    fn rasters_can_borrow_data() {
        let (width, height, depth) = (16i64, 9i64, 3i64);
        let mut data2 = vec![0i16; (width * height) as usize];
        let data3 = vec![0f32; (width * height * depth) as usize];
        let raster2: PtrRaster<i16> = Raster::new([width, height], data2.as_mut_slice()).unwrap();
        let const_raster3: ConstRaster<f32, [i64; 3]> =
            Raster::new([width, height, depth], data3.as_slice()).unwrap();
        let raster_dyn: ConstRaster<f32, Vec<i64>> =
            Raster::new(vec![width, height, depth], data3.as_slice()).unwrap();
        assert_eq!(raster2.dimension(), 2);
        assert_eq!(const_raster3.dimension(), 3);
        assert_eq!(raster_dyn.dimension(), 3);
    }

    #[test]
    fn ptr_raster_writes_through() {
        let mut data = vec![0u8; 6];
        {
            let mut view: PtrRaster<u8> = Raster::new([3, 2], data.as_mut_slice()).unwrap();
            *view.at_mut(&[-1, -1]).unwrap() = 7;
        }
        assert_eq!(data[5], 7);
    }

    #[test]
    fn shape_must_match_buffer() {
        assert!(matches!(
            VecRaster::new([3i64, 2], vec![0u8; 5]),
            Err(FitsError::SizeMismatch(_))
        ));
        assert!(VecRaster::<u8>::zeroed([-1, 2]).is_err());
        assert!(matches!(
            VecRaster::<u8>::new([1 << 32, 1 << 32], vec![]),
            Err(FitsError::SizeMismatch(_))
        ));
    }

    #[test]
    fn approx_uses_relative_tolerance() {
        let reference = VecRaster::from_fn([16, 9], pattern).unwrap();
        let mut test = reference.clone();
        assert!(test.approx(&reference, 0.0));
        test[[3, 3]] *= 1.005;
        assert!(test.approx(&reference, 0.01));
        assert!(!test.approx(&reference, 0.001));
        let other_shape = VecRaster::<f32>::zeroed([9, 16]).unwrap();
        assert!(!other_shape.approx(&reference, 1.0));
    }
}
