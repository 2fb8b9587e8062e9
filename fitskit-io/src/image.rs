//! Raster access to image data units.

use fitskit_data::{position, FitsError, FitsResult, IoContext, Position, Raster, VecRaster};

use crate::backend::ImageBackend;
use crate::dispatch::scalar::{decode_values, encode_values};
use crate::dispatch::Primitive;

pub struct ImageRaster<'a> {
    backend: &'a mut dyn ImageBackend,
}

impl<'a> ImageRaster<'a> {
    pub fn new(backend: &'a mut dyn ImageBackend) -> Self {
        Self { backend }
    }

    /// Shape of the image, which must have the dimension of `P`.
    pub fn read_shape<P: Position>(&self) -> FitsResult<P> {
        P::from_slice(&self.backend.shape())
    }

    /// Number of pixels.
    pub fn read_size(&self) -> usize {
        position::shape_size(&self.backend.shape()) as usize
    }

    pub fn read_raster<T: Primitive, P: Position>(&self) -> FitsResult<VecRaster<T, P>> {
        self.check_type::<T>()?;
        let mut raster = VecRaster::<T, P>::zeroed(self.read_shape::<P>()?)?;
        self.read_to(&mut raster)?;
        Ok(raster)
    }

    /// Fill a raster of the image shape.
    pub fn read_to<T: Primitive, P: Position, D: AsRef<[T]> + AsMut<[T]>>(
        &self,
        raster: &mut Raster<T, P, D>,
    ) -> FitsResult<()> {
        self.check_type::<T>()?;
        self.check_shape(raster.shape().as_ref())?;
        let mut raw = vec![0u8; raster.size() * T::SCALAR.code().width];
        tracing::debug!("Reading image of shape {:?}", raster.shape());
        self.backend
            .read_raw(0, &mut raw)
            .io_context(|| format!("reading image of shape {:?}", raster.shape()))?;
        decode_values(&raw, raster.data_mut());
        Ok(())
    }

    /// Write a raster of the image shape and type.
    pub fn write<T: Primitive, P: Position, D: AsRef<[T]>>(
        &mut self,
        raster: &Raster<T, P, D>,
    ) -> FitsResult<()> {
        self.ensure_writable("write image")?;
        self.check_type::<T>()?;
        self.check_shape(raster.shape().as_ref())?;
        tracing::debug!("Writing image of shape {:?}", raster.shape());
        let raw = encode_values(raster.data());
        self.backend
            .write_raw(0, &raw)
            .io_context(|| format!("writing image of shape {:?}", raster.shape()))
    }

    /// Change the type and shape of the image, discarding its pixels.
    pub fn reinit<T: Primitive, P: Position>(&mut self, shape: &P) -> FitsResult<()> {
        self.ensure_writable("resize image")?;
        position::validate_shape(shape.as_ref())?;
        let code = T::SCALAR.code();
        tracing::debug!("Reinitializing image as {} of shape {:?}", code, shape);
        self.backend
            .reshape(code, shape.as_ref())
            .io_context(|| format!("reshaping image to {:?}", shape))
    }

    fn ensure_writable(&self, action: &str) -> FitsResult<()> {
        if !self.backend.is_writable() {
            return Err(FitsError::ReadOnly(action.to_string()));
        }
        Ok(())
    }

    fn check_type<T: Primitive>(&self) -> FitsResult<()> {
        let requested = T::SCALAR.code();
        let declared = self.backend.type_code();
        if requested != declared {
            return Err(FitsError::TypeMismatch {
                name: "image".to_string(),
                requested: requested.to_string(),
                declared: declared.to_string(),
            });
        }
        Ok(())
    }

    fn check_shape(&self, shape: &[i64]) -> FitsResult<()> {
        let declared = self.backend.shape();
        if declared != shape {
            return Err(FitsError::SizeMismatch(format!(
                "raster shape {:?} differs from image shape {:?}",
                shape, declared
            )));
        }
        Ok(())
    }
}
