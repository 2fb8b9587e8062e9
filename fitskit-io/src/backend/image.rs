use fitskit_data::position;

use crate::backend::ImageBackend;
use crate::dispatch::TypeCode;

/// Image held in memory as big-endian values, first axis fastest.
#[derive(Debug, Clone)]
pub struct MemImage {
    code: TypeCode,
    shape: Vec<i64>,
    data: Vec<u8>,
    writable: bool,
}

impl MemImage {
    /// Zero-filled writable image.
    pub fn new(code: TypeCode, shape: &[i64]) -> anyhow::Result<Self> {
        let mut image = Self {
            code,
            shape: Vec::new(),
            data: Vec::new(),
            writable: true,
        };
        image.reshape(code, shape)?;
        Ok(image)
    }

    pub fn read_only(mut self) -> Self {
        self.writable = false;
        self
    }

    fn byte_range(&self, first: usize, byte_count: usize) -> anyhow::Result<std::ops::Range<usize>> {
        let start = first * self.code.width;
        if byte_count % self.code.width != 0 || start + byte_count > self.data.len() {
            anyhow::bail!(
                "Cannot access {} bytes from element {} of an image of {} bytes",
                byte_count,
                first,
                self.data.len()
            );
        }
        Ok(start..start + byte_count)
    }
}

impl ImageBackend for MemImage {
    fn is_writable(&self) -> bool {
        self.writable
    }

    fn type_code(&self) -> TypeCode {
        self.code
    }

    fn shape(&self) -> Vec<i64> {
        self.shape.clone()
    }

    fn read_raw(&self, first: usize, out: &mut [u8]) -> anyhow::Result<()> {
        let range = self.byte_range(first, out.len())?;
        out.copy_from_slice(&self.data[range]);
        Ok(())
    }

    fn write_raw(&mut self, first: usize, data: &[u8]) -> anyhow::Result<()> {
        if !self.writable {
            anyhow::bail!("Cannot write image: data unit is opened read-only");
        }
        let range = self.byte_range(first, data.len())?;
        self.data[range].copy_from_slice(data);
        Ok(())
    }

    fn reshape(&mut self, code: TypeCode, shape: &[i64]) -> anyhow::Result<()> {
        if !self.writable {
            anyhow::bail!("Cannot resize image: data unit is opened read-only");
        }
        if code.bitpix().is_none() {
            anyhow::bail!("Type {} cannot be stored in an image", code);
        }
        let byte_count = (position::validate_shape(shape)? as usize)
            .checked_mul(code.width)
            .ok_or_else(|| anyhow::anyhow!("Image of shape {:?} is too large", shape))?;
        self.code = code;
        self.shape = shape.to_vec();
        self.data = vec![0u8; byte_count];
        if code.offset {
            for element in self.data.chunks_exact_mut(code.width) {
                element[0] = 0x80;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::{ScalarType, TEXT_CODE};

    #[test]
    fn new_image_is_zeroed() {
        let image = MemImage::new(ScalarType::I16.code(), &[4, 3]).unwrap();
        assert_eq!(image.shape(), vec![4, 3]);
        let mut out = vec![0xffu8; 24];
        image.read_raw(0, &mut out).unwrap();
        assert!(out.iter().all(|byte| *byte == 0));
        assert!(image.read_raw(11, &mut [0u8; 4]).is_err());
    }

    #[test]
    fn offset_images_hold_zeros() {
        let image = MemImage::new(ScalarType::U16.code(), &[3]).unwrap();
        let mut out = [0u8; 6];
        image.read_raw(0, &mut out).unwrap();
        assert_eq!(out, [0x80, 0, 0x80, 0, 0x80, 0]);
    }

    #[test]
    fn unsupported_codes_are_rejected() {
        assert!(MemImage::new(TEXT_CODE, &[2]).is_err());
        assert!(MemImage::new(ScalarType::Bool.code(), &[2]).is_err());
        assert!(MemImage::new(ScalarType::F64.code(), &[-2]).is_err());
    }

    #[test]
    fn read_only_image_rejects_writes() {
        let mut image = MemImage::new(ScalarType::U8.code(), &[2]).unwrap().read_only();
        assert!(image.write_raw(0, &[1, 2]).is_err());
        assert!(image.reshape(ScalarType::U8.code(), &[3]).is_err());
    }
}
