mod common;

use fitskit_data::{FitsError, PtrRaster, Raster, VecRaster};
use fitskit_io::{ImageRaster, MemImage, ScalarType};

use common::init_tracing;

#[test]
fn raster_round_trip() -> anyhow::Result<()> {
    init_tracing();
    let mut image = MemImage::new(ScalarType::F32.code(), &[16, 9])?;
    let mut io = ImageRaster::new(&mut image);
    let input = VecRaster::<f32>::from_fn([16, 9], |p| p[0] as f32 + 0.1 * p[1] as f32)?;
    io.write(&input)?;
    let output = io.read_raster::<f32, [i64; 2]>()?;
    assert_eq!(output, input);
    assert!(output.approx(&input, 0.0));
    assert_eq!(*output.at(&[-1, -1])?, 15.0 + 0.1 * 8.0);
    Ok(())
}

#[test]
fn raster_of_runtime_dimension() -> anyhow::Result<()> {
    init_tracing();
    let mut image = MemImage::new(ScalarType::I32.code(), &[1])?;
    let mut io = ImageRaster::new(&mut image);
    io.reinit::<u16, _>(&vec![4i64, 3, 2])?;
    let input = VecRaster::<u16, Vec<i64>>::from_fn(vec![4, 3, 2], |p| {
        (p[0] + 10 * p[1] + 100 * p[2]) as u16 + 60000
    })?;
    io.write(&input)?;
    let output = io.read_raster::<u16, Vec<i64>>()?;
    assert_eq!(output.dimension(), 3);
    assert_eq!(output.vector(), input.vector());
    assert_eq!(*output.at(&vec![-1, -1, -1])?, 60123);
    assert!(matches!(
        io.read_raster::<u16, [i64; 2]>(),
        Err(FitsError::SizeMismatch(_))
    ));
    Ok(())
}

#[test]
fn read_into_borrowed_storage() -> anyhow::Result<()> {
    init_tracing();
    let mut image = MemImage::new(ScalarType::I64.code(), &[4, 3])?;
    let mut io = ImageRaster::new(&mut image);
    let input = VecRaster::<i64>::from_fn([4, 3], |p| p[0] * p[1] - 5)?;
    io.write(&input)?;

    let mut storage = vec![0i64; 12];
    {
        let mut view: PtrRaster<i64> = Raster::new([4, 3], storage.as_mut_slice())?;
        io.read_to(&mut view)?;
    }
    assert_eq!(&storage, input.vector());

    let mut wrong = VecRaster::<i64>::zeroed([3, 4])?;
    assert!(matches!(
        io.read_to(&mut wrong),
        Err(FitsError::SizeMismatch(_))
    ));
    let mut wrong_type = VecRaster::<i32>::zeroed([4, 3])?;
    assert!(matches!(
        io.read_to(&mut wrong_type),
        Err(FitsError::TypeMismatch { .. })
    ));
    Ok(())
}

#[test]
fn read_only_image() -> anyhow::Result<()> {
    init_tracing();
    let mut image = MemImage::new(ScalarType::F64.code(), &[2, 2])?.read_only();
    let mut io = ImageRaster::new(&mut image);
    let raster = VecRaster::<f64>::from_fn([2, 2], |p| (p[0] + p[1]) as f64)?;
    assert!(matches!(io.write(&raster), Err(FitsError::ReadOnly(_))));
    assert!(matches!(
        io.reinit::<f64, _>(&[3i64, 3]),
        Err(FitsError::ReadOnly(_))
    ));
    let zeros = io.read_raster::<f64, [i64; 2]>()?;
    assert!(zeros.data().iter().all(|value| *value == 0.0));
    Ok(())
}
