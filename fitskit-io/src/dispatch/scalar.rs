use bytes::BytesMut;

use super::{ColumnSlot, Primitive};
use crate::backend::BintableBackend;

/// Decode big-endian values, `raw` holding exactly `out.len()` of them.
pub fn decode_values<P: Primitive>(raw: &[u8], out: &mut [P]) {
    let mut buf = raw;
    for value in out.iter_mut() {
        *value = P::get(&mut buf);
    }
}

pub fn encode_values<P: Primitive>(values: &[P]) -> BytesMut {
    let mut buf = BytesMut::with_capacity(values.len() * P::SCALAR.code().width);
    for value in values {
        value.put(&mut buf);
    }
    buf
}

/// Read scalar or fixed-length vector rows with a single backend call.
pub(crate) fn read_rows<P: Primitive>(
    backend: &dyn BintableBackend,
    column: &ColumnSlot,
    first_row: usize,
    out: &mut [P],
) -> anyhow::Result<()> {
    let mut raw = vec![0u8; out.len() * column.descriptor.code.width];
    backend.read_rows(column.index, first_row, &mut raw)?;
    decode_values(&raw, out);
    Ok(())
}

pub(crate) fn write_rows<P: Primitive>(
    backend: &mut dyn BintableBackend,
    column: &ColumnSlot,
    first_row: usize,
    values: &[P],
) -> anyhow::Result<()> {
    let raw = encode_values(values);
    backend.write_rows(column.index, first_row, &raw)
}
