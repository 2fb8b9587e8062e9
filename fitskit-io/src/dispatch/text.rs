use std::ffi::CStr;

use bytes::{BufMut, BytesMut};

use super::ColumnSlot;
use crate::backend::BintableBackend;

/// Decode one fixed-width text field.
///
/// The field ends at the first NUL byte, if any, and trailing blanks are dropped.
pub fn decode_text(field: &[u8]) -> String {
    let bytes = match CStr::from_bytes_until_nul(field) {
        Ok(value) => value.to_bytes(),
        Err(_) => field,
    };
    String::from_utf8_lossy(bytes).trim_end().to_string()
}

/// Append `value` as a blank-padded field of `width` bytes.
///
/// Longer values are cut at the last character boundary which fits. Returns `false` if the
/// value had to be truncated.
pub fn encode_text(value: &str, width: usize, buf: &mut BytesMut) -> bool {
    let mut len = value.len().min(width);
    while !value.is_char_boundary(len) {
        len -= 1;
    }
    buf.put_slice(&value.as_bytes()[..len]);
    buf.put_bytes(b' ', width - len);
    len == value.len()
}

/// Read a block of characters and split it into one value per row.
pub(crate) fn read_rows(
    backend: &dyn BintableBackend,
    column: &ColumnSlot,
    first_row: usize,
    out: &mut [String],
) -> anyhow::Result<()> {
    let width = column.descriptor.repeat;
    if width == 0 {
        out.iter_mut().for_each(String::clear);
        return Ok(());
    }
    let mut raw = vec![0u8; out.len() * width];
    backend.read_rows(column.index, first_row, &mut raw)?;
    for (value, field) in out.iter_mut().zip(raw.chunks_exact(width)) {
        *value = decode_text(field);
    }
    Ok(())
}

pub(crate) fn write_rows(
    backend: &mut dyn BintableBackend,
    column: &ColumnSlot,
    first_row: usize,
    values: &[String],
) -> anyhow::Result<()> {
    let width = column.descriptor.repeat;
    if width == 0 {
        return Ok(());
    }
    let mut raw = BytesMut::with_capacity(values.len() * width);
    let truncated = values
        .iter()
        .filter(|value| !encode_text(value, width, &mut raw))
        .count();
    if truncated > 0 {
        tracing::warn!(
            "Truncated {} values to {} characters in column {}",
            truncated,
            width,
            column.name
        );
    }
    backend.write_rows(column.index, first_row, &raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_stops_at_nul_and_trims() {
        assert_eq!(decode_text(b"hello\0\0\0"), "hello");
        assert_eq!(decode_text(b"abc     "), "abc");
        assert_eq!(decode_text(b"full"), "full");
        assert_eq!(decode_text(b"\0garbage"), "");
        assert_eq!(decode_text(b"  lead  "), "  lead");
    }

    #[test]
    fn encode_pads_with_blanks() {
        let mut buf = BytesMut::new();
        assert!(encode_text("ab", 4, &mut buf));
        assert!(!encode_text("abcdef", 4, &mut buf));
        assert_eq!(&buf[..], b"ab  abcd");
    }

    #[test]
    fn truncation_keeps_whole_characters() {
        let mut buf = BytesMut::new();
        assert!(!encode_text("h\u{e9}llo", 2, &mut buf));
        assert_eq!(&buf[..], b"h ");
        assert!(encode_text("\u{e9}t\u{e9}", 5, &mut buf));
        assert_eq!(decode_text(&buf[2..]), "\u{e9}t\u{e9}");
    }
}
