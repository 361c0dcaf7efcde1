//! Variable-length integer wire encoding.
//!
//! Seven payload bits per byte, least-significant group first, high bit set
//! while more bytes follow. Negative values are encoded through their 64-bit
//! two's complement representation and therefore always occupy
//! [`MAX_VINT_LEN`] bytes. Zigzag folding is a separate, explicit encoding;
//! which fields use which scheme is fixed by the format and never inferred.

use rcscan_common::{Result, error::Error};

/// Longest possible encoding of a 64-bit value: ceil(64 / 7) bytes.
pub const MAX_VINT_LEN: usize = 10;

/// Appends the varint encoding of `value` to `buf`.
pub fn write_var_long(buf: &mut Vec<u8>, value: i64) {
    let mut v = value as u64;
    loop {
        let byte = (v & 0x7f) as u8;
        v >>= 7;
        if v != 0 {
            buf.push(byte | 0x80);
        } else {
            buf.push(byte);
            break;
        }
    }
}

pub fn write_var_int(buf: &mut Vec<u8>, value: i32) {
    write_var_long(buf, value as i64);
}

/// Appends the zigzag-folded varint encoding of `value` to `buf`.
pub fn write_zigzag_long(buf: &mut Vec<u8>, value: i64) {
    let folded = ((value << 1) ^ (value >> 63)) as u64;
    write_var_long(buf, folded as i64);
}

/// Appends a length-prefixed UTF-8 text value to `buf`.
pub fn write_text(buf: &mut Vec<u8>, text: &str) {
    write_var_long(buf, text.len() as i64);
    buf.extend_from_slice(text.as_bytes());
}

/// Decodes a varint from `buf` starting at `*pos`, advancing `*pos` past it.
///
/// Fails with a truncation error when the encoding runs off the end of the
/// buffer, and with a format error when a well-terminated encoding exceeds
/// [`MAX_VINT_LEN`] bytes.
pub fn read_var_long_at(buf: &[u8], pos: &mut usize) -> Result<i64> {
    let mut value: u64 = 0;
    let mut shift = 0u32;
    for count in 0..MAX_VINT_LEN {
        let Some(&byte) = buf.get(*pos + count) else {
            return Err(Error::truncated(
                "varint",
                (count + 1) as u64,
                count as u64,
            ));
        };
        value |= ((byte & 0x7f) as u64) << shift;
        shift += 7;
        if byte & 0x80 == 0 {
            *pos += count + 1;
            return Ok(value as i64);
        }
    }
    Err(Error::invalid_format("varint", "encoding exceeds 10 bytes"))
}

/// Decodes a varint that must fit in 32 bits.
pub fn read_var_int_at(buf: &[u8], pos: &mut usize) -> Result<i32> {
    let value = read_var_long_at(buf, pos)?;
    i32::try_from(value)
        .map_err(|_| Error::invalid_format("varint", format!("value {value} exceeds 32 bits")))
}

/// Unfolds a zigzag-encoded value decoded by [`read_var_long_at`].
pub fn unfold_zigzag(folded: i64) -> i64 {
    let v = folded as u64;
    ((v >> 1) as i64) ^ -((v & 1) as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(value: i64) -> i64 {
        let mut buf = Vec::new();
        write_var_long(&mut buf, value);
        let mut pos = 0;
        let decoded = read_var_long_at(&buf, &mut pos).unwrap();
        assert_eq!(pos, buf.len());
        decoded
    }

    #[test]
    fn test_var_long_roundtrip() {
        for value in [0i64, 1, 127, 128, 300, 16383, 16384, i64::MAX] {
            assert_eq!(roundtrip(value), value);
        }
    }

    #[test]
    fn test_var_long_negative_roundtrip() {
        for value in [-1i64, -2, -127, -4096, i64::MIN] {
            assert_eq!(roundtrip(value), value);
        }
        // Two's complement negatives always use the maximum length.
        let mut buf = Vec::new();
        write_var_long(&mut buf, -1);
        assert_eq!(buf.len(), MAX_VINT_LEN);
    }

    #[test]
    fn test_var_long_randomized_roundtrip() {
        for _ in 0..1000 {
            let value = fastrand::i64(..);
            assert_eq!(roundtrip(value), value);
        }
    }

    #[test]
    fn test_truncated_encoding() {
        // A continuation bit with no following byte.
        let buf = [0x80u8, 0x80];
        let mut pos = 0;
        let err = read_var_long_at(&buf, &mut pos).unwrap_err();
        assert!(matches!(
            err.kind(),
            rcscan_common::error::ErrorKind::TruncatedRead { .. }
        ));
        // Position is not advanced past a failed decode.
        assert_eq!(pos, 0);
    }

    #[test]
    fn test_never_terminating_encoding() {
        let buf = [0xffu8; 16];
        let mut pos = 0;
        let err = read_var_long_at(&buf, &mut pos).unwrap_err();
        assert!(matches!(
            err.kind(),
            rcscan_common::error::ErrorKind::InvalidFormat { .. }
        ));
    }

    #[test]
    fn test_var_int_range_check() {
        let mut buf = Vec::new();
        write_var_long(&mut buf, i64::from(i32::MAX) + 1);
        let mut pos = 0;
        assert!(read_var_int_at(&buf, &mut pos).is_err());

        let mut buf = Vec::new();
        write_var_int(&mut buf, -42);
        let mut pos = 0;
        assert_eq!(read_var_int_at(&buf, &mut pos).unwrap(), -42);
    }

    #[test]
    fn test_zigzag_roundtrip() {
        for value in [0i64, -1, 1, -2, 2, i64::MIN, i64::MAX] {
            let mut buf = Vec::new();
            write_zigzag_long(&mut buf, value);
            let mut pos = 0;
            let folded = read_var_long_at(&buf, &mut pos).unwrap();
            assert_eq!(unfold_zigzag(folded), value);
        }
        // Small magnitudes stay small on the wire.
        let mut buf = Vec::new();
        write_zigzag_long(&mut buf, -64);
        assert_eq!(buf.len(), 1);
    }

    #[test]
    fn test_text_roundtrip() {
        let mut buf = Vec::new();
        write_text(&mut buf, "hive.io.rcfile.column.number");
        let mut pos = 0;
        let len = read_var_long_at(&buf, &mut pos).unwrap() as usize;
        let text = std::str::from_utf8(&buf[pos..pos + len]).unwrap();
        assert_eq!(text, "hive.io.rcfile.column.number");
    }
}
