//! # Byte Coding
//!
//! Little-endian fixed-width and varint encodings used throughout the block
//! and table formats. Varints store 7 bits per byte, low bits first, with the
//! high bit flagging continuation.
//!
//! Encoders write into any [`BufMut`], so they work with `Vec<u8>` and
//! `BytesMut` alike.

use byteorder::{ByteOrder, LittleEndian};
use bytes::BufMut;

use crate::error::{Error, Result};

/// Longest possible varint32 encoding (5 bytes).
pub const MAX_VARINT32_LEN: usize = 5;
/// Longest possible varint64 encoding (10 bytes).
pub const MAX_VARINT64_LEN: usize = 10;

pub fn put_fixed32(dst: &mut impl BufMut, value: u32) {
    dst.put_u32_le(value);
}

pub fn put_fixed64(dst: &mut impl BufMut, value: u64) {
    dst.put_u64_le(value);
}

pub fn decode_fixed32(src: &[u8]) -> u32 {
    LittleEndian::read_u32(src)
}

pub fn decode_fixed64(src: &[u8]) -> u64 {
    LittleEndian::read_u64(src)
}

pub fn put_varint32(dst: &mut impl BufMut, value: u32) {
    put_varint64(dst, value as u64);
}

pub fn put_varint64(dst: &mut impl BufMut, mut value: u64) {
    while value >= 0x80 {
        dst.put_u8((value as u8) | 0x80);
        value >>= 7;
    }
    dst.put_u8(value as u8);
}

/// Number of bytes `put_varint64` would emit for `value`.
pub fn varint_length(mut value: u64) -> usize {
    let mut len = 1;
    while value >= 0x80 {
        value >>= 7;
        len += 1;
    }
    len
}

/// Decodes a varint32, returning the value and the number of bytes consumed.
pub fn get_varint32(src: &[u8]) -> Result<(u32, usize)> {
    let (value, consumed) = get_varint64(src)?;
    if value > u32::MAX as u64 {
        return Err(Error::corruption("varint32 overflow"));
    }
    Ok((value as u32, consumed))
}

/// Decodes a varint64, returning the value and the number of bytes consumed.
pub fn get_varint64(src: &[u8]) -> Result<(u64, usize)> {
    let mut value: u64 = 0;
    for (i, &byte) in src.iter().take(MAX_VARINT64_LEN).enumerate() {
        value |= ((byte & 0x7f) as u64) << (i * 7);
        if byte < 0x80 {
            return Ok((value, i + 1));
        }
    }
    Err(Error::corruption("truncated or malformed varint"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_roundtrip() {
        let mut buf = Vec::new();
        put_fixed32(&mut buf, 0xdeadbeef);
        put_fixed64(&mut buf, 0x0123_4567_89ab_cdef);
        assert_eq!(buf.len(), 12);
        assert_eq!(decode_fixed32(&buf[0..4]), 0xdeadbeef);
        assert_eq!(decode_fixed64(&buf[4..12]), 0x0123_4567_89ab_cdef);
    }

    #[test]
    fn test_fixed32_is_little_endian() {
        let mut buf = Vec::new();
        put_fixed32(&mut buf, 0x0403_0201);
        assert_eq!(buf, vec![0x01, 0x02, 0x03, 0x04]);
    }

    #[test]
    fn test_varint_roundtrip() {
        let values: Vec<u64> = vec![0, 1, 127, 128, 255, 16384, u32::MAX as u64, u64::MAX];
        for &v in &values {
            let mut buf = Vec::new();
            put_varint64(&mut buf, v);
            assert_eq!(buf.len(), varint_length(v));
            let (decoded, consumed) = get_varint64(&buf).unwrap();
            assert_eq!(decoded, v);
            assert_eq!(consumed, buf.len());
        }
    }

    #[test]
    fn test_varint_small_values_are_single_byte() {
        for v in 0u32..128 {
            let mut buf = Vec::new();
            put_varint32(&mut buf, v);
            assert_eq!(buf, vec![v as u8]);
        }
    }

    #[test]
    fn test_varint_truncated_is_corruption() {
        // High bit set on the final byte, nothing follows
        assert!(get_varint64(&[0x80]).is_err());
        assert!(get_varint64(&[]).is_err());
    }

    #[test]
    fn test_varint32_overflow_is_corruption() {
        let mut buf = Vec::new();
        put_varint64(&mut buf, u32::MAX as u64 + 1);
        assert!(get_varint32(&buf).is_err());
    }
}
