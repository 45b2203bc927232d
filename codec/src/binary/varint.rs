//! LEB128 varints, plus zig-zag mapping for signed values.
//!
//! Unsigned values take 1-10 bytes. Each byte carries seven value bits,
//! least significant group first; the high bit says more bytes follow.
//! Signed values are zig-zag mapped first so small magnitudes of either
//! sign stay short.

use bytes::BufMut;

use crate::config::MAX_VARINT_LEN;
use crate::error::{CodecError, CodecResult};

/// Append `value` as a varint.
pub fn put_uvarint<B: BufMut>(buf: &mut B, mut value: u64) {
    while value >= 0x80 {
        buf.put_u8((value as u8 & 0x7F) | 0x80);
        value >>= 7;
    }
    buf.put_u8(value as u8);
}

/// Append `value` as a zig-zag varint.
pub fn put_varint<B: BufMut>(buf: &mut B, value: i64) {
    put_uvarint(buf, zigzag_encode(value));
}

/// Decode a varint from the front of `buf`, returning `(value, consumed)`.
pub fn read_uvarint(buf: &[u8]) -> CodecResult<(u64, usize)> {
    let mut value: u64 = 0;
    for (i, &byte) in buf.iter().enumerate().take(MAX_VARINT_LEN) {
        let bits = u64::from(byte & 0x7F);
        // The tenth byte may only carry the single remaining bit.
        if i == MAX_VARINT_LEN - 1 && byte > 1 {
            return Err(CodecError::Malformed("varint overflows 64 bits".into()));
        }
        value |= bits << (7 * i);
        if byte & 0x80 == 0 {
            return Ok((value, i + 1));
        }
    }
    if buf.len() >= MAX_VARINT_LEN {
        Err(CodecError::Malformed("varint overflows 64 bits".into()))
    } else {
        Err(CodecError::Truncated { needed: 1 })
    }
}

/// Decode a zig-zag varint from the front of `buf`.
pub fn read_varint(buf: &[u8]) -> CodecResult<(i64, usize)> {
    read_uvarint(buf).map(|(raw, used)| (zigzag_decode(raw), used))
}

pub fn zigzag_encode(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)) as u64
}

pub fn zigzag_decode(raw: u64) -> i64 {
    ((raw >> 1) as i64) ^ -((raw & 1) as i64)
}

/// Number of bytes `value` takes as a varint.
pub fn uvarint_size(mut value: u64) -> usize {
    let mut size = 1;
    while value >= 0x80 {
        value >>= 7;
        size += 1;
    }
    size
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoded(value: u64) -> Vec<u8> {
        let mut buf = Vec::new();
        put_uvarint(&mut buf, value);
        buf
    }

    #[test]
    fn known_encodings() {
        assert_eq!(encoded(0), vec![0x00]);
        assert_eq!(encoded(127), vec![0x7F]);
        assert_eq!(encoded(128), vec![0x80, 0x01]);
        assert_eq!(encoded(300), vec![0xAC, 0x02]);
        assert_eq!(encoded(u64::MAX).len(), MAX_VARINT_LEN);
    }

    #[test]
    fn decode_reports_consumed_bytes() {
        let mut buf = encoded(300);
        buf.push(0xFF);
        assert_eq!(read_uvarint(&buf).unwrap(), (300, 2));
        assert_eq!(read_uvarint(&encoded(u64::MAX)).unwrap(), (u64::MAX, 10));
    }

    #[test]
    fn size_matches_encoding() {
        for value in [0, 1, 127, 128, 16_383, 16_384, u64::MAX / 3, u64::MAX] {
            assert_eq!(uvarint_size(value), encoded(value).len(), "{value}");
        }
    }

    #[test]
    fn zigzag_keeps_small_magnitudes_small() {
        assert_eq!(zigzag_encode(0), 0);
        assert_eq!(zigzag_encode(-1), 1);
        assert_eq!(zigzag_encode(1), 2);
        assert_eq!(zigzag_encode(-2), 3);
        for value in [i64::MIN, -300, -1, 0, 1, 300, i64::MAX] {
            assert_eq!(zigzag_decode(zigzag_encode(value)), value);
        }
    }

    #[test]
    fn truncated_and_overlong_inputs_fail() {
        assert!(matches!(
            read_uvarint(&[]),
            Err(CodecError::Truncated { .. })
        ));
        assert!(matches!(
            read_uvarint(&[0x80, 0x80]),
            Err(CodecError::Truncated { .. })
        ));
        assert!(matches!(
            read_uvarint(&[0xFF; 11]),
            Err(CodecError::Malformed(_))
        ));
        // Tenth byte carrying more than the final bit.
        let mut overflow = vec![0xFF; 9];
        overflow.push(0x02);
        assert!(matches!(
            read_uvarint(&overflow),
            Err(CodecError::Malformed(_))
        ));
    }

    #[test]
    fn signed_round_trip_through_buffer() {
        let mut buf = Vec::new();
        put_varint(&mut buf, -64);
        assert_eq!(buf, vec![0x7F]);
        assert_eq!(read_varint(&buf).unwrap(), (-64, 1));
    }
}
