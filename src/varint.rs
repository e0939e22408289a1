//! Base-128 varint encoding.
//!
//! Each octet carries a continuation bit (MSB) and 7 data bits. The least
//! significant group is written first; the last octet has continuation = 0.
//! A `u64` needs at most 10 octets.

use crate::bytestream::{ByteReader, ByteWriter};
use crate::{Error, Result};

/// Longest legal varint in bytes.
pub const MAX_VARINT_LEN: usize = 10;

/// Encodes a `u64` as a varint.
#[inline]
pub fn encode(writer: &mut ByteWriter, value: u64) {
    if value < 0x80 {
        // Fast-Path: Single-Byte (haeufigster Fall: Tags, kleine Laengen)
        writer.write_byte(value as u8);
        return;
    }
    let mut v = value;
    loop {
        let low7 = (v & 0x7F) as u8;
        v >>= 7;
        if v == 0 {
            writer.write_byte(low7);
            break;
        }
        writer.write_byte(0x80 | low7);
    }
}

/// Decodes a varint from the stream.
#[inline]
pub fn decode(reader: &mut ByteReader) -> Result<u64> {
    let byte = reader.read_byte()?;
    if byte & 0x80 == 0 {
        return Ok(u64::from(byte));
    }
    let mut result = u64::from(byte & 0x7F);
    let mut shift: u32 = 7;
    loop {
        let byte = reader.read_byte()?;
        let data = u64::from(byte & 0x7F);
        // Beim 10. Byte (shift 63) ist nur Daten-Bit 0 gueltig und keine Fortsetzung.
        if shift == 63 && (data > 1 || byte & 0x80 != 0) {
            return Err(Error::malformed("varint exceeds 10 bytes / 64 bits"));
        }
        result |= data << shift;
        if byte & 0x80 == 0 {
            return Ok(result);
        }
        shift += 7;
    }
}

/// Encodes `value` into a fresh byte vector.
pub fn encode_varint(value: u64) -> Vec<u8> {
    let mut w = ByteWriter::with_capacity(encoded_len(value));
    encode(&mut w, value);
    w.into_vec()
}

/// Decodes a varint starting at `offset`, returning the value and the
/// number of bytes it occupied.
pub fn decode_varint(bytes: &[u8], offset: usize) -> Result<(u64, usize)> {
    if offset > bytes.len() {
        return Err(Error::truncated());
    }
    let mut r = ByteReader::at(bytes, offset);
    let value = decode(&mut r)?;
    Ok((value, r.position() - offset))
}

/// Number of bytes `value` occupies when varint-encoded.
pub fn encoded_len(value: u64) -> usize {
    // 1 + floor((bits - 1) / 7), bits >= 1
    let bits = 64 - (value | 1).leading_zeros() as usize;
    (bits + 6) / 7
}

/// ZigZag-maps a signed 32-bit value onto an unsigned one (`sint32`).
#[inline]
pub fn zigzag_encode_32(value: i32) -> u32 {
    ((value << 1) ^ (value >> 31)) as u32
}

/// Inverse of [`zigzag_encode_32`].
#[inline]
pub fn zigzag_decode_32(value: u32) -> i32 {
    ((value >> 1) as i32) ^ -((value & 1) as i32)
}

/// ZigZag-maps a signed 64-bit value onto an unsigned one (`sint64`).
#[inline]
pub fn zigzag_encode_64(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)) as u64
}

/// Inverse of [`zigzag_encode_64`].
#[inline]
pub fn zigzag_decode_64(value: u64) -> i64 {
    ((value >> 1) as i64) ^ -((value & 1) as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(value: u64) -> u64 {
        let data = encode_varint(value);
        let (decoded, used) = decode_varint(&data, 0).unwrap();
        assert_eq!(used, data.len());
        decoded
    }

    #[test]
    fn single_byte_values() {
        assert_eq!(encode_varint(0), vec![0x00]);
        assert_eq!(encode_varint(1), vec![0x01]);
        assert_eq!(encode_varint(127), vec![0x7F]);
    }

    // 150 ist das Standardbeispiel der Protobuf-Doku: 0x96 0x01
    #[test]
    fn value_150() {
        assert_eq!(encode_varint(150), vec![0x96, 0x01]);
        assert_eq!(decode_varint(&[0x96, 0x01], 0).unwrap(), (150, 2));
    }

    #[test]
    fn min_two_byte_value() {
        assert_eq!(encode_varint(128), vec![0x80, 0x01]);
    }

    #[test]
    fn max_value_is_ten_bytes() {
        let data = encode_varint(u64::MAX);
        assert_eq!(data.len(), MAX_VARINT_LEN);
        assert_eq!(data[9], 0x01);
        assert_eq!(round_trip(u64::MAX), u64::MAX);
    }

    #[test]
    fn round_trip_diverse_values() {
        for &val in &[0, 1, 127, 128, 255, 300, 16_383, 16_384, 1 << 31, 1 << 35, u64::MAX / 2, u64::MAX] {
            assert_eq!(round_trip(val), val, "round-trip failed for {val}");
        }
    }

    #[test]
    fn encoded_len_matches_encoding() {
        for &val in &[0, 1, 127, 128, 16_383, 16_384, 1 << 49, 1 << 56, u64::MAX] {
            assert_eq!(encoded_len(val), encode_varint(val).len(), "len mismatch for {val}");
        }
    }

    #[test]
    fn decode_at_offset() {
        let data = [0xFF, 0xAC, 0x02, 0x05];
        assert_eq!(decode_varint(&data, 1).unwrap(), (300, 2));
        assert_eq!(decode_varint(&data, 3).unwrap(), (5, 1));
    }

    #[test]
    fn decode_truncated() {
        assert!(decode_varint(&[], 0).unwrap_err().is_malformed());
        assert!(decode_varint(&[0x80], 0).unwrap_err().is_malformed());
        assert!(decode_varint(&[0x01], 5).unwrap_err().is_malformed());
    }

    #[test]
    fn decode_overflow_eleven_bytes() {
        let mut data = vec![0x80; 10];
        data.push(0x01);
        assert!(decode_varint(&data, 0).unwrap_err().is_malformed());
    }

    #[test]
    fn decode_overflow_tenth_byte_continuation() {
        let mut data = vec![0x80; 9];
        data.push(0x81);
        assert!(decode_varint(&data, 0).unwrap_err().is_malformed());
    }

    #[test]
    fn decode_overflow_tenth_byte_too_large() {
        let mut data = vec![0xFF; 9];
        data.push(0x02);
        assert!(decode_varint(&data, 0).unwrap_err().is_malformed());
    }

    #[test]
    fn zigzag_32() {
        assert_eq!(zigzag_encode_32(0), 0);
        assert_eq!(zigzag_encode_32(-1), 1);
        assert_eq!(zigzag_encode_32(1), 2);
        assert_eq!(zigzag_encode_32(-2), 3);
        assert_eq!(zigzag_encode_32(i32::MAX), u32::MAX - 1);
        assert_eq!(zigzag_encode_32(i32::MIN), u32::MAX);
        for v in [0, 1, -1, 12345, -12345, i32::MAX, i32::MIN] {
            assert_eq!(zigzag_decode_32(zigzag_encode_32(v)), v);
        }
    }

    #[test]
    fn zigzag_64() {
        assert_eq!(zigzag_encode_64(-1), 1);
        assert_eq!(zigzag_encode_64(i64::MIN), u64::MAX);
        for v in [0, 1, -1, 1 << 40, -(1 << 40), i64::MAX, i64::MIN] {
            assert_eq!(zigzag_decode_64(zigzag_encode_64(v)), v);
        }
    }
}
