//! Variable-length integers.
//!
//! Unsigned (`VULong`): values up to `0xf7` take one byte; larger values are
//! written as a length byte `0xf7 + n` followed by `n` big-endian bytes of
//! `v - 0xf8`.
//!
//! Signed (`VSLong`): values in `-120..=119` take one byte (`v + 0x80`).
//! Larger magnitudes use a length byte and big-endian magnitude bytes; for
//! negative values both are bit-flipped. The encoding is order-preserving:
//! comparing two encodings as unsigned byte strings gives the numeric order.

use std::io::{Read, Write};

use crate::error::{CodecError, CodecResult};

const ONE_BYTE_MAX: u64 = 0xf7;
const UNSIGNED_BIAS: u64 = 0xf8;
const SIGNED_MIN: i64 = -120;
const SIGNED_MAX: i64 = 119;
const SIGNED_BIAS: u64 = 120;

/// Number of bytes needed to hold `v` big-endian (at least one).
fn byte_len(v: u64) -> usize {
    let bits = 64 - v.leading_zeros() as usize;
    bits.div_ceil(8).max(1)
}

fn read_byte(input: &mut dyn Read) -> CodecResult<u8> {
    let mut buf = [0u8; 1];
    input.read_exact(&mut buf)?;
    Ok(buf[0])
}

fn read_be(input: &mut dyn Read, len: usize, flip: u8) -> CodecResult<u64> {
    let mut buf = [0u8; 8];
    input.read_exact(&mut buf[..len])?;
    Ok(buf[..len]
        .iter()
        .fold(0u64, |acc, b| (acc << 8) | u64::from(b ^ flip)))
}

pub fn write_vulong(out: &mut dyn Write, v: u64) -> CodecResult<()> {
    if v <= ONE_BYTE_MAX {
        out.write_all(&[v as u8])?;
        return Ok(());
    }
    let rest = v - UNSIGNED_BIAS;
    let len = byte_len(rest);
    let mut buf = [0u8; 9];
    buf[0] = (ONE_BYTE_MAX as usize + len) as u8;
    buf[1..=len].copy_from_slice(&rest.to_be_bytes()[8 - len..]);
    out.write_all(&buf[..=len])?;
    Ok(())
}

pub fn read_vulong(input: &mut dyn Read) -> CodecResult<u64> {
    let first = read_byte(input)?;
    if u64::from(first) <= ONE_BYTE_MAX {
        return Ok(u64::from(first));
    }
    let len = usize::from(first) - ONE_BYTE_MAX as usize;
    read_be(input, len, 0)?
        .checked_add(UNSIGNED_BIAS)
        .ok_or_else(|| CodecError::Malformed("unsigned varint overflows 64 bits".into()))
}

/// Reads a `VULong` that counts items or bytes in memory.
pub fn read_len(input: &mut dyn Read) -> CodecResult<usize> {
    let v = read_vulong(input)?;
    usize::try_from(v).map_err(|_| CodecError::Malformed(format!("length {v} out of range")))
}

pub fn write_vslong(out: &mut dyn Write, v: i64) -> CodecResult<()> {
    if (SIGNED_MIN..=SIGNED_MAX).contains(&v) {
        out.write_all(&[(v + 0x80) as u8])?;
        return Ok(());
    }
    let (magnitude, flip) = if v < 0 { (!v as u64, 0xffu8) } else { (v as u64, 0u8) };
    let rest = magnitude - SIGNED_BIAS;
    let len = byte_len(rest);
    let mut buf = [0u8; 9];
    buf[0] = ((ONE_BYTE_MAX as usize + len) as u8) ^ flip;
    for (dst, src) in buf[1..=len].iter_mut().zip(&rest.to_be_bytes()[8 - len..]) {
        *dst = src ^ flip;
    }
    out.write_all(&buf[..=len])?;
    Ok(())
}

pub fn read_vslong(input: &mut dyn Read) -> CodecResult<i64> {
    let first = read_byte(input)?;
    if (0x08..=0xf7).contains(&first) {
        return Ok(i64::from(first) - 0x80);
    }
    let flip = if first < 0x08 { 0xffu8 } else { 0u8 };
    let len = usize::from(first ^ flip) - ONE_BYTE_MAX as usize;
    let magnitude = read_be(input, len, flip)?
        .checked_add(SIGNED_BIAS)
        .filter(|m| *m <= i64::MAX as u64)
        .ok_or_else(|| CodecError::Malformed("signed varint overflows 64 bits".into()))?;
    let v = magnitude as i64;
    Ok(if flip == 0 { v } else { !v })
}

/// Advances past one varint of either flavour without decoding it.
pub fn skip_varint(input: &mut dyn Read, signed: bool) -> CodecResult<()> {
    if signed {
        read_vslong(input).map(|_| ())
    } else {
        read_vulong(input).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_signed(v: i64) -> Vec<u8> {
        let mut out = Vec::new();
        write_vslong(&mut out, v).unwrap();
        out
    }

    fn encode_unsigned(v: u64) -> Vec<u8> {
        let mut out = Vec::new();
        write_vulong(&mut out, v).unwrap();
        out
    }

    #[test]
    fn test_small_values_take_one_byte() {
        assert_eq!(encode_unsigned(0), vec![0]);
        assert_eq!(encode_unsigned(0xf7), vec![0xf7]);
        assert_eq!(encode_signed(0), vec![0x80]);
        assert_eq!(encode_signed(-120), vec![0x08]);
        assert_eq!(encode_signed(119), vec![0xf7]);
    }

    #[test]
    fn test_unsigned_boundaries() {
        assert_eq!(encode_unsigned(0xf8), vec![0xf8, 0x00]);
        assert_eq!(encode_unsigned(0xf8 + 0xff), vec![0xf8, 0xff]);
        assert_eq!(encode_unsigned(0xf8 + 0x100), vec![0xf9, 0x01, 0x00]);
        for v in [0, 1, 0xf7, 0xf8, 0x1f7, 0x1f8, 1 << 20, u64::MAX - 0xf8, u64::MAX] {
            let bytes = encode_unsigned(v);
            assert_eq!(read_vulong(&mut bytes.as_slice()).unwrap(), v);
        }
    }

    #[test]
    fn test_signed_extremes() {
        for v in [i64::MIN, i64::MIN + 1, -121, -120, -1, 0, 1, 119, 120, 1 << 40, i64::MAX] {
            let bytes = encode_signed(v);
            assert!(bytes.len() <= 9);
            assert_eq!(read_vslong(&mut bytes.as_slice()).unwrap(), v, "value {v}");
        }
    }

    #[test]
    fn test_signed_encoding_preserves_order() {
        let samples = [
            i64::MIN, -1 << 40, -70_000, -256, -121, -120, -5, 0, 7, 119, 120, 300, 70_000, 1 << 40,
            i64::MAX,
        ];
        for pair in samples.windows(2) {
            assert!(
                encode_signed(pair[0]) < encode_signed(pair[1]),
                "{} should encode below {}",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn test_truncated_varint() {
        let bytes = encode_signed(1 << 30);
        let err = read_vslong(&mut &bytes[..2]).unwrap_err();
        assert!(matches!(err, CodecError::Truncated));

        let err = read_vulong(&mut &[][..]).unwrap_err();
        assert!(matches!(err, CodecError::Truncated));
    }
}
